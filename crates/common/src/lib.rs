// Copyright (C) 2024 Zhuo Zhang and Wuqi Zhang
// SPDX-License-Identifier: AGPL-3.0
//! MPA Common - Shared functionality for the proposal analyzer
//!
//! This crate provides the pieces shared between the analysis engine and any
//! embedding tool: the chain-family model and selector registry, display
//! formatting for decoded Solidity values, and the tracing bootstrap.

pub mod chain;
pub mod logging;
pub mod sol_value;

pub use chain::*;
pub use logging::*;
pub use sol_value::*;
