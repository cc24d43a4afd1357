// MPA - Multichain Proposal Analyzer
// Copyright (C) 2024 Zhuo Zhang and Wuqi Zhang
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Tracing bootstrap for binaries and tests embedding the analyzer.
//!
//! Library code only emits `tracing` events; installing a subscriber is the
//! embedder's job. This module provides the default wiring: an env-filtered
//! fmt subscriber honouring `RUST_LOG`, quiet (`warn`) by default.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Installs the default fmt subscriber.
///
/// Respects `RUST_LOG`; defaults to `warn` plus `info` for the analyzer
/// crates. Calling it twice is a no-op (the second install fails silently),
/// which keeps it safe to use from tests.
pub fn init() {
    init_with_default("warn,mpa_engine=info,mpa_common=info");
}

/// Installs the default fmt subscriber with an explicit fallback filter.
pub fn init_with_default(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true))
        .try_init();
}
