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

//! Error taxonomy for decoding, analysis, and rendering.
//!
//! Only [`DecodeError`] is recoverable: the decoder downgrades a failed call
//! to `[undecoded]` and keeps going. Everything in [`AnalysisError`] aborts
//! the run; no partially annotated tree escapes the engine.

use std::time::Duration;

use thiserror::Error;

use crate::tree::NodePath;

/// Fatal errors produced while registering analyzers or running an analysis.
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// An analyzer was registered with an empty ID.
    #[error("analyzer id must not be empty")]
    EmptyAnalyzerId,

    /// Two analyzers share the same ID.
    #[error("analyzer '{0}' is already registered")]
    DuplicateAnalyzer(String),

    /// An analyzer declared a dependency that is not registered.
    #[error("analyzer '{analyzer}' depends on unknown analyzer '{dependency}'")]
    MissingDependency {
        /// The analyzer declaring the dependency.
        analyzer: String,
        /// The missing dependency ID.
        dependency: String,
    },

    /// The dependency relation contains a cycle. The path starts and ends
    /// with the same analyzer ID.
    #[error("circular dependency detected: [{}]", path.join(" "))]
    CircularDependency {
        /// The offending path, e.g. `[A B C A]`.
        path: Vec<String>,
    },

    /// An analyzer callback returned an error.
    #[error("analyzer '{analyzer}' failed at {path}: {source}")]
    Analyzer {
        /// ID of the failing analyzer.
        analyzer: String,
        /// Tree node the analyzer was applied to.
        path: NodePath,
        /// The underlying analyzer error.
        source: eyre::Report,
    },

    /// An analyzer exceeded the per-call deadline.
    #[error("analyzer '{analyzer}' timed out at {path} after {timeout:?}")]
    Timeout {
        /// ID of the timed-out analyzer.
        analyzer: String,
        /// Tree node the analyzer was applied to.
        path: NodePath,
        /// The configured per-call deadline.
        timeout: Duration,
    },

    /// The caller cancelled the run.
    #[error("analysis cancelled")]
    Cancelled,
}

impl AnalysisError {
    /// Whether this error came out of analyzer validation (registration or
    /// graph construction) rather than execution.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::EmptyAnalyzerId
                | Self::DuplicateAnalyzer(_)
                | Self::MissingDependency { .. }
                | Self::CircularDependency { .. }
        )
    }
}

/// Per-call decoding failures. Never fatal: the affected call is kept as
/// `[undecoded]` with its raw payload preserved.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// No decoder is registered for the transaction's contract type.
    #[error("no decoder registered for contract type '{0}'")]
    UnknownContractType(String),

    /// The calldata is shorter than a method selector.
    #[error("calldata too short for a method selector ({0} bytes)")]
    ShortCalldata(usize),

    /// The method selector/discriminator matched nothing in the registry.
    #[error("unknown method selector 0x{0}")]
    UnknownSelector(String),

    /// Argument bytes did not decode against the resolved signature.
    #[error("argument decoding failed: {0}")]
    Arguments(String),

    /// `additional_fields` were required but missing or malformed.
    #[error("missing or malformed additional fields: {0}")]
    AdditionalFields(String),
}

/// Rendering failures. Surfaced to the caller; the analyzed tree stays
/// valid.
#[derive(Debug, Error)]
pub enum RenderError {
    /// The requested output format is not one of `text|html|markdown|json`.
    #[error("unknown output format '{0}'")]
    UnknownFormat(String),

    /// A template failed to compile at renderer construction.
    #[error("template '{0}' failed to compile: {1}")]
    Template(String, #[source] Box<handlebars::TemplateError>),

    /// Template execution failed.
    #[error(transparent)]
    Render(#[from] Box<handlebars::RenderError>),

    /// The analyzed tree failed to serialize for the JSON format.
    #[error("serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    /// The output writer failed.
    #[error("write failed: {0}")]
    Io(#[from] std::io::Error),
}

impl From<handlebars::RenderError> for RenderError {
    fn from(err: handlebars::RenderError) -> Self {
        Self::Render(Box::new(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_message_lists_path() {
        let err = AnalysisError::CircularDependency {
            path: vec!["A".into(), "B".into(), "C".into(), "A".into()],
        };
        let message = err.to_string();
        assert!(message.contains("circular dependency detected"));
        assert!(message.contains("[A B C A]"));
        assert!(err.is_validation());
    }

    #[test]
    fn test_analyzer_error_names_analyzer_and_path() {
        let err = AnalysisError::Analyzer {
            analyzer: "token-pool".into(),
            path: NodePath::call(1, 2),
            source: eyre::eyre!("boom"),
        };
        let message = err.to_string();
        assert!(message.contains("token-pool"));
        assert!(message.contains("batch 1"));
        assert!(message.contains("boom"));
        assert!(!err.is_validation());
    }
}
