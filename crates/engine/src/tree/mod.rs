//! The four-level proposal trees.
//!
//! [`DecodedTimelockProposal`] is produced once by the decoder and stays
//! immutable for the whole run; [`AnalyzedTimelockProposal`] is its mutable
//! mirror carrying per-node annotation lists. Node identity is positional:
//! `(batch, call, input/output, parameter)`, captured by [`NodePath`].

mod analyzed;
mod decoded;

pub use analyzed::*;
pub use decoded::*;

use std::fmt;

use serde::{Deserialize, Serialize};

/// Tree levels, ordered coarsest to finest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Level {
    /// The proposal root.
    Proposal,
    /// A per-chain batch of calls.
    BatchOperation,
    /// A single contract method invocation.
    Call,
    /// A named input or output of a call.
    Parameter,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Proposal => "proposal",
            Self::BatchOperation => "batch_operation",
            Self::Call => "call",
            Self::Parameter => "parameter",
        };
        f.write_str(s)
    }
}

/// Positional identity of a tree node.
///
/// Paths are stable across the decoded and analyzed trees, so analyzers and
/// the runner address write targets by path alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodePath {
    /// The proposal root.
    Proposal,
    /// `batches[batch]`.
    Batch {
        /// Batch index.
        batch: usize,
    },
    /// `batches[batch].calls[call]`.
    Call {
        /// Batch index.
        batch: usize,
        /// Call index within the batch.
        call: usize,
    },
    /// A parameter of `batches[batch].calls[call]`.
    Parameter {
        /// Batch index.
        batch: usize,
        /// Call index within the batch.
        call: usize,
        /// Whether the parameter is an input (`true`) or output (`false`).
        is_input: bool,
        /// Parameter index within the input or output list.
        param: usize,
    },
}

impl NodePath {
    /// The proposal root path.
    pub fn proposal() -> Self {
        Self::Proposal
    }

    /// Path of a batch operation.
    pub fn batch(batch: usize) -> Self {
        Self::Batch { batch }
    }

    /// Path of a call.
    pub fn call(batch: usize, call: usize) -> Self {
        Self::Call { batch, call }
    }

    /// Path of a parameter.
    pub fn parameter(batch: usize, call: usize, is_input: bool, param: usize) -> Self {
        Self::Parameter { batch, call, is_input, param }
    }

    /// The tree level this path addresses.
    pub fn level(&self) -> Level {
        match self {
            Self::Proposal => Level::Proposal,
            Self::Batch { .. } => Level::BatchOperation,
            Self::Call { .. } => Level::Call,
            Self::Parameter { .. } => Level::Parameter,
        }
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Proposal => write!(f, "proposal"),
            Self::Batch { batch } => write!(f, "batch {batch}"),
            Self::Call { batch, call } => write!(f, "batch {batch} / call {call}"),
            Self::Parameter { batch, call, is_input, param } => {
                let dir = if *is_input { "input" } else { "output" };
                write!(f, "batch {batch} / call {call} / {dir} {param}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_levels_are_ordered_coarse_to_fine() {
        assert!(Level::Proposal < Level::BatchOperation);
        assert!(Level::BatchOperation < Level::Call);
        assert!(Level::Call < Level::Parameter);
    }

    #[test]
    fn test_path_display() {
        assert_eq!(NodePath::proposal().to_string(), "proposal");
        assert_eq!(NodePath::call(0, 3).to_string(), "batch 0 / call 3");
        assert_eq!(
            NodePath::parameter(1, 2, false, 0).to_string(),
            "batch 1 / call 2 / output 0"
        );
        assert_eq!(NodePath::parameter(1, 2, true, 0).level(), Level::Parameter);
    }
}
