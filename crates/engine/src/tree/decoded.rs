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

//! The immutable decoded proposal tree.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::proposal::TimelockAction;

/// Method name assigned to calls the decoder could not decode.
pub const UNDECODED_METHOD: &str = "[undecoded]";

/// A named, decoded input or output of a call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecodedParameter {
    /// Parameter name from the contract interface (may be empty).
    pub name: String,
    /// Declared type, e.g. `uint256` or `vector<u8>`.
    #[serde(rename = "type")]
    pub ty: String,
    /// Decoded value as its JSON projection.
    pub value: Value,
    /// Decoder-provided render-ready form, where available.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_value: Option<String>,
}

impl DecodedParameter {
    /// Creates a parameter without a display form.
    pub fn new(name: impl Into<String>, ty: impl Into<String>, value: Value) -> Self {
        Self { name: name.into(), ty: ty.into(), value, display_value: None }
    }

    /// Sets the render-ready display form.
    pub fn with_display(mut self, display_value: impl Into<String>) -> Self {
        self.display_value = Some(display_value.into());
        self
    }
}

/// A single decoded contract method invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecodedCall {
    /// Free-form contract type token, e.g. `LockReleaseTokenPool`.
    pub contract_type: String,
    /// Target address in the chain's native textual form.
    pub address: String,
    /// Resolved method name, or [`UNDECODED_METHOD`].
    pub method_name: String,
    /// Decoded inputs, in signature order.
    pub inputs: Vec<DecodedParameter>,
    /// Decoded outputs, in signature order (usually empty for calldata).
    pub outputs: Vec<DecodedParameter>,
    /// The original encoded payload, preserved verbatim.
    #[serde(with = "hex::serde")]
    pub data: Vec<u8>,
    /// Raw `additional_fields` JSON, preserved verbatim; `None` when absent
    /// or unparseable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub additional_fields: Option<Value>,
}

impl DecodedCall {
    /// An `[undecoded]` call preserving the raw payload.
    pub fn undecoded(
        contract_type: impl Into<String>,
        address: impl Into<String>,
        data: Vec<u8>,
        additional_fields: Option<Value>,
    ) -> Self {
        Self {
            contract_type: contract_type.into(),
            address: address.into(),
            method_name: UNDECODED_METHOD.into(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            data,
            additional_fields,
        }
    }

    /// Whether the decoder failed to resolve this call.
    pub fn is_undecoded(&self) -> bool {
        self.method_name == UNDECODED_METHOD
    }
}

/// All decoded calls bound to a single chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecodedBatchOperation {
    /// The 64-bit chain selector.
    pub chain_selector: u64,
    /// Resolved chain name.
    pub chain_name: String,
    /// Decoded calls in proposal order.
    pub calls: Vec<DecodedCall>,
}

/// The decoded proposal root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecodedTimelockProposal {
    /// The timelock action of the source proposal, if it carried one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<TimelockAction>,
    /// Decoded batches in proposal order.
    pub batches: Vec<DecodedBatchOperation>,
}

impl DecodedTimelockProposal {
    /// Total number of calls across all batches.
    pub fn call_count(&self) -> usize {
        self.batches.iter().map(|b| b.calls.len()).sum()
    }
}
