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

//! The signed proposal wire format.
//!
//! A proposal is a JSON document grouping transactions per chain selector,
//! plus per-chain multisig metadata. Transaction payloads travel as base64;
//! `additional_fields` stays raw JSON for the family decoders to interpret.
//! Unknown fields at every nesting level are preserved on round-trip via
//! flattened maps.

use std::{collections::BTreeMap, io::Read};

use base64::Engine;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use thiserror::Error;

/// Errors loading a proposal document.
#[derive(Debug, Error)]
pub enum ProposalError {
    /// The document is not valid JSON or misses required fields.
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// The document was read but its version is not valid semver.
    #[error("invalid proposal version '{version}': {source}")]
    Version {
        /// The offending version string.
        version: String,
        /// The semver parse failure.
        source: semver::Error,
    },

    /// Reading the input failed.
    #[error("reading proposal failed: {0}")]
    Io(#[from] std::io::Error),
}

/// The two accepted document kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProposalKind {
    /// A timelocked proposal whose operations are gated by a timelock
    /// contract.
    TimelockProposal,
    /// A plain multisig proposal.
    Proposal,
}

/// How a timelocked proposal routes through the timelock contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimelockAction {
    /// Schedule the operations after the timelock delay.
    Schedule,
    /// Cancel previously scheduled operations.
    Cancel,
    /// Execute immediately, bypassing the delay.
    Bypass,
}

impl std::fmt::Display for TimelockAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Schedule => "schedule",
            Self::Cancel => "cancel",
            Self::Bypass => "bypass",
        };
        f.write_str(s)
    }
}

/// Per-chain multisig metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainMetadata {
    /// Operation counter the chain's multisig starts from.
    pub starting_op_count: u64,
    /// Address of the multisig contract, in the chain's native form.
    pub mcm_address: Value,
    /// Unknown fields, preserved on round-trip.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// A single transaction inside a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProposalTransaction {
    /// Target contract address.
    pub to: String,
    /// Encoded payload, base64 on the wire.
    #[serde(with = "base64_bytes")]
    pub data: Vec<u8>,
    /// Free-form contract type token used for decoder dispatch.
    pub contract_type: String,
    /// Family-specific extra data, kept as raw JSON.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_fields: Option<Value>,
    /// Unknown fields, preserved on round-trip.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl ProposalTransaction {
    /// Parses `additional_fields` into a family-specific shape.
    ///
    /// Returns `None` when the fields are absent or do not match `T`;
    /// malformed payloads are a decode downgrade, never an error.
    pub fn parse_additional_fields<T: serde::de::DeserializeOwned>(&self) -> Option<T> {
        self.additional_fields.as_ref().and_then(|v| serde_json::from_value(v.clone()).ok())
    }
}

/// A group of transactions bound to one chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProposalBatch {
    /// The 64-bit chain selector.
    pub chain_selector: u64,
    /// Transactions in execution order.
    pub transactions: Vec<ProposalTransaction>,
    /// Unknown fields, preserved on round-trip.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// A signed multichain (timelock) proposal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelockProposal {
    /// Document version (semver).
    pub version: String,
    /// Document kind.
    pub kind: ProposalKind,
    /// Timelock routing; present on timelock proposals only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<TimelockAction>,
    /// Per-chain multisig metadata keyed by selector.
    #[serde(default)]
    pub chain_metadata: BTreeMap<u64, ChainMetadata>,
    /// Transaction batches in execution order.
    pub operations: Vec<ProposalBatch>,
    /// Unknown fields, preserved on round-trip.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl TimelockProposal {
    /// Parses a proposal from a JSON string and validates its version.
    pub fn from_json_str(input: &str) -> Result<Self, ProposalError> {
        let proposal: Self = serde_json::from_str(input)?;
        proposal.validate()?;
        Ok(proposal)
    }

    /// Parses a proposal from a reader.
    pub fn from_reader<R: Read>(mut reader: R) -> Result<Self, ProposalError> {
        let mut buf = String::new();
        reader.read_to_string(&mut buf)?;
        Self::from_json_str(&buf)
    }

    /// Serializes the proposal back to pretty JSON.
    pub fn to_json(&self) -> Result<String, ProposalError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Total number of transactions across all batches.
    pub fn transaction_count(&self) -> usize {
        self.operations.iter().map(|op| op.transactions.len()).sum()
    }

    fn validate(&self) -> Result<(), ProposalError> {
        semver::Version::parse(&self.version).map_err(|source| ProposalError::Version {
            version: self.version.clone(),
            source,
        })?;
        Ok(())
    }
}

mod base64_bytes {
    use super::*;

    pub(super) fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
        serializer.serialize_str(&encoded)
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        base64::engine::general_purpose::STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    const SAMPLE: &str = r#"{
        "version": "1.0.0",
        "kind": "TimelockProposal",
        "action": "schedule",
        "validUntil": 1767225600,
        "chain_metadata": {
            "16015286601757825753": {
                "starting_op_count": 7,
                "mcm_address": "0x9fe40b94fac9f6eeae1a1bf7c9dea72b8a4660ee",
                "role": "proposer"
            }
        },
        "operations": [
            {
                "chain_selector": 16015286601757825753,
                "transactions": [
                    {
                        "to": "0x7d4a13fe119c9f36425008a7afcb2737b2bb5c41",
                        "data": "qQWcuw==",
                        "contract_type": "BurnMintTokenPool",
                        "additional_fields": {"value": 0},
                        "signer_hint": "ccip-deployer"
                    }
                ]
            }
        ]
    }"#;

    #[test]
    fn test_parse_and_base64_data() {
        let proposal = TimelockProposal::from_json_str(SAMPLE).unwrap();
        assert_eq!(proposal.kind, ProposalKind::TimelockProposal);
        assert_eq!(proposal.action, Some(TimelockAction::Schedule));
        assert_eq!(proposal.transaction_count(), 1);

        let tx = &proposal.operations[0].transactions[0];
        assert_eq!(tx.data, vec![0xa9, 0x05, 0x9c, 0xbb]);
        assert_eq!(tx.contract_type, "BurnMintTokenPool");

        let metadata = proposal.chain_metadata.get(&16015286601757825753).unwrap();
        assert_eq!(metadata.starting_op_count, 7);
    }

    #[test]
    fn test_unknown_fields_round_trip() {
        let proposal = TimelockProposal::from_json_str(SAMPLE).unwrap();
        assert_eq!(proposal.extra.get("validUntil"), Some(&json!(1767225600)));
        assert_eq!(
            proposal.operations[0].transactions[0].extra.get("signer_hint"),
            Some(&json!("ccip-deployer"))
        );
        let metadata = proposal.chain_metadata.get(&16015286601757825753).unwrap();
        assert_eq!(metadata.extra.get("role"), Some(&json!("proposer")));

        let reparsed =
            TimelockProposal::from_json_str(&proposal.to_json().unwrap()).unwrap();
        assert_eq!(reparsed, proposal);
    }

    #[test]
    fn test_invalid_version_is_rejected() {
        let doc = SAMPLE.replace("\"1.0.0\"", "\"not-a-version\"");
        let err = TimelockProposal::from_json_str(&doc).unwrap_err();
        assert!(matches!(err, ProposalError::Version { .. }));
    }

    #[test]
    fn test_additional_fields_parse_is_lenient() {
        #[derive(Deserialize)]
        struct EvmFields {
            value: u64,
        }
        #[derive(Deserialize)]
        struct SuiFields {
            #[allow(dead_code)]
            module_name: String,
        }

        let proposal = TimelockProposal::from_json_str(SAMPLE).unwrap();
        let tx = &proposal.operations[0].transactions[0];
        assert_eq!(tx.parse_additional_fields::<EvmFields>().map(|f| f.value), Some(0));
        assert!(tx.parse_additional_fields::<SuiFields>().is_none());
    }
}
