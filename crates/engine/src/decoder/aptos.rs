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

//! Entry-function decoding for Aptos transactions.
//!
//! Aptos payloads are BCS-encoded entry-function arguments. The target is
//! named by `additional_fields.{module_name, function}`; registered decode
//! functions deserialize the argument bytes, typically via
//! `bcs::from_bytes` on an argument struct.

use std::{collections::HashMap, sync::Arc};

use serde::Deserialize;

use crate::{
    error::DecodeError,
    proposal::ProposalTransaction,
    tree::{DecodedCall, DecodedParameter},
};

/// Decodes the BCS-encoded argument bytes of one entry function.
pub type AptosDecodeFn =
    Arc<dyn Fn(&[u8]) -> Result<Vec<DecodedParameter>, DecodeError> + Send + Sync>;

#[derive(Debug, Deserialize)]
struct AptosAdditionalFields {
    module_name: String,
    function: String,
    #[serde(default)]
    #[allow(dead_code)]
    package_id: Option<String>,
}

/// Entry-function decoder registry keyed by `(module, function)`.
#[derive(Default)]
pub struct AptosRegistry {
    functions: HashMap<(String, String), AptosDecodeFn>,
}

impl std::fmt::Debug for AptosRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AptosRegistry").field("functions", &self.functions.len()).finish()
    }
}

impl AptosRegistry {
    /// Registers a decode function, replacing any previous one for the pair.
    pub fn register(
        &mut self,
        module_name: impl Into<String>,
        function: impl Into<String>,
        decode: AptosDecodeFn,
    ) {
        self.functions.insert((module_name.into(), function.into()), decode);
    }

    fn resolve(&self, module_name: &str, function: &str) -> Option<&AptosDecodeFn> {
        self.functions.get(&(module_name.to_string(), function.to_string()))
    }
}

/// Decoder for Aptos transactions.
#[derive(Debug, Default)]
pub struct AptosDecoder {
    registry: AptosRegistry,
}

impl AptosDecoder {
    /// Mutable registry access during decoder construction.
    pub fn registry_mut(&mut self) -> &mut AptosRegistry {
        &mut self.registry
    }

    /// Decodes a single transaction against the registry.
    pub fn decode(&self, tx: &ProposalTransaction) -> Result<DecodedCall, DecodeError> {
        let fields: AptosAdditionalFields = tx.parse_additional_fields().ok_or_else(|| {
            DecodeError::AdditionalFields("expected {module_name, function}".into())
        })?;
        let decode = self.registry.resolve(&fields.module_name, &fields.function).ok_or_else(
            || {
                DecodeError::UnknownContractType(format!(
                    "{}::{}",
                    fields.module_name, fields.function
                ))
            },
        )?;

        let inputs = decode(&tx.data)?;
        Ok(DecodedCall {
            contract_type: tx.contract_type.clone(),
            address: tx.to.clone(),
            method_name: fields.function,
            inputs,
            outputs: Vec::new(),
            data: tx.data.clone(),
            additional_fields: tx.additional_fields.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};
    use serde_json::json;

    use super::*;

    #[derive(Serialize, Deserialize)]
    struct TransferArgs {
        amount: u64,
        recipient: [u8; 32],
    }

    fn decoder() -> AptosDecoder {
        let mut decoder = AptosDecoder::default();
        let decode: AptosDecodeFn = Arc::new(|data| {
            let args: TransferArgs =
                bcs::from_bytes(data).map_err(|err| DecodeError::Arguments(err.to_string()))?;
            Ok(vec![
                DecodedParameter::new("amount", "u64", json!(args.amount))
                    .with_display(args.amount.to_string()),
                DecodedParameter::new(
                    "recipient",
                    "address",
                    json!(format!("0x{}", hex::encode(args.recipient))),
                ),
            ])
        });
        decoder.registry_mut().register("managed_token", "transfer", decode);
        decoder
    }

    fn tx(data: Vec<u8>, additional_fields: Option<serde_json::Value>) -> ProposalTransaction {
        ProposalTransaction {
            to: "0x1::managed_token".into(),
            data,
            contract_type: "managed_token".into(),
            additional_fields,
            extra: Default::default(),
        }
    }

    #[test]
    fn test_entry_function_decode() {
        let args = TransferArgs { amount: 1500, recipient: [0x77; 32] };
        let data = bcs::to_bytes(&args).unwrap();
        let fields = json!({"module_name": "managed_token", "function": "transfer"});

        let call = decoder().decode(&tx(data, Some(fields))).unwrap();
        assert_eq!(call.method_name, "transfer");
        assert_eq!(call.inputs[0].value, json!(1500));
        assert_eq!(call.inputs[1].value, json!(format!("0x{}", "77".repeat(32))));
    }

    #[test]
    fn test_unregistered_function_and_missing_fields() {
        let data = bcs::to_bytes(&TransferArgs { amount: 1, recipient: [0; 32] }).unwrap();

        let fields = json!({"module_name": "managed_token", "function": "burn"});
        let err = decoder().decode(&tx(data.clone(), Some(fields))).unwrap_err();
        assert!(matches!(err, DecodeError::UnknownContractType(_)));

        let err = decoder().decode(&tx(data, None)).unwrap_err();
        assert!(matches!(err, DecodeError::AdditionalFields(_)));
    }

    #[test]
    fn test_malformed_arguments() {
        let fields = json!({"module_name": "managed_token", "function": "transfer"});
        let err = decoder().decode(&tx(vec![0x01, 0x02], Some(fields))).unwrap_err();
        assert!(matches!(err, DecodeError::Arguments(_)));
    }
}
