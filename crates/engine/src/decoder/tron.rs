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

//! Tron decoding.
//!
//! Tron calldata is EVM ABI compatible, so decoding reuses the selector
//! machinery over a family-local registry; only the address space differs
//! and addresses pass through untouched.

use super::{decode_abi_call, AbiRegistry};
use crate::{error::DecodeError, proposal::ProposalTransaction, tree::DecodedCall};

/// Decoder for Tron transactions.
#[derive(Debug, Default)]
pub struct TronDecoder {
    registry: AbiRegistry,
}

impl TronDecoder {
    /// Mutable registry access during decoder construction.
    pub fn registry_mut(&mut self) -> &mut AbiRegistry {
        &mut self.registry
    }

    /// Decodes a single transaction against the registry.
    pub fn decode(&self, tx: &ProposalTransaction) -> Result<DecodedCall, DecodeError> {
        decode_abi_call(&self.registry, tx)
    }
}

#[cfg(test)]
mod tests {
    use semver::Version;

    use super::*;

    #[test]
    fn test_empty_registry_rejects_everything() {
        let decoder = TronDecoder::default();
        let tx = ProposalTransaction {
            to: "TR7NHqjeKQxGTCi8q8ZY4pL8otSzgjLj6t".into(),
            data: vec![0xa9, 0x05, 0x9c, 0xbb],
            contract_type: "Trc20".into(),
            additional_fields: None,
            extra: Default::default(),
        };
        let err = decoder.decode(&tx).unwrap_err();
        assert!(matches!(err, DecodeError::UnknownContractType(_)));
    }

    #[test]
    fn test_registered_abi_decodes_tron_calldata() {
        const ABI: &str = r#"[
            {
                "type": "function",
                "name": "freezeBalance",
                "stateMutability": "nonpayable",
                "inputs": [{"name": "amount", "type": "uint256"}],
                "outputs": []
            }
        ]"#;

        let mut decoder = TronDecoder::default();
        decoder.registry_mut().register_json("Staking", Version::new(1, 0, 0), ABI).unwrap();

        let abi: alloy_json_abi::JsonAbi = serde_json::from_str(ABI).unwrap();
        let function = abi.functions().next().unwrap();
        let mut data = function.selector().to_vec();
        data.extend(
            alloy_dyn_abi::JsonAbiExt::abi_encode_input(
                function,
                &[alloy_dyn_abi::DynSolValue::Uint(alloy_primitives::U256::from(42u64), 256)],
            )
            .unwrap(),
        );

        let tx = ProposalTransaction {
            to: "TR7NHqjeKQxGTCi8q8ZY4pL8otSzgjLj6t".into(),
            data,
            contract_type: "Staking".into(),
            additional_fields: None,
            extra: Default::default(),
        };
        let call = decoder.decode(&tx).unwrap();
        assert_eq!(call.method_name, "freezeBalance");
        assert_eq!(call.address, "TR7NHqjeKQxGTCi8q8ZY4pL8otSzgjLj6t");
        assert_eq!(call.inputs[0].value, serde_json::json!("42"));
    }
}
