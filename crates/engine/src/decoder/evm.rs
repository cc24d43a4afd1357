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

//! ABI-based decoding for EVM-family transactions.
//!
//! The registry maps `contract_type@version` to a [`JsonAbi`]; the method is
//! resolved from the 4-byte selector and arguments are decoded with
//! `alloy-dyn-abi`. The same machinery backs the Tron decoder, whose
//! calldata is ABI-compatible.

use std::collections::{BTreeMap, HashMap};

use alloy_dyn_abi::JsonAbiExt;
use alloy_json_abi::JsonAbi;
use eyre::WrapErr;
use mpa_common::sol_value::{format_sol_value, sol_value_to_json};
use semver::Version;

use super::{require_len, split_versioned_type};
use crate::{
    error::DecodeError,
    proposal::ProposalTransaction,
    tree::{DecodedCall, DecodedParameter},
};

/// Versioned ABI store keyed by contract type.
#[derive(Debug, Default)]
pub struct AbiRegistry {
    abis: HashMap<String, BTreeMap<Version, JsonAbi>>,
}

impl AbiRegistry {
    /// Registers an ABI under `contract_type@version`, replacing any
    /// previous registration of the same pair.
    pub fn register(&mut self, contract_type: impl Into<String>, version: Version, abi: JsonAbi) {
        self.abis.entry(contract_type.into()).or_default().insert(version, abi);
    }

    /// Registers an ABI from its JSON text.
    pub fn register_json(
        &mut self,
        contract_type: impl Into<String>,
        version: Version,
        abi_json: &str,
    ) -> eyre::Result<()> {
        let contract_type = contract_type.into();
        let abi: JsonAbi = serde_json::from_str(abi_json)
            .wrap_err_with(|| format!("invalid ABI JSON for '{contract_type}'"))?;
        self.register(contract_type, version, abi);
        Ok(())
    }

    /// Resolves a contract type to an ABI.
    ///
    /// An exact version match wins; without a pinned version the highest
    /// registered version is used.
    pub fn resolve(&self, contract_type: &str, version: Option<&Version>) -> Option<&JsonAbi> {
        let versions = self.abis.get(contract_type)?;
        match version {
            Some(version) => versions.get(version),
            None => versions.values().next_back(),
        }
    }

    /// Number of registered `(type, version)` pairs.
    pub fn len(&self) -> usize {
        self.abis.values().map(BTreeMap::len).sum()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.abis.is_empty()
    }
}

/// Decoder for EVM (and ZkSync era) transactions.
#[derive(Debug, Default)]
pub struct EvmDecoder {
    registry: AbiRegistry,
}

impl EvmDecoder {
    /// Mutable registry access during decoder construction.
    pub fn registry_mut(&mut self) -> &mut AbiRegistry {
        &mut self.registry
    }

    /// Decodes a single transaction against the registry.
    pub fn decode(&self, tx: &ProposalTransaction) -> Result<DecodedCall, DecodeError> {
        decode_abi_call(&self.registry, tx)
    }
}

/// Selector-based ABI decode shared by the EVM and Tron decoders.
pub(crate) fn decode_abi_call(
    registry: &AbiRegistry,
    tx: &ProposalTransaction,
) -> Result<DecodedCall, DecodeError> {
    let (base_type, version) = split_versioned_type(&tx.contract_type);
    let abi = registry
        .resolve(base_type, version.as_ref())
        .ok_or_else(|| DecodeError::UnknownContractType(tx.contract_type.clone()))?;

    require_len(&tx.data, 4)?;
    let selector = &tx.data[..4];
    let function = abi
        .functions()
        .find(|f| f.selector().as_slice() == selector)
        .ok_or_else(|| DecodeError::UnknownSelector(hex::encode(selector)))?;

    let values = function
        .abi_decode_input(&tx.data[4..])
        .map_err(|err| DecodeError::Arguments(err.to_string()))?;

    let inputs = function
        .inputs
        .iter()
        .zip(values.iter())
        .map(|(param, value)| {
            DecodedParameter::new(param.name.clone(), param.ty.clone(), sol_value_to_json(value))
                .with_display(format_sol_value(value))
        })
        .collect();

    Ok(DecodedCall {
        contract_type: tx.contract_type.clone(),
        address: tx.to.clone(),
        method_name: function.name.clone(),
        inputs,
        outputs: Vec::new(),
        data: tx.data.clone(),
        additional_fields: tx.additional_fields.clone(),
    })
}
