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

//! Stellar (Soroban) decoding.
//!
//! Soroban invocations name their function in
//! `additional_fields.function`; argument decoding of the XDR payload is
//! delegated to registered per-function decode functions. Empty by default.

use std::{collections::HashMap, sync::Arc};

use serde::Deserialize;

use super::split_versioned_type;
use crate::{
    error::DecodeError,
    proposal::ProposalTransaction,
    tree::{DecodedCall, DecodedParameter},
};

/// Decodes the argument bytes of one Soroban function invocation.
pub type StellarDecodeFn =
    Arc<dyn Fn(&[u8]) -> Result<Vec<DecodedParameter>, DecodeError> + Send + Sync>;

#[derive(Debug, Deserialize)]
struct StellarAdditionalFields {
    function: String,
}

/// Decoder registry keyed by `(contract_type, function)`.
#[derive(Default)]
pub struct StellarRegistry {
    functions: HashMap<(String, String), StellarDecodeFn>,
}

impl std::fmt::Debug for StellarRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StellarRegistry").field("functions", &self.functions.len()).finish()
    }
}

impl StellarRegistry {
    /// Registers a decode function, replacing any previous one for the pair.
    pub fn register(
        &mut self,
        contract_type: impl Into<String>,
        function: impl Into<String>,
        decode: StellarDecodeFn,
    ) {
        self.functions.insert((contract_type.into(), function.into()), decode);
    }

    fn resolve(&self, contract_type: &str, function: &str) -> Option<&StellarDecodeFn> {
        self.functions.get(&(contract_type.to_string(), function.to_string()))
    }
}

/// Decoder for Stellar transactions.
#[derive(Debug, Default)]
pub struct StellarDecoder {
    registry: StellarRegistry,
}

impl StellarDecoder {
    /// Mutable registry access during decoder construction.
    pub fn registry_mut(&mut self) -> &mut StellarRegistry {
        &mut self.registry
    }

    /// Decodes a single transaction against the registry.
    pub fn decode(&self, tx: &ProposalTransaction) -> Result<DecodedCall, DecodeError> {
        let fields: StellarAdditionalFields = tx
            .parse_additional_fields()
            .ok_or_else(|| DecodeError::AdditionalFields("expected {function}".into()))?;
        let (base_type, _) = split_versioned_type(&tx.contract_type);
        let decode = self.registry.resolve(base_type, &fields.function).ok_or_else(|| {
            DecodeError::UnknownContractType(format!("{base_type}::{}", fields.function))
        })?;

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
