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

//! TON decoding.
//!
//! TON message bodies are BOC cells, for which no general offline schema
//! exists; decoding is therefore fully delegated to per-contract-type
//! decode functions. The registry is empty by default, so unregistered TON
//! transactions surface as `[undecoded]` calls.

use std::{collections::HashMap, sync::Arc};

use super::split_versioned_type;
use crate::{error::DecodeError, proposal::ProposalTransaction, tree::DecodedCall};

/// Decodes a full TON transaction into a call.
pub type TonDecodeFn =
    Arc<dyn Fn(&ProposalTransaction) -> Result<DecodedCall, DecodeError> + Send + Sync>;

/// Per-contract-type decoder registry.
#[derive(Default)]
pub struct TonRegistry {
    decoders: HashMap<String, TonDecodeFn>,
}

impl std::fmt::Debug for TonRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TonRegistry").field("decoders", &self.decoders.len()).finish()
    }
}

impl TonRegistry {
    /// Registers a decode function for a contract type.
    pub fn register(&mut self, contract_type: impl Into<String>, decode: TonDecodeFn) {
        self.decoders.insert(contract_type.into(), decode);
    }
}

/// Decoder for TON transactions.
#[derive(Debug, Default)]
pub struct TonDecoder {
    registry: TonRegistry,
}

impl TonDecoder {
    /// Mutable registry access during decoder construction.
    pub fn registry_mut(&mut self) -> &mut TonRegistry {
        &mut self.registry
    }

    /// Decodes a single transaction against the registry.
    pub fn decode(&self, tx: &ProposalTransaction) -> Result<DecodedCall, DecodeError> {
        let (base_type, _) = split_versioned_type(&tx.contract_type);
        let decode = self
            .registry
            .decoders
            .get(base_type)
            .ok_or_else(|| DecodeError::UnknownContractType(tx.contract_type.clone()))?;
        decode(tx)
    }
}
