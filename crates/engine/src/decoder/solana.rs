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

//! Instruction-discriminator decoding for Solana programs.
//!
//! Anchor instructions carry an 8-byte discriminator followed by
//! borsh-encoded arguments. The registry is keyed on `program@version` and
//! maps discriminators to named decode functions. Argument values that
//! decode to nested structures get a YAML-like `display_value`; scalar
//! arguments display as themselves.

use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};

use mpa_common::sol_value::yaml_block;
use semver::Version;
use serde_json::Value;

use super::{require_len, split_versioned_type};
use crate::{
    error::DecodeError,
    proposal::ProposalTransaction,
    tree::{DecodedCall, DecodedParameter},
};

/// Width of an Anchor instruction discriminator.
pub const DISCRIMINATOR_LEN: usize = 8;

/// Decodes the borsh-encoded argument bytes of one instruction.
pub type DecodeInstructionFn =
    Arc<dyn Fn(&[u8]) -> Result<Vec<DecodedParameter>, DecodeError> + Send + Sync>;

/// Builds a [`DecodeInstructionFn`] from a borsh argument struct and a
/// projection into named parameters.
///
/// The argument bytes must deserialize exactly into `T`; trailing bytes are
/// a decode failure.
pub fn borsh_instruction_decoder<T, F>(project: F) -> DecodeInstructionFn
where
    T: borsh::BorshDeserialize,
    F: Fn(T) -> Vec<DecodedParameter> + Send + Sync + 'static,
{
    Arc::new(move |data| {
        let args =
            T::try_from_slice(data).map_err(|err| DecodeError::Arguments(err.to_string()))?;
        Ok(project(args))
    })
}

struct InstructionDecoder {
    name: String,
    decode: DecodeInstructionFn,
}

impl std::fmt::Debug for InstructionDecoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstructionDecoder").field("name", &self.name).finish()
    }
}

/// Per-program instruction decoder registry.
#[derive(Debug, Default)]
pub struct SolanaRegistry {
    programs: HashMap<String, BTreeMap<Version, HashMap<[u8; 8], InstructionDecoder>>>,
}

impl SolanaRegistry {
    /// Registers a decode function for one instruction of `program@version`.
    pub fn register(
        &mut self,
        program: impl Into<String>,
        version: Version,
        discriminator: [u8; 8],
        instruction: impl Into<String>,
        decode: DecodeInstructionFn,
    ) {
        self.programs
            .entry(program.into())
            .or_default()
            .entry(version)
            .or_default()
            .insert(discriminator, InstructionDecoder { name: instruction.into(), decode });
    }

    fn resolve(
        &self,
        program: &str,
        version: Option<&Version>,
    ) -> Option<&HashMap<[u8; 8], InstructionDecoder>> {
        let versions = self.programs.get(program)?;
        match version {
            Some(version) => versions.get(version),
            None => versions.values().next_back(),
        }
    }
}

/// Decoder for Solana transactions.
#[derive(Debug, Default)]
pub struct SolanaDecoder {
    registry: SolanaRegistry,
}

impl SolanaDecoder {
    /// Mutable registry access during decoder construction.
    pub fn registry_mut(&mut self) -> &mut SolanaRegistry {
        &mut self.registry
    }

    /// Decodes a single transaction against the registry.
    pub fn decode(&self, tx: &ProposalTransaction) -> Result<DecodedCall, DecodeError> {
        let (program, version) = split_versioned_type(&tx.contract_type);
        let instructions = self
            .registry
            .resolve(program, version.as_ref())
            .ok_or_else(|| DecodeError::UnknownContractType(tx.contract_type.clone()))?;

        require_len(&tx.data, DISCRIMINATOR_LEN)?;
        let mut discriminator = [0u8; DISCRIMINATOR_LEN];
        discriminator.copy_from_slice(&tx.data[..DISCRIMINATOR_LEN]);
        let decoder = instructions
            .get(&discriminator)
            .ok_or_else(|| DecodeError::UnknownSelector(hex::encode(discriminator)))?;

        let inputs = (decoder.decode)(&tx.data[DISCRIMINATOR_LEN..])?
            .into_iter()
            .map(|p| match p.display_value {
                Some(_) => p,
                None => {
                    let display = display_for(&p.value);
                    p.with_display(display)
                }
            })
            .collect();

        Ok(DecodedCall {
            contract_type: tx.contract_type.clone(),
            address: tx.to.clone(),
            method_name: decoder.name.clone(),
            inputs,
            outputs: Vec::new(),
            data: tx.data.clone(),
            additional_fields: tx.additional_fields.clone(),
        })
    }
}

/// Default display for a decoded argument: scalars print as themselves,
/// objects as a YAML-like block.
fn display_for(value: &Value) -> String {
    match value {
        Value::Object(fields) => {
            let pairs: Vec<(String, String)> = fields
                .iter()
                .map(|(name, value)| (name.clone(), scalar_display(value)))
                .collect();
            yaml_block(&pairs)
        }
        other => scalar_display(other),
    }
}

fn scalar_display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
