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

//! Chain-family dispatch from wire proposal to decoded tree.
//!
//! Each batch derives its family from the chain selector; each transaction
//! is handed to the family decoder. Decoding is purely offline and never
//! fails a run: a transaction the family decoder cannot resolve becomes an
//! `[undecoded]` call with the raw payload preserved, and a warning is
//! logged.
//!
//! The registries inside a [`ProposalDecoder`] are populated at
//! construction time; handing the decoder to the engine freezes them by
//! ownership.

mod aptos;
mod evm;
mod solana;
mod stellar;
mod sui;
mod ton;
mod tron;

pub use aptos::*;
pub use evm::*;
pub use solana::*;
pub use stellar::*;
pub use sui::*;
pub use ton::*;
pub use tron::*;

use mpa_common::chain::{ChainFamily, ChainRegistry};
use tracing::{debug, warn};

use crate::{
    error::DecodeError,
    proposal::{ProposalTransaction, TimelockProposal},
    tree::{DecodedBatchOperation, DecodedCall, DecodedTimelockProposal},
};

/// Offline decoder over all supported chain families.
#[derive(Debug, Default)]
pub struct ProposalDecoder {
    chains: ChainRegistry,
    evm: EvmDecoder,
    solana: SolanaDecoder,
    sui: SuiDecoder,
    aptos: AptosDecoder,
    ton: TonDecoder,
    tron: TronDecoder,
    stellar: StellarDecoder,
}

impl ProposalDecoder {
    /// Creates a decoder with empty registries over the given chain table.
    pub fn new(chains: ChainRegistry) -> Self {
        Self { chains, ..Self::default() }
    }

    /// Creates a decoder over the built-in table of well-known chains.
    pub fn with_known_chains() -> Self {
        Self::new(ChainRegistry::with_known_chains())
    }

    /// The chain table used for family dispatch.
    pub fn chains(&self) -> &ChainRegistry {
        &self.chains
    }

    /// Registers an EVM contract ABI under `contract_type@version`.
    pub fn register_evm_abi(
        &mut self,
        contract_type: impl Into<String>,
        version: semver::Version,
        abi: alloy_json_abi::JsonAbi,
    ) {
        self.evm.registry_mut().register(contract_type, version, abi);
    }

    /// Registers an EVM contract ABI from its JSON text.
    pub fn register_evm_abi_json(
        &mut self,
        contract_type: impl Into<String>,
        version: semver::Version,
        abi_json: &str,
    ) -> eyre::Result<()> {
        self.evm.registry_mut().register_json(contract_type, version, abi_json)
    }

    /// Registers a Solana instruction decoder for `program@version`.
    pub fn register_solana_instruction(
        &mut self,
        program: impl Into<String>,
        version: semver::Version,
        discriminator: [u8; 8],
        instruction: impl Into<String>,
        decode: DecodeInstructionFn,
    ) {
        self.solana.registry_mut().register(program, version, discriminator, instruction, decode);
    }

    /// Registers a Sui call layout for `module::function`.
    pub fn register_sui_layout(&mut self, layout: SuiCallLayout) {
        self.sui.registry_mut().register(layout);
    }

    /// Registers an Aptos entry-function argument decoder.
    pub fn register_aptos_function(
        &mut self,
        module_name: impl Into<String>,
        function: impl Into<String>,
        decode: AptosDecodeFn,
    ) {
        self.aptos.registry_mut().register(module_name, function, decode);
    }

    /// Registers a TON call decoder for a contract type.
    pub fn register_ton_decoder(&mut self, contract_type: impl Into<String>, decode: TonDecodeFn) {
        self.ton.registry_mut().register(contract_type, decode);
    }

    /// Registers a Tron contract ABI; Tron calldata is EVM ABI compatible.
    pub fn register_tron_abi(
        &mut self,
        contract_type: impl Into<String>,
        version: semver::Version,
        abi: alloy_json_abi::JsonAbi,
    ) {
        self.tron.registry_mut().register(contract_type, version, abi);
    }

    /// Registers a Stellar function decoder for `contract_type`.
    pub fn register_stellar_function(
        &mut self,
        contract_type: impl Into<String>,
        function: impl Into<String>,
        decode: StellarDecodeFn,
    ) {
        self.stellar.registry_mut().register(contract_type, function, decode);
    }

    /// Decodes a wire proposal into the immutable decoded tree.
    ///
    /// Never fails: per-call decode errors downgrade to `[undecoded]`.
    pub fn decode(&self, proposal: &TimelockProposal) -> DecodedTimelockProposal {
        let batches = proposal
            .operations
            .iter()
            .map(|op| {
                let family = self.chains.family(op.chain_selector);
                DecodedBatchOperation {
                    chain_selector: op.chain_selector,
                    chain_name: self.chains.name(op.chain_selector),
                    calls: op
                        .transactions
                        .iter()
                        .map(|tx| self.decode_transaction(family, op.chain_selector, tx))
                        .collect(),
                }
            })
            .collect();
        DecodedTimelockProposal { action: proposal.action, batches }
    }

    fn decode_transaction(
        &self,
        family: ChainFamily,
        chain_selector: u64,
        tx: &ProposalTransaction,
    ) -> DecodedCall {
        let decoded = match family {
            ChainFamily::Evm => self.evm.decode(tx),
            ChainFamily::Tron => self.tron.decode(tx),
            ChainFamily::Solana => self.solana.decode(tx),
            ChainFamily::Sui => self.sui.decode(tx),
            ChainFamily::Aptos => self.aptos.decode(tx),
            ChainFamily::Ton => self.ton.decode(tx),
            ChainFamily::Stellar => self.stellar.decode(tx),
        };
        match decoded {
            Ok(call) => {
                debug!(
                    chain_selector,
                    contract_type = %tx.contract_type,
                    method = %call.method_name,
                    "decoded call"
                );
                call
            }
            Err(err) => {
                warn!(
                    chain_selector,
                    contract_type = %tx.contract_type,
                    to = %tx.to,
                    %err,
                    "transaction kept as [undecoded]"
                );
                DecodedCall::undecoded(
                    tx.contract_type.clone(),
                    tx.to.clone(),
                    tx.data.clone(),
                    tx.additional_fields.clone(),
                )
            }
        }
    }
}

/// Splits an optional `@version` suffix off a contract type token.
pub(crate) fn split_versioned_type(contract_type: &str) -> (&str, Option<semver::Version>) {
    match contract_type.split_once('@') {
        Some((base, version)) => match semver::Version::parse(version) {
            Ok(parsed) => (base, Some(parsed)),
            Err(_) => (contract_type, None),
        },
        None => (contract_type, None),
    }
}

/// Shared per-family decode error helper: rejects payloads shorter than the
/// family's discriminator width.
pub(crate) fn require_len(data: &[u8], min: usize) -> Result<(), DecodeError> {
    if data.len() < min {
        return Err(DecodeError::ShortCalldata(data.len()));
    }
    Ok(())
}
