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

//! Chain families and the selector registry.
//!
//! Every chain a proposal can touch is identified by a 64-bit selector. The
//! registry maps selectors to a human-readable name and a [`ChainFamily`],
//! which the decoder uses to pick its decoding strategy. A default table of
//! well-known networks is built in; embedders register additional chains at
//! construction time.

use std::{collections::HashMap, fmt};

use serde::{Deserialize, Serialize};
use tracing::warn;

/// The decoding strategy family a chain belongs to.
///
/// ZkSync-era chains and Tron speak the EVM ABI on the wire and therefore
/// map to [`ChainFamily::Evm`] and [`ChainFamily::Tron`] respectively; Tron
/// keeps its own variant because its address space differs even though the
/// calldata layout is ABI-compatible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChainFamily {
    /// Ethereum and every ABI-compatible EVM chain (including ZkSync era).
    Evm,
    /// Solana programs addressed by base58 program ids.
    Solana,
    /// Aptos Move entry functions.
    Aptos,
    /// Sui Move calls with BCS-encoded arguments.
    Sui,
    /// TON contracts.
    Ton,
    /// Tron contracts (EVM ABI calldata, Tron addressing).
    Tron,
    /// Stellar / Soroban contracts.
    Stellar,
}

impl fmt::Display for ChainFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Evm => "evm",
            Self::Solana => "solana",
            Self::Aptos => "aptos",
            Self::Sui => "sui",
            Self::Ton => "ton",
            Self::Tron => "tron",
            Self::Stellar => "stellar",
        };
        f.write_str(name)
    }
}

/// Static description of a single chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainInfo {
    /// The 64-bit chain selector.
    pub selector: u64,
    /// Canonical chain name, e.g. `ethereum-sepolia`.
    pub name: String,
    /// Decoding strategy family.
    pub family: ChainFamily,
}

impl ChainInfo {
    /// Creates a new chain description.
    pub fn new(selector: u64, name: impl Into<String>, family: ChainFamily) -> Self {
        Self { selector, name: name.into(), family }
    }
}

/// Registry of known chains, keyed by selector.
///
/// Lookups never fail hard: an unknown selector falls back to the EVM family
/// with a synthesized `chain-<selector>` name, so a proposal touching an
/// unregistered chain still decodes (likely to `[undecoded]` calls) instead
/// of aborting the run.
#[derive(Debug, Clone, Default)]
pub struct ChainRegistry {
    chains: HashMap<u64, ChainInfo>,
}

impl ChainRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry pre-populated with well-known networks.
    pub fn with_known_chains() -> Self {
        let mut registry = Self::new();
        for info in known_chains() {
            registry.register(info);
        }
        registry
    }

    /// Registers a chain, replacing any previous entry for the selector.
    pub fn register(&mut self, info: ChainInfo) {
        self.chains.insert(info.selector, info);
    }

    /// Looks up a chain by selector.
    pub fn get(&self, selector: u64) -> Option<&ChainInfo> {
        self.chains.get(&selector)
    }

    /// Returns the chain family for a selector, falling back to EVM.
    pub fn family(&self, selector: u64) -> ChainFamily {
        match self.chains.get(&selector) {
            Some(info) => info.family,
            None => {
                warn!(selector, "unknown chain selector, assuming EVM family");
                ChainFamily::Evm
            }
        }
    }

    /// Returns the chain name for a selector, synthesizing one when unknown.
    pub fn name(&self, selector: u64) -> String {
        self.chains
            .get(&selector)
            .map(|info| info.name.clone())
            .unwrap_or_else(|| format!("chain-{selector}"))
    }

    /// Renders `name (selector)`, the form used in annotations and reports.
    pub fn display(&self, selector: u64) -> String {
        format!("{} ({})", self.name(selector), selector)
    }

    /// Number of registered chains.
    pub fn len(&self) -> usize {
        self.chains.len()
    }

    /// Whether the registry has no entries.
    pub fn is_empty(&self) -> bool {
        self.chains.is_empty()
    }
}

/// The built-in table of well-known chain selectors.
fn known_chains() -> Vec<ChainInfo> {
    use ChainFamily::*;
    vec![
        ChainInfo::new(5009297550715157269, "ethereum-mainnet", Evm),
        ChainInfo::new(16015286601757825753, "ethereum-sepolia", Evm),
        ChainInfo::new(4051577828743386545, "polygon-mainnet", Evm),
        ChainInfo::new(6433500567565663785, "avalanche-mainnet", Evm),
        ChainInfo::new(14767482510784806043, "avalanche-fuji", Evm),
        ChainInfo::new(11344663589394136015, "bsc-mainnet", Evm),
        ChainInfo::new(4949039107694359620, "arbitrum-mainnet", Evm),
        ChainInfo::new(3734403246176062136, "optimism-mainnet", Evm),
        ChainInfo::new(15971525489660198786, "base-mainnet", Evm),
        ChainInfo::new(124615329519749607, "solana-mainnet", Solana),
        ChainInfo::new(16423721717087811551, "solana-devnet", Solana),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_chain_lookup() {
        let registry = ChainRegistry::with_known_chains();
        let sepolia = registry.get(16015286601757825753).expect("sepolia should be registered");
        assert_eq!(sepolia.name, "ethereum-sepolia");
        assert_eq!(sepolia.family, ChainFamily::Evm);
        assert_eq!(
            registry.display(16015286601757825753),
            "ethereum-sepolia (16015286601757825753)"
        );
    }

    #[test]
    fn test_unknown_selector_falls_back_to_evm() {
        let registry = ChainRegistry::with_known_chains();
        assert_eq!(registry.family(42), ChainFamily::Evm);
        assert_eq!(registry.name(42), "chain-42");
    }

    #[test]
    fn test_register_overrides_existing_entry() {
        let mut registry = ChainRegistry::new();
        registry.register(ChainInfo::new(7, "testnet-a", ChainFamily::Solana));
        registry.register(ChainInfo::new(7, "testnet-b", ChainFamily::Sui));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.family(7), ChainFamily::Sui);
        assert_eq!(registry.name(7), "testnet-b");
    }
}
