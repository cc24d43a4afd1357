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

//! Token-pool chain-update inspection.
//!
//! Recognizes `applyChainUpdates` on token pools and annotates the call
//! with the remote chains being added or removed plus the proposed
//! rate-limiter configuration per direction, compared against the current
//! on-chain state when the batch's chain handle carries an RPC capability.

use alloy_dyn_abi::{DynSolType, DynSolValue};
use alloy_primitives::{keccak256, U256};
use async_trait::async_trait;
use eyre::{eyre, WrapErr};
use mpa_common::chain::{ChainFamily, ChainRegistry};
use serde_json::{json, Value};

use crate::{
    analyzer::CallAnalyzer,
    annotation::{Annotation, DiffValue},
    context::{AnalyzerRequest, ChainReader},
    tree::DecodedCall,
};

const METHOD: &str = "applyChainUpdates";
const OUTBOUND_STATE_SIG: &str = "getCurrentOutboundRateLimiterState(uint64)";
const INBOUND_STATE_SIG: &str = "getCurrentInboundRateLimiterState(uint64)";
/// RateLimiter.TokenBucket: (tokens, lastUpdated, isEnabled, capacity, rate)
const TOKEN_BUCKET_TY: &str = "(uint128,uint32,bool,uint128,uint128)";

/// Annotates token-pool `applyChainUpdates` calls with `chain_update` and
/// `rate_limiter` facts.
#[derive(Debug, Clone)]
pub struct TokenPoolAnalyzer {
    chains: ChainRegistry,
}

impl Default for TokenPoolAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenPoolAnalyzer {
    /// Creates the analyzer over the built-in chain table.
    pub fn new() -> Self {
        Self { chains: ChainRegistry::with_known_chains() }
    }

    /// Creates the analyzer over a custom chain table.
    pub fn with_chains(chains: ChainRegistry) -> Self {
        Self { chains }
    }
}

#[async_trait]
impl CallAnalyzer for TokenPoolAnalyzer {
    fn id(&self) -> &str {
        "token-pool"
    }

    async fn can_analyze(&self, req: &AnalyzerRequest, call: &DecodedCall) -> bool {
        let family = req
            .context
            .chain_selector()
            .and_then(|selector| req.execution.chain(selector))
            .map(|handle| handle.family);
        matches!(family, Some(ChainFamily::Evm) | None)
            && call.method_name == METHOD
            && call.contract_type.contains("TokenPool")
    }

    async fn analyze(
        &self,
        req: &AnalyzerRequest,
        call: DecodedCall,
    ) -> eyre::Result<Vec<Annotation>> {
        let mut annotations = Vec::new();

        for selector in removed_selectors(&call) {
            annotations.push(Annotation::new(
                "chain_update",
                selector.to_string(),
                json!(format!("{} removed", self.chains.display(selector))),
            ));
        }

        let reader = req
            .context
            .chain_selector()
            .and_then(|selector| req.execution.chain(selector))
            .and_then(|handle| handle.reader.clone());

        for update in added_updates(&call)? {
            annotations.push(Annotation::new(
                "chain_update",
                update.remote_selector.to_string(),
                json!(format!("{} added", self.chains.display(update.remote_selector))),
            ));

            for (direction, sig, proposed) in [
                ("outbound", OUTBOUND_STATE_SIG, &update.outbound),
                ("inbound", INBOUND_STATE_SIG, &update.inbound),
            ] {
                let Some(proposed) = proposed else { continue };
                let prior = match &reader {
                    Some(reader) => Some(
                        read_bucket(reader.as_ref(), &call.address, update.remote_selector, sig)
                            .await
                            .wrap_err_with(|| {
                                format!("reading {direction} rate limiter state failed")
                            })?,
                    ),
                    None => None,
                };
                annotations.extend(limiter_annotations(direction, proposed, prior.as_ref()));
            }
        }

        Ok(annotations)
    }
}

/// Proposed rate-limiter configuration for one direction.
#[derive(Debug, Clone, PartialEq)]
struct LimiterConfig {
    is_enabled: bool,
    capacity: String,
    rate: String,
}

/// One entry of `chainsToAdd`.
#[derive(Debug, Clone)]
struct ChainUpdate {
    remote_selector: u64,
    outbound: Option<LimiterConfig>,
    inbound: Option<LimiterConfig>,
}

/// Current on-chain token bucket.
#[derive(Debug, Clone)]
struct TokenBucket {
    capacity: String,
    rate: String,
}

fn input_value<'a>(call: &'a DecodedCall, name: &str) -> Option<&'a Value> {
    call.inputs.iter().find(|p| p.name == name).map(|p| &p.value)
}

fn removed_selectors(call: &DecodedCall) -> Vec<u64> {
    input_value(call, "remoteChainSelectorsToRemove")
        .and_then(Value::as_array)
        .map(|entries| entries.iter().filter_map(parse_u64).collect())
        .unwrap_or_default()
}

fn added_updates(call: &DecodedCall) -> eyre::Result<Vec<ChainUpdate>> {
    let Some(entries) = input_value(call, "chainsToAdd").and_then(Value::as_array) else {
        return Ok(Vec::new());
    };
    entries
        .iter()
        .map(|entry| {
            // ChainUpdate tuple: (remoteChainSelector, remotePoolAddress,
            // remoteTokenAddress, outboundRateLimiterConfig, inboundRateLimiterConfig)
            let fields = entry
                .as_array()
                .ok_or_else(|| eyre!("chainsToAdd entry is not a tuple: {entry}"))?;
            let remote_selector = fields
                .first()
                .and_then(parse_u64)
                .ok_or_else(|| eyre!("chainsToAdd entry misses remote chain selector"))?;
            Ok(ChainUpdate {
                remote_selector,
                outbound: fields.get(3).and_then(parse_limiter),
                inbound: fields.get(4).and_then(parse_limiter),
            })
        })
        .collect()
}

fn parse_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn parse_decimal(value: &Value) -> Option<String> {
    match value {
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) => Some(s.clone()),
        _ => None,
    }
}

/// RateLimiter.Config tuple: (isEnabled, capacity, rate).
fn parse_limiter(value: &Value) -> Option<LimiterConfig> {
    let fields = value.as_array()?;
    Some(LimiterConfig {
        is_enabled: fields.first()?.as_bool()?,
        capacity: parse_decimal(fields.get(1)?)?,
        rate: parse_decimal(fields.get(2)?)?,
    })
}

fn limiter_annotations(
    direction: &str,
    proposed: &LimiterConfig,
    prior: Option<&TokenBucket>,
) -> Vec<Annotation> {
    // a zero-capacity limiter on an enabled direction blocks all transfers
    let kind = if proposed.is_enabled && proposed.capacity == "0" {
        "warning"
    } else {
        "rate_limiter"
    };

    let entry = |field: &str, old: Option<&String>, new: &String| {
        let diff = DiffValue::new(
            field,
            old.map(|v| json!(v)).unwrap_or(Value::Null),
            json!(new),
        )
        .with_value_type("ethereum.uint256");
        Annotation::new(kind, format!("{direction}.{field}"), diff.into())
    };

    vec![
        entry("capacity", prior.map(|p| &p.capacity), &proposed.capacity),
        entry("rate", prior.map(|p| &p.rate), &proposed.rate),
    ]
}

async fn read_bucket(
    reader: &dyn ChainReader,
    pool: &str,
    remote_selector: u64,
    sig: &str,
) -> eyre::Result<TokenBucket> {
    let mut calldata = keccak256(sig.as_bytes())[..4].to_vec();
    calldata.extend(DynSolValue::Uint(U256::from(remote_selector), 64).abi_encode());

    let output = reader.read_contract(pool, &calldata).await?;
    let bucket_ty: DynSolType =
        TOKEN_BUCKET_TY.parse().wrap_err("token bucket type parse failed")?;
    let decoded = bucket_ty
        .abi_decode(&output)
        .wrap_err_with(|| format!("malformed {sig} response"))?;

    let DynSolValue::Tuple(fields) = decoded else {
        return Err(eyre!("token bucket response is not a tuple"));
    };
    let uint_at = |idx: usize| -> eyre::Result<String> {
        match fields.get(idx) {
            Some(DynSolValue::Uint(n, _)) => Ok(n.to_string()),
            other => Err(eyre!("unexpected token bucket field at {idx}: {other:?}")),
        }
    };
    Ok(TokenBucket { capacity: uint_at(3)?, rate: uint_at(4)? })
}
