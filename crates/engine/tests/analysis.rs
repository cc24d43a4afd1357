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

//! End-to-end engine scenarios: decode, schedule, analyze, render.

use std::{collections::BTreeMap, sync::Arc, time::Duration};

use async_trait::async_trait;
use mpa_common::chain::ChainFamily;
use mpa_engine::{
    analyzers::{TokenPoolAnalyzer, ValueTypeAnalyzer},
    AnalysisError, AnalyzerEngine, AnalyzerKind, AnalyzerRequest, Annotation, CallAnalyzer,
    ChainHandle, DecodedCall, DecodedTimelockProposal, EngineConfig, ExecutionContext, Level,
    ProposalAnalyzer, ProposalBatch, ProposalDecoder, ProposalKind, ProposalTransaction,
    TimelockAction, TimelockProposal,
};
use parking_lot::Mutex;
use serde_json::json;

const SEPOLIA: u64 = 16015286601757825753;

const TOKEN_POOL_ABI: &str = r#"[
    {
        "type": "function",
        "name": "applyChainUpdates",
        "stateMutability": "nonpayable",
        "inputs": [
            {
                "name": "chainsToAdd",
                "type": "tuple[]",
                "components": [
                    {"name": "remoteChainSelector", "type": "uint64"},
                    {"name": "remotePoolAddress", "type": "bytes"},
                    {"name": "remoteTokenAddress", "type": "bytes"},
                    {
                        "name": "outboundRateLimiterConfig",
                        "type": "tuple",
                        "components": [
                            {"name": "isEnabled", "type": "bool"},
                            {"name": "capacity", "type": "uint128"},
                            {"name": "rate", "type": "uint128"}
                        ]
                    },
                    {
                        "name": "inboundRateLimiterConfig",
                        "type": "tuple",
                        "components": [
                            {"name": "isEnabled", "type": "bool"},
                            {"name": "capacity", "type": "uint128"},
                            {"name": "rate", "type": "uint128"}
                        ]
                    }
                ]
            },
            {"name": "remoteChainSelectorsToRemove", "type": "uint64[]"}
        ],
        "outputs": []
    }
]"#;

fn proposal_with(transactions: Vec<ProposalTransaction>) -> TimelockProposal {
    TimelockProposal {
        version: "1.0.0".into(),
        kind: ProposalKind::TimelockProposal,
        action: Some(TimelockAction::Schedule),
        chain_metadata: BTreeMap::new(),
        operations: vec![ProposalBatch {
            chain_selector: SEPOLIA,
            transactions,
            extra: BTreeMap::new(),
        }],
        extra: BTreeMap::new(),
    }
}

fn execution_context() -> ExecutionContext {
    ExecutionContext::new("ccip", "testnet").with_chain(ChainHandle::new(
        SEPOLIA,
        "ethereum-sepolia",
        ChainFamily::Evm,
    ))
}

fn apply_chain_updates_calldata(capacity: u128, rate: u128) -> Vec<u8> {
    use alloy_dyn_abi::{DynSolValue, JsonAbiExt};

    let abi: alloy_json_abi::JsonAbi = serde_json::from_str(TOKEN_POOL_ABI).unwrap();
    let function = abi.functions().next().unwrap();

    let limiter = |capacity: u128, rate: u128| {
        DynSolValue::Tuple(vec![
            DynSolValue::Bool(true),
            DynSolValue::Uint(alloy_primitives::U256::from(capacity), 128),
            DynSolValue::Uint(alloy_primitives::U256::from(rate), 128),
        ])
    };
    let update = DynSolValue::Tuple(vec![
        DynSolValue::Uint(alloy_primitives::U256::from(SEPOLIA), 64),
        DynSolValue::Bytes(vec![0x11; 20]),
        DynSolValue::Bytes(vec![0x22; 20]),
        limiter(capacity, rate),
        limiter(capacity, rate),
    ]);

    let mut data = function.selector().to_vec();
    data.extend(
        function
            .abi_encode_input(&[
                DynSolValue::Array(vec![update]),
                DynSolValue::Array(vec![]),
            ])
            .unwrap(),
    );
    data
}

/// Emits fixed annotations on the proposal root.
struct EmitAnalyzer {
    id: &'static str,
    deps: Vec<&'static str>,
    annotations: Vec<Annotation>,
}

#[async_trait]
impl ProposalAnalyzer for EmitAnalyzer {
    fn id(&self) -> &str {
        self.id
    }

    fn dependencies(&self) -> Vec<String> {
        self.deps.iter().map(|d| d.to_string()).collect()
    }

    async fn analyze(
        &self,
        _req: &AnalyzerRequest,
        _proposal: DecodedTimelockProposal,
    ) -> eyre::Result<Vec<Annotation>> {
        Ok(self.annotations.clone())
    }
}

/// Records what it observes through the scoped store.
struct ObserveAnalyzer {
    id: &'static str,
    deps: Vec<&'static str>,
    seen: Arc<Mutex<Vec<Annotation>>>,
}

#[async_trait]
impl ProposalAnalyzer for ObserveAnalyzer {
    fn id(&self) -> &str {
        self.id
    }

    fn dependencies(&self) -> Vec<String> {
        self.deps.iter().map(|d| d.to_string()).collect()
    }

    async fn analyze(
        &self,
        req: &AnalyzerRequest,
        _proposal: DecodedTimelockProposal,
    ) -> eyre::Result<Vec<Annotation>> {
        *self.seen.lock() = req.annotations_at(Level::Proposal);
        Ok(Vec::new())
    }
}

/// Blocks past any reasonable deadline.
struct SleepAnalyzer;

#[async_trait]
impl CallAnalyzer for SleepAnalyzer {
    fn id(&self) -> &str {
        "sleeper"
    }

    async fn analyze(
        &self,
        _req: &AnalyzerRequest,
        _call: DecodedCall,
    ) -> eyre::Result<Vec<Annotation>> {
        tokio::time::sleep(Duration::from_secs(1)).await;
        Ok(Vec::new())
    }
}

#[tokio::test]
async fn undecoded_call_survives_the_run() {
    let engine = AnalyzerEngine::default();
    let data = vec![0xde, 0xad, 0xbe, 0xef, 0x42];
    let proposal = proposal_with(vec![ProposalTransaction {
        to: "0x7d4a13fe119c9f36425008a7afcb2737b2bb5c41".into(),
        data: data.clone(),
        contract_type: "UnknownThing".into(),
        additional_fields: None,
        extra: BTreeMap::new(),
    }]);

    let analyzed = engine.run(execution_context(), &proposal).await.unwrap();
    assert_eq!(analyzed.batches.len(), 1);
    let call = &analyzed.batches[0].calls[0];
    assert_eq!(call.method_name, "[undecoded]");
    assert!(call.inputs.is_empty());
    assert_eq!(call.data, data);
}

#[tokio::test]
async fn token_pool_chain_updates_are_annotated() {
    let mut decoder = ProposalDecoder::with_known_chains();
    decoder
        .register_evm_abi_json(
            "LockReleaseTokenPool",
            semver::Version::new(1, 5, 1),
            TOKEN_POOL_ABI,
        )
        .unwrap();

    let mut engine = AnalyzerEngine::new(decoder);
    engine.register_analyzer(AnalyzerKind::call(TokenPoolAnalyzer::new())).unwrap();
    engine.register_analyzer(AnalyzerKind::parameter(ValueTypeAnalyzer::new())).unwrap();

    let proposal = proposal_with(vec![ProposalTransaction {
        to: "0x7d4a13fe119c9f36425008a7afcb2737b2bb5c41".into(),
        data: apply_chain_updates_calldata(1_000_000_000_000_000_000, 50_000_000_000_000_000),
        contract_type: "LockReleaseTokenPool".into(),
        additional_fields: Some(json!({"value": 0})),
        extra: BTreeMap::new(),
    }]);

    let analyzed = engine.run(execution_context(), &proposal).await.unwrap();
    let call = &analyzed.batches[0].calls[0];
    assert_eq!(call.method_name, "applyChainUpdates");

    let updates = call.annotations.get_by_kind("chain_update");
    assert_eq!(updates.len(), 1);
    assert_eq!(
        updates[0].value,
        json!("ethereum-sepolia (16015286601757825753) added")
    );
    assert_eq!(updates[0].analyzer_id.as_deref(), Some("token-pool"));

    let limiters = call.annotations.get_by_kind("rate_limiter");
    assert_eq!(limiters.len(), 4);
    assert!(limiters.iter().any(|a| a.name == "outbound.capacity"));
    assert!(limiters.iter().any(|a| a.name == "inbound.rate"));
}

#[tokio::test]
async fn zero_capacity_update_downgrades_to_warning() {
    let mut decoder = ProposalDecoder::with_known_chains();
    decoder
        .register_evm_abi_json(
            "LockReleaseTokenPool",
            semver::Version::new(1, 5, 1),
            TOKEN_POOL_ABI,
        )
        .unwrap();
    let mut engine = AnalyzerEngine::new(decoder);
    engine.register_analyzer(AnalyzerKind::call(TokenPoolAnalyzer::new())).unwrap();

    let proposal = proposal_with(vec![ProposalTransaction {
        to: "0x7d4a13fe119c9f36425008a7afcb2737b2bb5c41".into(),
        data: apply_chain_updates_calldata(0, 0),
        contract_type: "LockReleaseTokenPool".into(),
        additional_fields: None,
        extra: BTreeMap::new(),
    }]);

    let analyzed = engine.run(execution_context(), &proposal).await.unwrap();
    let call = &analyzed.batches[0].calls[0];
    assert!(call.annotations.get_by_kind("rate_limiter").is_empty());
    assert_eq!(call.annotations.get_by_kind("warning").len(), 4);
}

#[tokio::test]
async fn dependency_isolation_across_analyzers() {
    let seen_by_x = Arc::new(Mutex::new(Vec::new()));
    let seen_by_z = Arc::new(Mutex::new(Vec::new()));

    let mut engine = AnalyzerEngine::default();
    engine
        .register_analyzer(AnalyzerKind::proposal(EmitAnalyzer {
            id: "Y",
            deps: vec![],
            annotations: vec![Annotation::new("tag", "k", json!(1))],
        }))
        .unwrap();
    engine
        .register_analyzer(AnalyzerKind::proposal(ObserveAnalyzer {
            id: "X",
            deps: vec!["Y"],
            seen: seen_by_x.clone(),
        }))
        .unwrap();
    engine
        .register_analyzer(AnalyzerKind::proposal(ObserveAnalyzer {
            id: "Z",
            deps: vec![],
            seen: seen_by_z.clone(),
        }))
        .unwrap();

    let proposal = proposal_with(vec![]);
    engine.run(execution_context(), &proposal).await.unwrap();

    let seen = seen_by_x.lock();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].name, "k");
    assert_eq!(seen[0].value, json!(1));
    assert_eq!(seen[0].analyzer_id.as_deref(), Some("Y"));

    assert!(seen_by_z.lock().is_empty());
}

#[tokio::test]
async fn circular_dependencies_fail_the_run() {
    let emit = |id: &'static str, dep: &'static str| EmitAnalyzer {
        id,
        deps: vec![dep],
        annotations: vec![],
    };
    let mut engine = AnalyzerEngine::default();
    engine.register_analyzer(AnalyzerKind::proposal(emit("A", "B"))).unwrap();
    engine.register_analyzer(AnalyzerKind::proposal(emit("B", "C"))).unwrap();
    engine.register_analyzer(AnalyzerKind::proposal(emit("C", "A"))).unwrap();

    let err = engine
        .run(execution_context(), &proposal_with(vec![]))
        .await
        .unwrap_err();
    let message = err.to_string();
    assert!(message.contains("circular dependency detected"));
    assert!(message.contains("[A B C A]"));
}

#[tokio::test]
async fn duplicate_and_empty_ids_fail_registration() {
    let mut engine = AnalyzerEngine::default();
    engine
        .register_analyzer(AnalyzerKind::proposal(EmitAnalyzer {
            id: "dup",
            deps: vec![],
            annotations: vec![],
        }))
        .unwrap();
    let err = engine
        .register_analyzer(AnalyzerKind::proposal(EmitAnalyzer {
            id: "dup",
            deps: vec![],
            annotations: vec![],
        }))
        .unwrap_err();
    assert!(matches!(err, AnalysisError::DuplicateAnalyzer(id) if id == "dup"));

    let err = engine
        .register_analyzer(AnalyzerKind::proposal(EmitAnalyzer {
            id: "",
            deps: vec![],
            annotations: vec![],
        }))
        .unwrap_err();
    assert!(matches!(err, AnalysisError::EmptyAnalyzerId));
}

#[tokio::test]
async fn blocking_analyzer_times_out() {
    let mut engine = AnalyzerEngine::default()
        .with_config(EngineConfig::default().with_analyzer_timeout(Duration::from_millis(50)));
    engine.register_analyzer(AnalyzerKind::call(SleepAnalyzer)).unwrap();

    let proposal = proposal_with(vec![ProposalTransaction {
        to: "0x7d4a13fe119c9f36425008a7afcb2737b2bb5c41".into(),
        data: vec![0x01, 0x02, 0x03, 0x04],
        contract_type: "UnknownThing".into(),
        additional_fields: None,
        extra: BTreeMap::new(),
    }]);

    let started = std::time::Instant::now();
    let err = engine.run(execution_context(), &proposal).await.unwrap_err();
    assert!(started.elapsed() < Duration::from_millis(800));
    match err {
        AnalysisError::Timeout { analyzer, timeout, .. } => {
            assert_eq!(analyzer, "sleeper");
            assert_eq!(timeout, Duration::from_millis(50));
        }
        other => panic!("expected timeout, got {other}"),
    }
}

#[tokio::test]
async fn cancellation_aborts_the_run() {
    let mut engine = AnalyzerEngine::default();
    engine.register_analyzer(AnalyzerKind::call(SleepAnalyzer)).unwrap();

    let proposal = proposal_with(vec![ProposalTransaction {
        to: "0x7d4a13fe119c9f36425008a7afcb2737b2bb5c41".into(),
        data: vec![0x01, 0x02, 0x03, 0x04],
        contract_type: "UnknownThing".into(),
        additional_fields: None,
        extra: BTreeMap::new(),
    }]);

    let err = engine
        .run_until(execution_context(), &proposal, async {
            tokio::time::sleep(Duration::from_millis(20)).await;
        })
        .await
        .unwrap_err();
    assert!(matches!(err, AnalysisError::Cancelled));
}

#[tokio::test]
async fn analysis_is_deterministic_and_shape_preserving() {
    let build = || {
        let mut engine = AnalyzerEngine::default();
        engine
            .register_analyzer(AnalyzerKind::proposal(EmitAnalyzer {
                id: "first",
                deps: vec![],
                annotations: vec![Annotation::new("tag", "a", json!("x"))],
            }))
            .unwrap();
        engine
            .register_analyzer(AnalyzerKind::proposal(EmitAnalyzer {
                id: "second",
                deps: vec!["first"],
                annotations: vec![Annotation::new("tag", "b", json!("y"))],
            }))
            .unwrap();
        engine
    };

    let proposal = proposal_with(vec![ProposalTransaction {
        to: "0x7d4a13fe119c9f36425008a7afcb2737b2bb5c41".into(),
        data: vec![0x0a, 0x0b, 0x0c, 0x0d],
        contract_type: "UnknownThing".into(),
        additional_fields: None,
        extra: BTreeMap::new(),
    }]);

    let first = build().run(execution_context(), &proposal).await.unwrap();
    let second = build().run(execution_context(), &proposal).await.unwrap();
    assert_eq!(first, second);

    // tree shape mirrors the proposal
    assert_eq!(first.batches.len(), proposal.operations.len());
    assert_eq!(first.batches[0].calls.len(), proposal.operations[0].transactions.len());

    // dependency order is reflected in annotation order on the root
    let names: Vec<&str> = first.annotations.iter().map(|a| a.name.as_str()).collect();
    assert_eq!(names, ["a", "b"]);
}
