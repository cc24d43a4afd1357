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

//! Execution context and per-invocation analyzer requests.
//!
//! The [`ExecutionContext`] is built once per run by the embedder: which
//! domain and environment the proposal belongs to, handles to the chains it
//! touches, a read-only datastore snapshot, and a clock. The runner derives
//! an [`AnalyzerRequest`] from it for every analyzer invocation, adding the
//! target's ancestor chain and the dependency-scoped annotation store.

use std::{collections::HashMap, fmt, sync::Arc};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mpa_common::chain::ChainFamily;
use serde::{Deserialize, Serialize};

use crate::{
    annotation::Annotation,
    store::ScopedAnnotationStore,
    tree::{
        DecodedBatchOperation, DecodedCall, DecodedParameter, DecodedTimelockProposal, Level,
        NodePath,
    },
};

/// Read-only contract-call capability for a single chain.
///
/// Analyzers use this best-effort to compare proposed state against current
/// on-chain state. Implementations must not mutate anything; errors
/// propagate out of `analyze` and abort the run.
#[async_trait]
pub trait ChainReader: Send + Sync {
    /// Executes a read-only contract call and returns the raw result bytes.
    async fn read_contract(&self, address: &str, data: &[u8]) -> eyre::Result<Vec<u8>>;
}

/// Handle to one chain referenced by the proposal.
#[derive(Clone)]
pub struct ChainHandle {
    /// The 64-bit chain selector.
    pub selector: u64,
    /// Canonical chain name.
    pub name: String,
    /// Decoding strategy family.
    pub family: ChainFamily,
    /// Optional read-only RPC capability.
    pub reader: Option<Arc<dyn ChainReader>>,
}

impl ChainHandle {
    /// Creates a handle without an RPC capability.
    pub fn new(selector: u64, name: impl Into<String>, family: ChainFamily) -> Self {
        Self { selector, name: name.into(), family, reader: None }
    }

    /// Attaches a read-only RPC capability.
    pub fn with_reader(mut self, reader: Arc<dyn ChainReader>) -> Self {
        self.reader = Some(reader);
        self
    }
}

impl fmt::Debug for ChainHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChainHandle")
            .field("selector", &self.selector)
            .field("name", &self.name)
            .field("family", &self.family)
            .field("reader", &self.reader.is_some())
            .finish()
    }
}

/// One address record in the datastore snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressRef {
    /// Chain the contract lives on.
    pub chain_selector: u64,
    /// Contract type token.
    pub contract_type: String,
    /// Distinguishes multiple deployments of the same type.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qualifier: Option<String>,
    /// Deployed address in the chain's native form.
    pub address: String,
}

/// Immutable snapshot of deployed-address records.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DataStoreSnapshot {
    refs: Vec<AddressRef>,
}

impl DataStoreSnapshot {
    /// Creates a snapshot from address records.
    pub fn new(refs: Vec<AddressRef>) -> Self {
        Self { refs }
    }

    /// Finds a record by chain, type, and optional qualifier.
    pub fn get(
        &self,
        chain_selector: u64,
        contract_type: &str,
        qualifier: Option<&str>,
    ) -> Option<&AddressRef> {
        self.refs.iter().find(|r| {
            r.chain_selector == chain_selector
                && r.contract_type == contract_type
                && r.qualifier.as_deref() == qualifier
        })
    }

    /// All records on one chain.
    pub fn by_chain(&self, chain_selector: u64) -> Vec<&AddressRef> {
        self.refs.iter().filter(|r| r.chain_selector == chain_selector).collect()
    }

    /// All records in the snapshot.
    pub fn all(&self) -> &[AddressRef] {
        &self.refs
    }
}

/// Time source for analyzers; fixed in tests for determinism.
#[derive(Debug, Clone, Default)]
pub enum Clock {
    /// Wall-clock time.
    #[default]
    System,
    /// A frozen instant.
    Fixed(DateTime<Utc>),
}

impl Clock {
    /// The current instant according to this clock.
    pub fn now(&self) -> DateTime<Utc> {
        match self {
            Self::System => Utc::now(),
            Self::Fixed(at) => *at,
        }
    }
}

/// Environment the analysis runs against.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    /// Deployment domain identifier, e.g. `ccip`.
    pub domain: String,
    /// Environment name, e.g. `staging` or `mainnet`.
    pub environment: String,
    /// Chain handles keyed by selector.
    pub chains: HashMap<u64, ChainHandle>,
    /// Read-only datastore snapshot.
    pub datastore: DataStoreSnapshot,
    /// Time source.
    pub clock: Clock,
}

impl ExecutionContext {
    /// Creates a context with no chains and an empty datastore.
    pub fn new(domain: impl Into<String>, environment: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            environment: environment.into(),
            chains: HashMap::new(),
            datastore: DataStoreSnapshot::default(),
            clock: Clock::System,
        }
    }

    /// Adds a chain handle.
    pub fn with_chain(mut self, handle: ChainHandle) -> Self {
        self.chains.insert(handle.selector, handle);
        self
    }

    /// Sets the datastore snapshot.
    pub fn with_datastore(mut self, datastore: DataStoreSnapshot) -> Self {
        self.datastore = datastore;
        self
    }

    /// Sets the time source.
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// The handle for a chain selector, if registered.
    pub fn chain(&self, selector: u64) -> Option<&ChainHandle> {
        self.chains.get(&selector)
    }
}

/// The ancestor chain of an analyzer target.
///
/// Holds the shared decoded tree plus the target path, so analyzers can
/// inspect enclosing nodes without the tree carrying parent pointers.
#[derive(Debug, Clone)]
pub struct AnalyzerContext {
    proposal: Arc<DecodedTimelockProposal>,
    path: NodePath,
}

impl AnalyzerContext {
    /// Creates a context for the node at `path`.
    pub fn new(proposal: Arc<DecodedTimelockProposal>, path: NodePath) -> Self {
        Self { proposal, path }
    }

    /// The target path.
    pub fn path(&self) -> NodePath {
        self.path
    }

    /// The decoded proposal root.
    pub fn proposal(&self) -> &DecodedTimelockProposal {
        &self.proposal
    }

    /// The enclosing batch, for batch-or-finer targets.
    pub fn batch(&self) -> Option<&DecodedBatchOperation> {
        let idx = match self.path {
            NodePath::Proposal => return None,
            NodePath::Batch { batch }
            | NodePath::Call { batch, .. }
            | NodePath::Parameter { batch, .. } => batch,
        };
        self.proposal.batches.get(idx)
    }

    /// The enclosing call, for call-or-finer targets.
    pub fn call(&self) -> Option<&DecodedCall> {
        let (batch, call) = match self.path {
            NodePath::Call { batch, call } | NodePath::Parameter { batch, call, .. } => {
                (batch, call)
            }
            _ => return None,
        };
        self.proposal.batches.get(batch)?.calls.get(call)
    }

    /// The target parameter, for parameter targets.
    pub fn parameter(&self) -> Option<&DecodedParameter> {
        let NodePath::Parameter { is_input, param, .. } = self.path else {
            return None;
        };
        let call = self.call()?;
        let params = if is_input { &call.inputs } else { &call.outputs };
        params.get(param)
    }

    /// The chain selector of the enclosing batch, if any.
    pub fn chain_selector(&self) -> Option<u64> {
        self.batch().map(|b| b.chain_selector)
    }
}

/// Everything an analyzer invocation may observe.
#[derive(Debug, Clone)]
pub struct AnalyzerRequest {
    /// Ancestor chain of the target node.
    pub context: AnalyzerContext,
    /// The run's execution context.
    pub execution: Arc<ExecutionContext>,
    /// Dependency-scoped annotation snapshot.
    pub store: ScopedAnnotationStore,
}

impl AnalyzerRequest {
    /// The dependency-visible annotations at `level`.
    pub fn annotations_at(&self, level: Level) -> Vec<Annotation> {
        self.store.at_level(level)
    }
}
