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

//! The analyzer capability surface.
//!
//! An analyzer targets exactly one tree level; the four traits share the
//! same facet (`id`, `dependencies`, `can_analyze`, `analyze`) and differ
//! only in target type. [`AnalyzerKind`] is the tagged variant the engine
//! registers and schedules.
//!
//! Contract for authors: return deterministic annotations for identical
//! inputs, honour cancellation (the invocation future is dropped on
//! timeout), and produce no side effects beyond the returned annotations.
//! Targets arrive by value; the request is read-only.

use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    annotation::Annotation,
    context::AnalyzerRequest,
    tree::{
        DecodedBatchOperation, DecodedCall, DecodedParameter, DecodedTimelockProposal, Level,
    },
};

/// Analyzer applied once to the proposal root.
#[async_trait]
pub trait ProposalAnalyzer: Send + Sync {
    /// Unique analyzer ID.
    fn id(&self) -> &str;

    /// IDs of analyzers whose annotations this one needs to observe.
    fn dependencies(&self) -> Vec<String> {
        Vec::new()
    }

    /// Whether the analyzer applies to this proposal.
    async fn can_analyze(
        &self,
        _req: &AnalyzerRequest,
        _proposal: &DecodedTimelockProposal,
    ) -> bool {
        true
    }

    /// Produces annotations for the proposal root.
    async fn analyze(
        &self,
        req: &AnalyzerRequest,
        proposal: DecodedTimelockProposal,
    ) -> eyre::Result<Vec<Annotation>>;
}

/// Analyzer applied to every batch operation.
#[async_trait]
pub trait BatchOperationAnalyzer: Send + Sync {
    /// Unique analyzer ID.
    fn id(&self) -> &str;

    /// IDs of analyzers whose annotations this one needs to observe.
    fn dependencies(&self) -> Vec<String> {
        Vec::new()
    }

    /// Whether the analyzer applies to this batch.
    async fn can_analyze(&self, _req: &AnalyzerRequest, _batch: &DecodedBatchOperation) -> bool {
        true
    }

    /// Produces annotations for one batch operation.
    async fn analyze(
        &self,
        req: &AnalyzerRequest,
        batch: DecodedBatchOperation,
    ) -> eyre::Result<Vec<Annotation>>;
}

/// Analyzer applied to every call.
#[async_trait]
pub trait CallAnalyzer: Send + Sync {
    /// Unique analyzer ID.
    fn id(&self) -> &str;

    /// IDs of analyzers whose annotations this one needs to observe.
    fn dependencies(&self) -> Vec<String> {
        Vec::new()
    }

    /// Whether the analyzer applies to this call.
    async fn can_analyze(&self, _req: &AnalyzerRequest, _call: &DecodedCall) -> bool {
        true
    }

    /// Produces annotations for one call.
    async fn analyze(
        &self,
        req: &AnalyzerRequest,
        call: DecodedCall,
    ) -> eyre::Result<Vec<Annotation>>;
}

/// Analyzer applied to every parameter, inputs before outputs.
#[async_trait]
pub trait ParameterAnalyzer: Send + Sync {
    /// Unique analyzer ID.
    fn id(&self) -> &str;

    /// IDs of analyzers whose annotations this one needs to observe.
    fn dependencies(&self) -> Vec<String> {
        Vec::new()
    }

    /// Whether the analyzer applies to this parameter.
    async fn can_analyze(&self, _req: &AnalyzerRequest, _param: &DecodedParameter) -> bool {
        true
    }

    /// Produces annotations for one parameter.
    async fn analyze(
        &self,
        req: &AnalyzerRequest,
        param: DecodedParameter,
    ) -> eyre::Result<Vec<Annotation>>;
}

/// A registered analyzer, tagged with its target level.
#[derive(Clone)]
pub enum AnalyzerKind {
    /// Runs once per proposal.
    Proposal(Arc<dyn ProposalAnalyzer>),
    /// Runs per batch operation.
    BatchOperation(Arc<dyn BatchOperationAnalyzer>),
    /// Runs per call.
    Call(Arc<dyn CallAnalyzer>),
    /// Runs per parameter.
    Parameter(Arc<dyn ParameterAnalyzer>),
}

impl AnalyzerKind {
    /// Wraps a proposal analyzer.
    pub fn proposal(analyzer: impl ProposalAnalyzer + 'static) -> Self {
        Self::Proposal(Arc::new(analyzer))
    }

    /// Wraps a batch-operation analyzer.
    pub fn batch_operation(analyzer: impl BatchOperationAnalyzer + 'static) -> Self {
        Self::BatchOperation(Arc::new(analyzer))
    }

    /// Wraps a call analyzer.
    pub fn call(analyzer: impl CallAnalyzer + 'static) -> Self {
        Self::Call(Arc::new(analyzer))
    }

    /// Wraps a parameter analyzer.
    pub fn parameter(analyzer: impl ParameterAnalyzer + 'static) -> Self {
        Self::Parameter(Arc::new(analyzer))
    }

    /// The analyzer's unique ID.
    pub fn id(&self) -> &str {
        match self {
            Self::Proposal(a) => a.id(),
            Self::BatchOperation(a) => a.id(),
            Self::Call(a) => a.id(),
            Self::Parameter(a) => a.id(),
        }
    }

    /// The analyzer's declared dependencies.
    pub fn dependencies(&self) -> Vec<String> {
        match self {
            Self::Proposal(a) => a.dependencies(),
            Self::BatchOperation(a) => a.dependencies(),
            Self::Call(a) => a.dependencies(),
            Self::Parameter(a) => a.dependencies(),
        }
    }

    /// The tree level this analyzer targets.
    pub fn level(&self) -> Level {
        match self {
            Self::Proposal(_) => Level::Proposal,
            Self::BatchOperation(_) => Level::BatchOperation,
            Self::Call(_) => Level::Call,
            Self::Parameter(_) => Level::Parameter,
        }
    }
}

impl std::fmt::Debug for AnalyzerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnalyzerKind")
            .field("id", &self.id())
            .field("level", &self.level())
            .field("dependencies", &self.dependencies())
            .finish()
    }
}
