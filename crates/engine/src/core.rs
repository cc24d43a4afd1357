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

//! The engine facade.
//!
//! [`AnalyzerEngine`] owns the decoder, the registered analyzers, and the
//! run configuration. A run moves through `Ready -> Decoding -> GraphBuild
//! -> Executing -> Done|Failed`; any failure aborts the run and no
//! partially annotated tree is returned.

use std::{collections::HashSet, fmt, sync::Arc, time::Duration};

use parking_lot::RwLock;
use tracing::{debug, info};

use crate::{
    analyzer::AnalyzerKind,
    context::ExecutionContext,
    decoder::ProposalDecoder,
    error::AnalysisError,
    graph::AnalyzerGraph,
    proposal::TimelockProposal,
    runner::Runner,
    tree::{AnalyzedTimelockProposal, DecodedTimelockProposal},
};

/// Configuration for the analyzer engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Deadline applied to each `can_analyze` + `analyze` pair.
    pub analyzer_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self { analyzer_timeout: Duration::from_secs(30) }
    }
}

impl EngineConfig {
    /// Sets the per-call analyzer deadline.
    pub fn with_analyzer_timeout(mut self, timeout: Duration) -> Self {
        self.analyzer_timeout = timeout;
        self
    }
}

/// Phases of one engine run, used for log context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunState {
    Decoding,
    GraphBuild,
    Executing,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Decoding => "decoding",
            Self::GraphBuild => "graph-build",
            Self::Executing => "executing",
        };
        f.write_str(s)
    }
}

/// The proposal analysis engine.
///
/// Register analyzers, then call [`run`](Self::run) with a signed proposal,
/// or [`analyze_decoded`](Self::analyze_decoded) to skip decoding in staged
/// pipelines and tests.
pub struct AnalyzerEngine {
    decoder: ProposalDecoder,
    analyzers: Vec<AnalyzerKind>,
    ids: HashSet<String>,
    config: EngineConfig,
}

impl Default for AnalyzerEngine {
    fn default() -> Self {
        Self::new(ProposalDecoder::with_known_chains())
    }
}

impl fmt::Debug for AnalyzerEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnalyzerEngine")
            .field("analyzers", &self.analyzers)
            .field("config", &self.config)
            .finish()
    }
}

impl AnalyzerEngine {
    /// Creates an engine around a populated decoder.
    pub fn new(decoder: ProposalDecoder) -> Self {
        Self {
            decoder,
            analyzers: Vec::new(),
            ids: HashSet::new(),
            config: EngineConfig::default(),
        }
    }

    /// Replaces the engine configuration.
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// The decoder this engine dispatches through.
    pub fn decoder(&self) -> &ProposalDecoder {
        &self.decoder
    }

    /// Registers an analyzer.
    ///
    /// Fails immediately on an empty or duplicate ID; dependency referents
    /// are validated at run start, once the full set is known.
    pub fn register_analyzer(&mut self, analyzer: AnalyzerKind) -> Result<(), AnalysisError> {
        let id = analyzer.id();
        if id.is_empty() {
            return Err(AnalysisError::EmptyAnalyzerId);
        }
        if !self.ids.insert(id.to_string()) {
            return Err(AnalysisError::DuplicateAnalyzer(id.to_string()));
        }
        debug!(analyzer = id, level = %analyzer.level(), "registered analyzer");
        self.analyzers.push(analyzer);
        Ok(())
    }

    /// Decodes and analyzes a signed proposal.
    pub async fn run(
        &self,
        execution: ExecutionContext,
        proposal: &TimelockProposal,
    ) -> Result<AnalyzedTimelockProposal, AnalysisError> {
        debug!(state = %RunState::Decoding, transactions = proposal.transaction_count(), "run started");
        let decoded = self.decoder.decode(proposal);
        self.analyze_decoded(execution, decoded).await
    }

    /// Analyzes an already decoded proposal.
    pub async fn analyze_decoded(
        &self,
        execution: ExecutionContext,
        decoded: DecodedTimelockProposal,
    ) -> Result<AnalyzedTimelockProposal, AnalysisError> {
        debug!(state = %RunState::GraphBuild, analyzers = self.analyzers.len(), "resolving analyzer order");
        let nodes: Vec<(String, Vec<String>)> = self
            .analyzers
            .iter()
            .map(|a| (a.id().to_string(), a.dependencies()))
            .collect();
        let graph = AnalyzerGraph::build(&nodes)?;
        let levels: Vec<Vec<AnalyzerKind>> = graph
            .levels()
            .into_iter()
            .map(|level| {
                level
                    .iter()
                    .map(|id| {
                        self.analyzers
                            .iter()
                            .find(|a| a.id() == id.as_str())
                            .cloned()
                            .unwrap_or_else(|| unreachable!("graph node '{id}' has no analyzer"))
                    })
                    .collect()
            })
            .collect();

        debug!(state = %RunState::Executing, levels = levels.len(), "running analyzers");
        let tree = RwLock::new(AnalyzedTimelockProposal::from_decoded(&decoded));
        let decoded = Arc::new(decoded);
        let execution = Arc::new(execution);

        let runner = Runner::new(self.config.analyzer_timeout);
        runner.run(&levels, decoded, execution, &tree).await?;

        let analyzed = tree.into_inner();
        info!(
            batches = analyzed.batches.len(),
            annotations = analyzed.annotations.len(),
            "analysis complete"
        );
        Ok(analyzed)
    }

    /// Runs until completion or until `cancel` resolves, whichever is
    /// first. Cancellation drops all in-flight analyzer invocations.
    pub async fn run_until(
        &self,
        execution: ExecutionContext,
        proposal: &TimelockProposal,
        cancel: impl std::future::Future<Output = ()> + Send,
    ) -> Result<AnalyzedTimelockProposal, AnalysisError> {
        tokio::select! {
            _ = cancel => Err(AnalysisError::Cancelled),
            result = self.run(execution, proposal) => result,
        }
    }
}
