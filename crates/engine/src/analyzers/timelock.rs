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

//! Proposal-level timelock summary.

use async_trait::async_trait;
use serde_json::json;

use crate::{
    analyzer::ProposalAnalyzer,
    annotation::{Annotation, Severity},
    context::AnalyzerRequest,
    tree::DecodedTimelockProposal,
};

/// Summarizes the proposal root: timelock action, batch and call counts,
/// and the touched chains.
#[derive(Debug, Clone, Default)]
pub struct TimelockActionAnalyzer;

impl TimelockActionAnalyzer {
    /// Creates the analyzer.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ProposalAnalyzer for TimelockActionAnalyzer {
    fn id(&self) -> &str {
        "timelock-summary"
    }

    async fn analyze(
        &self,
        _req: &AnalyzerRequest,
        proposal: DecodedTimelockProposal,
    ) -> eyre::Result<Vec<Annotation>> {
        let action = proposal
            .action
            .map(|a| a.to_string())
            .unwrap_or_else(|| "none".to_string());
        let chains: Vec<String> =
            proposal.batches.iter().map(|b| b.chain_name.clone()).collect();

        Ok(vec![
            Annotation::new("proposal_summary", "action", json!(action)),
            Annotation::new("proposal_summary", "batches", json!(proposal.batches.len())),
            Annotation::new("proposal_summary", "calls", json!(proposal.call_count())),
            Annotation::new("proposal_summary", "chains", json!(chains)),
            Annotation::severity(Severity::Info),
        ])
    }
}
