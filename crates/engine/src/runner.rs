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

//! Level-by-level analyzer execution.
//!
//! The runner walks the dependency levels in order. Within a level, every
//! analyzer runs as a concurrent future over its full target iteration
//! (batches ascending, calls ascending, inputs before outputs, parameters
//! ascending); produced annotations are buffered and written back to the
//! analyzed tree in the level's iteration order once the level completes.
//! Deferring the writes keeps sibling analyzers blind to each other and
//! makes annotation order deterministic regardless of future interleaving.
//!
//! Every `can_analyze` + `analyze` pair runs under one deadline. The first
//! failure (analyzer error or timeout) aborts the level; unfinished sibling
//! futures are dropped, which is their cancellation.

use std::{sync::Arc, time::Duration};

use futures::future::try_join_all;
use parking_lot::RwLock;
use tracing::{debug, trace};

use crate::{
    analyzer::AnalyzerKind,
    annotation::Annotation,
    context::{AnalyzerContext, AnalyzerRequest, ExecutionContext},
    error::AnalysisError,
    store::ScopedAnnotationStore,
    tree::{AnalyzedTimelockProposal, DecodedTimelockProposal, NodePath},
};

/// Annotations one analyzer produced for one node.
type Writes = Vec<(NodePath, Vec<Annotation>)>;

/// Executes analyzer level sets over a decoded proposal.
pub(crate) struct Runner {
    timeout: Duration,
}

impl Runner {
    pub(crate) fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Runs all levels to completion, writing annotations into `tree`.
    pub(crate) async fn run(
        &self,
        levels: &[Vec<AnalyzerKind>],
        decoded: Arc<DecodedTimelockProposal>,
        execution: Arc<ExecutionContext>,
        tree: &RwLock<AnalyzedTimelockProposal>,
    ) -> Result<(), AnalysisError> {
        for (depth, level) in levels.iter().enumerate() {
            debug!(depth, analyzers = level.len(), "executing dependency level");

            let results: Vec<Writes> = try_join_all(
                level
                    .iter()
                    .map(|analyzer| self.run_analyzer(analyzer, &decoded, &execution, tree)),
            )
            .await?;

            let mut guard = tree.write();
            for (analyzer, writes) in level.iter().zip(results) {
                for (path, annotations) in writes {
                    trace!(analyzer = analyzer.id(), %path, count = annotations.len(), "attaching annotations");
                    if let Some(target) = guard.annotations_at_mut(&path) {
                        target.add_all(
                            annotations.into_iter().map(|a| a.with_analyzer(analyzer.id())),
                        );
                    }
                }
            }
        }
        Ok(())
    }

    /// Applies one analyzer to every target at its level, in deterministic
    /// iteration order, and buffers the produced annotations.
    async fn run_analyzer(
        &self,
        analyzer: &AnalyzerKind,
        decoded: &Arc<DecodedTimelockProposal>,
        execution: &Arc<ExecutionContext>,
        tree: &RwLock<AnalyzedTimelockProposal>,
    ) -> Result<Writes, AnalysisError> {
        let deps = analyzer.dependencies();
        let mut writes = Writes::new();

        match analyzer {
            AnalyzerKind::Proposal(a) => {
                let path = NodePath::proposal();
                let req = build_request(tree, decoded, execution, &deps, path);
                let produced = self
                    .bounded(a.id(), path, async {
                        if !a.can_analyze(&req, decoded).await {
                            return Ok(None);
                        }
                        a.analyze(&req, (**decoded).clone()).await.map(Some)
                    })
                    .await?;
                if let Some(annotations) = produced {
                    writes.push((path, annotations));
                }
            }
            AnalyzerKind::BatchOperation(a) => {
                for (bi, batch) in decoded.batches.iter().enumerate() {
                    let path = NodePath::batch(bi);
                    let req = build_request(tree, decoded, execution, &deps, path);
                    let produced = self
                        .bounded(a.id(), path, async {
                            if !a.can_analyze(&req, batch).await {
                                return Ok(None);
                            }
                            a.analyze(&req, batch.clone()).await.map(Some)
                        })
                        .await?;
                    if let Some(annotations) = produced {
                        writes.push((path, annotations));
                    }
                }
            }
            AnalyzerKind::Call(a) => {
                for (bi, batch) in decoded.batches.iter().enumerate() {
                    for (ci, call) in batch.calls.iter().enumerate() {
                        let path = NodePath::call(bi, ci);
                        let req = build_request(tree, decoded, execution, &deps, path);
                        let produced = self
                            .bounded(a.id(), path, async {
                                if !a.can_analyze(&req, call).await {
                                    return Ok(None);
                                }
                                a.analyze(&req, call.clone()).await.map(Some)
                            })
                            .await?;
                        if let Some(annotations) = produced {
                            writes.push((path, annotations));
                        }
                    }
                }
            }
            AnalyzerKind::Parameter(a) => {
                for (bi, batch) in decoded.batches.iter().enumerate() {
                    for (ci, call) in batch.calls.iter().enumerate() {
                        let params = call
                            .inputs
                            .iter()
                            .enumerate()
                            .map(|(pi, p)| (true, pi, p))
                            .chain(
                                call.outputs.iter().enumerate().map(|(pi, p)| (false, pi, p)),
                            );
                        for (is_input, pi, param) in params {
                            let path = NodePath::parameter(bi, ci, is_input, pi);
                            let req = build_request(tree, decoded, execution, &deps, path);
                            let produced = self
                                .bounded(a.id(), path, async {
                                    if !a.can_analyze(&req, param).await {
                                        return Ok(None);
                                    }
                                    a.analyze(&req, param.clone()).await.map(Some)
                                })
                                .await?;
                            if let Some(annotations) = produced {
                                writes.push((path, annotations));
                            }
                        }
                    }
                }
            }
        }
        Ok(writes)
    }

    /// Wraps one `can_analyze` + `analyze` pair in the per-call deadline.
    ///
    /// `Ok(None)` means the analyzer skipped the target.
    async fn bounded<F>(
        &self,
        analyzer_id: &str,
        path: NodePath,
        invocation: F,
    ) -> Result<Option<Vec<Annotation>>, AnalysisError>
    where
        F: std::future::Future<Output = eyre::Result<Option<Vec<Annotation>>>>,
    {
        match tokio::time::timeout(self.timeout, invocation).await {
            Ok(Ok(produced)) => Ok(produced),
            Ok(Err(source)) => Err(AnalysisError::Analyzer {
                analyzer: analyzer_id.to_string(),
                path,
                source,
            }),
            Err(_) => Err(AnalysisError::Timeout {
                analyzer: analyzer_id.to_string(),
                path,
                timeout: self.timeout,
            }),
        }
    }
}

/// Builds the read-only request for one invocation: ancestor chain, shared
/// execution context, and the dependency-scoped annotation snapshot.
///
/// The tree's read lock is held only long enough to clone the per-level
/// snapshot lists.
fn build_request(
    tree: &RwLock<AnalyzedTimelockProposal>,
    decoded: &Arc<DecodedTimelockProposal>,
    execution: &Arc<ExecutionContext>,
    deps: &[String],
    path: NodePath,
) -> AnalyzerRequest {
    let snapshot = tree.read().ancestor_annotations(&path);
    AnalyzerRequest {
        context: AnalyzerContext::new(decoded.clone(), path),
        execution: execution.clone(),
        store: ScopedAnnotationStore::new(deps.iter().cloned(), snapshot),
    }
}
