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

//! The analyzer dependency graph.
//!
//! Registered analyzers form a DAG: an edge `A -> B` means `A` depends on
//! `B` and must run after it. Construction validates IDs and dependency
//! referents and rejects cycles, reporting the full offending path. The
//! graph then yields either a flat topological order or level sets whose
//! members may execute concurrently.

use std::collections::{HashMap, HashSet};

use petgraph::{graphmap::DiGraphMap, Direction};

use crate::error::AnalysisError;

/// Validated dependency DAG over analyzer IDs.
#[derive(Debug, Clone)]
pub struct AnalyzerGraph {
    /// Analyzer IDs in registration order; node indices point into this.
    ids: Vec<String>,
    /// Edge `a -> b`: analyzer `a` depends on analyzer `b`.
    graph: DiGraphMap<usize, ()>,
}

impl AnalyzerGraph {
    /// Builds and validates the graph from `(id, dependencies)` pairs.
    ///
    /// Fails on empty IDs, duplicate IDs, dependencies on unregistered
    /// analyzers, and cycles.
    pub fn build(nodes: &[(String, Vec<String>)]) -> Result<Self, AnalysisError> {
        let mut ids = Vec::with_capacity(nodes.len());
        let mut index: HashMap<&str, usize> = HashMap::with_capacity(nodes.len());
        for (id, _) in nodes {
            if id.is_empty() {
                return Err(AnalysisError::EmptyAnalyzerId);
            }
            if index.insert(id.as_str(), ids.len()).is_some() {
                return Err(AnalysisError::DuplicateAnalyzer(id.clone()));
            }
            ids.push(id.clone());
        }

        let mut graph = DiGraphMap::with_capacity(ids.len(), ids.len());
        for idx in 0..ids.len() {
            graph.add_node(idx);
        }
        for (id, deps) in nodes {
            let from = index[id.as_str()];
            for dep in deps {
                let Some(&to) = index.get(dep.as_str()) else {
                    return Err(AnalysisError::MissingDependency {
                        analyzer: id.clone(),
                        dependency: dep.clone(),
                    });
                };
                graph.add_edge(from, to, ());
            }
        }

        let built = Self { ids, graph };
        built.check_cycles()?;
        Ok(built)
    }

    /// Number of analyzers in the graph.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Whether the graph is empty.
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Analyzer IDs in an order where every dependency precedes its
    /// dependents.
    pub fn topological_sort(&self) -> Vec<String> {
        self.levels().into_iter().flatten().collect()
    }

    /// Partitions analyzers into dependency levels.
    ///
    /// `levels[i]` holds every analyzer whose dependencies are all contained
    /// in earlier levels; members of one level are mutually independent and
    /// may run in parallel. Within-level order follows registration order
    /// but is not part of the contract.
    pub fn levels(&self) -> Vec<Vec<String>> {
        let mut remaining: HashSet<usize> = (0..self.ids.len()).collect();
        let mut levels = Vec::new();

        while !remaining.is_empty() {
            let ready: Vec<usize> = (0..self.ids.len())
                .filter(|idx| remaining.contains(idx))
                .filter(|&idx| {
                    self.graph
                        .neighbors_directed(idx, Direction::Outgoing)
                        .all(|dep| !remaining.contains(&dep))
                })
                .collect();

            // check_cycles ran at construction, so peeling always progresses
            debug_assert!(!ready.is_empty(), "level peeling stalled on a cyclic graph");
            for idx in &ready {
                remaining.remove(idx);
            }
            levels.push(ready.into_iter().map(|idx| self.ids[idx].clone()).collect());
        }
        levels
    }

    /// Depth-first cycle search with an explicit recursion stack, so the
    /// offending path can be reported verbatim.
    fn check_cycles(&self) -> Result<(), AnalysisError> {
        let mut state = vec![VisitState::Unvisited; self.ids.len()];
        let mut stack: Vec<usize> = Vec::new();

        for start in 0..self.ids.len() {
            if state[start] != VisitState::Unvisited {
                continue;
            }
            if let Some(path) = self.visit(start, &mut state, &mut stack) {
                return Err(AnalysisError::CircularDependency {
                    path: path.into_iter().map(|idx| self.ids[idx].clone()).collect(),
                });
            }
        }
        Ok(())
    }

    fn visit(
        &self,
        node: usize,
        state: &mut [VisitState],
        stack: &mut Vec<usize>,
    ) -> Option<Vec<usize>> {
        state[node] = VisitState::OnStack;
        stack.push(node);

        for dep in self.graph.neighbors_directed(node, Direction::Outgoing) {
            match state[dep] {
                VisitState::OnStack => {
                    // back edge: the cycle is the stack suffix from the
                    // first occurrence of `dep`, closed with `dep` itself
                    let pos = stack.iter().position(|&n| n == dep).unwrap_or(0);
                    let mut path: Vec<usize> = stack[pos..].to_vec();
                    path.push(dep);
                    return Some(path);
                }
                VisitState::Unvisited => {
                    if let Some(path) = self.visit(dep, state, stack) {
                        return Some(path);
                    }
                }
                VisitState::Done => {}
            }
        }

        stack.pop();
        state[node] = VisitState::Done;
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VisitState {
    Unvisited,
    OnStack,
    Done,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: &str, deps: &[&str]) -> (String, Vec<String>) {
        (id.to_string(), deps.iter().map(|d| d.to_string()).collect())
    }

    #[test]
    fn test_topological_sort_respects_dependencies() {
        let graph = AnalyzerGraph::build(&[
            node("C", &["B"]),
            node("A", &[]),
            node("B", &["A"]),
            node("D", &["A"]),
        ])
        .unwrap();

        let order = graph.topological_sort();
        let pos = |id: &str| order.iter().position(|o| o == id).unwrap();
        assert!(pos("A") < pos("B"));
        assert!(pos("B") < pos("C"));
        assert!(pos("A") < pos("D"));
        assert_eq!(order.len(), 4);
    }

    #[test]
    fn test_levels_partition_independent_analyzers() {
        let graph = AnalyzerGraph::build(&[
            node("A", &[]),
            node("B", &[]),
            node("C", &["A", "B"]),
            node("D", &["C"]),
        ])
        .unwrap();

        let levels = graph.levels();
        assert_eq!(levels.len(), 3);
        let first: HashSet<&str> = levels[0].iter().map(String::as_str).collect();
        assert_eq!(first, HashSet::from(["A", "B"]));
        assert_eq!(levels[1], vec!["C".to_string()]);
        assert_eq!(levels[2], vec!["D".to_string()]);
    }

    #[test]
    fn test_duplicate_and_empty_ids_rejected() {
        let err = AnalyzerGraph::build(&[node("A", &[]), node("A", &[])]).unwrap_err();
        assert!(matches!(err, AnalysisError::DuplicateAnalyzer(id) if id == "A"));

        let err = AnalyzerGraph::build(&[node("", &[])]).unwrap_err();
        assert!(matches!(err, AnalysisError::EmptyAnalyzerId));
    }

    #[test]
    fn test_missing_dependency_rejected() {
        let err = AnalyzerGraph::build(&[node("A", &["ghost"])]).unwrap_err();
        match err {
            AnalysisError::MissingDependency { analyzer, dependency } => {
                assert_eq!(analyzer, "A");
                assert_eq!(dependency, "ghost");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_cycle_reports_full_path() {
        let err =
            AnalyzerGraph::build(&[node("A", &["B"]), node("B", &["C"]), node("C", &["A"])])
                .unwrap_err();
        match err {
            AnalysisError::CircularDependency { ref path } => {
                assert_eq!(path.first(), path.last());
                assert_eq!(path.len(), 4);
                let message = err.to_string();
                assert!(message.contains("circular dependency detected"));
                assert!(message.contains("[A B C A]"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_self_dependency_is_a_cycle() {
        let err = AnalyzerGraph::build(&[node("A", &["A"])]).unwrap_err();
        match err {
            AnalysisError::CircularDependency { path } => {
                assert_eq!(path, vec!["A".to_string(), "A".to_string()]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
