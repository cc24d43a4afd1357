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

//! Capability-scoped view over ancestor annotations.
//!
//! When an analyzer runs, it only observes annotations produced by its
//! declared dependencies, on the target node and its ancestors. The store is
//! a snapshot: per-level annotation lists are cloned at construction, so
//! writes that land after construction are never visible to the holder.
//!
//! An analyzer with no declared dependencies is sandboxed: its store returns
//! empty lists at every level regardless of what the snapshot contains.

use std::collections::{HashMap, HashSet};

use crate::{
    annotation::{Annotation, Annotations},
    tree::Level,
};

/// A read-only, dependency-filtered snapshot of ancestor annotations.
#[derive(Debug, Clone, Default)]
pub struct ScopedAnnotationStore {
    deps: HashSet<String>,
    per_level: HashMap<Level, Annotations>,
}

impl ScopedAnnotationStore {
    /// Builds a store from a dependency set and per-level snapshots.
    ///
    /// The snapshots are cloned lists taken from the analyzed tree at the
    /// moment of construction (see
    /// [`AnalyzedTimelockProposal::ancestor_annotations`]).
    ///
    /// [`AnalyzedTimelockProposal::ancestor_annotations`]: crate::tree::AnalyzedTimelockProposal::ancestor_annotations
    pub fn new(
        deps: impl IntoIterator<Item = String>,
        per_level: impl IntoIterator<Item = (Level, Annotations)>,
    ) -> Self {
        Self {
            deps: deps.into_iter().collect(),
            per_level: per_level.into_iter().collect(),
        }
    }

    /// An empty store that sees nothing at any level.
    pub fn empty() -> Self {
        Self::default()
    }

    /// The annotations visible at `level`, in snapshot insertion order.
    ///
    /// Only entries whose producer is in the dependency set are returned; an
    /// empty dependency set yields an empty list.
    pub fn at_level(&self, level: Level) -> Vec<Annotation> {
        if self.deps.is_empty() {
            return Vec::new();
        }
        let Some(annotations) = self.per_level.get(&level) else {
            return Vec::new();
        };
        annotations
            .iter()
            .filter(|a| a.analyzer_id.as_ref().is_some_and(|id| self.deps.contains(id)))
            .cloned()
            .collect()
    }

    /// The dependency IDs this store filters by.
    pub fn dependencies(&self) -> &HashSet<String> {
        &self.deps
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn snapshot() -> Vec<(Level, Annotations)> {
        let mut proposal = Annotations::new();
        proposal.add(Annotation::new("tag", "k", json!(1)).with_analyzer("Y"));
        proposal.add(Annotation::new("tag", "other", json!(2)).with_analyzer("Z"));
        proposal.add(Annotation::new("tag", "k2", json!(3)).with_analyzer("Y"));

        let mut call = Annotations::new();
        call.add(Annotation::new("note", "n", json!("x")).with_analyzer("Z"));

        vec![(Level::Proposal, proposal), (Level::Call, call)]
    }

    #[test]
    fn test_filters_by_dependency_set() {
        let store = ScopedAnnotationStore::new(["Y".to_string()], snapshot());

        let visible = store.at_level(Level::Proposal);
        assert_eq!(visible.len(), 2);
        assert!(visible.iter().all(|a| a.analyzer_id.as_deref() == Some("Y")));
        // insertion order preserved
        assert_eq!(visible[0].name, "k");
        assert_eq!(visible[1].name, "k2");

        assert!(store.at_level(Level::Call).is_empty());
        assert!(store.at_level(Level::BatchOperation).is_empty());
    }

    #[test]
    fn test_empty_deps_sees_nothing() {
        let store = ScopedAnnotationStore::new(Vec::<String>::new(), snapshot());
        assert!(store.at_level(Level::Proposal).is_empty());
        assert!(store.at_level(Level::Call).is_empty());
    }

    #[test]
    fn test_snapshot_isolated_from_later_writes() {
        let mut live = Annotations::new();
        live.add(Annotation::new("tag", "before", json!(0)).with_analyzer("Y"));

        let store =
            ScopedAnnotationStore::new(["Y".to_string()], [(Level::Proposal, live.clone())]);

        // writes after construction are invisible
        live.add(Annotation::new("tag", "after", json!(1)).with_analyzer("Y"));
        let visible = store.at_level(Level::Proposal);
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].name, "before");
    }

    #[test]
    fn test_untagged_annotations_are_never_visible() {
        let mut anns = Annotations::new();
        anns.add(Annotation::new("tag", "untagged", json!(0)));
        let store = ScopedAnnotationStore::new(["Y".to_string()], [(Level::Proposal, anns)]);
        assert!(store.at_level(Level::Proposal).is_empty());
    }
}
