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

//! Typed annotations and the per-node annotation list.
//!
//! Analyzers communicate exclusively through [`Annotation`] values attached
//! to tree nodes. An annotation is a `(type, name, value)` fact tagged with
//! the ID of its producer; a fixed set of framework-reserved names
//! (`severity`, `risk`, `value_type`, `diff`) drives dedicated renderer
//! fragments, everything else flows through the generic annotations block.
//!
//! [`Annotations`] is append-only and keeps insertion order. Repeated writes
//! of the same `(producer, name)` pair are kept as-is; de-duplication is
//! deliberately not performed.

use std::{fmt, ops::Deref};

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Framework-reserved annotation names consumed by the renderer.
pub mod reserved {
    /// Severity of a finding: `error|warning|info|debug`.
    pub const SEVERITY: &str = "severity";
    /// Risk classification: `high|medium|low`.
    pub const RISK: &str = "risk";
    /// Display formatter selector for a parameter value.
    pub const VALUE_TYPE: &str = "value_type";
    /// A field-level before/after comparison.
    pub const DIFF: &str = "diff";
}

/// Severity levels understood by the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// A finding that invalidates the proposal.
    Error,
    /// A finding that needs signer attention.
    Warning,
    /// Informational context.
    Info,
    /// Diagnostic detail, hidden by default in most renderings.
    Debug,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Info => "info",
            Self::Debug => "debug",
        };
        f.write_str(s)
    }
}

/// Risk levels understood by the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Risk {
    /// High risk.
    High,
    /// Medium risk.
    Medium,
    /// Low risk.
    Low,
}

impl fmt::Display for Risk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        };
        f.write_str(s)
    }
}

/// A field-level before/after comparison carried in a `diff` annotation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiffValue {
    /// The field being compared.
    pub field: String,
    /// The prior value.
    pub old: Value,
    /// The proposed value.
    pub new: Value,
    /// Optional formatter applied to both sides when rendering.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_type: Option<String>,
}

impl DiffValue {
    /// Creates a diff for `field` between `old` and `new`.
    pub fn new(field: impl Into<String>, old: Value, new: Value) -> Self {
        Self { field: field.into(), old, new, value_type: None }
    }

    /// Sets the formatter applied when rendering both sides.
    pub fn with_value_type(mut self, value_type: impl Into<String>) -> Self {
        self.value_type = Some(value_type.into());
        self
    }
}

impl From<DiffValue> for Value {
    fn from(diff: DiffValue) -> Self {
        let mut obj = json!({
            "field": diff.field,
            "old": diff.old,
            "new": diff.new,
        });
        if let Some(vt) = diff.value_type {
            obj["value_type"] = json!(vt);
        }
        obj
    }
}

/// A typed, named fact attached to a tree node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    /// Semantic tag driving renderer dispatch, e.g. `severity` or
    /// `chain_update`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Stable identifier within the kind.
    pub name: String,
    /// Opaque payload.
    pub value: Value,
    /// ID of the producing analyzer; set by the runner at insertion.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analyzer_id: Option<String>,
}

impl Annotation {
    /// Creates an untagged annotation. The runner tags the producer before
    /// the annotation reaches the tree.
    pub fn new(kind: impl Into<String>, name: impl Into<String>, value: Value) -> Self {
        Self { kind: kind.into(), name: name.into(), value, analyzer_id: None }
    }

    /// Tags the annotation with its producing analyzer.
    pub fn with_analyzer(mut self, analyzer_id: impl Into<String>) -> Self {
        self.analyzer_id = Some(analyzer_id.into());
        self
    }

    /// A reserved `severity` annotation.
    pub fn severity(severity: Severity) -> Self {
        Self::new(reserved::SEVERITY, reserved::SEVERITY, json!(severity.to_string()))
    }

    /// A reserved `risk` annotation.
    pub fn risk(risk: Risk) -> Self {
        Self::new(reserved::RISK, reserved::RISK, json!(risk.to_string()))
    }

    /// A reserved `value_type` annotation selecting a display formatter.
    pub fn value_type(value_type: impl Into<String>) -> Self {
        Self::new(reserved::VALUE_TYPE, reserved::VALUE_TYPE, json!(value_type.into()))
    }

    /// A reserved `diff` annotation named after the compared field.
    pub fn diff(diff: DiffValue) -> Self {
        let name = diff.field.clone();
        Self::new(reserved::DIFF, name, diff.into())
    }

    /// Whether this annotation uses a framework-reserved name.
    pub fn is_reserved(&self) -> bool {
        matches!(
            self.name.as_str(),
            reserved::SEVERITY | reserved::RISK | reserved::VALUE_TYPE
        ) || self.kind == reserved::DIFF
    }
}

/// Ordered, append-only list of annotations on one tree node.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Annotations {
    inner: Vec<Annotation>,
}

impl Deref for Annotations {
    type Target = [Annotation];

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl Annotations {
    /// Creates an empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a single annotation.
    pub fn add(&mut self, annotation: Annotation) {
        self.inner.push(annotation);
    }

    /// Appends annotations in iteration order.
    pub fn add_all<I: IntoIterator<Item = Annotation>>(&mut self, annotations: I) {
        self.inner.extend(annotations);
    }

    /// All annotations with the given name, in insertion order.
    pub fn get_by_name(&self, name: &str) -> Vec<&Annotation> {
        self.inner.iter().filter(|a| a.name == name).collect()
    }

    /// The first annotation with the given name, if any.
    pub fn first_by_name(&self, name: &str) -> Option<&Annotation> {
        self.inner.iter().find(|a| a.name == name)
    }

    /// All annotations with the given kind, in insertion order.
    pub fn get_by_kind(&self, kind: &str) -> Vec<&Annotation> {
        self.inner.iter().filter(|a| a.kind == kind).collect()
    }

    /// All annotations produced by the given analyzer, in insertion order.
    pub fn get_by_analyzer(&self, analyzer_id: &str) -> Vec<&Annotation> {
        self.inner.iter().filter(|a| a.analyzer_id.as_deref() == Some(analyzer_id)).collect()
    }
}

impl IntoIterator for Annotations {
    type Item = Annotation;
    type IntoIter = std::vec::IntoIter<Annotation>;

    fn into_iter(self) -> Self::IntoIter {
        self.inner.into_iter()
    }
}

impl FromIterator<Annotation> for Annotations {
    fn from_iter<I: IntoIterator<Item = Annotation>>(iter: I) -> Self {
        Self { inner: iter.into_iter().collect() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insertion_order_is_stable() {
        let mut annotations = Annotations::new();
        annotations.add(Annotation::new("tag", "a", json!(1)));
        annotations.add_all([
            Annotation::new("tag", "b", json!(2)),
            Annotation::new("tag", "a", json!(3)),
        ]);

        let names: Vec<&str> = annotations.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, ["a", "b", "a"]);

        // duplicates are kept, not collapsed
        let by_name = annotations.get_by_name("a");
        assert_eq!(by_name.len(), 2);
        assert_eq!(by_name[0].value, json!(1));
        assert_eq!(by_name[1].value, json!(3));
    }

    #[test]
    fn test_producer_tagging() {
        let ann = Annotation::new("tag", "k", json!(true)).with_analyzer("producer");
        assert_eq!(ann.analyzer_id.as_deref(), Some("producer"));

        let mut annotations = Annotations::new();
        annotations.add(ann);
        assert_eq!(annotations.get_by_analyzer("producer").len(), 1);
        assert!(annotations.get_by_analyzer("other").is_empty());
    }

    #[test]
    fn test_reserved_constructors() {
        let sev = Annotation::severity(Severity::Warning);
        assert_eq!(sev.kind, "severity");
        assert_eq!(sev.value, json!("warning"));
        assert!(sev.is_reserved());

        let diff = Annotation::diff(
            DiffValue::new("capacity", json!(100), json!(200)).with_value_type("ethereum.uint256"),
        );
        assert_eq!(diff.kind, "diff");
        assert_eq!(diff.name, "capacity");
        assert_eq!(diff.value["value_type"], json!("ethereum.uint256"));
        assert!(diff.is_reserved());

        let custom = Annotation::new("chain_update", "added", json!("x"));
        assert!(!custom.is_reserved());
    }

    #[test]
    fn test_wire_shape_uses_type_key() {
        let ann = Annotation::new("severity", "severity", json!("info")).with_analyzer("a");
        let wire = serde_json::to_value(&ann).unwrap();
        assert_eq!(wire["type"], json!("severity"));
        assert_eq!(wire["analyzer_id"], json!("a"));
    }
}
