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

//! Template view model.
//!
//! Templates never look at raw annotations: this module walks the analyzed
//! tree once and produces plain serializable views. Framework-reserved
//! annotations are folded into dedicated fields (severity/risk symbols,
//! formatted diffs, value-type formatted parameter displays); everything
//! else lands in the generic annotations list.

use serde::Serialize;
use serde_json::Value;

use super::format::{
    format_value, plain_display, risk_symbol, severity_symbol, truncate_address,
};
use crate::{
    annotation::{reserved, Annotations},
    tree::{
        AnalyzedBatchOperation, AnalyzedCall, AnalyzedParameter, AnalyzedTimelockProposal,
    },
};

/// Per-node annotation view shared by all levels.
#[derive(Debug, Default, Serialize)]
pub(crate) struct NodeView {
    severity: Option<String>,
    severity_symbol: String,
    risk: Option<String>,
    risk_symbol: String,
    diffs: Vec<DiffView>,
    annotations: Vec<AnnotationView>,
    has_diffs: bool,
    has_annotations: bool,
}

#[derive(Debug, Serialize)]
pub(crate) struct DiffView {
    field: String,
    old_display: String,
    new_display: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct AnnotationView {
    #[serde(rename = "type")]
    kind: String,
    name: String,
    display: String,
    analyzer: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct ParameterView {
    name: String,
    #[serde(rename = "type")]
    ty: String,
    direction: &'static str,
    display: String,
    #[serde(flatten)]
    node: NodeView,
}

#[derive(Debug, Serialize)]
pub(crate) struct CallView {
    contract_type: String,
    method_name: String,
    address: String,
    address_short: String,
    data_hex: String,
    is_undecoded: bool,
    inputs: Vec<ParameterView>,
    outputs: Vec<ParameterView>,
    has_parameters: bool,
    #[serde(flatten)]
    node: NodeView,
}

#[derive(Debug, Serialize)]
pub(crate) struct BatchView {
    chain_name: String,
    chain_selector: u64,
    calls: Vec<CallView>,
    #[serde(flatten)]
    node: NodeView,
}

#[derive(Debug, Serialize)]
pub(crate) struct ProposalView {
    action: Option<String>,
    batch_count: usize,
    call_count: usize,
    batches: Vec<BatchView>,
    #[serde(flatten)]
    node: NodeView,
}

/// Builds the full view model for one analyzed proposal.
pub(crate) fn build_model(proposal: &AnalyzedTimelockProposal) -> ProposalView {
    ProposalView {
        action: proposal.action.map(|a| a.to_string()),
        batch_count: proposal.batches.len(),
        call_count: proposal.batches.iter().map(|b| b.calls.len()).sum(),
        batches: proposal.batches.iter().map(batch_view).collect(),
        node: node_view(&proposal.annotations),
    }
}

fn batch_view(batch: &AnalyzedBatchOperation) -> BatchView {
    BatchView {
        chain_name: batch.chain_name.clone(),
        chain_selector: batch.chain_selector,
        calls: batch.calls.iter().map(call_view).collect(),
        node: node_view(&batch.annotations),
    }
}

fn call_view(call: &AnalyzedCall) -> CallView {
    CallView {
        contract_type: call.contract_type.clone(),
        method_name: call.method_name.clone(),
        address: call.address.clone(),
        address_short: truncate_address(&call.address),
        data_hex: format!("0x{}", hex::encode(&call.data)),
        is_undecoded: call.method_name == crate::tree::UNDECODED_METHOD,
        inputs: call.inputs.iter().map(|p| parameter_view(p, "input")).collect(),
        outputs: call.outputs.iter().map(|p| parameter_view(p, "output")).collect(),
        has_parameters: !call.inputs.is_empty() || !call.outputs.is_empty(),
        node: node_view(&call.annotations),
    }
}

fn parameter_view(param: &AnalyzedParameter, direction: &'static str) -> ParameterView {
    ParameterView {
        name: param.name.clone(),
        ty: param.ty.clone(),
        direction,
        display: parameter_display(param),
        node: node_view(&param.annotations),
    }
}

/// Resolves the rendered value of a parameter: a `value_type` annotation
/// wins, then the decoder's display form, then the raw value.
fn parameter_display(param: &AnalyzedParameter) -> String {
    if let Some(vt) = param.annotations.first_by_name(reserved::VALUE_TYPE) {
        if let Value::String(vt) = &vt.value {
            return format_value(vt, &param.value);
        }
    }
    param.display_value.clone().unwrap_or_else(|| plain_display(&param.value))
}

fn node_view(annotations: &Annotations) -> NodeView {
    let severity = annotations
        .first_by_name(reserved::SEVERITY)
        .and_then(|a| a.value.as_str().map(str::to_string));
    let risk = annotations
        .first_by_name(reserved::RISK)
        .and_then(|a| a.value.as_str().map(str::to_string));

    let diffs: Vec<DiffView> = annotations
        .get_by_kind(reserved::DIFF)
        .into_iter()
        .filter_map(|a| {
            let obj = a.value.as_object()?;
            let value_type = obj.get("value_type").and_then(Value::as_str);
            let side = |key: &str| -> String {
                match obj.get(key) {
                    None | Some(Value::Null) => "-".to_string(),
                    Some(value) => match value_type {
                        Some(vt) => format_value(vt, value),
                        None => plain_display(value),
                    },
                }
            };
            Some(DiffView {
                field: obj.get("field").and_then(Value::as_str).unwrap_or(&a.name).to_string(),
                old_display: side("old"),
                new_display: side("new"),
            })
        })
        .collect();

    let generic: Vec<AnnotationView> = annotations
        .iter()
        .filter(|a| !a.is_reserved())
        .map(|a| AnnotationView {
            kind: a.kind.clone(),
            name: a.name.clone(),
            display: plain_display(&a.value),
            analyzer: a.analyzer_id.clone(),
        })
        .collect();

    NodeView {
        severity_symbol: severity.as_deref().map(severity_symbol).unwrap_or("").to_string(),
        severity,
        risk_symbol: risk.as_deref().map(risk_symbol).unwrap_or("").to_string(),
        risk,
        has_diffs: !diffs.is_empty(),
        has_annotations: !generic.is_empty(),
        diffs,
        annotations: generic,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::annotation::{Annotation, DiffValue, Risk, Severity};

    #[test]
    fn test_reserved_annotations_fold_into_dedicated_fields() {
        let mut annotations = Annotations::new();
        annotations.add(Annotation::severity(Severity::Warning).with_analyzer("a"));
        annotations.add(Annotation::risk(Risk::High).with_analyzer("a"));
        annotations.add(
            Annotation::diff(
                DiffValue::new("capacity", json!(100), json!(200))
                    .with_value_type("ethereum.uint256"),
            )
            .with_analyzer("a"),
        );
        annotations.add(Annotation::new("chain_update", "x", json!("added")).with_analyzer("a"));

        let view = node_view(&annotations);
        assert_eq!(view.severity.as_deref(), Some("warning"));
        assert_eq!(view.severity_symbol, "⚠");
        assert_eq!(view.risk_symbol, "🔴");
        assert_eq!(view.diffs.len(), 1);
        assert_eq!(view.diffs[0].old_display, "100");
        assert_eq!(view.diffs[0].new_display, "200");
        // only the custom annotation flows into the generic list
        assert_eq!(view.annotations.len(), 1);
        assert_eq!(view.annotations[0].kind, "chain_update");
    }

    #[test]
    fn test_parameter_display_priority() {
        let mut param = AnalyzedParameter {
            name: "amount".into(),
            ty: "uint256".into(),
            value: json!("1000000"),
            display_value: Some("1000000".into()),
            annotations: Annotations::new(),
        };
        assert_eq!(parameter_display(&param), "1000000");

        param.annotations.add(Annotation::value_type("ethereum.uint256").with_analyzer("a"));
        assert_eq!(parameter_display(&param), "1,000,000");
    }

    #[test]
    fn test_diff_with_unknown_old_side() {
        let mut annotations = Annotations::new();
        annotations.add(
            Annotation::diff(DiffValue::new("rate", Value::Null, json!("5"))).with_analyzer("a"),
        );
        let view = node_view(&annotations);
        assert_eq!(view.diffs[0].old_display, "-");
        assert_eq!(view.diffs[0].new_display, "5");
    }
}
