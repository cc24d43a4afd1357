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

//! The annotated mirror of the decoded tree.
//!
//! Constructed once per run from a [`DecodedTimelockProposal`], with
//! identical cardinalities at every level. Annotation lists are the only
//! mutable part; the runner is the only writer during analysis.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{
    DecodedBatchOperation, DecodedCall, DecodedParameter, DecodedTimelockProposal, Level,
    NodePath,
};
use crate::{annotation::Annotations, proposal::TimelockAction};

/// An annotated parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyzedParameter {
    /// Parameter name from the contract interface (may be empty).
    pub name: String,
    /// Declared type.
    #[serde(rename = "type")]
    pub ty: String,
    /// Decoded value as its JSON projection.
    pub value: Value,
    /// Decoder-provided render-ready form, where available.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_value: Option<String>,
    /// Annotations attached to this parameter.
    pub annotations: Annotations,
}

impl From<&DecodedParameter> for AnalyzedParameter {
    fn from(param: &DecodedParameter) -> Self {
        Self {
            name: param.name.clone(),
            ty: param.ty.clone(),
            value: param.value.clone(),
            display_value: param.display_value.clone(),
            annotations: Annotations::new(),
        }
    }
}

/// An annotated call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyzedCall {
    /// Free-form contract type token.
    pub contract_type: String,
    /// Target address in the chain's native textual form.
    pub address: String,
    /// Resolved method name, or `[undecoded]`.
    pub method_name: String,
    /// Annotated inputs.
    pub inputs: Vec<AnalyzedParameter>,
    /// Annotated outputs.
    pub outputs: Vec<AnalyzedParameter>,
    /// The original encoded payload.
    #[serde(with = "hex::serde")]
    pub data: Vec<u8>,
    /// Raw `additional_fields` JSON.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub additional_fields: Option<Value>,
    /// Annotations attached to this call.
    pub annotations: Annotations,
}

impl From<&DecodedCall> for AnalyzedCall {
    fn from(call: &DecodedCall) -> Self {
        Self {
            contract_type: call.contract_type.clone(),
            address: call.address.clone(),
            method_name: call.method_name.clone(),
            inputs: call.inputs.iter().map(AnalyzedParameter::from).collect(),
            outputs: call.outputs.iter().map(AnalyzedParameter::from).collect(),
            data: call.data.clone(),
            additional_fields: call.additional_fields.clone(),
            annotations: Annotations::new(),
        }
    }
}

/// An annotated batch operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyzedBatchOperation {
    /// The 64-bit chain selector.
    pub chain_selector: u64,
    /// Resolved chain name.
    pub chain_name: String,
    /// Annotated calls.
    pub calls: Vec<AnalyzedCall>,
    /// Annotations attached to this batch.
    pub annotations: Annotations,
}

impl From<&DecodedBatchOperation> for AnalyzedBatchOperation {
    fn from(batch: &DecodedBatchOperation) -> Self {
        Self {
            chain_selector: batch.chain_selector,
            chain_name: batch.chain_name.clone(),
            calls: batch.calls.iter().map(AnalyzedCall::from).collect(),
            annotations: Annotations::new(),
        }
    }
}

/// The annotated proposal root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyzedTimelockProposal {
    /// The timelock action of the source proposal, if it carried one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<TimelockAction>,
    /// Annotated batches.
    pub batches: Vec<AnalyzedBatchOperation>,
    /// Annotations attached to the proposal root.
    pub annotations: Annotations,
}

impl AnalyzedTimelockProposal {
    /// Builds the annotation-free mirror of a decoded proposal.
    pub fn from_decoded(decoded: &DecodedTimelockProposal) -> Self {
        Self {
            action: decoded.action,
            batches: decoded.batches.iter().map(AnalyzedBatchOperation::from).collect(),
            annotations: Annotations::new(),
        }
    }

    /// The annotation list at `path`, if the path exists in this tree.
    pub fn annotations_at(&self, path: &NodePath) -> Option<&Annotations> {
        match *path {
            NodePath::Proposal => Some(&self.annotations),
            NodePath::Batch { batch } => self.batches.get(batch).map(|b| &b.annotations),
            NodePath::Call { batch, call } => {
                self.batches.get(batch)?.calls.get(call).map(|c| &c.annotations)
            }
            NodePath::Parameter { batch, call, is_input, param } => {
                let call = self.batches.get(batch)?.calls.get(call)?;
                let params = if is_input { &call.inputs } else { &call.outputs };
                params.get(param).map(|p| &p.annotations)
            }
        }
    }

    /// Mutable access to the annotation list at `path`.
    pub fn annotations_at_mut(&mut self, path: &NodePath) -> Option<&mut Annotations> {
        match *path {
            NodePath::Proposal => Some(&mut self.annotations),
            NodePath::Batch { batch } => self.batches.get_mut(batch).map(|b| &mut b.annotations),
            NodePath::Call { batch, call } => {
                self.batches.get_mut(batch)?.calls.get_mut(call).map(|c| &mut c.annotations)
            }
            NodePath::Parameter { batch, call, is_input, param } => {
                let call = self.batches.get_mut(batch)?.calls.get_mut(call)?;
                let params = if is_input { &mut call.inputs } else { &mut call.outputs };
                params.get_mut(param).map(|p| &mut p.annotations)
            }
        }
    }

    /// Clones the annotation lists of `path` and its ancestors, one entry
    /// per level from the proposal root down to the path's own level.
    ///
    /// This is the raw material for a scoped annotation store snapshot.
    pub fn ancestor_annotations(&self, path: &NodePath) -> Vec<(Level, Annotations)> {
        let mut levels = Vec::with_capacity(4);
        levels.push((Level::Proposal, self.annotations.clone()));

        let (batch_idx, call_idx) = match *path {
            NodePath::Proposal => return levels,
            NodePath::Batch { batch } => (batch, None),
            NodePath::Call { batch, call } => (batch, Some(call)),
            NodePath::Parameter { batch, call, .. } => (batch, Some(call)),
        };
        let Some(batch) = self.batches.get(batch_idx) else {
            return levels;
        };
        levels.push((Level::BatchOperation, batch.annotations.clone()));

        let Some(call) = call_idx.and_then(|idx| batch.calls.get(idx)) else {
            return levels;
        };
        levels.push((Level::Call, call.annotations.clone()));

        if let NodePath::Parameter { is_input, param, .. } = *path {
            let params = if is_input { &call.inputs } else { &call.outputs };
            if let Some(parameter) = params.get(param) {
                levels.push((Level::Parameter, parameter.annotations.clone()));
            }
        }
        levels
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::annotation::Annotation;

    fn sample_decoded() -> DecodedTimelockProposal {
        DecodedTimelockProposal {
            action: None,
            batches: vec![DecodedBatchOperation {
                chain_selector: 1,
                chain_name: "testchain".into(),
                calls: vec![DecodedCall {
                    contract_type: "Token".into(),
                    address: "0x01".into(),
                    method_name: "transfer".into(),
                    inputs: vec![
                        DecodedParameter::new("to", "address", json!("0x02")),
                        DecodedParameter::new("amount", "uint256", json!("5")),
                    ],
                    outputs: vec![DecodedParameter::new("ok", "bool", json!(true))],
                    data: vec![0xa9, 0x05, 0x9c, 0xbb],
                    additional_fields: None,
                }],
            }],
        }
    }

    #[test]
    fn test_mirror_preserves_cardinalities() {
        let decoded = sample_decoded();
        let analyzed = AnalyzedTimelockProposal::from_decoded(&decoded);
        assert_eq!(analyzed.batches.len(), 1);
        assert_eq!(analyzed.batches[0].calls.len(), 1);
        assert_eq!(analyzed.batches[0].calls[0].inputs.len(), 2);
        assert_eq!(analyzed.batches[0].calls[0].outputs.len(), 1);
        assert_eq!(analyzed.batches[0].calls[0].data, decoded.batches[0].calls[0].data);
    }

    #[test]
    fn test_annotations_addressable_by_path() {
        let mut analyzed = AnalyzedTimelockProposal::from_decoded(&sample_decoded());
        let path = NodePath::parameter(0, 0, true, 1);
        analyzed
            .annotations_at_mut(&path)
            .unwrap()
            .add(Annotation::new("tag", "k", json!(1)));

        assert_eq!(analyzed.annotations_at(&path).unwrap().len(), 1);
        assert!(analyzed.annotations_at(&NodePath::parameter(0, 0, false, 1)).is_none());
        assert!(analyzed.annotations_at(&NodePath::call(0, 9)).is_none());
    }

    #[test]
    fn test_ancestor_annotations_cover_path_levels() {
        let mut analyzed = AnalyzedTimelockProposal::from_decoded(&sample_decoded());
        analyzed
            .annotations_at_mut(&NodePath::proposal())
            .unwrap()
            .add(Annotation::new("tag", "root", json!(0)));
        analyzed
            .annotations_at_mut(&NodePath::batch(0))
            .unwrap()
            .add(Annotation::new("tag", "batch", json!(1)));

        let levels = analyzed.ancestor_annotations(&NodePath::call(0, 0));
        assert_eq!(levels.len(), 3);
        assert_eq!(levels[0].0, Level::Proposal);
        assert_eq!(levels[0].1.len(), 1);
        assert_eq!(levels[1].0, Level::BatchOperation);
        assert_eq!(levels[1].1.len(), 1);
        assert_eq!(levels[2].0, Level::Call);
        assert!(levels[2].1.is_empty());
    }
}
