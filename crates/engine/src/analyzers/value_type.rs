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

//! Value-type classification for EVM parameters.

use async_trait::async_trait;
use mpa_common::chain::ChainFamily;

use crate::{
    analyzer::ParameterAnalyzer,
    annotation::Annotation,
    context::AnalyzerRequest,
    tree::DecodedParameter,
};

/// Tags EVM parameters with `value_type` annotations so the renderer's
/// formatter catalogue applies (`ethereum.address`, `ethereum.uint256`,
/// `hex`).
#[derive(Debug, Clone, Default)]
pub struct ValueTypeAnalyzer;

impl ValueTypeAnalyzer {
    /// Creates the analyzer.
    pub fn new() -> Self {
        Self
    }

    fn classify(ty: &str) -> Option<&'static str> {
        match ty {
            "address" => Some("ethereum.address"),
            "uint256" | "int256" => Some("ethereum.uint256"),
            "bytes" => Some("hex"),
            ty if ty.starts_with("bytes") && ty[5..].parse::<u8>().is_ok() => Some("hex"),
            _ => None,
        }
    }
}

#[async_trait]
impl ParameterAnalyzer for ValueTypeAnalyzer {
    fn id(&self) -> &str {
        "value-type"
    }

    async fn can_analyze(&self, req: &AnalyzerRequest, param: &DecodedParameter) -> bool {
        // classification names are Ethereum-specific; only apply on chains
        // known to be EVM (unknown chains are treated as EVM elsewhere too)
        let family = req
            .context
            .chain_selector()
            .and_then(|selector| req.execution.chain(selector))
            .map(|handle| handle.family);
        matches!(family, Some(ChainFamily::Evm) | None) && Self::classify(&param.ty).is_some()
    }

    async fn analyze(
        &self,
        _req: &AnalyzerRequest,
        param: DecodedParameter,
    ) -> eyre::Result<Vec<Annotation>> {
        Ok(Self::classify(&param.ty)
            .map(|vt| vec![Annotation::value_type(vt)])
            .unwrap_or_default())
    }
}
