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

//! Rendering of analyzed proposals.
//!
//! Four formats are supported. Text, HTML, and Markdown are driven by a
//! compiled handlebars template set (`proposal`, `batch_operation`, `call`,
//! `parameter`, `annotations`), with embedded defaults that can be
//! overridden programmatically; JSON is a faithful serde projection of the
//! analyzed tree and bypasses templates entirely.

mod format;
mod model;

pub use format::*;

use std::{collections::HashMap, fmt, io::Write, str::FromStr};

use handlebars::Handlebars;

use crate::{error::RenderError, tree::AnalyzedTimelockProposal};

/// Supported output formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputFormat {
    /// Fixed-width text report.
    Text,
    /// Self-contained HTML document.
    Html,
    /// GitHub-flavoured Markdown.
    Markdown,
    /// Faithful JSON projection of the analyzed tree.
    Json,
}

impl OutputFormat {
    /// All formats, in display order.
    pub const ALL: [Self; 4] = [Self::Text, Self::Html, Self::Markdown, Self::Json];

    /// Conventional file extension for the format.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Text => "txt",
            Self::Html => "html",
            Self::Markdown => "md",
            Self::Json => "json",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Text => "text",
            Self::Html => "html",
            Self::Markdown => "markdown",
            Self::Json => "json",
        };
        f.write_str(s)
    }
}

impl FromStr for OutputFormat {
    type Err = RenderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(Self::Text),
            "html" => Ok(Self::Html),
            "markdown" | "md" => Ok(Self::Markdown),
            "json" => Ok(Self::Json),
            other => Err(RenderError::UnknownFormat(other.to_string())),
        }
    }
}

/// The template names every non-JSON format provides.
pub const TEMPLATE_NAMES: [&str; 5] =
    ["proposal", "batch_operation", "call", "parameter", "annotations"];

/// Embedded default template sources for one format.
fn default_templates(format: OutputFormat) -> Option<[(&'static str, &'static str); 5]> {
    macro_rules! set {
        ($dir:literal) => {
            [
                ("proposal", include_str!(concat!("templates/", $dir, "/proposal.hbs"))),
                (
                    "batch_operation",
                    include_str!(concat!("templates/", $dir, "/batch_operation.hbs")),
                ),
                ("call", include_str!(concat!("templates/", $dir, "/call.hbs"))),
                ("parameter", include_str!(concat!("templates/", $dir, "/parameter.hbs"))),
                ("annotations", include_str!(concat!("templates/", $dir, "/annotations.hbs"))),
            ]
        };
    }
    match format {
        OutputFormat::Text => Some(set!("text")),
        OutputFormat::Html => Some(set!("html")),
        OutputFormat::Markdown => Some(set!("markdown")),
        OutputFormat::Json => None,
    }
}

/// Format-selectable renderer over analyzed proposals.
///
/// Construction compiles the template set once; `render`/`render_to` take
/// `&self` and are safe to call from multiple threads.
pub struct ProposalRenderer {
    format: OutputFormat,
    registry: Handlebars<'static>,
}

impl fmt::Debug for ProposalRenderer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProposalRenderer").field("format", &self.format).finish()
    }
}

impl ProposalRenderer {
    /// Creates a renderer with the embedded default templates.
    pub fn new(format: OutputFormat) -> Result<Self, RenderError> {
        Self::with_templates(format, HashMap::new())
    }

    /// Creates a renderer, overriding default templates by name.
    ///
    /// Override keys must be one of [`TEMPLATE_NAMES`]; unknown names are
    /// registered as additional partials so custom template sets can factor
    /// out shared fragments.
    pub fn with_templates(
        format: OutputFormat,
        overrides: HashMap<String, String>,
    ) -> Result<Self, RenderError> {
        let mut registry = Handlebars::new();
        registry.set_strict_mode(false);
        if format != OutputFormat::Html {
            registry.register_escape_fn(handlebars::no_escape);
        }

        if let Some(defaults) = default_templates(format) {
            for (name, source) in defaults {
                let source = overrides.get(name).map(String::as_str).unwrap_or(source);
                registry
                    .register_template_string(name, source)
                    .map_err(|err| RenderError::Template(name.to_string(), Box::new(err)))?;
            }
            for (name, source) in &overrides {
                if !TEMPLATE_NAMES.contains(&name.as_str()) {
                    registry
                        .register_template_string(name, source)
                        .map_err(|err| RenderError::Template(name.clone(), Box::new(err)))?;
                }
            }
        }

        Ok(Self { format, registry })
    }

    /// The renderer's output format.
    pub fn format(&self) -> OutputFormat {
        self.format
    }

    /// Renders the proposal to a string.
    pub fn render(&self, proposal: &AnalyzedTimelockProposal) -> Result<String, RenderError> {
        match self.format {
            OutputFormat::Json => Ok(serde_json::to_string_pretty(proposal)?),
            _ => {
                let model = model::build_model(proposal);
                Ok(self.registry.render("proposal", &model)?)
            }
        }
    }

    /// Renders the proposal into a writer.
    pub fn render_to(
        &self,
        writer: &mut dyn Write,
        proposal: &AnalyzedTimelockProposal,
    ) -> Result<(), RenderError> {
        let rendered = self.render(proposal)?;
        writer.write_all(rendered.as_bytes())?;
        Ok(())
    }
}

/// Renders the default text report, the form most tools print.
pub fn describe(proposal: &AnalyzedTimelockProposal) -> Result<String, RenderError> {
    ProposalRenderer::new(OutputFormat::Text)?.render(proposal)
}
