//! Built-in analyzers.
//!
//! These cover the framework's own reporting needs: parameter value-type
//! classification for the renderer's formatter catalogue, token-pool chain
//! update inspection, and a proposal-level summary. Embedders register
//! additional analyzers alongside them.

mod timelock;
mod token_pool;
mod value_type;

pub use timelock::*;
pub use token_pool::*;
pub use value_type::*;

use crate::analyzer::AnalyzerKind;

/// The default analyzer set registered by embedding tools.
pub fn default_analyzers() -> Vec<AnalyzerKind> {
    vec![
        AnalyzerKind::proposal(TimelockActionAnalyzer::new()),
        AnalyzerKind::call(TokenPoolAnalyzer::new()),
        AnalyzerKind::parameter(ValueTypeAnalyzer::new()),
    ]
}
