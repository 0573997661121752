pub mod matcher;
pub mod store;

pub use matcher::{
    CompileError, EvalBudget, EvalError, MatchSite, Matcher, MatcherDef, PathExpr,
};
pub use store::{DefinitionError, FilesystemSource, QuerySource, StoreError};

use crate::model::{Format, Severity};

/// A detection rule, frozen at load time.
#[derive(Debug, Clone)]
pub struct Query {
    pub id: String,
    pub name: String,
    pub description: String,
    pub severity: Severity,
    /// Document formats this query applies to. Empty means all formats.
    pub platforms: Vec<Format>,
    pub matcher: Matcher,
    /// Path of the definition file the query came from.
    pub source_file: String,
}

impl Query {
    pub fn applies_to(&self, format: Format) -> bool {
        self.platforms.is_empty() || self.platforms.contains(&format)
    }
}
