use super::Severity;
use serde::{Deserialize, Serialize};

/// One confirmed finding: a query that matched somewhere in a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vulnerability {
    pub scan_id: String,
    pub query_id: String,
    pub query_name: String,
    pub severity: Severity,
    pub file_name: String,
    pub line: usize,
    /// Dot-path of the matched attribute inside the document.
    pub attribute_path: String,
    pub actual_value: String,
    pub expected_value: String,
    pub description: String,
}
