use crate::model::{Document, Vulnerability};
use crate::query::{MatchSite, Query};

/// Turns a match site into a reportable vulnerability record.
///
/// Implementations must be pure: the same inputs always produce the same
/// record, so results stay deterministic across runs and thread schedules.
pub trait VulnerabilityBuilder: Send + Sync {
    fn build(
        &self,
        scan_id: &str,
        query: &Query,
        document: &Document,
        site: &MatchSite,
    ) -> Vulnerability;
}

/// Standard builder: copies query and site fields verbatim and derives a
/// description when the query does not provide one.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultVulnerabilityBuilder;

impl VulnerabilityBuilder for DefaultVulnerabilityBuilder {
    fn build(
        &self,
        scan_id: &str,
        query: &Query,
        document: &Document,
        site: &MatchSite,
    ) -> Vulnerability {
        let description = if query.description.is_empty() {
            format!(
                "{}: found {}, expected {}",
                query.name, site.actual, site.expected
            )
        } else {
            query.description.clone()
        };
        Vulnerability {
            scan_id: scan_id.to_string(),
            query_id: query.id.clone(),
            query_name: query.name.clone(),
            severity: query.severity,
            file_name: document.file_name.clone(),
            line: site.line,
            attribute_path: site.path.clone(),
            actual_value: site.actual.clone(),
            expected_value: site.expected.clone(),
            description,
        }
    }
}
