//! Scan summary and result output.

use crate::error::{AuditError, Result};
use crate::model::{Document, Severity, Vulnerability};
use crate::tracker::Tracker;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::info;

/// Scan health counters derived from the tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counters {
    pub scanned_files: usize,
    pub failed_to_scan_files: usize,
    pub total_queries: usize,
    pub failed_to_execute_queries: usize,
}

impl Counters {
    pub fn from_tracker(tracker: &Tracker) -> Self {
        let snapshot = tracker.snapshot();
        Self {
            scanned_files: snapshot.found_files,
            failed_to_scan_files: snapshot.found_files.saturating_sub(snapshot.parsed_files),
            total_queries: snapshot.loaded_queries,
            failed_to_execute_queries: snapshot
                .loaded_queries
                .saturating_sub(snapshot.executed_queries),
        }
    }
}

/// One file location a query flagged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VulnerableFile {
    pub file_name: String,
    pub line: usize,
}

/// All findings of one query, in canonical order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub query_id: String,
    pub query_name: String,
    pub severity: Severity,
    pub files: Vec<VulnerableFile>,
}

/// Final scan report: health counters plus findings grouped by query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub scanned_files: usize,
    pub failed_to_scan_files: usize,
    pub total_queries: usize,
    pub failed_to_execute_queries: usize,
    pub failed_queries: Vec<QueryResult>,
}

impl Summary {
    /// Groups findings by query. Queries appear in the order of their
    /// first finding, which follows query load order.
    pub fn new(counters: Counters, vulnerabilities: &[Vulnerability]) -> Self {
        let mut failed_queries: Vec<QueryResult> = Vec::new();
        let mut index: HashMap<&str, usize> = HashMap::new();
        for vulnerability in vulnerabilities {
            let position = match index.get(vulnerability.query_id.as_str()) {
                Some(position) => *position,
                None => {
                    index.insert(&vulnerability.query_id, failed_queries.len());
                    failed_queries.push(QueryResult {
                        query_id: vulnerability.query_id.clone(),
                        query_name: vulnerability.query_name.clone(),
                        severity: vulnerability.severity,
                        files: Vec::new(),
                    });
                    failed_queries.len() - 1
                }
            };
            failed_queries[position].files.push(VulnerableFile {
                file_name: vulnerability.file_name.clone(),
                line: vulnerability.line,
            });
        }
        Self {
            scanned_files: counters.scanned_files,
            failed_to_scan_files: counters.failed_to_scan_files,
            total_queries: counters.total_queries,
            failed_to_execute_queries: counters.failed_to_execute_queries,
            failed_queries,
        }
    }

    /// True when any failed query meets the severity threshold.
    pub fn has_findings_at(&self, threshold: Severity) -> bool {
        self.failed_queries
            .iter()
            .any(|query| query.severity >= threshold && !query.files.is_empty())
    }
}

/// Parsed source representation, written when a payload path is given.
#[derive(Debug, Serialize)]
pub struct Payload<'a> {
    pub documents: &'a [Document],
}

impl<'a> Payload<'a> {
    pub fn new(documents: &'a [Document]) -> Self {
        Self { documents }
    }
}

pub fn write_json_file<T: Serialize>(path: &Path, body: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(body)?;
    fs::write(path, json).map_err(|e| AuditError::WriteError {
        path: path.display().to_string(),
        source: e,
    })?;
    info!(file = %path.display(), "results saved");
    Ok(())
}

pub fn print_summary(summary: &Summary) {
    println!("Files scanned: {}", summary.scanned_files);
    println!("Files failed to scan: {}", summary.failed_to_scan_files);
    println!("Queries loaded: {}", summary.total_queries);
    println!(
        "Queries failed to execute: {}",
        summary.failed_to_execute_queries
    );
    for query in &summary.failed_queries {
        println!(
            "{}, Severity: {}, Results: {}",
            query.query_name,
            query.severity,
            query.files.len()
        );
        for file in &query.files {
            println!("\t{}:{}", file.file_name, file.line);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn vulnerability(query_id: &str, file_name: &str, line: usize) -> Vulnerability {
        Vulnerability {
            scan_id: "console".to_string(),
            query_id: query_id.to_string(),
            query_name: query_id.to_uppercase(),
            severity: if query_id == "open_ingress" {
                Severity::Critical
            } else {
                Severity::Medium
            },
            file_name: file_name.to_string(),
            line,
            attribute_path: "a.b".to_string(),
            actual_value: "'b' is set".to_string(),
            expected_value: "'b' should not be set".to_string(),
            description: String::new(),
        }
    }

    fn counters() -> Counters {
        Counters {
            scanned_files: 3,
            failed_to_scan_files: 1,
            total_queries: 2,
            failed_to_execute_queries: 0,
        }
    }

    #[test]
    fn test_summary_groups_by_query_in_first_seen_order() {
        let findings = vec![
            vulnerability("versioning", "a.yaml", 4),
            vulnerability("versioning", "b.yaml", 9),
            vulnerability("open_ingress", "a.yaml", 12),
        ];
        let summary = Summary::new(counters(), &findings);

        assert_eq!(summary.failed_queries.len(), 2);
        assert_eq!(summary.failed_queries[0].query_id, "versioning");
        assert_eq!(summary.failed_queries[0].files.len(), 2);
        assert_eq!(summary.failed_queries[1].query_id, "open_ingress");
        assert_eq!(
            summary.failed_queries[1].files,
            vec![VulnerableFile {
                file_name: "a.yaml".to_string(),
                line: 12
            }]
        );
    }

    #[test]
    fn test_has_findings_at_threshold() {
        let findings = vec![vulnerability("versioning", "a.yaml", 4)];
        let summary = Summary::new(counters(), &findings);

        assert!(summary.has_findings_at(Severity::Info));
        assert!(summary.has_findings_at(Severity::Medium));
        assert!(!summary.has_findings_at(Severity::High));
    }

    #[test]
    fn test_empty_summary_has_no_findings() {
        let summary = Summary::new(counters(), &[]);
        assert!(!summary.has_findings_at(Severity::Info));
        assert!(summary.failed_queries.is_empty());
    }

    #[test]
    fn test_counters_from_tracker_saturate() {
        let tracker = Tracker::new();
        tracker.track_query_load();
        // repeated inspections can push executions past the load count
        tracker.track_query_execution();
        tracker.track_query_execution();

        let counters = Counters::from_tracker(&tracker);
        assert_eq!(counters.total_queries, 1);
        assert_eq!(counters.failed_to_execute_queries, 0);
    }

    #[test]
    fn test_write_json_file_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("summary.json");
        let summary = Summary::new(counters(), &[vulnerability("versioning", "a.yaml", 4)]);

        write_json_file(&path, &summary).unwrap();
        let loaded: Summary =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(loaded, summary);
    }

    #[test]
    fn test_write_json_file_bad_path() {
        let summary = Summary::new(counters(), &[]);
        let result = write_json_file(Path::new("/nonexistent/dir/out.json"), &summary);
        assert!(matches!(result, Err(AuditError::WriteError { .. })));
    }
}
