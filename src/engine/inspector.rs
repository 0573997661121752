//! Query execution engine.
//!
//! The inspector runs every loaded query against every normalized document.
//! Pairs are evaluated in parallel, but results are collected in canonical
//! order (query load order, then document order, then match order), so two
//! runs over the same inputs produce identical output. A fault in one
//! (query, document) pair is logged and counted; it never aborts the scan.

use crate::engine::builder::VulnerabilityBuilder;
use crate::model::{Document, Vulnerability};
use crate::query::{EvalBudget, Query, QuerySource, StoreError};
use crate::tracker::Tracker;
use rayon::prelude::*;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

/// Node-visit cap per (query, document) pair. Evaluation is pure tree
/// walking, so the budget bounds runtime without a wall clock.
pub const DEFAULT_EVAL_BUDGET: usize = 1_000_000;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("failed to load queries: {0}")]
    Store(#[from] StoreError),
    #[error("invalid document set: {0}")]
    InvalidDocumentSet(String),
}

/// Cooperative cancellation flag shared between a scan driver and the
/// engine. Checked once per pair; cancellation is not an error.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

enum PairOutcome {
    Matched(Vec<Vulnerability>),
    Faulted,
    Cancelled,
}

/// Holds the frozen query set and evaluates it against document batches.
pub struct Inspector {
    queries: Vec<Query>,
    builder: Arc<dyn VulnerabilityBuilder>,
    tracker: Arc<Tracker>,
    eval_budget: usize,
}

impl Inspector {
    /// Loads the query set once. The set is immutable afterwards; a new
    /// inspector is needed to pick up definition changes.
    pub fn new(
        source: &dyn QuerySource,
        builder: Arc<dyn VulnerabilityBuilder>,
        tracker: Arc<Tracker>,
    ) -> Result<Self, EngineError> {
        let queries = source.load(&tracker)?;
        debug!(count = queries.len(), "inspector ready");
        Ok(Self {
            queries,
            builder,
            tracker,
            eval_budget: DEFAULT_EVAL_BUDGET,
        })
    }

    pub fn with_eval_budget(mut self, budget: usize) -> Self {
        self.eval_budget = budget;
        self
    }

    pub fn queries(&self) -> &[Query] {
        &self.queries
    }

    /// Runs every applicable (query, document) pair and returns the merged
    /// findings in canonical order.
    ///
    /// A query counts as executed only when all of its applicable pairs
    /// completed without a fault or cancellation. A query with no
    /// applicable documents has nothing left to prove and counts as
    /// executed immediately.
    pub fn inspect(
        &self,
        scan_id: &str,
        documents: &[Document],
        cancel: &CancelToken,
    ) -> Result<Vec<Vulnerability>, EngineError> {
        validate_documents(documents)?;

        let pairs: Vec<(&Query, &Document)> = self
            .queries
            .iter()
            .flat_map(|query| {
                documents
                    .iter()
                    .filter(move |document| query.applies_to(document.format))
                    .map(move |document| (query, document))
            })
            .collect();

        let outcomes: Vec<PairOutcome> = pairs
            .par_iter()
            .map(|(query, document)| self.evaluate_pair(scan_id, query, document, cancel))
            .collect();

        let mut vulnerabilities = Vec::new();
        let mut cursor = outcomes.into_iter();
        for query in &self.queries {
            let applicable = documents
                .iter()
                .filter(|document| query.applies_to(document.format))
                .count();
            let mut completed = true;
            for _ in 0..applicable {
                match cursor.next() {
                    Some(PairOutcome::Matched(mut found)) => {
                        vulnerabilities.append(&mut found)
                    }
                    Some(PairOutcome::Faulted) | Some(PairOutcome::Cancelled) | None => {
                        completed = false
                    }
                }
            }
            if completed {
                self.tracker.track_query_execution();
            }
        }

        debug!(
            findings = vulnerabilities.len(),
            documents = documents.len(),
            "inspection finished"
        );
        Ok(vulnerabilities)
    }

    fn evaluate_pair(
        &self,
        scan_id: &str,
        query: &Query,
        document: &Document,
        cancel: &CancelToken,
    ) -> PairOutcome {
        if cancel.is_cancelled() {
            return PairOutcome::Cancelled;
        }
        let mut budget = EvalBudget::new(self.eval_budget);
        match query.matcher.evaluate(&document.content, &mut budget) {
            Ok(sites) => PairOutcome::Matched(
                sites
                    .iter()
                    .map(|site| self.builder.build(scan_id, query, document, site))
                    .collect(),
            ),
            Err(e) => {
                warn!(
                    query = %query.id,
                    file = %document.file_name,
                    error = %e,
                    "query evaluation failed"
                );
                PairOutcome::Faulted
            }
        }
    }
}

fn validate_documents(documents: &[Document]) -> Result<(), EngineError> {
    let mut seen = HashSet::new();
    for document in documents {
        if document.file_name.is_empty() {
            return Err(EngineError::InvalidDocumentSet(
                "document with an empty file name".to_string(),
            ));
        }
        if !seen.insert(document.file_name.as_str()) {
            return Err(EngineError::InvalidDocumentSet(format!(
                "duplicate document '{}'",
                document.file_name
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::builder::DefaultVulnerabilityBuilder;
    use crate::model::{Format, Severity};
    use crate::parser::{FileParser, YamlParser};
    use crate::query::{Matcher, MatcherDef};

    struct StaticSource(Vec<Query>);

    impl QuerySource for StaticSource {
        fn load(&self, tracker: &Tracker) -> Result<Vec<Query>, StoreError> {
            for _ in &self.0 {
                tracker.track_query_load();
            }
            Ok(self.0.clone())
        }
    }

    fn query(id: &str, platforms: Vec<Format>, matcher_yaml: &str) -> Query {
        let def: MatcherDef = serde_yaml::from_str(matcher_yaml).unwrap();
        Query {
            id: id.to_string(),
            name: id.to_string(),
            description: String::new(),
            severity: Severity::Medium,
            platforms,
            matcher: Matcher::compile(&def).unwrap(),
            source_file: "test.yaml".to_string(),
        }
    }

    fn yaml_doc(file_name: &str, content: &str) -> Document {
        YamlParser::new().parse(content, file_name).unwrap()
    }

    fn inspector(queries: Vec<Query>) -> (Inspector, Arc<Tracker>) {
        let tracker = Arc::new(Tracker::new());
        let inspector = Inspector::new(
            &StaticSource(queries),
            Arc::new(DefaultVulnerabilityBuilder),
            Arc::clone(&tracker),
        )
        .unwrap();
        (inspector, tracker)
    }

    const EXISTS_NAME: &str = r#"
attribute_exists:
  path: "metadata.name"
"#;

    const EQUALS_PRIVILEGED: &str = r#"
attribute_equals:
  path: "spec.privileged"
  value: true
"#;

    const FAULTING: &str = r#"
attribute_matches:
  path: "metadata"
  pattern: "x"
"#;

    #[test]
    fn test_findings_in_canonical_order() {
        let (inspector, _) = inspector(vec![
            query("a_exists", vec![], EXISTS_NAME),
            query("b_privileged", vec![], EQUALS_PRIVILEGED),
        ]);
        let docs = vec![
            yaml_doc("one.yaml", "metadata:\n  name: first\nspec:\n  privileged: true\n"),
            yaml_doc("two.yaml", "metadata:\n  name: second\n"),
        ];

        let findings = inspector
            .inspect("console", &docs, &CancelToken::new())
            .unwrap();
        let keys: Vec<(&str, &str)> = findings
            .iter()
            .map(|v| (v.query_id.as_str(), v.file_name.as_str()))
            .collect();
        assert_eq!(
            keys,
            vec![
                ("a_exists", "one.yaml"),
                ("a_exists", "two.yaml"),
                ("b_privileged", "one.yaml"),
            ]
        );
    }

    #[test]
    fn test_deterministic_across_runs() {
        let (inspector, _) = inspector(vec![
            query("a_exists", vec![], EXISTS_NAME),
            query("b_privileged", vec![], EQUALS_PRIVILEGED),
        ]);
        let docs: Vec<Document> = (0..20)
            .map(|i| {
                yaml_doc(
                    &format!("doc{i:02}.yaml"),
                    "metadata:\n  name: app\nspec:\n  privileged: true\n",
                )
            })
            .collect();

        let first = inspector
            .inspect("console", &docs, &CancelToken::new())
            .unwrap();
        let second = inspector
            .inspect("console", &docs, &CancelToken::new())
            .unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 40);
    }

    #[test]
    fn test_platform_filter_skips_pairs() {
        let (inspector, tracker) = inspector(vec![query(
            "json_only",
            vec![Format::Json],
            EXISTS_NAME,
        )]);
        let docs = vec![yaml_doc("app.yaml", "metadata:\n  name: app\n")];

        let findings = inspector
            .inspect("console", &docs, &CancelToken::new())
            .unwrap();
        assert!(findings.is_empty());
        // no applicable pairs, so the query trivially executed
        assert_eq!(tracker.snapshot().executed_queries, 1);
    }

    #[test]
    fn test_faulting_query_is_isolated() {
        let (inspector, tracker) = inspector(vec![
            query("faulty", vec![], FAULTING),
            query("healthy", vec![], EXISTS_NAME),
        ]);
        let docs = vec![yaml_doc("app.yaml", "metadata:\n  name: app\n")];

        let findings = inspector
            .inspect("console", &docs, &CancelToken::new())
            .unwrap();
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].query_id, "healthy");
        assert_eq!(tracker.snapshot().executed_queries, 1);
    }

    #[test]
    fn test_budget_exhaustion_is_a_fault() {
        let (inspector, tracker) = inspector(vec![query("deep", vec![], EXISTS_NAME)]);
        let inspector = inspector.with_eval_budget(1);
        let docs = vec![yaml_doc("app.yaml", "metadata:\n  name: app\n")];

        let findings = inspector
            .inspect("console", &docs, &CancelToken::new())
            .unwrap();
        assert!(findings.is_empty());
        assert_eq!(tracker.snapshot().executed_queries, 0);
    }

    #[test]
    fn test_empty_file_name_rejected() {
        let (inspector, _) = inspector(vec![query("q", vec![], EXISTS_NAME)]);
        let docs = vec![yaml_doc("", "metadata:\n  name: app\n")];

        let err = inspector
            .inspect("console", &docs, &CancelToken::new())
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidDocumentSet(_)));
    }

    #[test]
    fn test_duplicate_file_name_rejected() {
        let (inspector, _) = inspector(vec![query("q", vec![], EXISTS_NAME)]);
        let docs = vec![
            yaml_doc("same.yaml", "metadata:\n  name: a\n"),
            yaml_doc("same.yaml", "metadata:\n  name: b\n"),
        ];

        let err = inspector
            .inspect("console", &docs, &CancelToken::new())
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidDocumentSet(_)));
    }

    #[test]
    fn test_empty_document_set_executes_all_queries() {
        let (inspector, tracker) = inspector(vec![
            query("a", vec![], EXISTS_NAME),
            query("b", vec![], EQUALS_PRIVILEGED),
        ]);

        let findings = inspector
            .inspect("console", &[], &CancelToken::new())
            .unwrap();
        assert!(findings.is_empty());
        assert_eq!(tracker.snapshot().executed_queries, 2);
    }

    #[test]
    fn test_cancelled_scan_returns_no_findings() {
        let (inspector, tracker) = inspector(vec![query("q", vec![], EXISTS_NAME)]);
        let docs = vec![yaml_doc("app.yaml", "metadata:\n  name: app\n")];

        let cancel = CancelToken::new();
        cancel.cancel();
        let findings = inspector.inspect("console", &docs, &cancel).unwrap();
        assert!(findings.is_empty());
        // cancelled pairs leave the query unexecuted but are not an error
        assert_eq!(tracker.snapshot().executed_queries, 0);
    }

    #[test]
    fn test_executed_counts_accumulate_per_call() {
        let (inspector, tracker) = inspector(vec![query("q", vec![], EXISTS_NAME)]);
        let docs = vec![yaml_doc("app.yaml", "metadata:\n  name: app\n")];

        inspector
            .inspect("console", &docs, &CancelToken::new())
            .unwrap();
        inspector
            .inspect("console", &docs, &CancelToken::new())
            .unwrap();
        assert_eq!(tracker.snapshot().executed_queries, 2);
        assert_eq!(tracker.snapshot().loaded_queries, 1);
    }
}
