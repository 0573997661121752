//! Scan orchestration.
//!
//! The service wires discovery, parsing, and the engine into one run:
//! find candidate files, parse what it can, hand every surviving document
//! to the inspector. Files that cannot be read or parsed are logged and
//! counted; the scan keeps going.

use crate::engine::{CancelToken, Inspector};
use crate::error::Result;
use crate::model::{Document, Vulnerability};
use crate::parser::CombinedParser;
use crate::source::FileSystemSourceProvider;
use crate::tracker::Tracker;
use std::fs;
use std::sync::Arc;
use tracing::{debug, warn};

/// Everything one scan produced.
pub struct ScanOutcome {
    pub documents: Vec<Document>,
    pub vulnerabilities: Vec<Vulnerability>,
}

pub struct ScanService {
    provider: FileSystemSourceProvider,
    parser: CombinedParser,
    inspector: Inspector,
    tracker: Arc<Tracker>,
}

impl ScanService {
    pub fn new(
        provider: FileSystemSourceProvider,
        parser: CombinedParser,
        inspector: Inspector,
        tracker: Arc<Tracker>,
    ) -> Self {
        Self {
            provider,
            parser,
            inspector,
            tracker,
        }
    }

    pub fn start_scan(&self, scan_id: &str, cancel: &CancelToken) -> Result<ScanOutcome> {
        let documents = self.collect_documents();
        let vulnerabilities = self.inspector.inspect(scan_id, &documents, cancel)?;
        debug!(
            scan_id,
            documents = documents.len(),
            findings = vulnerabilities.len(),
            "scan finished"
        );
        Ok(ScanOutcome {
            documents,
            vulnerabilities,
        })
    }

    fn collect_documents(&self) -> Vec<Document> {
        let extensions = self.parser.supported_extensions();
        let mut documents = Vec::new();
        for path in self.provider.get_files(&extensions) {
            self.tracker.track_file_found();
            let content = match fs::read_to_string(&path) {
                Ok(content) => content,
                Err(e) => {
                    warn!(file = %path.display(), error = %e, "failed to read file");
                    continue;
                }
            };
            let file_name = path.display().to_string();
            match self.parser.parse(&content, &file_name) {
                Ok(document) => {
                    self.tracker.track_file_parse();
                    documents.push(document);
                }
                Err(e) => {
                    warn!(file = %file_name, error = %e, "failed to parse file");
                }
            }
        }
        documents
    }
}
