//! Scan-health counters.

use std::sync::atomic::{AtomicUsize, Ordering};

/// Monotonic counters for one scan.
///
/// Every counter only ever goes up; the interesting numbers are the gaps:
/// `found_files - parsed_files` is how many files could not be parsed, and
/// `loaded_queries - executed_queries` is how many queries faulted during
/// evaluation. A tracker is scoped to the scan that owns it and is shared
/// across workers through an `Arc`.
#[derive(Debug, Default)]
pub struct Tracker {
    found_files: AtomicUsize,
    parsed_files: AtomicUsize,
    loaded_queries: AtomicUsize,
    executed_queries: AtomicUsize,
    rejected_queries: AtomicUsize,
}

/// Consistent point-in-time read of a tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackerSnapshot {
    pub found_files: usize,
    pub parsed_files: usize,
    pub loaded_queries: usize,
    pub executed_queries: usize,
    pub rejected_queries: usize,
}

impl Tracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// A candidate file was discovered by the source provider.
    pub fn track_file_found(&self) {
        self.found_files.fetch_add(1, Ordering::Relaxed);
    }

    /// A discovered file parsed into a document.
    pub fn track_file_parse(&self) {
        self.parsed_files.fetch_add(1, Ordering::Relaxed);
    }

    /// A query definition loaded successfully.
    pub fn track_query_load(&self) {
        self.loaded_queries.fetch_add(1, Ordering::Relaxed);
    }

    /// A query completed evaluation over every applicable document.
    pub fn track_query_execution(&self) {
        self.executed_queries.fetch_add(1, Ordering::Relaxed);
    }

    /// A malformed or duplicate query definition was skipped at load time.
    pub fn track_query_rejection(&self) {
        self.rejected_queries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> TrackerSnapshot {
        TrackerSnapshot {
            found_files: self.found_files.load(Ordering::Relaxed),
            parsed_files: self.parsed_files.load(Ordering::Relaxed),
            loaded_queries: self.loaded_queries.load(Ordering::Relaxed),
            executed_queries: self.executed_queries.load(Ordering::Relaxed),
            rejected_queries: self.rejected_queries.load(Ordering::Relaxed),
        }
    }
}
