pub mod cli;
pub mod engine;
pub mod error;
pub mod model;
pub mod parser;
pub mod query;
pub mod report;
pub mod service;
pub mod source;
pub mod tracker;

pub use cli::Cli;
pub use engine::{CancelToken, DefaultVulnerabilityBuilder, Inspector, VulnerabilityBuilder};
pub use error::{AuditError, Result};
pub use model::{Document, Format, Node, NodeValue, Severity, Vulnerability};
pub use query::{FilesystemSource, Query, QuerySource};
pub use report::{Counters, Summary};
pub use service::{ScanOutcome, ScanService};
pub use source::FileSystemSourceProvider;
pub use tracker::Tracker;
