//! Query definition loading.
//!
//! Definitions live in YAML files under a query directory. Loading is
//! deliberately forgiving: a malformed file or definition is logged,
//! counted against the tracker, and skipped. Only an unreachable query
//! directory is fatal, because it means the whole store is unusable.

use crate::model::{Format, Severity};
use crate::query::matcher::{CompileError, Matcher, MatcherDef};
use crate::query::Query;
use crate::tracker::Tracker;
use serde::Deserialize;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Fatal store failures. Everything else is skip-and-count.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("query directory not found: {0}")]
    SourceNotFound(PathBuf),
    #[error("query path is not a directory: {0}")]
    NotADirectory(PathBuf),
}

/// Why a single definition was rejected during loading.
#[derive(Debug, Error)]
pub enum DefinitionError {
    #[error("query id is empty")]
    EmptyId,
    #[error(
        "query '{query_id}' has invalid severity '{value}'. Expected: info, low, medium, high, critical"
    )]
    InvalidSeverity { query_id: String, value: String },
    #[error(
        "query '{query_id}' has invalid platform '{value}'. Expected: json, yaml, terraform"
    )]
    InvalidPlatform { query_id: String, value: String },
    #[error("query '{query_id}' has an invalid matcher: {source}")]
    InvalidMatcher {
        query_id: String,
        #[source]
        source: CompileError,
    },
}

/// Supplies the immutable query set for an inspection run.
pub trait QuerySource {
    fn load(&self, tracker: &Tracker) -> Result<Vec<Query>, StoreError>;
}

/// Top-level shape of a query definition file.
#[derive(Debug, Deserialize)]
struct QueryFile {
    queries: Vec<serde_yaml::Value>,
}

/// One query definition as written, before validation.
#[derive(Debug, Deserialize)]
struct QueryDefinition {
    id: String,
    name: String,
    #[serde(default)]
    description: String,
    severity: String,
    #[serde(default)]
    platforms: Vec<String>,
    #[serde(rename = "match")]
    matcher: MatcherDef,
}

/// Loads query definitions from `*.yaml` / `*.yml` files under a directory
/// tree, in deterministic path order.
pub struct FilesystemSource {
    path: PathBuf,
}

impl FilesystemSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl QuerySource for FilesystemSource {
    fn load(&self, tracker: &Tracker) -> Result<Vec<Query>, StoreError> {
        if !self.path.exists() {
            return Err(StoreError::SourceNotFound(self.path.clone()));
        }
        if !self.path.is_dir() {
            return Err(StoreError::NotADirectory(self.path.clone()));
        }

        let mut queries = Vec::new();
        let mut seen = HashSet::new();
        for entry in WalkDir::new(&self.path).sort_by_file_name() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(error = %e, "skipping unreadable query store entry");
                    continue;
                }
            };
            if entry.file_type().is_file() && is_definition_file(entry.path()) {
                load_definition_file(entry.path(), tracker, &mut seen, &mut queries);
            }
        }

        debug!(count = queries.len(), path = %self.path.display(), "queries loaded");
        Ok(queries)
    }
}

fn is_definition_file(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some(ext) if ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml")
    )
}

fn load_definition_file(
    path: &Path,
    tracker: &Tracker,
    seen: &mut HashSet<String>,
    queries: &mut Vec<Query>,
) {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            warn!(file = %path.display(), error = %e, "failed to read query file");
            tracker.track_query_rejection();
            return;
        }
    };

    let file: QueryFile = match serde_yaml::from_str(&content) {
        Ok(file) => file,
        Err(e) => {
            warn!(file = %path.display(), error = %e, "failed to parse query file");
            tracker.track_query_rejection();
            return;
        }
    };

    for value in file.queries {
        let def: QueryDefinition = match serde_yaml::from_value(value) {
            Ok(def) => def,
            Err(e) => {
                warn!(file = %path.display(), error = %e, "skipping malformed query definition");
                tracker.track_query_rejection();
                continue;
            }
        };
        match convert_definition(def, path) {
            Ok(query) => {
                if seen.insert(query.id.clone()) {
                    tracker.track_query_load();
                    queries.push(query);
                } else {
                    warn!(file = %path.display(), query = %query.id, "skipping duplicate query id");
                    tracker.track_query_rejection();
                }
            }
            Err(e) => {
                warn!(file = %path.display(), error = %e, "skipping invalid query definition");
                tracker.track_query_rejection();
            }
        }
    }
}

fn convert_definition(def: QueryDefinition, source_path: &Path) -> Result<Query, DefinitionError> {
    if def.id.trim().is_empty() {
        return Err(DefinitionError::EmptyId);
    }
    let severity = parse_severity(&def.severity).ok_or_else(|| DefinitionError::InvalidSeverity {
        query_id: def.id.clone(),
        value: def.severity.clone(),
    })?;
    let mut platforms = Vec::new();
    for raw in &def.platforms {
        let platform = parse_platform(raw).ok_or_else(|| DefinitionError::InvalidPlatform {
            query_id: def.id.clone(),
            value: raw.clone(),
        })?;
        if !platforms.contains(&platform) {
            platforms.push(platform);
        }
    }
    let matcher = Matcher::compile(&def.matcher).map_err(|e| DefinitionError::InvalidMatcher {
        query_id: def.id.clone(),
        source: e,
    })?;

    Ok(Query {
        id: def.id,
        name: def.name,
        description: def.description,
        severity,
        platforms,
        matcher,
        source_file: source_path.display().to_string(),
    })
}

fn parse_severity(value: &str) -> Option<Severity> {
    match value.to_lowercase().as_str() {
        "info" => Some(Severity::Info),
        "low" => Some(Severity::Low),
        "medium" => Some(Severity::Medium),
        "high" => Some(Severity::High),
        "critical" => Some(Severity::Critical),
        _ => None,
    }
}

fn parse_platform(value: &str) -> Option<Format> {
    match value.to_lowercase().as_str() {
        "json" => Some(Format::Json),
        "yaml" | "yml" => Some(Format::Yaml),
        "terraform" | "tf" => Some(Format::Terraform),
        _ => None,
    }
}
