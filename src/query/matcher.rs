//! Match predicates evaluated against document trees.
//!
//! A matcher is the executable part of a query: a tree of leaf conditions
//! over attribute paths, combined with `all`/`any`/`not`. Evaluation is a
//! pure traversal of the document; anything that goes wrong is reported as
//! an [`EvalError`] value so one broken pair never takes down a scan.

use crate::model::{Node, NodeValue};
use regex::Regex;
use serde::Deserialize;
use thiserror::Error;

/// Dot-separated attribute path.
///
/// `*` descends into every entry of an object and every element of an
/// array. A numeric segment addresses an array element by index. Paths are
/// parsed once at load time.
#[derive(Debug, Clone, PartialEq)]
pub struct PathExpr {
    segments: Vec<PathSegment>,
    raw: String,
}

#[derive(Debug, Clone, PartialEq)]
enum PathSegment {
    Key(String),
    Wildcard,
}

#[derive(Debug, Error, PartialEq)]
pub enum PathError {
    #[error("path is empty")]
    Empty,
    #[error("path '{0}' contains an empty segment")]
    EmptySegment(String),
}

impl PathExpr {
    pub fn parse(raw: &str) -> Result<Self, PathError> {
        if raw.is_empty() {
            return Err(PathError::Empty);
        }
        let mut segments = Vec::new();
        for part in raw.split('.') {
            if part.is_empty() {
                return Err(PathError::EmptySegment(raw.to_string()));
            }
            if part == "*" {
                segments.push(PathSegment::Wildcard);
            } else {
                segments.push(PathSegment::Key(part.to_string()));
            }
        }
        Ok(Self {
            segments,
            raw: raw.to_string(),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

/// Caps the number of nodes one evaluation may visit. Evaluation does no
/// I/O, so the visit budget is the runaway guard instead of a wall clock.
#[derive(Debug)]
pub struct EvalBudget {
    remaining: usize,
    limit: usize,
}

impl EvalBudget {
    pub fn new(limit: usize) -> Self {
        Self {
            remaining: limit,
            limit,
        }
    }

    fn charge(&mut self) -> Result<(), EvalError> {
        if self.remaining == 0 {
            return Err(EvalError::BudgetExceeded { limit: self.limit });
        }
        self.remaining -= 1;
        Ok(())
    }
}

/// A recoverable evaluation fault, scoped to one (query, document) pair.
#[derive(Debug, Error, PartialEq)]
pub enum EvalError {
    #[error("evaluation budget of {limit} node visits exhausted")]
    BudgetExceeded { limit: usize },
    #[error("attribute '{path}' is a {kind}, expected a scalar")]
    NotAScalar { path: String, kind: &'static str },
}

/// One place in a document where a matcher fired.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchSite {
    /// Dot-path of the matched node.
    pub path: String,
    pub line: usize,
    /// Rendering of what the document actually contains.
    pub actual: String,
    /// Rendering of what a compliant document would contain.
    pub expected: String,
}

/// Declarative matcher shape as it appears in query definition files.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatcherDef {
    AttributeEquals {
        path: String,
        value: serde_json::Value,
    },
    AttributeExists {
        path: String,
    },
    AttributeAbsent {
        path: String,
    },
    AttributeMatches {
        path: String,
        pattern: String,
    },
    All(Vec<MatcherDef>),
    Any(Vec<MatcherDef>),
    Not(Box<MatcherDef>),
}

#[derive(Debug, Error)]
pub enum CompileError {
    #[error("invalid attribute path '{path}': {source}")]
    InvalidPath {
        path: String,
        #[source]
        source: PathError,
    },
    #[error("invalid match pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
    #[error("expected value for '{path}' must be a scalar")]
    NonScalarExpected { path: String },
    #[error("absent path '{path}' must end with a named attribute")]
    AbsentWildcard { path: String },
}

/// Compiled matcher, frozen for the lifetime of its query.
#[derive(Debug, Clone)]
pub enum Matcher {
    /// Fires on every attribute at `path` equal to `value`.
    AttributeEquals {
        path: PathExpr,
        value: serde_json::Value,
    },
    /// Fires on every attribute present at `path`.
    AttributeExists { path: PathExpr },
    /// Fires on every resolved parent object missing the final attribute.
    AttributeAbsent { path: PathExpr },
    /// Fires on every scalar at `path` whose rendering matches the pattern.
    AttributeMatches { path: PathExpr, pattern: Regex },
    /// Fires with every child's sites, but only when every child fired.
    All(Vec<Matcher>),
    /// Fires with the concatenation of all children's sites.
    Any(Vec<Matcher>),
    /// Fires once at the document root when the child found nothing.
    Not(Box<Matcher>),
}

impl Matcher {
    pub fn compile(def: &MatcherDef) -> Result<Self, CompileError> {
        match def {
            MatcherDef::AttributeEquals { path, value } => {
                let parsed = parse_path(path)?;
                if value.is_object() || value.is_array() {
                    return Err(CompileError::NonScalarExpected { path: path.clone() });
                }
                Ok(Matcher::AttributeEquals {
                    path: parsed,
                    value: value.clone(),
                })
            }
            MatcherDef::AttributeExists { path } => Ok(Matcher::AttributeExists {
                path: parse_path(path)?,
            }),
            MatcherDef::AttributeAbsent { path } => {
                let parsed = parse_path(path)?;
                if matches!(parsed.segments.last(), Some(PathSegment::Wildcard)) {
                    return Err(CompileError::AbsentWildcard { path: path.clone() });
                }
                Ok(Matcher::AttributeAbsent { path: parsed })
            }
            MatcherDef::AttributeMatches { path, pattern } => {
                let compiled = Regex::new(pattern).map_err(|e| CompileError::InvalidPattern {
                    pattern: pattern.clone(),
                    source: e,
                })?;
                Ok(Matcher::AttributeMatches {
                    path: parse_path(path)?,
                    pattern: compiled,
                })
            }
            MatcherDef::All(children) => Ok(Matcher::All(compile_children(children)?)),
            MatcherDef::Any(children) => Ok(Matcher::Any(compile_children(children)?)),
            MatcherDef::Not(inner) => Ok(Matcher::Not(Box::new(Self::compile(inner)?))),
        }
    }

    /// Walks the document and returns every site where this matcher fires,
    /// in source order.
    pub fn evaluate(
        &self,
        root: &Node,
        budget: &mut EvalBudget,
    ) -> Result<Vec<MatchSite>, EvalError> {
        match self {
            Matcher::AttributeEquals { path, value } => {
                let mut sites = Vec::new();
                for (node_path, node) in resolve(root, &path.segments, budget)? {
                    if scalar_equals(&node.value, value) {
                        let name = attribute_name(&node_path);
                        sites.push(MatchSite {
                            line: node.line,
                            actual: format!("'{name}' is {}", node.render()),
                            expected: format!(
                                "'{name}' should not be {}",
                                render_expected(value)
                            ),
                            path: node_path,
                        });
                    }
                }
                Ok(sites)
            }
            Matcher::AttributeExists { path } => {
                let mut sites = Vec::new();
                for (node_path, node) in resolve(root, &path.segments, budget)? {
                    let name = attribute_name(&node_path);
                    sites.push(MatchSite {
                        line: node.line,
                        actual: format!("'{name}' is set"),
                        expected: format!("'{name}' should not be set"),
                        path: node_path,
                    });
                }
                Ok(sites)
            }
            Matcher::AttributeAbsent { path } => evaluate_absent(path, root, budget),
            Matcher::AttributeMatches { path, pattern } => {
                let mut sites = Vec::new();
                for (node_path, node) in resolve(root, &path.segments, budget)? {
                    if !node.is_scalar() {
                        return Err(EvalError::NotAScalar {
                            path: node_path,
                            kind: node.kind(),
                        });
                    }
                    let text = node.render();
                    if pattern.is_match(&text) {
                        let name = attribute_name(&node_path);
                        sites.push(MatchSite {
                            line: node.line,
                            actual: format!("'{name}' is {text}"),
                            expected: format!("'{name}' should not match '{pattern}'"),
                            path: node_path,
                        });
                    }
                }
                Ok(sites)
            }
            Matcher::All(children) => {
                let mut sites = Vec::new();
                for child in children {
                    let child_sites = child.evaluate(root, budget)?;
                    if child_sites.is_empty() {
                        return Ok(vec![]);
                    }
                    sites.extend(child_sites);
                }
                Ok(sites)
            }
            Matcher::Any(children) => {
                let mut sites = Vec::new();
                for child in children {
                    sites.extend(child.evaluate(root, budget)?);
                }
                Ok(sites)
            }
            Matcher::Not(inner) => {
                if inner.evaluate(root, budget)?.is_empty() {
                    Ok(vec![MatchSite {
                        path: String::new(),
                        line: root.line,
                        actual: "no attribute satisfies the required condition".to_string(),
                        expected: "at least one attribute satisfies the required condition"
                            .to_string(),
                    }])
                } else {
                    Ok(vec![])
                }
            }
        }
    }
}

fn compile_children(defs: &[MatcherDef]) -> Result<Vec<Matcher>, CompileError> {
    defs.iter().map(Matcher::compile).collect()
}

fn parse_path(raw: &str) -> Result<PathExpr, CompileError> {
    PathExpr::parse(raw).map_err(|e| CompileError::InvalidPath {
        path: raw.to_string(),
        source: e,
    })
}

fn evaluate_absent(
    path: &PathExpr,
    root: &Node,
    budget: &mut EvalBudget,
) -> Result<Vec<MatchSite>, EvalError> {
    let (last, init) = match path.segments.split_last() {
        Some(split) => split,
        None => return Ok(vec![]),
    };
    let key = match last {
        PathSegment::Key(key) => key,
        PathSegment::Wildcard => return Ok(vec![]),
    };
    let mut sites = Vec::new();
    for (parent_path, parent) in resolve(root, init, budget)? {
        if let NodeValue::Object(entries) = &parent.value {
            if !entries.iter().any(|(k, _)| k == key) {
                sites.push(MatchSite {
                    path: join_path(&parent_path, key),
                    line: parent.line,
                    actual: format!("'{key}' is not set"),
                    expected: format!("'{key}' should be set"),
                });
            }
        }
    }
    Ok(sites)
}

/// Resolves a path against the tree, returning every matching node with
/// its concrete dot-path. Order follows the source.
fn resolve<'a>(
    root: &'a Node,
    segments: &[PathSegment],
    budget: &mut EvalBudget,
) -> Result<Vec<(String, &'a Node)>, EvalError> {
    let mut current: Vec<(String, &Node)> = vec![(String::new(), root)];
    for segment in segments {
        let mut next = Vec::new();
        for (path, node) in current {
            budget.charge()?;
            match (&node.value, segment) {
                (NodeValue::Object(entries), PathSegment::Key(key)) => {
                    for (k, child) in entries {
                        if k == key {
                            next.push((join_path(&path, k), child));
                        }
                    }
                }
                (NodeValue::Object(entries), PathSegment::Wildcard) => {
                    for (k, child) in entries {
                        budget.charge()?;
                        next.push((join_path(&path, k), child));
                    }
                }
                (NodeValue::Array(items), PathSegment::Wildcard) => {
                    for (index, child) in items.iter().enumerate() {
                        budget.charge()?;
                        next.push((join_path(&path, &index.to_string()), child));
                    }
                }
                (NodeValue::Array(items), PathSegment::Key(key)) => {
                    if let Ok(index) = key.parse::<usize>() {
                        if let Some(child) = items.get(index) {
                            next.push((join_path(&path, key), child));
                        }
                    }
                }
                _ => {}
            }
        }
        current = next;
    }
    Ok(current)
}

fn join_path(parent: &str, key: &str) -> String {
    if parent.is_empty() {
        key.to_string()
    } else {
        format!("{parent}.{key}")
    }
}

fn attribute_name(path: &str) -> &str {
    path.rsplit('.').next().unwrap_or(path)
}

fn scalar_equals(value: &NodeValue, expected: &serde_json::Value) -> bool {
    match (value, expected) {
        (NodeValue::String(s), serde_json::Value::String(e)) => s == e,
        (NodeValue::Bool(b), serde_json::Value::Bool(e)) => b == e,
        (NodeValue::Number(n), serde_json::Value::Number(e)) => {
            e.as_f64().is_some_and(|f| f == *n)
        }
        (NodeValue::Null, serde_json::Value::Null) => true,
        _ => false,
    }
}

fn render_expected(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
