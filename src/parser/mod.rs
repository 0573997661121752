//! File parsing boundary.
//!
//! Parsers turn raw file content into the normalized [`Document`] model the
//! engine evaluates. Each parser implements the [`FileParser`] trait and is
//! composed through a [`ParserBuilder`]; the first parser that accepts a
//! file name wins.

pub mod json;
pub mod yaml;

pub use json::JsonParser;
pub use yaml::YamlParser;

use crate::model::{Document, Node, NodeValue};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("no parser accepts '{0}'")]
    UnsupportedFormat(String),
    #[error("failed to parse JSON: {path}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to parse YAML: {path}")]
    Yaml {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
}

/// Parses one file format into a normalized document.
pub trait FileParser: Send + Sync {
    fn parse(&self, content: &str, file_name: &str) -> Result<Document, ParseError>;

    /// Extensions this parser accepts, with the leading dot.
    fn supported_extensions(&self) -> &[&str];

    fn can_parse(&self, file_name: &str) -> bool {
        let lower = file_name.to_lowercase();
        self.supported_extensions()
            .iter()
            .any(|ext| lower.ends_with(ext))
    }
}

/// Assembles the parser chain used by a scan.
#[derive(Default)]
pub struct ParserBuilder {
    parsers: Vec<Box<dyn FileParser>>,
}

impl ParserBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(mut self, parser: Box<dyn FileParser>) -> Self {
        self.parsers.push(parser);
        self
    }

    pub fn build(self) -> CombinedParser {
        CombinedParser {
            parsers: self.parsers,
        }
    }
}

/// Dispatches each file to the first parser that accepts it.
pub struct CombinedParser {
    parsers: Vec<Box<dyn FileParser>>,
}

impl CombinedParser {
    pub fn parse(&self, content: &str, file_name: &str) -> Result<Document, ParseError> {
        for parser in &self.parsers {
            if parser.can_parse(file_name) {
                return parser.parse(content, file_name);
            }
        }
        Err(ParseError::UnsupportedFormat(file_name.to_string()))
    }

    /// Union of all registered extensions, used for file discovery.
    pub fn supported_extensions(&self) -> Vec<&str> {
        self.parsers
            .iter()
            .flat_map(|parser| parser.supported_extensions().iter().copied())
            .collect()
    }
}

/// How a key appears in source text, for line lookup.
#[derive(Debug, Clone, Copy)]
pub(crate) enum KeyStyle {
    Json,
    Yaml,
}

impl KeyStyle {
    fn needle(&self, key: &str) -> String {
        match self {
            KeyStyle::Json => format!("\"{key}\""),
            KeyStyle::Yaml => format!("{key}:"),
        }
    }
}

/// Finds source lines for keys by scanning the raw text left to right.
///
/// The cursor only moves forward, so repeated keys resolve to successive
/// occurrences. A key that cannot be found (flow style, quoting) falls
/// back to its parent's line.
pub(crate) struct LineLocator<'a> {
    content: &'a str,
    cursor: usize,
}

impl<'a> LineLocator<'a> {
    pub(crate) fn new(content: &'a str) -> Self {
        Self { content, cursor: 0 }
    }

    pub(crate) fn locate(&mut self, needle: &str, fallback: usize) -> usize {
        match self.content[self.cursor..].find(needle) {
            Some(offset) => {
                let position = self.cursor + offset;
                self.cursor = position + needle.len();
                line_at(self.content, position)
            }
            None => fallback,
        }
    }
}

fn line_at(content: &str, position: usize) -> usize {
    content[..position].bytes().filter(|b| *b == b'\n').count() + 1
}

/// Converts a parsed value tree into the node model, attaching source
/// lines as it walks. Key order is preserved from the source.
pub(crate) fn value_to_node(
    value: &serde_json::Value,
    style: KeyStyle,
    locator: &mut LineLocator,
    line: usize,
) -> Node {
    match value {
        serde_json::Value::Object(map) => {
            let mut entries = Vec::with_capacity(map.len());
            for (key, child) in map {
                let key_line = locator.locate(&style.needle(key), line);
                entries.push((key.clone(), value_to_node(child, style, locator, key_line)));
            }
            Node::new(NodeValue::Object(entries), line)
        }
        serde_json::Value::Array(items) => {
            let children = items
                .iter()
                .map(|item| value_to_node(item, style, locator, line))
                .collect();
            Node::new(NodeValue::Array(children), line)
        }
        serde_json::Value::String(s) => Node::new(NodeValue::String(s.clone()), line),
        serde_json::Value::Number(n) => {
            Node::new(NodeValue::Number(n.as_f64().unwrap_or(0.0)), line)
        }
        serde_json::Value::Bool(b) => Node::new(NodeValue::Bool(*b), line),
        serde_json::Value::Null => Node::new(NodeValue::Null, line),
    }
}
