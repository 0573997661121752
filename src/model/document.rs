//! Normalized document model shared by every parser and the engine.

use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Deserialize, Serialize, Serializer};

/// Source format a document was parsed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    Json,
    Yaml,
    Terraform,
}

impl Format {
    /// Detect the format from a file extension (without the dot).
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "json" => Some(Self::Json),
            "yml" | "yaml" => Some(Self::Yaml),
            "tf" => Some(Self::Terraform),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Format::Json => "json",
            Format::Yaml => "yaml",
            Format::Terraform => "terraform",
        }
    }
}

impl std::fmt::Display for Format {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One node of a parsed document tree, carrying its source line.
///
/// Object entries keep the order they appeared in the source, so any
/// traversal of the tree is deterministic.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub value: NodeValue,
    /// 1-based source line. Defaults to the enclosing node's line when the
    /// parser could not pin the exact position.
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeValue {
    Object(Vec<(String, Node)>),
    Array(Vec<Node>),
    String(String),
    Number(f64),
    Bool(bool),
    Null,
}

impl Node {
    pub fn new(value: NodeValue, line: usize) -> Self {
        Self { value, line }
    }

    /// Look up a direct child of an object node.
    pub fn get(&self, key: &str) -> Option<&Node> {
        match &self.value {
            NodeValue::Object(entries) => entries
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, node)| node),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match &self.value {
            NodeValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self.value {
            NodeValue::Bool(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self.value {
            NodeValue::Number(n) => Some(n),
            _ => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self.value {
            NodeValue::Object(_) => "object",
            NodeValue::Array(_) => "array",
            NodeValue::String(_) => "string",
            NodeValue::Number(_) => "number",
            NodeValue::Bool(_) => "bool",
            NodeValue::Null => "null",
        }
    }

    pub fn is_scalar(&self) -> bool {
        !matches!(self.value, NodeValue::Object(_) | NodeValue::Array(_))
    }

    /// Compact rendering of the value for report messages.
    pub fn render(&self) -> String {
        match &self.value {
            NodeValue::Object(_) => "{...}".to_string(),
            NodeValue::Array(_) => "[...]".to_string(),
            NodeValue::String(s) => s.clone(),
            NodeValue::Number(n) => format_number(*n),
            NodeValue::Bool(b) => b.to_string(),
            NodeValue::Null => "null".to_string(),
        }
    }
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.is_finite() && n.abs() < i64::MAX as f64 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

// Nodes serialize as the plain value they hold, so a payload dump reads
// like the source it came from. Line numbers are not part of the output.
impl Serialize for Node {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match &self.value {
            NodeValue::Object(entries) => {
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (key, node) in entries {
                    map.serialize_entry(key, node)?;
                }
                map.end()
            }
            NodeValue::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            NodeValue::String(s) => serializer.serialize_str(s),
            NodeValue::Number(n) => {
                if n.fract() == 0.0 && n.is_finite() && n.abs() < i64::MAX as f64 {
                    serializer.serialize_i64(*n as i64)
                } else {
                    serializer.serialize_f64(*n)
                }
            }
            NodeValue::Bool(b) => serializer.serialize_bool(*b),
            NodeValue::Null => serializer.serialize_unit(),
        }
    }
}

/// One scanned file in normalized form. Immutable after parsing; the
/// engine only reads it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Document {
    pub file_name: String,
    pub format: Format,
    pub content: Node,
}

impl Document {
    pub fn new(file_name: impl Into<String>, format: Format, content: Node) -> Self {
        Self {
            file_name: file_name.into(),
            format,
            content,
        }
    }
}
