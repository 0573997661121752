//! YAML file parser.

use super::{value_to_node, FileParser, KeyStyle, LineLocator, ParseError};
use crate::model::{Document, Format};

pub struct YamlParser;

impl YamlParser {
    pub fn new() -> Self {
        Self
    }
}

impl Default for YamlParser {
    fn default() -> Self {
        Self::new()
    }
}

impl FileParser for YamlParser {
    fn parse(&self, content: &str, file_name: &str) -> Result<Document, ParseError> {
        // Parse into a JSON value for uniformity across formats.
        let value: serde_json::Value =
            serde_yaml::from_str(content).map_err(|e| ParseError::Yaml {
                path: file_name.to_string(),
                source: e,
            })?;
        let mut locator = LineLocator::new(content);
        let root = value_to_node(&value, KeyStyle::Yaml, &mut locator, 1);
        Ok(Document::new(file_name, Format::Yaml, root))
    }

    fn supported_extensions(&self) -> &[&str] {
        &[".yml", ".yaml"]
    }
}
