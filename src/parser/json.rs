//! JSON file parser.

use super::{value_to_node, FileParser, KeyStyle, LineLocator, ParseError};
use crate::model::{Document, Format};

pub struct JsonParser;

impl JsonParser {
    pub fn new() -> Self {
        Self
    }
}

impl Default for JsonParser {
    fn default() -> Self {
        Self::new()
    }
}

impl FileParser for JsonParser {
    fn parse(&self, content: &str, file_name: &str) -> Result<Document, ParseError> {
        let value: serde_json::Value =
            serde_json::from_str(content).map_err(|e| ParseError::Json {
                path: file_name.to_string(),
                source: e,
            })?;
        let mut locator = LineLocator::new(content);
        let root = value_to_node(&value, KeyStyle::Json, &mut locator, 1);
        Ok(Document::new(file_name, Format::Json, root))
    }

    fn supported_extensions(&self) -> &[&str] {
        &[".json"]
    }
}
