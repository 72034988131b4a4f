mod loader;
mod splitter;

pub use loader::load_document;
pub use splitter::CharacterTextSplitter;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

pub type Metadata = HashMap<String, serde_json::Value>;

/// A chunk of text plus the metadata it was indexed with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub page_content: String,
    #[serde(default)]
    pub metadata: Metadata,
}

impl Document {
    pub fn new(page_content: impl Into<String>) -> Self {
        Self {
            page_content: page_content.into(),
            metadata: Metadata::new(),
        }
    }

    pub fn with_metadata(page_content: impl Into<String>, metadata: Metadata) -> Self {
        Self {
            page_content: page_content.into(),
            metadata,
        }
    }

    /// The `source` tag rendered as a plain label (`0`, `"a.txt"` -> `a.txt`).
    pub fn source(&self) -> Option<String> {
        self.metadata.get("source").map(|value| match value {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        })
    }
}

impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<&String> = self.metadata.keys().collect();
        keys.sort();
        let metadata = keys
            .iter()
            .map(|k| format!("\"{}\": {}", k, self.metadata[*k]))
            .collect::<Vec<_>>()
            .join(", ");
        write!(f, "page_content='{}' metadata={{{}}}", self.page_content, metadata)
    }
}

/// Builds `{"source": i}` for every position, the tagging used when indexing a split file.
pub fn ordinal_sources(count: usize) -> Vec<Metadata> {
    (0..count)
        .map(|i| {
            let mut metadata = Metadata::new();
            metadata.insert("source".to_string(), serde_json::json!(i));
            metadata
        })
        .collect()
}
