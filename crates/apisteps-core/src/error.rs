//! Errors raised while loading a document or walking its schemas

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("Cannot read {0}: {1}")]
    Io(PathBuf, String),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Unresolved reference: {0}")]
    UnresolvedReference(String),
    #[error("Unsupported schema shape at {location}: {reason}")]
    UnsupportedSchemaShape { location: String, reason: String },
}

impl SchemaError {
    pub fn unsupported(location: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::UnsupportedSchemaShape {
            location: location.into(),
            reason: reason.into(),
        }
    }
}
