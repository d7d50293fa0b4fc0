//! Error taxonomy for the ingest engine.
//!
//! Everything here propagates to the driver; a single failed entity aborts
//! the run. The only recoverable conditions (unknown keys, upstream shape
//! drift) are `tracing::warn!` events, not errors.

use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by the ingest engine.
#[derive(Error, Debug)]
pub enum ParseError {
    /// A required option is missing while the feature needing it is active.
    #[error("missing configuration: {0}")]
    Configuration(String),

    /// A descriptor file referenced by the tree does not exist.
    #[error("descriptor not found: {path}")]
    FileNotFound {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A descriptor file exists but is not valid JSON (or not an array).
    #[error("malformed descriptor {path}: {message}")]
    MalformedJson { path: PathBuf, message: String },

    /// An asset reference string could not be decoded into (file, index).
    #[error("malformed reference {reference:?}: {message}")]
    MalformedReference { reference: String, message: String },

    /// A recognized key carried an unexpected type or a structural
    /// invariant was broken (mixed curve modes, multiple fire modes,
    /// invalid key-map rule).
    #[error("schema error in {entity}: {message}")]
    Schema { entity: String, message: String },

    /// Template overlay and base disagree on a key's type.
    #[error("template type mismatch at {key}: {base} vs {overlay}")]
    TemplateTypeMismatch {
        key: String,
        base: &'static str,
        overlay: &'static str,
    },

    /// Template chain loops back on itself.
    #[error("template cycle through {0}")]
    TemplateCycle(String),

    /// Non-descriptor I/O failure (output directory, temp files).
    #[error("i/o failure at {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ParseError {
    /// Shorthand for schema violations, the most common construction site.
    pub fn schema(entity: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Schema {
            entity: entity.into(),
            message: message.into(),
        }
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ParseError>;

/// serde_json type name used in mismatch reports.
pub(crate) fn value_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}
