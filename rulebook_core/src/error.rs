//! Error types for the rulebook_core library.

use std::io;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for rulebook_core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// IO error occurred
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// TOML parsing error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Variant catalog or template library validation error
    #[error("Catalog validation error: {0}")]
    CatalogValidation(String),

    /// The rule store rejected an operation
    #[error("Store error: {0}")]
    Store(String),

    /// A referenced rule, schedule or template does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Template expansion error
    #[error("Template error: {0}")]
    Template(String),

    /// Fetching or copying rules for a week failed
    #[error("Failed to load {context}: {source}")]
    Load {
        context: String,
        #[source]
        source: Box<Error>,
    },

    /// A row operation failed part-way through a save.
    ///
    /// `committed` operations from the same save were already applied.
    #[error(
        "Save failed on {operation} (block {block_order}, rule {}) after {committed} committed operation(s): {source}",
        rule_id.as_deref().unwrap_or("<new>")
    )]
    Save {
        operation: &'static str,
        block_order: u32,
        rule_id: Option<String>,
        committed: usize,
        #[source]
        source: Box<Error>,
    },

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Wrap a store failure encountered while loading a week
    pub fn load(context: impl Into<String>, source: Error) -> Self {
        Error::Load {
            context: context.into(),
            source: Box::new(source),
        }
    }
}
