//! Error types for viewkit components

use thiserror::Error;

/// Result type alias using the component Error
pub type Result<T> = std::result::Result<T, Error>;

/// Component construction and rendering errors
#[derive(Error, Debug)]
pub enum Error {
    #[error("missing required option(s) for {kind}: {}", missing.join(", "))]
    MissingOptions {
        kind: &'static str,
        missing: Vec<String>,
    },

    #[error("invalid option `{name}` for {kind}: expected {expected}")]
    InvalidOption {
        kind: &'static str,
        name: String,
        expected: &'static str,
    },

    #[error("collection item {position} failed: {source}")]
    CollectionItem {
        position: usize,
        #[source]
        source: Box<Error>,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Names of the missing options, if this is a missing-option error
    pub fn missing_options(&self) -> Option<&[String]> {
        match self {
            Error::MissingOptions { missing, .. } => Some(missing),
            Error::CollectionItem { source, .. } => source.missing_options(),
            _ => None,
        }
    }
}
