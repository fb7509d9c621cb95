//! Error types for rateview
//!
//! All modules use `RateviewResult<T>` as their return type.

use crate::fetch::FetchError;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for rateview operations
pub type RateviewResult<T> = Result<T, RateviewError>;

/// All errors that can occur in rateview
#[derive(Error, Debug)]
pub enum RateviewError {
    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Failed to create config directory {path}: {source}")]
    ConfigDirCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // Fetch errors
    #[error("Fetch failed for {key}: {source}")]
    Fetch {
        key: String,
        #[source]
        source: FetchError,
    },

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // Serialization errors
    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    // General errors
    #[error("{0}")]
    User(String),
}

impl RateviewError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a fetch error for a resource key
    pub fn fetch(key: impl Into<String>, source: FetchError) -> Self {
        Self::Fetch {
            key: key.into(),
            source,
        }
    }

    /// Check if error is retryable
    ///
    /// A failed fetch never populates the cache, so the next request
    /// for the same key starts fresh.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Fetch { .. })
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::Fetch { .. } => Some("Check [source].url in the config file"),
            Self::ConfigInvalid { .. } => Some("Run: rateview config init --force"),
            _ => None,
        }
    }
}
