//! Configuration schema for rateview
//!
//! Configuration is stored at `~/.config/rateview/config.toml`

use serde::{Deserialize, Serialize};

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Where the rate document comes from
    pub source: SourceConfig,

    /// How the rate is presented
    pub display: DisplayConfig,
}

/// Rate source settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// URL serving a JSON document with the current rate
    pub url: String,

    /// JSON pointer to the numeric value inside the document
    pub pointer: String,

    /// Transport timeout in seconds
    pub timeout_secs: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            url: "https://open.er-api.com/v6/latest/USD".to_string(),
            pointer: "/rates/VND".to_string(),
            timeout_secs: 10,
        }
    }
}

/// Presentation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Label for the displayed pair; doubles as the cache key
    pub label: String,

    /// Value shown while loading, and kept if every fetch fails
    pub fallback: f64,

    /// Decimal places to display
    pub precision: usize,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            label: "USD/VND".to_string(),
            fallback: 25_000.0,
            precision: 0,
        }
    }
}
