//! Error types shared by the engine crates.

use thiserror::Error;

/// Errors raised while reading the engine configuration.
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The file is not valid JSON or has fields of the wrong type.
    #[error("Config parse error: {0}")]
    ConfigParse(#[from] serde_json::Error),

    /// The values parsed but cannot be rendered with.
    #[error("Config error: {0}")]
    Config(String),
}

/// Result type alias using the core Error type.
pub type Result<T> = std::result::Result<T, Error>;
