//! Common error types

use thiserror::Error;

/// Configuration and startup errors shared by the host binary.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Usage error: {0}")]
    Usage(String),
}

/// Result alias using common Error
pub type Result<T> = std::result::Result<T, Error>;
