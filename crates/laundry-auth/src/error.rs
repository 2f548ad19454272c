//! Error types for credential and token endpoint operations

use transport::{ResponseBody, TransportError};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The token endpoint answered with a non-2xx status.
    #[error("token endpoint returned {status}")]
    Rejected { status: u16, body: ResponseBody },

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("invalid token response: {0}")]
    InvalidResponse(String),

    #[error("credential parse error: {0}")]
    CredentialParse(String),

    #[error("I/O error: {0}")]
    Io(String),
}

/// Result alias for auth operations.
pub type Result<T> = std::result::Result<T, Error>;
