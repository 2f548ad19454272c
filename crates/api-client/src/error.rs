//! Caller-visible failure type and status classification

use serde::ser::{Serialize, SerializeStruct, Serializer};

/// Failure taxonomy.
///
/// `AuthExpired` is recovered inside the client and never reaches a caller
/// unless the refresh fails, in which case the caller sees `AuthFailed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// 401 on a request that carried a token; recoverable by refresh
    AuthExpired,
    /// Refresh failed, no refresh token, a replay refused again (all of
    /// which end the session), or a 401 on a request sent without a token
    AuthFailed,
    Forbidden,
    NotFound,
    Conflict,
    BadRequest,
    Validation,
    ServerError,
    /// No response received
    NetworkUnreachable,
    Unexpected,
}

impl ErrorKind {
    /// Label for metrics and logs.
    pub fn label(&self) -> &'static str {
        match self {
            ErrorKind::AuthExpired => "auth_expired",
            ErrorKind::AuthFailed => "auth_failed",
            ErrorKind::Forbidden => "forbidden",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Conflict => "conflict",
            ErrorKind::BadRequest => "bad_request",
            ErrorKind::Validation => "validation",
            ErrorKind::ServerError => "server_error",
            ErrorKind::NetworkUnreachable => "network_unreachable",
            ErrorKind::Unexpected => "unexpected",
        }
    }
}

/// Map a non-2xx status to its kind, ignoring credentials.
pub fn classify_status(status: u16) -> ErrorKind {
    match status {
        400 => ErrorKind::BadRequest,
        401 => ErrorKind::AuthFailed,
        403 => ErrorKind::Forbidden,
        404 => ErrorKind::NotFound,
        409 => ErrorKind::Conflict,
        422 => ErrorKind::Validation,
        500..=599 => ErrorKind::ServerError,
        _ => ErrorKind::Unexpected,
    }
}

/// Classify a failed response for routing. Only a 401 on a request that
/// carried a token is `AuthExpired`.
pub fn classify_failure(status: u16, sent_with_token: bool) -> ErrorKind {
    if status == 401 && sent_with_token {
        ErrorKind::AuthExpired
    } else {
        classify_status(status)
    }
}

/// The one failure shape every caller receives.
///
/// `code` is the HTTP status, or `0` when no response was involved.
/// Serializes as `{ "success": false, "message", "code", "data"? }`.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{message}")]
pub struct NormalizedError {
    kind: ErrorKind,
    message: String,
    code: u16,
    data: Option<serde_json::Value>,
}

impl NormalizedError {
    pub(crate) fn new(
        kind: ErrorKind,
        message: impl Into<String>,
        code: u16,
        data: Option<serde_json::Value>,
    ) -> Self {
        Self {
            kind,
            message: message.into(),
            code,
            data,
        }
    }

    /// Terminal authentication failure shared by every caller of a failed refresh.
    pub fn session_expired() -> Self {
        Self::new(
            ErrorKind::AuthFailed,
            crate::normalizer::SESSION_EXPIRED_MESSAGE,
            401,
            None,
        )
    }

    /// Always `false`; kept for parity with the serialized shape.
    pub fn success(&self) -> bool {
        false
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn code(&self) -> u16 {
        self.code
    }

    pub fn data(&self) -> Option<&serde_json::Value> {
        self.data.as_ref()
    }
}

impl Serialize for NormalizedError {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let len = if self.data.is_some() { 4 } else { 3 };
        let mut s = serializer.serialize_struct("NormalizedError", len)?;
        s.serialize_field("success", &false)?;
        s.serialize_field("message", &self.message)?;
        s.serialize_field("code", &self.code)?;
        if let Some(data) = &self.data {
            s.serialize_field("data", data)?;
        }
        s.end()
    }
}
