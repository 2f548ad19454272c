//! Error normalization
//!
//! Every failed call passes through here exactly once. The raw failure is a
//! closed set (`RawFailure`); `normalize` maps it to a `NormalizedError`
//! without side effects, and `Normalizer::report` additionally logs it and
//! announces the message through the host's `Notifier`.
//!
//! Message precedence for server responses:
//! 1. `message` field of a structured body (string, or list of strings)
//! 2. text before the first `:` of a string body
//! 3. the whole string body
//! 4. a default phrase for the status code

use std::sync::Arc;

use tracing::warn;
use transport::{ResponseBody, TransportError};

use crate::error::{ErrorKind, NormalizedError, classify_status};
use crate::hooks::Notifier;

pub const NETWORK_UNREACHABLE_MESSAGE: &str =
    "Unable to reach the server. Please check your connection and try again.";

pub const UNEXPECTED_MESSAGE: &str = "An unexpected error occurred. Please try again.";

pub const SESSION_EXPIRED_MESSAGE: &str = "Your session has expired. Please log in again.";

/// How a transport call failed.
#[derive(Debug, Clone, PartialEq)]
pub enum RawFailure {
    /// The server responded with a non-2xx status.
    Http { status: u16, body: ResponseBody },
    /// No response was received.
    Network { reason: String },
    /// The request could not be built or sent, or anything else went wrong
    /// outside the exchange (e.g. the payload didn't decode).
    Construction { reason: Option<String> },
}

impl From<TransportError> for RawFailure {
    fn from(e: TransportError) -> Self {
        match e {
            TransportError::Network(reason) => RawFailure::Network { reason },
            TransportError::Construction(reason) => RawFailure::Construction {
                reason: Some(reason),
            },
        }
    }
}

impl From<laundry_auth::Error> for RawFailure {
    fn from(e: laundry_auth::Error) -> Self {
        match e {
            laundry_auth::Error::Rejected { status, body } => RawFailure::Http { status, body },
            laundry_auth::Error::Transport(t) => t.into(),
            other => RawFailure::Construction {
                reason: Some(other.to_string()),
            },
        }
    }
}

fn default_message(status: u16) -> &'static str {
    match status {
        400 => "The request was invalid. Please check your input.",
        401 => "Authentication required. Please log in.",
        403 => "You do not have permission to perform this action.",
        404 => "The requested resource was not found.",
        409 => "This request conflicts with the current state of the resource.",
        422 => "Some of the submitted data is invalid.",
        500..=599 => "The server encountered an error. Please try again later.",
        _ => UNEXPECTED_MESSAGE,
    }
}

fn non_blank(s: &str) -> Option<String> {
    let trimmed = s.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn message_from_string(body: &str) -> Option<String> {
    match body.split_once(':') {
        Some((head, _)) => non_blank(head).or_else(|| non_blank(body)),
        None => non_blank(body),
    }
}

fn message_from_field(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => non_blank(s),
        serde_json::Value::Array(items) => {
            let parts: Vec<&str> = items
                .iter()
                .filter_map(|v| v.as_str())
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .collect();
            (!parts.is_empty()).then(|| parts.join(", "))
        }
        _ => None,
    }
}

fn extract_message(body: &ResponseBody) -> Option<String> {
    match body {
        ResponseBody::Json(serde_json::Value::Object(map)) => {
            map.get("message").and_then(message_from_field)
        }
        ResponseBody::Json(serde_json::Value::String(s)) | ResponseBody::Text(s) => {
            message_from_string(s)
        }
        _ => None,
    }
}

fn structured_data(body: &ResponseBody) -> Option<serde_json::Value> {
    match body {
        ResponseBody::Json(v @ (serde_json::Value::Object(_) | serde_json::Value::Array(_))) => {
            Some(v.clone())
        }
        _ => None,
    }
}

/// Map a raw failure to its normalized form. Pure and deterministic.
pub fn normalize(failure: &RawFailure) -> NormalizedError {
    match failure {
        RawFailure::Http { status, body } => {
            let message =
                extract_message(body).unwrap_or_else(|| default_message(*status).to_string());
            NormalizedError::new(
                classify_status(*status),
                message,
                *status,
                structured_data(body),
            )
        }
        RawFailure::Network { .. } => NormalizedError::new(
            ErrorKind::NetworkUnreachable,
            NETWORK_UNREACHABLE_MESSAGE,
            0,
            None,
        ),
        RawFailure::Construction { reason } => {
            let message = reason
                .as_deref()
                .and_then(non_blank)
                .unwrap_or_else(|| UNEXPECTED_MESSAGE.to_string());
            NormalizedError::new(ErrorKind::Unexpected, message, 0, None)
        }
    }
}

/// Normalizes failures and announces them to the user.
pub struct Normalizer {
    notifier: Arc<dyn Notifier>,
}

impl Normalizer {
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self { notifier }
    }

    /// Normalize, log and announce a failure. Call once per failed call.
    pub fn report(&self, failure: RawFailure) -> NormalizedError {
        let err = normalize(&failure);
        match &failure {
            RawFailure::Network { reason } => {
                warn!(reason, kind = err.kind().label(), "request failed without a response")
            }
            RawFailure::Construction { reason } => {
                warn!(reason = ?reason, kind = err.kind().label(), "request failed before completion")
            }
            RawFailure::Http { status, .. } => {
                warn!(status, kind = err.kind().label(), error_message = err.message(), "request rejected")
            }
        }
        self.announce(&err);
        err
    }

    /// Send an already-built error's message to the notifier.
    pub fn announce(&self, err: &NormalizedError) {
        self.notifier.notify(err.message());
    }
}
