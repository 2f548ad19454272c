//! Transport abstraction for outbound API calls
//!
//! Defines the `Transport` trait that performs exactly one HTTP exchange.
//! Everything above it (token injection, refresh coordination, error
//! normalization) is layered on top in `api-client`; the refresh and login
//! calls in `laundry-auth` use a transport directly so they bypass that
//! pipeline.
//!
//! A transport returns `Ok` for every response the server sent, whatever its
//! status. `Err` is reserved for exchanges that produced no response at all.

pub mod reqwest_transport;

pub use reqwest_transport::ReqwestTransport;

use std::future::Future;
use std::pin::Pin;

use reqwest::Method;
use reqwest::header::{AUTHORIZATION, HeaderMap};

/// Boxed future used by the dyn-compatible traits in this workspace.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Outbound request descriptor.
///
/// Cheap enough to clone so a request can be captured for replay after a
/// credential refresh.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub body: Option<serde_json::Value>,
}

impl ApiRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HeaderMap::new(),
            body: None,
        }
    }

    /// Attach a JSON body. `Value::Null` means "no body".
    pub fn with_body(mut self, body: serde_json::Value) -> Self {
        self.body = if body.is_null() { None } else { Some(body) };
        self
    }

    /// The bearer token currently set on this request, if any.
    pub fn bearer_token(&self) -> Option<&str> {
        self.headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
    }
}

/// Decoded response body.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    Empty,
    Json(serde_json::Value),
    Text(String),
}

impl ResponseBody {
    /// Classify raw response text: blank is `Empty`, valid JSON is `Json`,
    /// anything else is kept verbatim as `Text`.
    pub fn from_text(text: String) -> Self {
        if text.trim().is_empty() {
            return ResponseBody::Empty;
        }
        match serde_json::from_str(&text) {
            Ok(value) => ResponseBody::Json(value),
            Err(_) => ResponseBody::Text(text),
        }
    }

    /// Convert into a JSON value (`Null` for empty, `String` for text).
    pub fn into_value(self) -> serde_json::Value {
        match self {
            ResponseBody::Empty => serde_json::Value::Null,
            ResponseBody::Json(value) => value,
            ResponseBody::Text(text) => serde_json::Value::String(text),
        }
    }
}

/// A response the server actually sent, any status.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: u16,
    pub body: ResponseBody,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Exchanges that never produced a response.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// Sent (or attempted) but nothing came back: DNS, refused, timeout, reset.
    #[error("no response received: {0}")]
    Network(String),

    /// The request could not be built or dispatched at all.
    #[error("request could not be sent: {0}")]
    Construction(String),
}

/// Result alias for transport operations.
pub type Result<T> = std::result::Result<T, TransportError>;

/// Performs a single HTTP request/response exchange.
///
/// Uses `BoxFuture` return types for dyn-compatibility (`Arc<dyn Transport>`).
pub trait Transport: Send + Sync {
    /// Identifier for logging (e.g. "reqwest")
    fn id(&self) -> &str;

    fn send(&self, request: ApiRequest) -> BoxFuture<'_, Result<ApiResponse>>;
}
