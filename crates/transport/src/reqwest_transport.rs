//! reqwest-backed transport.
//!
//! The production `Transport`. Holds a shared `reqwest::Client` (connection
//! pooling) and applies a per-request timeout.

use std::time::Duration;

use tracing::debug;

use crate::{ApiRequest, ApiResponse, BoxFuture, ResponseBody, Transport, TransportError};

pub struct ReqwestTransport {
    client: reqwest::Client,
    timeout: Duration,
}

impl ReqwestTransport {
    pub fn new(client: reqwest::Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }
}

impl Transport for ReqwestTransport {
    fn id(&self) -> &str {
        "reqwest"
    }

    fn send(&self, request: ApiRequest) -> BoxFuture<'_, crate::Result<ApiResponse>> {
        Box::pin(async move {
            let ApiRequest {
                method,
                url,
                headers,
                body,
            } = request;

            let mut builder = self
                .client
                .request(method.clone(), &url)
                .headers(headers)
                .timeout(self.timeout);
            if let Some(body) = &body {
                builder = builder.json(body);
            }

            let response = builder.send().await.map_err(classify_send_error)?;
            let status = response.status().as_u16();
            let text = response
                .text()
                .await
                .map_err(|e| TransportError::Network(format!("reading response body: {e}")))?;

            debug!(%method, url, status, "transport exchange complete");
            Ok(ApiResponse {
                status,
                body: ResponseBody::from_text(text),
            })
        })
    }
}

/// Builder errors (bad URL, unserializable body) never left the process;
/// everything else is a failure to get a response.
fn classify_send_error(e: reqwest::Error) -> TransportError {
    if e.is_builder() {
        TransportError::Construction(e.to_string())
    } else {
        TransportError::Network(e.to_string())
    }
}
