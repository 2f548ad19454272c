//! Login and token refresh calls
//!
//! Both POST JSON to the API's auth endpoints through a bare `Transport`:
//! no bearer injection and no 401 interception. A 401 from the login
//! endpoint means bad credentials and a failed refresh means the session is
//! over; neither may start another refresh.

use common::Secret;
use reqwest::Method;
use reqwest::header::{ACCEPT, HeaderValue};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use transport::{ApiRequest, Transport};

use crate::error::{Error, Result};

/// Refresh endpoint response. `refreshToken` is present only when the
/// server rotates it.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    pub token: Secret<String>,
    #[serde(default)]
    pub refresh_token: Option<Secret<String>>,
    /// Seconds until the access token expires (delta, not absolute)
    #[serde(default)]
    pub expires_in: Option<u64>,
}

/// Login endpoint response.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub token: Secret<String>,
    #[serde(default)]
    pub refresh_token: Option<Secret<String>>,
    /// Profile cached for the UI
    #[serde(default)]
    pub user: Option<serde_json::Value>,
    #[serde(default)]
    pub expires_in: Option<u64>,
}

/// Exchange a refresh token for a new access token.
pub async fn refresh_token(
    transport: &dyn Transport,
    url: &str,
    refresh: &Secret<String>,
) -> Result<TokenResponse> {
    let body = serde_json::json!({ "refreshToken": refresh.expose() });
    let response: TokenResponse = post_json(transport, url, body).await?;
    if response.token.is_blank() {
        return Err(Error::InvalidResponse(
            "refresh response carried an empty token".into(),
        ));
    }
    Ok(response)
}

/// Authenticate with whatever body the login endpoint expects
/// (typically `{ "email", "password" }`).
pub async fn login(
    transport: &dyn Transport,
    url: &str,
    body: serde_json::Value,
) -> Result<LoginResponse> {
    post_json(transport, url, body).await
}

async fn post_json<T: DeserializeOwned>(
    transport: &dyn Transport,
    url: &str,
    body: serde_json::Value,
) -> Result<T> {
    let mut request = ApiRequest::new(Method::POST, url).with_body(body);
    request
        .headers
        .insert(ACCEPT, HeaderValue::from_static("application/json"));

    let response = transport.send(request).await.map_err(|e| {
        warn!(url, error = %e, "token endpoint unreachable");
        Error::Transport(e)
    })?;

    if !response.is_success() {
        debug!(url, status = response.status, "token endpoint rejected request");
        return Err(Error::Rejected {
            status: response.status,
            body: response.body,
        });
    }

    serde_json::from_value(response.body.into_value())
        .map_err(|e| Error::InvalidResponse(e.to_string()))
}
