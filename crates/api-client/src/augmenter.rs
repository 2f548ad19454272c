//! Request augmentation
//!
//! Attaches the standard headers, a request id, and the current bearer token
//! to every outbound request. A missing token is not an error here; the
//! server decides whether the call needed one.

use std::str::FromStr;

use common::Secret;
use laundry_auth::Credentials;
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderName, HeaderValue, USER_AGENT};
use tracing::warn;
use transport::ApiRequest;

use crate::config::HeaderInjection;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

pub struct Augmenter {
    credentials: Credentials,
    defaults: HeaderMap,
}

impl Augmenter {
    /// Build the default header set. Invalid injections are skipped with a
    /// warning, and none may set `Authorization`.
    pub fn new(credentials: Credentials, user_agent: &str, injections: &[HeaderInjection]) -> Self {
        let mut defaults = HeaderMap::new();
        defaults.insert(ACCEPT, HeaderValue::from_static("application/json"));
        match HeaderValue::from_str(user_agent) {
            Ok(v) => {
                defaults.insert(USER_AGENT, v);
            }
            Err(e) => warn!(user_agent, error = %e, "skipping invalid user agent"),
        }

        for injection in injections {
            let name = match HeaderName::from_str(&injection.name) {
                Ok(n) => n,
                Err(e) => {
                    warn!(header = %injection.name, error = %e, "skipping invalid header name");
                    continue;
                }
            };
            if name == AUTHORIZATION {
                warn!(header = %injection.name, "refusing to inject authorization header");
                continue;
            }
            let value = match HeaderValue::from_str(&injection.value) {
                Ok(v) => v,
                Err(e) => {
                    warn!(header = %injection.name, error = %e, "skipping invalid header value");
                    continue;
                }
            };
            defaults.insert(name, value);
        }

        Self {
            credentials,
            defaults,
        }
    }

    /// Attach the stored access token (if any) and default headers.
    ///
    /// Returns the token that was attached, so a later 401 can be matched
    /// against the credential epoch it was sent in.
    pub async fn augment(&self, request: &mut ApiRequest) -> Option<Secret<String>> {
        let token = self.credentials.access_token().await;
        self.apply(request, token.as_ref());
        token
    }

    /// Attach default headers and the given token. Headers the caller set
    /// explicitly are kept; the bearer is always replaced.
    pub fn apply(&self, request: &mut ApiRequest, token: Option<&Secret<String>>) {
        for (name, value) in &self.defaults {
            if !request.headers.contains_key(name) {
                request.headers.insert(name.clone(), value.clone());
            }
        }

        if !request.headers.contains_key(REQUEST_ID_HEADER) {
            let id = format!("req_{}", uuid::Uuid::new_v4().as_simple());
            if let Ok(v) = HeaderValue::from_str(&id) {
                request
                    .headers
                    .insert(HeaderName::from_static(REQUEST_ID_HEADER), v);
            }
        }

        request.headers.remove(AUTHORIZATION);
        if let Some(token) = token {
            match HeaderValue::from_str(&format!("Bearer {}", token.expose())) {
                Ok(mut v) => {
                    v.set_sensitive(true);
                    request.headers.insert(AUTHORIZATION, v);
                }
                Err(e) => warn!(error = %e, "stored access token is not a valid header value"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use laundry_auth::{ACCESS_TOKEN_KEY, KeyValueStore, MemoryStore, TokenTtl};
    use reqwest::Method;
    use std::sync::Arc;

    fn augmenter(injections: &[HeaderInjection]) -> (Arc<MemoryStore>, Augmenter) {
        let store = Arc::new(MemoryStore::new());
        let creds = Credentials::new(store.clone(), TokenTtl::default());
        (store, Augmenter::new(creds, "laundry-test/1.0", injections))
    }

    fn injection(name: &str, value: &str) -> HeaderInjection {
        HeaderInjection {
            name: name.into(),
            value: value.into(),
        }
    }

    #[tokio::test]
    async fn attaches_bearer_when_token_stored() {
        let (store, augmenter) = augmenter(&[]);
        store.set(ACCESS_TOKEN_KEY, "T1".into(), 7).await.unwrap();

        let mut req = ApiRequest::new(Method::GET, "https://api.example.com/orders");
        let attached = augmenter.augment(&mut req).await;

        assert_eq!(attached.unwrap().expose(), "T1");
        assert_eq!(req.bearer_token(), Some("T1"));
        assert!(req.headers.get(AUTHORIZATION).unwrap().is_sensitive());
        assert_eq!(req.headers.get(ACCEPT).unwrap(), "application/json");
        assert_eq!(req.headers.get(USER_AGENT).unwrap(), "laundry-test/1.0");
        assert!(
            req.headers
                .get(REQUEST_ID_HEADER)
                .unwrap()
                .to_str()
                .unwrap()
                .starts_with("req_")
        );
    }

    #[tokio::test]
    async fn leaves_authorization_absent_without_token() {
        let (_, augmenter) = augmenter(&[]);
        let mut req = ApiRequest::new(Method::GET, "https://api.example.com/services");
        let attached = augmenter.augment(&mut req).await;

        assert!(attached.is_none());
        assert!(req.headers.get(AUTHORIZATION).is_none());
    }

    #[test]
    fn apply_replaces_stale_bearer() {
        let (_, augmenter) = augmenter(&[]);
        let mut req = ApiRequest::new(Method::GET, "https://api.example.com/orders");
        augmenter.apply(&mut req, Some(&Secret::from("T1")));
        let request_id = req.headers.get(REQUEST_ID_HEADER).cloned();

        augmenter.apply(&mut req, Some(&Secret::from("T2")));
        assert_eq!(req.bearer_token(), Some("T2"));
        assert_eq!(
            req.headers.get(REQUEST_ID_HEADER).cloned(),
            request_id,
            "replays keep their request id"
        );
    }

    #[test]
    fn injects_configured_headers_but_never_authorization() {
        let (_, augmenter) = augmenter(&[
            injection("authorization", "Bearer INJECTED"),
            injection("x-storefront", "web"),
            injection("invalid header name", "v"),
        ]);
        let mut req = ApiRequest::new(Method::GET, "https://api.example.com/orders");
        augmenter.apply(&mut req, None);

        assert!(req.headers.get(AUTHORIZATION).is_none());
        assert_eq!(req.headers.get("x-storefront").unwrap(), "web");
        assert_eq!(req.headers.len(), 4);
    }

    #[test]
    fn caller_headers_win_over_defaults() {
        let (_, augmenter) = augmenter(&[injection("x-storefront", "web")]);
        let mut req = ApiRequest::new(Method::GET, "https://api.example.com/orders");
        req.headers
            .insert("x-storefront", HeaderValue::from_static("admin"));
        augmenter.apply(&mut req, None);

        assert_eq!(req.headers.get("x-storefront").unwrap(), "admin");
    }
}
