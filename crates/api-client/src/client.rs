//! Client facade

use std::sync::Arc;

use reqwest::Method;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};
use transport::{ApiRequest, Transport};

use laundry_auth::{Credentials, LoginResponse};

use crate::augmenter::{Augmenter, REQUEST_ID_HEADER};
use crate::config::ClientConfig;
use crate::coordinator::RefreshCoordinator;
use crate::error::{ErrorKind, NormalizedError, classify_failure};
use crate::hooks::Hooks;
use crate::normalizer::{Normalizer, RawFailure};

/// Intercepted API client. Cheap to clone; clones share one coordinator.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<Inner>,
}

struct Inner {
    config: ClientConfig,
    /// Bare transport: no augmentation, no interception
    transport: Arc<dyn Transport>,
    credentials: Credentials,
    augmenter: Arc<Augmenter>,
    normalizer: Arc<Normalizer>,
    coordinator: Arc<RefreshCoordinator>,
}

impl ApiClient {
    pub fn new(
        config: &ClientConfig,
        transport: Arc<dyn Transport>,
        credentials: Credentials,
        hooks: Hooks,
    ) -> Self {
        let augmenter = Arc::new(Augmenter::new(
            credentials.clone(),
            &config.user_agent,
            &config.headers,
        ));
        let normalizer = Arc::new(Normalizer::new(hooks.notifier));
        let coordinator = Arc::new(RefreshCoordinator::new(
            Arc::clone(&transport),
            config.url(&config.refresh_path),
            credentials.clone(),
            Arc::clone(&augmenter),
            Arc::clone(&normalizer),
            hooks.session,
        ));

        info!(
            base_url = %config.base_url,
            transport = transport.id(),
            "api client ready"
        );

        Self {
            inner: Arc::new(Inner {
                config: config.clone(),
                transport,
                credentials,
                augmenter,
                normalizer,
                coordinator,
            }),
        }
    }

    pub fn coordinator(&self) -> &Arc<RefreshCoordinator> {
        &self.inner.coordinator
    }

    pub fn credentials(&self) -> &Credentials {
        &self.inner.credentials
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, NormalizedError> {
        let payload = self.request(Method::GET, path, None).await?;
        self.decode(payload)
    }

    pub async fn post<B, T>(&self, path: &str, body: &B) -> Result<T, NormalizedError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let body = self.encode(body)?;
        let payload = self.request(Method::POST, path, body).await?;
        self.decode(payload)
    }

    pub async fn put<B, T>(&self, path: &str, body: &B) -> Result<T, NormalizedError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let body = self.encode(body)?;
        let payload = self.request(Method::PUT, path, body).await?;
        self.decode(payload)
    }

    pub async fn patch<B, T>(&self, path: &str, body: &B) -> Result<T, NormalizedError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let body = self.encode(body)?;
        let payload = self.request(Method::PATCH, path, body).await?;
        self.decode(payload)
    }

    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T, NormalizedError> {
        let payload = self.request(Method::DELETE, path, None).await?;
        self.decode(payload)
    }

    /// Augment, send, and route the outcome. Returns the raw JSON payload.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> Result<serde_json::Value, NormalizedError> {
        let label = method.as_str().to_string();
        let outcome = self.dispatch(method, path, body).await;

        let result_label = match &outcome {
            Ok(_) => "success",
            Err(e) => e.kind().label(),
        };
        crate::metrics::record_request(&label, result_label);
        outcome
    }

    async fn dispatch(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> Result<serde_json::Value, NormalizedError> {
        let mut request = ApiRequest::new(method, self.inner.config.url(path));
        if let Some(body) = body {
            request = request.with_body(body);
        }
        let sent_with = self.inner.augmenter.augment(&mut request).await;

        // Keep a copy only when a 401 could send it to the coordinator
        let replay = sent_with.as_ref().map(|_| request.clone());

        let request_id = request
            .headers
            .get(REQUEST_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_owned();
        debug!(
            method = %request.method,
            url = %request.url,
            request_id = %request_id,
            authenticated = sent_with.is_some(),
            "sending request"
        );
        let response = match self.inner.transport.send(request).await {
            Ok(response) => response,
            Err(e) => return Err(self.inner.normalizer.report(e.into())),
        };

        if response.is_success() {
            return Ok(response.body.into_value());
        }

        if classify_failure(response.status, sent_with.is_some()) == ErrorKind::AuthExpired
            && let (Some(request), Some(token)) = (replay, sent_with)
        {
            debug!(request_id = %request_id, "access token rejected, handing to refresh coordinator");
            return self.inner.coordinator.recover(request, token).await;
        }

        Err(self.inner.normalizer.report(RawFailure::Http {
            status: response.status,
            body: response.body,
        }))
    }

    /// Sign in through the bare transport and persist the issued tokens.
    ///
    /// A 401 here means bad credentials and is normalized like any other
    /// failure; it never triggers a refresh.
    pub async fn login<B: Serialize + ?Sized>(
        &self,
        body: &B,
    ) -> Result<LoginResponse, NormalizedError> {
        let body = self.encode(body)?.unwrap_or(serde_json::Value::Null);
        let url = self.inner.config.url(&self.inner.config.login_path);

        let response = laundry_auth::login(self.inner.transport.as_ref(), &url, body)
            .await
            .map_err(|e| self.inner.normalizer.report(e.into()))?;

        self.inner
            .credentials
            .store_login(&response)
            .await
            .map_err(|e| {
                self.inner.normalizer.report(RawFailure::Construction {
                    reason: Some(format!("could not save credentials: {e}")),
                })
            })?;

        info!(has_refresh_token = response.refresh_token.is_some(), "signed in");
        Ok(response)
    }

    /// Forget all stored credentials.
    pub async fn logout(&self) -> laundry_auth::Result<()> {
        self.inner.credentials.clear().await?;
        info!("signed out");
        Ok(())
    }

    /// Cached user profile from the last sign-in, if still valid.
    pub async fn current_user(&self) -> Option<serde_json::Value> {
        self.inner.credentials.user().await
    }

    fn encode<B: Serialize + ?Sized>(
        &self,
        body: &B,
    ) -> Result<Option<serde_json::Value>, NormalizedError> {
        match serde_json::to_value(body) {
            Ok(serde_json::Value::Null) => Ok(None),
            Ok(value) => Ok(Some(value)),
            Err(e) => Err(self.inner.normalizer.report(RawFailure::Construction {
                reason: Some(format!("could not encode request body: {e}")),
            })),
        }
    }

    fn decode<T: DeserializeOwned>(&self, payload: serde_json::Value) -> Result<T, NormalizedError> {
        serde_json::from_value(payload).map_err(|e| {
            warn!(error = %e, "response payload did not match the expected type");
            self.inner.normalizer.report(RawFailure::Construction {
                reason: Some(format!("unexpected response payload: {e}")),
            })
        })
    }
}
