//! Test doubles shared by the client and coordinator tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use laundry_auth::{ACCESS_TOKEN_KEY, Credentials, KeyValueStore, MemoryStore, REFRESH_TOKEN_KEY, TokenTtl};
use serde_json::json;
use transport::{ApiRequest, ApiResponse, BoxFuture, ResponseBody, Transport, TransportError};

use crate::client::ApiClient;
use crate::config::ClientConfig;
use crate::hooks::{Hooks, Notifier, SessionHandler};

pub const BASE_URL: &str = "http://api.test";

/// Records notifications and redirects instead of showing them.
#[derive(Default)]
pub struct RecordingHooks {
    notifications: Mutex<Vec<String>>,
    redirects: AtomicUsize,
    panic_on_notify: bool,
}

impl RecordingHooks {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Records, then panics on every notification.
    pub fn panicking() -> Arc<Self> {
        Arc::new(Self {
            panic_on_notify: true,
            ..Self::default()
        })
    }

    pub fn notifications(&self) -> Vec<String> {
        self.notifications.lock().unwrap().clone()
    }

    pub fn redirects(&self) -> usize {
        self.redirects.load(Ordering::SeqCst)
    }
}

impl Notifier for RecordingHooks {
    fn notify(&self, message: &str) {
        self.notifications.lock().unwrap().push(message.to_string());
        if self.panic_on_notify {
            panic!("notifier failed: {message}");
        }
    }
}

impl SessionHandler for RecordingHooks {
    fn session_expired(&self) {
        self.redirects.fetch_add(1, Ordering::SeqCst);
    }
}

/// `MemoryStore` whose `clear` yields before clearing and whose `set` can
/// be made to panic.
pub struct FaultyStore {
    inner: Arc<MemoryStore>,
    clear_delay: Duration,
    panic_on_set: bool,
}

impl FaultyStore {
    pub fn slow_clear(inner: Arc<MemoryStore>, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            inner,
            clear_delay: delay,
            panic_on_set: false,
        })
    }

    pub fn panicking_set(inner: Arc<MemoryStore>) -> Arc<Self> {
        Arc::new(Self {
            inner,
            clear_delay: Duration::ZERO,
            panic_on_set: true,
        })
    }
}

impl KeyValueStore for FaultyStore {
    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Option<String>> {
        self.inner.get(key)
    }

    fn set<'a>(
        &'a self,
        key: &'a str,
        value: String,
        ttl_days: u32,
    ) -> BoxFuture<'a, laundry_auth::Result<()>> {
        if self.panic_on_set {
            panic!("store write failed for {key}");
        }
        self.inner.set(key, value, ttl_days)
    }

    fn clear<'a>(&'a self, key: &'a str) -> BoxFuture<'a, laundry_auth::Result<()>> {
        Box::pin(async move {
            tokio::time::sleep(self.clear_delay).await;
            self.inner.clear(key).await
        })
    }
}

/// In-memory store seeded with the given tokens.
pub async fn seeded_store(access: Option<&str>, refresh: Option<&str>) -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    if let Some(access) = access {
        store.set(ACCESS_TOKEN_KEY, access.to_string(), 7).await.unwrap();
    }
    if let Some(refresh) = refresh {
        store.set(REFRESH_TOKEN_KEY, refresh.to_string(), 30).await.unwrap();
    }
    store
}

pub enum RefreshBehavior {
    Issue {
        token: String,
        refresh: Option<String>,
    },
    Reject(u16),
    Unreachable,
}

/// Scripted laundry API.
///
/// - `/auth/refresh-token`: follows `RefreshBehavior` after `refresh_delay`
/// - `/auth/login`: accepts pat@example.com only
/// - `/missing` 404, `/boom` 500, `/conflict` 409, `/offline` no response
/// - anything else requires `Bearer <accepted>` and echoes path, token, body
pub struct MockApi {
    refresh: RefreshBehavior,
    refresh_delay: Duration,
    accepted: Mutex<String>,
    pub refresh_calls: AtomicUsize,
    calls: Mutex<Vec<ApiRequest>>,
}

impl MockApi {
    pub fn new(refresh: RefreshBehavior) -> Self {
        let accepted = match &refresh {
            RefreshBehavior::Issue { token, .. } => token.clone(),
            _ => "never-issued".to_string(),
        };
        Self {
            refresh,
            refresh_delay: Duration::ZERO,
            accepted: Mutex::new(accepted),
            refresh_calls: AtomicUsize::new(0),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Refresh succeeds with `token` and no rotated refresh token.
    pub fn issuing(token: &str) -> Self {
        Self::new(RefreshBehavior::Issue {
            token: token.to_string(),
            refresh: None,
        })
    }

    pub fn with_refresh_delay(mut self, delay: Duration) -> Self {
        self.refresh_delay = delay;
        self
    }

    /// Change which bearer token protected paths accept.
    pub fn accept(&self, token: &str) {
        *self.accepted.lock().unwrap() = token.to_string();
    }

    /// Calls to anything other than the auth endpoints.
    pub fn api_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn bearers(&self) -> Vec<Option<String>> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.bearer_token().map(str::to_string))
            .collect()
    }

    pub fn last_bearer(&self) -> Option<String> {
        self.bearers().pop().flatten()
    }

    async fn refresh_endpoint(&self) -> transport::Result<ApiResponse> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.refresh_delay).await;
        match &self.refresh {
            RefreshBehavior::Issue { token, refresh } => {
                let mut body = json!({ "token": token, "expiresIn": 900 });
                if let Some(refresh) = refresh {
                    body["refreshToken"] = json!(refresh);
                }
                Ok(json_response(200, body))
            }
            RefreshBehavior::Reject(status) => Ok(json_response(
                *status,
                json!({ "message": "Refresh token expired" }),
            )),
            RefreshBehavior::Unreachable => {
                Err(TransportError::Network("connection refused".into()))
            }
        }
    }

    fn login_endpoint(&self, request: &ApiRequest) -> ApiResponse {
        let email = request
            .body
            .as_ref()
            .and_then(|b| b["email"].as_str())
            .unwrap_or_default();
        if email == "pat@example.com" {
            json_response(
                200,
                json!({
                    "token": "T1",
                    "refreshToken": "R1",
                    "user": { "email": email, "role": "customer" },
                }),
            )
        } else {
            json_response(401, json!({ "message": "Invalid email or password" }))
        }
    }

    async fn api_endpoint(&self, path: &str, request: ApiRequest) -> transport::Result<ApiResponse> {
        self.calls.lock().unwrap().push(request.clone());
        tokio::time::sleep(Duration::from_millis(5)).await;

        let response = match path {
            "/missing" => json_response(404, json!({ "message": "Order not found" })),
            "/boom" => ApiResponse {
                status: 500,
                body: ResponseBody::Text(
                    "database unavailable: connection pool exhausted".into(),
                ),
            },
            "/conflict" => json_response(409, json!({ "message": "Slot taken", "slot": 3 })),
            "/offline" => return Err(TransportError::Network("no route to host".into())),
            _ => {
                let accepted = self.accepted.lock().unwrap().clone();
                match request.bearer_token() {
                    Some(token) if token == accepted => json_response(
                        200,
                        json!({ "path": path, "token": token, "body": request.body.clone() }),
                    ),
                    _ => ApiResponse {
                        status: 401,
                        body: ResponseBody::Text("jwt expired".into()),
                    },
                }
            }
        };
        Ok(response)
    }
}

fn json_response(status: u16, body: serde_json::Value) -> ApiResponse {
    ApiResponse {
        status,
        body: ResponseBody::Json(body),
    }
}

impl Transport for MockApi {
    fn id(&self) -> &str {
        "mock"
    }

    fn send(&self, request: ApiRequest) -> BoxFuture<'_, transport::Result<ApiResponse>> {
        Box::pin(async move {
            let path = request
                .url
                .strip_prefix(BASE_URL)
                .unwrap_or(&request.url)
                .to_string();
            match path.as_str() {
                "/auth/refresh-token" => self.refresh_endpoint().await,
                "/auth/login" => Ok(self.login_endpoint(&request)),
                _ => self.api_endpoint(&path, request).await,
            }
        })
    }
}

/// An `ApiClient` wired to a `MockApi`, an in-memory store and recording hooks.
pub struct Harness {
    pub api: Arc<MockApi>,
    pub client: ApiClient,
    pub credentials: Credentials,
    pub hooks: Arc<RecordingHooks>,
    config: ClientConfig,
}

impl Harness {
    pub async fn new(api: MockApi, access: Option<&str>, refresh: Option<&str>) -> Self {
        let store = seeded_store(access, refresh).await;
        Self::with_parts(api, store, RecordingHooks::new())
    }

    pub fn with_parts(
        api: MockApi,
        store: Arc<dyn KeyValueStore>,
        hooks: Arc<RecordingHooks>,
    ) -> Self {
        let api = Arc::new(api);
        let credentials = Credentials::new(store, TokenTtl::default());
        let config = ClientConfig::new(BASE_URL);
        let client = ApiClient::new(
            &config,
            api.clone(),
            credentials.clone(),
            Hooks {
                notifier: hooks.clone(),
                session: hooks.clone(),
            },
        );

        Self {
            api,
            client,
            credentials,
            hooks,
            config,
        }
    }

    pub fn url(&self, path: &str) -> String {
        self.config.url(path)
    }

    pub async fn wait_for_queue(&self, len: usize) {
        let coordinator = self.client.coordinator();
        tokio::time::timeout(Duration::from_secs(2), async {
            while coordinator.queued().await != Some(len) {
                tokio::time::sleep(Duration::from_millis(2)).await;
            }
        })
        .await
        .expect("queue never reached the expected length");
    }

    pub async fn wait_for_api_calls(&self, count: usize) {
        tokio::time::timeout(Duration::from_secs(2), async {
            while self.api.api_calls() < count {
                tokio::time::sleep(Duration::from_millis(2)).await;
            }
        })
        .await
        .expect("api never saw the expected calls");
    }
}
