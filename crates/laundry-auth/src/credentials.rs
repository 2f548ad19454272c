//! Typed access to the stored credential set
//!
//! `Credentials` is the only writer of the token keys. The access token is
//! replaced only by a successful login or refresh, and all keys are removed
//! together on logout or unrecoverable refresh failure.

use std::sync::Arc;

use common::Secret;
use tracing::{debug, info, warn};

use crate::constants::{
    ACCESS_TOKEN_KEY, ALL_KEYS, DEFAULT_REFRESH_TTL_DAYS, DEFAULT_TOKEN_TTL_DAYS,
    REFRESH_TOKEN_KEY, TOKEN_EXPIRES_KEY, USER_KEY,
};
use crate::error::Result;
use crate::store::{KeyValueStore, now_millis};
use crate::token::{LoginResponse, TokenResponse};

/// Snapshot of the stored credential set.
#[derive(Debug, Clone)]
pub struct Credential {
    pub access_token: Secret<String>,
    pub refresh_token: Option<Secret<String>>,
    /// Access token expiry as unix millis, when the server told us
    pub expires_hint: Option<u64>,
}

/// Time-to-live for stored entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenTtl {
    /// Access token, cached user and expiry hint
    pub access_days: u32,
    pub refresh_days: u32,
}

impl Default for TokenTtl {
    fn default() -> Self {
        Self {
            access_days: DEFAULT_TOKEN_TTL_DAYS,
            refresh_days: DEFAULT_REFRESH_TTL_DAYS,
        }
    }
}

/// Credential accessors over a shared key/value store.
#[derive(Clone)]
pub struct Credentials {
    store: Arc<dyn KeyValueStore>,
    ttl: TokenTtl,
}

impl Credentials {
    pub fn new(store: Arc<dyn KeyValueStore>, ttl: TokenTtl) -> Self {
        Self { store, ttl }
    }

    async fn token(&self, key: &str) -> Option<Secret<String>> {
        self.store
            .get(key)
            .await
            .map(Secret::new)
            .filter(|t| !t.is_blank())
    }

    pub async fn access_token(&self) -> Option<Secret<String>> {
        self.token(ACCESS_TOKEN_KEY).await
    }

    pub async fn refresh_token(&self) -> Option<Secret<String>> {
        self.token(REFRESH_TOKEN_KEY).await
    }

    /// Full snapshot, `None` when there is no access token.
    pub async fn current(&self) -> Option<Credential> {
        let access_token = self.access_token().await?;
        let expires_hint = self
            .store
            .get(TOKEN_EXPIRES_KEY)
            .await
            .and_then(|v| v.parse().ok());
        Some(Credential {
            access_token,
            refresh_token: self.refresh_token().await,
            expires_hint,
        })
    }

    /// Cached user profile. Unparseable cache entries read as absent.
    pub async fn user(&self) -> Option<serde_json::Value> {
        let raw = self.store.get(USER_KEY).await?;
        match serde_json::from_str(&raw) {
            Ok(user) => Some(user),
            Err(e) => {
                warn!(error = %e, "ignoring unparseable cached user profile");
                None
            }
        }
    }

    /// Persist everything a successful login returned.
    pub async fn store_login(&self, login: &LoginResponse) -> Result<()> {
        self.store
            .set(
                ACCESS_TOKEN_KEY,
                login.token.expose().clone(),
                self.ttl.access_days,
            )
            .await?;
        match &login.refresh_token {
            Some(refresh) => {
                self.store
                    .set(
                        REFRESH_TOKEN_KEY,
                        refresh.expose().clone(),
                        self.ttl.refresh_days,
                    )
                    .await?
            }
            // A login without a refresh token must not leave an older one behind
            None => self.store.clear(REFRESH_TOKEN_KEY).await?,
        }
        match &login.user {
            Some(user) => {
                self.store
                    .set(USER_KEY, user.to_string(), self.ttl.access_days)
                    .await?
            }
            None => self.store.clear(USER_KEY).await?,
        }
        self.store_expiry(login.expires_in).await?;
        info!("stored credentials from login");
        Ok(())
    }

    /// Persist a refreshed access token, and the rotated refresh token if
    /// the server sent one.
    pub async fn store_refresh(&self, refreshed: &TokenResponse) -> Result<()> {
        self.store
            .set(
                ACCESS_TOKEN_KEY,
                refreshed.token.expose().clone(),
                self.ttl.access_days,
            )
            .await?;
        if let Some(refresh) = &refreshed.refresh_token {
            self.store
                .set(
                    REFRESH_TOKEN_KEY,
                    refresh.expose().clone(),
                    self.ttl.refresh_days,
                )
                .await?;
            debug!("refresh token rotated");
        }
        self.store_expiry(refreshed.expires_in).await
    }

    async fn store_expiry(&self, expires_in: Option<u64>) -> Result<()> {
        match expires_in {
            Some(secs) => {
                let at = now_millis().saturating_add(secs.saturating_mul(1000));
                self.store
                    .set(TOKEN_EXPIRES_KEY, at.to_string(), self.ttl.access_days)
                    .await
            }
            None => self.store.clear(TOKEN_EXPIRES_KEY).await,
        }
    }

    /// Remove every credential key. Attempts all keys even if one fails and
    /// reports the first failure.
    pub async fn clear(&self) -> Result<()> {
        let mut first_err = None;
        for key in ALL_KEYS {
            if let Err(e) = self.store.clear(key).await {
                warn!(key, error = %e, "failed to clear credential entry");
                first_err.get_or_insert(e);
            }
        }
        info!("cleared stored credentials");
        first_err.map_or(Ok(()), Err)
    }
}
