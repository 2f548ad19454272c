//! Single-flight token refresh
//!
//! State machine:
//! - `Idle`: no refresh in flight, nothing queued
//! - `Refreshing { queue }`: exactly one refresh call outstanding; every
//!   request that hit a 401 meanwhile waits in `queue`
//!
//! Transitions:
//! - 401 while Idle, request carried the current token, refresh token stored
//!   → Refreshing, spawn the refresh
//! - 401 while Idle, request carried an older token → replay at once with the
//!   current token (another refresh already rotated it)
//! - 401 while Idle, no refresh token → clear credentials, end the session
//! - 401 while Idle, no access token → the session already ended; fail
//!   quietly without a second notification
//! - 401 while Refreshing → enqueue
//! - refresh succeeds → persist, take queue, Idle, replay every entry with
//!   the new token
//! - refresh fails (or its task panics) → clear credentials, take queue,
//!   Idle, reject every entry with the same error, end the session once
//! - replay gets 401 again → end the session once, no second refresh
//!
//! The refresh runs on its own task so a caller that stops waiting can't
//! cancel it or strand the queue. Each queued entry is answered exactly once,
//! whether or not its caller is still listening. Host hooks are only called
//! once the queue is drained.

use std::sync::Arc;

use common::Secret;
use futures_util::future::join_all;
use tokio::sync::{Mutex, oneshot};
use tracing::{debug, error, info, warn};
use transport::{ApiRequest, Transport};

use laundry_auth::{Credentials, TokenResponse};

use crate::augmenter::Augmenter;
use crate::error::NormalizedError;
use crate::hooks::SessionHandler;
use crate::normalizer::{Normalizer, RawFailure};

/// What a caller eventually receives: the decoded-later payload or the error.
pub(crate) type Outcome = Result<serde_json::Value, NormalizedError>;

/// A caller parked until the in-flight refresh settles.
struct PendingRequest {
    request: ApiRequest,
    responder: oneshot::Sender<Outcome>,
}

enum RefreshState {
    Idle,
    Refreshing { queue: Vec<PendingRequest> },
}

pub struct RefreshCoordinator {
    state: Mutex<RefreshState>,
    /// Used raw for the refresh call and for replays; never re-intercepted
    transport: Arc<dyn Transport>,
    refresh_url: String,
    credentials: Credentials,
    augmenter: Arc<Augmenter>,
    normalizer: Arc<Normalizer>,
    session: Arc<dyn SessionHandler>,
}

impl RefreshCoordinator {
    pub fn new(
        transport: Arc<dyn Transport>,
        refresh_url: String,
        credentials: Credentials,
        augmenter: Arc<Augmenter>,
        normalizer: Arc<Normalizer>,
        session: Arc<dyn SessionHandler>,
    ) -> Self {
        Self {
            state: Mutex::new(RefreshState::Idle),
            transport,
            refresh_url,
            credentials,
            augmenter,
            normalizer,
            session,
        }
    }

    /// `None` while Idle, `Some(queued callers)` while Refreshing.
    pub async fn queued(&self) -> Option<usize> {
        match &*self.state.lock().await {
            RefreshState::Idle => None,
            RefreshState::Refreshing { queue } => Some(queue.len()),
        }
    }

    /// Recover a request that got 401 after being sent with `sent_with`.
    pub(crate) async fn recover(
        self: &Arc<Self>,
        request: ApiRequest,
        sent_with: Secret<String>,
    ) -> Outcome {
        let (responder, waiter) = oneshot::channel();
        let pending = PendingRequest { request, responder };

        let mut state = self.state.lock().await;
        if let RefreshState::Refreshing { queue } = &mut *state {
            queue.push(pending);
            crate::metrics::record_queued();
            debug!(queued = queue.len(), "refresh in flight, request queued");
            drop(state);
            return wait(waiter).await;
        }

        // Idle. The state lock stays held while reading credentials so no
        // other caller can start a refresh in between.
        match self.credentials.access_token().await {
            None => {
                // Logged out or a failed refresh already ended the session
                // and announced it.
                drop(state);
                debug!("401 after the session ended");
                return Err(NormalizedError::session_expired());
            }
            Some(current) if current != sent_with => {
                drop(state);
                debug!("401 for a superseded token, replaying with current token");
                return self.replay(pending.request, &current).await;
            }
            Some(_) => {}
        }

        let Some(refresh) = self.credentials.refresh_token().await else {
            info!("401 with no refresh token stored, ending session");
            crate::metrics::record_refresh("skipped_no_refresh_token");
            // Cleared under the lock: concurrent 401s then find no access
            // token and fail quietly instead of ending the session again.
            self.clear_credentials().await;
            drop(state);
            self.announce_session_end();
            return Err(NormalizedError::session_expired());
        };

        *state = RefreshState::Refreshing {
            queue: vec![pending],
        };
        drop(state);

        let this = Arc::clone(self);
        tokio::spawn(async move { this.run_refresh(refresh).await });

        wait(waiter).await
    }

    /// Drive one refresh to completion and settle the queue.
    ///
    /// Store writes run on a child task so a panic there still settles the
    /// queue. Host hooks run only after the queue is back to `Idle`.
    async fn run_refresh(self: Arc<Self>, refresh: Secret<String>) {
        info!("access token rejected, refreshing");

        let worker = Arc::clone(&self);
        let refreshed = match tokio::spawn(async move { worker.refresh_and_persist(refresh).await })
            .await
        {
            Ok(refreshed) => refreshed,
            Err(e) => {
                error!(error = %e, "token refresh task panicked, ending session");
                None
            }
        };

        let queue = self.take_queue().await;

        match refreshed {
            Some(tokens) => {
                crate::metrics::record_refresh("success");
                info!(replays = queue.len(), "token refreshed, replaying queued requests");

                let this = &*self;
                let token = &tokens.token;
                join_all(queue.into_iter().map(|pending| async move {
                    let outcome = this.replay(pending.request, token).await;
                    if pending.responder.send(outcome).is_err() {
                        debug!("caller stopped waiting before its replay finished");
                    }
                }))
                .await;
            }
            None => {
                crate::metrics::record_refresh("failure");

                let err = NormalizedError::session_expired();
                for pending in queue {
                    if pending.responder.send(Err(err.clone())).is_err() {
                        debug!("caller stopped waiting before the refresh failed");
                    }
                }
                self.announce_session_end();
            }
        }
    }

    /// Call the refresh endpoint and persist the result. On failure the
    /// credentials are cleared before returning, so the state only goes back
    /// to `Idle` once a late 401 can no longer find the old refresh token.
    async fn refresh_and_persist(&self, refresh: Secret<String>) -> Option<TokenResponse> {
        match laundry_auth::refresh_token(self.transport.as_ref(), &self.refresh_url, &refresh)
            .await
        {
            Ok(tokens) => {
                if let Err(e) = self.credentials.store_refresh(&tokens).await {
                    warn!(error = %e, "failed to persist refreshed token, continuing with it in memory");
                }
                Some(tokens)
            }
            Err(e) => {
                warn!(error = %e, "token refresh failed, ending session");
                self.clear_credentials().await;
                None
            }
        }
    }

    async fn take_queue(&self) -> Vec<PendingRequest> {
        let mut state = self.state.lock().await;
        match std::mem::replace(&mut *state, RefreshState::Idle) {
            RefreshState::Refreshing { queue } => queue,
            RefreshState::Idle => Vec::new(),
        }
    }

    /// Re-send with `token`. A second 401 is final: the session ends and the
    /// request is not queued again.
    async fn replay(&self, mut request: ApiRequest, token: &Secret<String>) -> Outcome {
        self.augmenter.apply(&mut request, Some(token));
        match self.transport.send(request).await {
            Ok(response) if response.is_success() => Ok(response.body.into_value()),
            Ok(response) if response.status == 401 => {
                warn!("replayed request rejected, ending session");
                self.expire(token).await;
                Err(NormalizedError::session_expired())
            }
            Ok(response) => Err(self.normalizer.report(RawFailure::Http {
                status: response.status,
                body: response.body,
            })),
            Err(e) => Err(self.normalizer.report(e.into())),
        }
    }

    /// End the session because `rejected` was refused after a refresh.
    /// Several replays can be refused at once; only the first one that still
    /// finds `rejected` stored ends the session.
    async fn expire(&self, rejected: &Secret<String>) {
        let state = self.state.lock().await;
        if matches!(*state, RefreshState::Refreshing { .. }) {
            debug!("another refresh is in flight, leaving the session to it");
            return;
        }
        let still_stored = self
            .credentials
            .access_token()
            .await
            .is_some_and(|current| &current == rejected);
        if !still_stored {
            debug!("session already ended or renewed");
            return;
        }
        self.clear_credentials().await;
        drop(state);
        self.announce_session_end();
    }

    async fn clear_credentials(&self) {
        if let Err(e) = self.credentials.clear().await {
            warn!(error = %e, "failed to clear credentials");
        }
    }

    /// Tell the user and send them to sign-in. Runs once per ended session.
    fn announce_session_end(&self) {
        self.normalizer.announce(&NormalizedError::session_expired());
        self.session.session_expired();
    }
}

async fn wait(waiter: oneshot::Receiver<Outcome>) -> Outcome {
    waiter.await.unwrap_or_else(|_| {
        Err(crate::normalizer::normalize(&RawFailure::Construction {
            reason: Some("refresh coordinator dropped the request".into()),
        }))
    })
}
