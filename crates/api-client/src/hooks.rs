//! Ports into the host application
//!
//! The client never renders anything. It hands user-facing messages to a
//! `Notifier` and asks a `SessionHandler` to send the user back to sign-in
//! when the session can't be recovered. Both are fire-and-forget.

use std::sync::Arc;

use tracing::{info, warn};

/// Shows a single message to the user. Not awaited, not retried.
pub trait Notifier: Send + Sync {
    fn notify(&self, message: &str);
}

/// Navigates to the authentication entry point after an unrecoverable
/// authorization failure.
pub trait SessionHandler: Send + Sync {
    fn session_expired(&self);
}

/// Notifier that only logs.
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, message: &str) {
        info!(notification = message, "user notification");
    }
}

/// Session handler that only logs.
pub struct LogSessionHandler;

impl SessionHandler for LogSessionHandler {
    fn session_expired(&self) {
        warn!("session expired, re-authentication required");
    }
}

/// Host-supplied ports, shared by the normalizer and the coordinator.
#[derive(Clone)]
pub struct Hooks {
    pub notifier: Arc<dyn Notifier>,
    pub session: Arc<dyn SessionHandler>,
}

impl Default for Hooks {
    fn default() -> Self {
        Self {
            notifier: Arc::new(LogNotifier),
            session: Arc::new(LogSessionHandler),
        }
    }
}
