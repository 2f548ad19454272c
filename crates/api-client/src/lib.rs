//! Outbound client for the laundry service API
//!
//! The only entry point the rest of the application uses. Each verb call runs
//! augment → send → classify:
//! - 2xx: the payload is decoded and returned, no envelope
//! - 401 on a request that carried a token: handed to the `RefreshCoordinator`,
//!   which refreshes the token at most once for every concurrent caller and
//!   replays the request with the new token
//! - anything else: handed to the `Normalizer`, which builds one
//!   `NormalizedError` and announces it through the host's `Notifier`
//!
//! Callers therefore see either their payload or a `NormalizedError`, never a
//! transport-specific error.

pub mod augmenter;
pub mod client;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod hooks;
pub mod metrics;
pub mod normalizer;

#[cfg(test)]
mod testing;

pub use augmenter::Augmenter;
pub use client::ApiClient;
pub use config::{ClientConfig, HeaderInjection};
pub use coordinator::RefreshCoordinator;
pub use error::{ErrorKind, NormalizedError, classify_failure, classify_status};
pub use hooks::{Hooks, LogNotifier, LogSessionHandler, Notifier, SessionHandler};
pub use normalizer::{Normalizer, RawFailure, normalize};
