//! Shared types for the laundry API client workspace

mod error;
mod secret;

pub use error::{Error, Result};
pub use secret::Secret;
