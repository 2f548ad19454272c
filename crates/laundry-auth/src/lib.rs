//! Client-side credential handling for the laundry API
//!
//! Owns everything that reads or writes credentials: the durable key/value
//! store, typed accessors for the access token, refresh token and cached user
//! profile, and the two token endpoint calls (login and refresh). Those calls
//! go straight to a `Transport` and never through the intercepted client, so
//! a failing refresh can't trigger another refresh.
//!
//! Credential flow:
//! 1. Host calls `token::login()` → `Credentials::store_login()`
//! 2. Client attaches `Credentials::access_token()` to each request
//! 3. On 401 the coordinator calls `token::refresh_token()` once
//! 4. New tokens saved via `Credentials::store_refresh()`
//! 5. Logout or unrecoverable refresh failure → `Credentials::clear()`

pub mod constants;
pub mod credentials;
pub mod error;
pub mod store;
pub mod token;

pub use constants::*;
pub use credentials::{Credential, Credentials, TokenTtl};
pub use error::{Error, Result};
pub use store::{FileStore, KeyValueStore, MemoryStore};
pub use token::{LoginResponse, TokenResponse, login, refresh_token};
