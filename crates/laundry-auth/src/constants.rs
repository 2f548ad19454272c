//! Storage keys and endpoint defaults

/// Store key holding the bearer access token
pub const ACCESS_TOKEN_KEY: &str = "token";

/// Store key holding the refresh token
pub const REFRESH_TOKEN_KEY: &str = "refreshToken";

/// Store key holding the cached user profile (JSON text)
pub const USER_KEY: &str = "user";

/// Store key holding the access token expiry hint (unix millis)
pub const TOKEN_EXPIRES_KEY: &str = "tokenExpiresAt";

/// Every key `Credentials::clear()` removes.
pub const ALL_KEYS: &[&str] = &[
    ACCESS_TOKEN_KEY,
    REFRESH_TOKEN_KEY,
    USER_KEY,
    TOKEN_EXPIRES_KEY,
];

pub const DEFAULT_REFRESH_PATH: &str = "/auth/refresh-token";

pub const DEFAULT_LOGIN_PATH: &str = "/auth/login";

pub const DEFAULT_TOKEN_TTL_DAYS: u32 = 7;

pub const DEFAULT_REFRESH_TTL_DAYS: u32 = 30;
