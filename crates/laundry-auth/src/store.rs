//! Durable key/value storage for credentials
//!
//! Every value is written with a time-to-live in days; an expired entry reads
//! as absent. `FileStore` persists a JSON map to disk using atomic temp-file +
//! rename with 0600 permissions. `MemoryStore` has the same semantics without
//! persistence (tests, ephemeral sessions).
//!
//! Reads never fail: they serve the in-memory state. Only writes can hit I/O.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info};
use transport::BoxFuture;

use crate::error::{Error, Result};

const MILLIS_PER_DAY: u64 = 86_400_000;

/// Key/value store with per-entry expiry.
///
/// Uses `BoxFuture` return types for dyn-compatibility (`Arc<dyn KeyValueStore>`).
pub trait KeyValueStore: Send + Sync {
    /// Current value for `key`, or `None` if missing or expired.
    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Option<String>>;

    /// Store `value` under `key`, expiring `ttl_days` from now.
    fn set<'a>(&'a self, key: &'a str, value: String, ttl_days: u32) -> BoxFuture<'a, Result<()>>;

    /// Remove `key`. Removing a missing key is not an error.
    fn clear<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<()>>;
}

#[derive(Clone, Serialize, Deserialize)]
struct StoredEntry {
    value: String,
    /// Unix timestamp in milliseconds
    expires_at: u64,
}

impl StoredEntry {
    fn new(value: String, ttl_days: u32, now: u64) -> Self {
        Self {
            value,
            expires_at: now.saturating_add(u64::from(ttl_days) * MILLIS_PER_DAY),
        }
    }

    fn is_live(&self, now: u64) -> bool {
        self.expires_at > now
    }
}

pub(crate) fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

fn live_value(entries: &HashMap<String, StoredEntry>, key: &str) -> Option<String> {
    entries
        .get(key)
        .filter(|e| e.is_live(now_millis()))
        .map(|e| e.value.clone())
}

fn prune(entries: &mut HashMap<String, StoredEntry>) {
    let now = now_millis();
    entries.retain(|_, e| e.is_live(now));
}

/// File-backed store. The file is the single source of truth across runs.
pub struct FileStore {
    path: PathBuf,
    state: Mutex<HashMap<String, StoredEntry>>,
}

impl FileStore {
    /// Load entries from the given file path.
    ///
    /// If the file doesn't exist, creates it as `{}` (logged-out cold start).
    pub async fn load(path: PathBuf) -> Result<Self> {
        let state = if path.exists() {
            let contents = tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| Error::Io(format!("reading credential file: {e}")))?;
            let entries: HashMap<String, StoredEntry> = serde_json::from_str(&contents)
                .map_err(|e| Error::CredentialParse(format!("parsing credential file: {e}")))?;
            info!(path = %path.display(), keys = entries.len(), "loaded credential store");
            entries
        } else {
            info!(path = %path.display(), "credential file not found, starting logged out");
            let entries = HashMap::new();
            write_atomic(&path, &entries).await?;
            entries
        };

        Ok(Self {
            path,
            state: Mutex::new(state),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl KeyValueStore for FileStore {
    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Option<String>> {
        Box::pin(async move {
            let state = self.state.lock().await;
            live_value(&state, key)
        })
    }

    fn set<'a>(&'a self, key: &'a str, value: String, ttl_days: u32) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let mut state = self.state.lock().await;
            prune(&mut state);
            state.insert(key.to_string(), StoredEntry::new(value, ttl_days, now_millis()));
            debug!(key, ttl_days, "stored credential entry");
            write_atomic(&self.path, &state).await
        })
    }

    fn clear<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let mut state = self.state.lock().await;
            if state.remove(key).is_some() {
                debug!(key, "cleared credential entry");
                write_atomic(&self.path, &state).await?;
            }
            Ok(())
        })
    }
}

/// In-memory store with the same expiry semantics as `FileStore`.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<HashMap<String, StoredEntry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Option<String>> {
        Box::pin(async move {
            let state = self.state.lock().await;
            live_value(&state, key)
        })
    }

    fn set<'a>(&'a self, key: &'a str, value: String, ttl_days: u32) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let mut state = self.state.lock().await;
            prune(&mut state);
            state.insert(key.to_string(), StoredEntry::new(value, ttl_days, now_millis()));
            Ok(())
        })
    }

    fn clear<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            self.state.lock().await.remove(key);
            Ok(())
        })
    }
}

/// Write entries to a file atomically.
///
/// Writes to a temporary file in the same directory, then renames it over
/// the target. Permissions are 0600 since the file holds tokens.
async fn write_atomic(path: &Path, data: &HashMap<String, StoredEntry>) -> Result<()> {
    let json = serde_json::to_string_pretty(data)
        .map_err(|e| Error::CredentialParse(format!("serializing credentials: {e}")))?;

    let dir = path
        .parent()
        .ok_or_else(|| Error::Io("credential path has no parent directory".into()))?;

    let tmp_path = dir.join(format!(".credentials.tmp.{}", std::process::id()));

    tokio::fs::write(&tmp_path, json.as_bytes())
        .await
        .map_err(|e| Error::Io(format!("writing temp credential file: {e}")))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        tokio::fs::set_permissions(&tmp_path, perms)
            .await
            .map_err(|e| Error::Io(format!("setting credential file permissions: {e}")))?;
    }

    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| Error::Io(format!("renaming temp credential file: {e}")))?;

    debug!(path = %path.display(), "persisted credentials");
    Ok(())
}
