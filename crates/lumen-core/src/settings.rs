//! Persistent settings store abstraction.
//!
//! The launcher's durable key-value store (installed versions, downloaded
//! runtimes) is an external collaborator; the pipeline only needs
//! `get`/`set`/`has`. The trait keeps the core testable without a real
//! store, and [`JsonFileStore`] is the file-backed implementation the CLI
//! uses.

use std::collections::BTreeMap;
use std::path::PathBuf;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;

use crate::error::UpdateError;

/// Keys the pipeline reads and writes.
pub mod keys {
    /// Installed patch-layer version.
    pub const PATCH_VERSION: &str = "patcherVersion";
    /// Installed engine version.
    pub const ENGINE_VERSION: &str = "engineVersion";
    /// Names of runtimes acquired so far.
    pub const DOWNLOADED_RUNTIMES: &str = "downloadedRuntimes";
}

/// Durable key-value settings store.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// Read a value.
    async fn get(&self, key: &str) -> Option<Value>;

    /// Write a value durably.
    async fn set(&self, key: &str, value: Value) -> Result<(), UpdateError>;

    /// Whether a key is present.
    async fn has(&self, key: &str) -> bool {
        self.get(key).await.is_some()
    }

    /// Read a value as a string, when it is one.
    async fn get_string(&self, key: &str) -> Option<String> {
        match self.get(key).await {
            Some(Value::String(s)) => Some(s),
            _ => None,
        }
    }
}

/// In-memory store for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, Value>>,
}

#[async_trait]
impl SettingsStore for MemoryStore {
    async fn get(&self, key: &str) -> Option<Value> {
        self.entries.lock().await.get(key).cloned()
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), UpdateError> {
        self.entries.lock().await.insert(key.to_string(), value);
        Ok(())
    }
}

/// JSON-file-backed settings store.
///
/// The whole document is rewritten on every `set`; settings are tiny and
/// writes are rare (once per stage at most).
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, Value>>,
}

impl JsonFileStore {
    /// Open a store at `path`, loading existing contents if present.
    ///
    /// # Errors
    ///
    /// [`UpdateError::Format`] when the file exists but is not a JSON
    /// object, [`UpdateError::Filesystem`] when it cannot be read.
    pub async fn open(path: PathBuf) -> Result<Self, UpdateError> {
        let entries = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => serde_json::from_str(&raw)
                .map_err(|e| UpdateError::Format(format!("settings {}: {e}", path.display())))?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(err) => return Err(err.into()),
        };
        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }
}

#[async_trait]
impl SettingsStore for JsonFileStore {
    async fn get(&self, key: &str) -> Option<Value> {
        self.entries.lock().await.get(key).cloned()
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), UpdateError> {
        let mut entries = self.entries.lock().await;
        entries.insert(key.to_string(), value);
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut pretty = serde_json::to_string_pretty(&*entries)?;
        pretty.push('\n');
        tokio::fs::write(&self.path, pretty).await?;
        Ok(())
    }
}
