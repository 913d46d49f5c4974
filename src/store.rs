//! Persisted records: credential, favorites and watch history
//!
//! Each record is one JSON document under a key. Writes replace the document as a
//! whole (temp file, fsync, rename), so a crash leaves either the old or the new
//! version on disk, never a torn one. Reads are forgiving: a missing or malformed
//! record loads as the empty default.

use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use serde::de::DeserializeOwned;
use tempfile::NamedTempFile;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::StoreError;
use crate::models::{Credential, MediaItem};

pub const CREDENTIAL_KEY: &str = "credential";
pub const FAVORITES_KEY: &str = "favorites";
pub const HISTORY_KEY: &str = "history";
pub const DEFAULT_HISTORY_LIMIT: usize = 20;

/// Whole-document storage keyed by record name
pub trait KeyValueStore: Send + Sync {
    fn read(&self, key: &str) -> Result<Option<String>, StoreError>;
    /// Replace the record atomically
    fn write(&self, key: &str, value: &str) -> Result<(), StoreError>;
    fn remove(&self, key: &str) -> Result<(), StoreError>;
}

/// One `<key>.json` file per record
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }

    fn io_error(key: &str) -> impl FnOnce(std::io::Error) -> StoreError + '_ {
        move |source| StoreError::Io {
            key: key.to_string(),
            source,
        }
    }
}

impl KeyValueStore for FileStore {
    fn read(&self, key: &str) -> Result<Option<String>, StoreError> {
        match fs::read_to_string(self.path(key)) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Self::io_error(key)(e)),
        }
    }

    fn write(&self, key: &str, value: &str) -> Result<(), StoreError> {
        fs::create_dir_all(&self.dir).map_err(Self::io_error(key))?;

        // Unique temp file in the target directory; dropped (and removed) on any error
        let mut file = NamedTempFile::new_in(&self.dir).map_err(Self::io_error(key))?;
        file.write_all(value.as_bytes()).map_err(Self::io_error(key))?;
        file.as_file().sync_all().map_err(Self::io_error(key))?;
        file.persist(self.path(key))
            .map_err(|e| Self::io_error(key)(e.error))?;
        debug!(key, bytes = value.len(), "Record saved");
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        match fs::remove_file(self.path(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Self::io_error(key)(e)),
        }
    }
}

/// In-process store for tests and embedders that persist elsewhere
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.lock().contains_key(key)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.records.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl KeyValueStore for MemoryStore {
    fn read(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.lock().get(key).cloned())
    }

    fn write(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.lock().remove(key);
        Ok(())
    }
}

/// Read a record, treating absence, read errors and bad JSON as "nothing stored"
fn load_record<T: DeserializeOwned>(store: &dyn KeyValueStore, key: &str) -> Option<T> {
    let content = match store.read(key) {
        Ok(Some(content)) => content,
        Ok(None) => return None,
        Err(e) => {
            warn!(key, error = %e, "Cannot read record, using default");
            return None;
        }
    };
    match serde_json::from_str(&content) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(key, error = %e, "Malformed record, using default");
            None
        }
    }
}

fn save_record<T: Serialize + ?Sized>(
    store: &dyn KeyValueStore,
    key: &str,
    value: &T,
) -> Result<(), StoreError> {
    let content = serde_json::to_string(value).map_err(|source| StoreError::Encode {
        key: key.to_string(),
        source,
    })?;
    store.write(key, &content)
}

// ---------------------------------------------------------------------------
// Credential
// ---------------------------------------------------------------------------

#[derive(Serialize, Deserialize)]
struct StoredCredential {
    server: String,
    username: String,
    password: String,
    // When this entry was saved (Unix timestamp)
    #[serde(default)]
    saved_at: i64,
}

pub struct CredentialStore {
    store: Arc<dyn KeyValueStore>,
}

impl CredentialStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Stored login, re-validated; anything unusable reads as logged out
    pub fn load(&self) -> Option<Credential> {
        let stored: StoredCredential = load_record(self.store.as_ref(), CREDENTIAL_KEY)?;
        match Credential::new(&stored.server, &stored.username, &stored.password) {
            Ok(credential) => Some(credential),
            Err(e) => {
                warn!(error = %e, "Stored credential is unusable");
                None
            }
        }
    }

    pub fn save(&self, credential: &Credential) -> Result<(), StoreError> {
        let stored = StoredCredential {
            server: credential.provider_url().to_string(),
            username: credential.username().to_string(),
            password: credential.password().to_string(),
            saved_at: chrono::Utc::now().timestamp(),
        };
        save_record(self.store.as_ref(), CREDENTIAL_KEY, &stored)?;
        info!(server = credential.provider_url(), "Credential saved");
        Ok(())
    }

    pub fn clear(&self) -> Result<(), StoreError> {
        self.store.remove(CREDENTIAL_KEY)
    }
}

// ---------------------------------------------------------------------------
// Favorites & history
// ---------------------------------------------------------------------------

/// Favorites (toggle set, insertion order) and history (most recent first, bounded).
/// Every mutation is persisted before it returns.
pub struct PreferenceStore {
    store: Arc<dyn KeyValueStore>,
    favorites: Vec<MediaItem>,
    history: Vec<MediaItem>,
    history_limit: usize,
}

impl PreferenceStore {
    pub fn new(store: Arc<dyn KeyValueStore>, history_limit: usize) -> Self {
        Self {
            store,
            favorites: Vec::new(),
            history: Vec::new(),
            history_limit: history_limit.max(1),
        }
    }

    /// Construct and load in one go
    pub fn open(store: Arc<dyn KeyValueStore>, history_limit: usize) -> Self {
        let mut prefs = Self::new(store, history_limit);
        prefs.load();
        prefs
    }

    /// Replace in-memory state with what is persisted
    pub fn load(&mut self) {
        self.favorites = dedup(load_record(self.store.as_ref(), FAVORITES_KEY).unwrap_or_default());
        let mut history = dedup(load_record(self.store.as_ref(), HISTORY_KEY).unwrap_or_default());
        history.truncate(self.history_limit);
        self.history = history;
        debug!(
            favorites = self.favorites.len(),
            history = self.history.len(),
            "Preferences loaded"
        );
    }

    pub fn favorites(&self) -> &[MediaItem] {
        &self.favorites
    }

    pub fn history(&self) -> &[MediaItem] {
        &self.history
    }

    pub fn is_favorite(&self, item: &MediaItem) -> bool {
        self.favorites.iter().any(|f| f.same_as(item))
    }

    /// Remove if present, append if absent. Returns whether the item is now a favorite.
    pub fn toggle_favorite(&mut self, item: &MediaItem) -> Result<bool, StoreError> {
        let previous = self.favorites.clone();
        let now_favorite = if let Some(pos) = self.favorites.iter().position(|f| f.same_as(item)) {
            self.favorites.remove(pos);
            false
        } else {
            self.favorites.push(item.clone());
            true
        };

        if let Err(e) = save_record(self.store.as_ref(), FAVORITES_KEY, &self.favorites) {
            self.favorites = previous;
            return Err(e);
        }
        info!(kind = %item.kind, id = %item.id, favorite = now_favorite, "Favorite toggled");
        Ok(now_favorite)
    }

    /// Move (or insert) the item at the front of history
    pub fn record_visit(&mut self, item: &MediaItem) -> Result<(), StoreError> {
        let previous = self.history.clone();
        self.history.retain(|h| !h.same_as(item));
        self.history.insert(0, item.clone());
        self.history.truncate(self.history_limit);

        if let Err(e) = save_record(self.store.as_ref(), HISTORY_KEY, &self.history) {
            self.history = previous;
            return Err(e);
        }
        Ok(())
    }

    pub fn clear_history(&mut self) -> Result<(), StoreError> {
        let previous = std::mem::take(&mut self.history);
        if let Err(e) = save_record(self.store.as_ref(), HISTORY_KEY, &self.history) {
            self.history = previous;
            return Err(e);
        }
        Ok(())
    }
}

/// Persisted data may have been edited by hand; keep the first of any duplicates
fn dedup(items: Vec<MediaItem>) -> Vec<MediaItem> {
    let mut seen = Vec::with_capacity(items.len());
    let mut out = Vec::with_capacity(items.len());
    for item in items {
        let key = item.key();
        if !seen.contains(&key) {
            seen.push(key);
            out.push(item);
        }
    }
    out
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
