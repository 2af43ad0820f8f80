//! Viewer display preferences.
//!
//! Preferences are a small JSON blob stored under a caller-supplied key in
//! a generic key-value store. The store is injectable so the engine works
//! (and is testable) without any particular persistence mechanism; the
//! default implementation keeps a JSON map in the user config directory.

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Per-viewer display preferences. Loaded once at viewer creation, saved
/// on every change.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerPrefs {
    pub wrap: bool,
    pub font_size: u16,
    pub include_timestamp: bool,
}

impl Default for ViewerPrefs {
    fn default() -> Self {
        Self {
            wrap: false,
            font_size: 12,
            include_timestamp: false,
        }
    }
}

impl ViewerPrefs {
    /// Load from the store, falling back to defaults when the key is
    /// missing or the stored blob does not parse.
    pub fn load(store: &dyn PrefsStore, key: &str) -> Self {
        store
            .get(key)
            .and_then(|raw| serde_json::from_str(&raw).ok())
            .unwrap_or_default()
    }

    pub fn save(&self, store: &mut dyn PrefsStore, key: &str) {
        if let Ok(raw) = serde_json::to_string(self) {
            store.set(key, &raw);
        }
    }
}

/// Generic key-value persistence.
pub trait PrefsStore {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: &str);
}

/// In-memory store, used when no config directory is available.
#[derive(Default)]
pub struct MemoryPrefsStore {
    entries: HashMap<String, String>,
}

impl PrefsStore for MemoryPrefsStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) {
        self.entries.insert(key.to_string(), value.to_string());
    }
}

/// File-backed store: one JSON object mapping keys to values, rewritten on
/// every change. Read and write failures degrade to in-memory behavior.
pub struct FilePrefsStore {
    path: PathBuf,
    entries: HashMap<String, serde_json::Value>,
}

impl FilePrefsStore {
    pub fn open(path: PathBuf) -> Self {
        let entries = std::fs::read_to_string(&path)
            .ok()
            .and_then(|raw| serde_json::from_str(&raw).ok())
            .unwrap_or_default();
        Self { path, entries }
    }

    fn persist(&self) {
        if let Some(parent) = self.path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        match serde_json::to_string_pretty(&self.entries) {
            Ok(raw) => {
                if let Err(e) = std::fs::write(&self.path, raw) {
                    warn!(path = %self.path.display(), error = %e, "failed to save preferences");
                }
            }
            Err(e) => warn!(error = %e, "failed to encode preferences"),
        }
    }
}

impl PrefsStore for FilePrefsStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).map(|v| v.to_string())
    }

    fn set(&mut self, key: &str, value: &str) {
        let value = serde_json::from_str(value)
            .unwrap_or_else(|_| serde_json::Value::String(value.to_string()));
        self.entries.insert(key.to_string(), value);
        self.persist();
    }
}
