//! Opaque preference persistence
//!
//! The dashboard stores a handful of small preferences (time range history,
//! auto-reload interval) in an external key-value store. The store is an
//! external collaborator: the engine only ever reads and writes strings and
//! must tolerate missing or corrupt values by falling back to defaults.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::warn;

/// String key-value store for dashboard preferences.
///
/// Implementations must never fail loudly: a missing key is `None`, a failed
/// write is the implementation's problem to log.
pub trait PreferenceStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);
}

/// In-memory preference store used by the CLI and tests.
#[derive(Default)]
pub struct MemoryPreferenceStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryPreferenceStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PreferenceStore for MemoryPreferenceStore {
    fn get(&self, key: &str) -> Option<String> {
        match self.values.lock() {
            Ok(values) => values.get(key).cloned(),
            Err(_) => None,
        }
    }

    fn set(&self, key: &str, value: &str) {
        if let Ok(mut values) = self.values.lock() {
            values.insert(key.to_string(), value.to_string());
        }
    }
}

/// Preference store backed by a JSON file, so history and the auto-reload
/// interval survive across runs.
///
/// Missing or corrupt files open as empty; write failures are logged and
/// otherwise ignored. Every `set` rewrites the file.
pub struct FilePreferenceStore {
    path: PathBuf,
    values: Mutex<HashMap<String, String>>,
}

impl FilePreferenceStore {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let values = match std::fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str(&raw) {
                Ok(values) => values,
                Err(e) => {
                    warn!("ignoring corrupt preference file {}: {e}", path.display());
                    HashMap::new()
                }
            },
            Err(_) => HashMap::new(),
        };
        Self {
            path,
            values: Mutex::new(values),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self, values: &HashMap<String, String>) {
        let serialized = match serde_json::to_string_pretty(values) {
            Ok(serialized) => serialized,
            Err(e) => {
                warn!("failed to serialize preferences: {e}");
                return;
            }
        };
        if let Err(e) = std::fs::write(&self.path, serialized) {
            warn!("failed to write preference file {}: {e}", self.path.display());
        }
    }
}

impl PreferenceStore for FilePreferenceStore {
    fn get(&self, key: &str) -> Option<String> {
        match self.values.lock() {
            Ok(values) => values.get(key).cloned(),
            Err(_) => None,
        }
    }

    fn set(&self, key: &str, value: &str) {
        if let Ok(mut values) = self.values.lock() {
            values.insert(key.to_string(), value.to_string());
            self.flush(&values);
        }
    }
}
