//! Durable string preferences (the "don't warn again" and "info seen" flags).

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use tracing::{debug, warn};

pub const DONT_SHOW_TOOLS_WARNING_KEY: &str = "dontShowToolsWarning";
pub const INFO_DIALOG_SEEN_KEY: &str = "hasSeenInfoDialog";

/// Key/value storage that survives restarts.
pub trait PreferenceStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;

    fn set(&self, key: &str, value: &str) -> Result<()>;

    fn get_bool(&self, key: &str) -> bool {
        self.get(key).as_deref() == Some("true")
    }
}

#[derive(Debug, Default)]
pub struct MemoryPreferenceStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryPreferenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_value(self, key: &str, value: &str) -> Self {
        self.values
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.to_string(), value.to_string());
        self
    }
}

impl PreferenceStore for MemoryPreferenceStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.values
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// JSON object on disk, rewritten atomically on every `set`.
#[derive(Debug)]
pub struct FilePreferenceStore {
    path: PathBuf,
    values: Mutex<BTreeMap<String, String>>,
}

impl FilePreferenceStore {
    /// Open `path`, starting empty when the file is missing or unreadable.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let values = match std::fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                warn!(path = %path.display(), error = %e, "Ignoring malformed preferences file");
                BTreeMap::new()
            }),
            Err(_) => {
                debug!(path = %path.display(), "No preferences file yet");
                BTreeMap::new()
            }
        };
        Self {
            path,
            values: Mutex::new(values),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, values: &BTreeMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create preferences directory: {}", parent.display())
            })?;
        }
        let json = serde_json::to_string_pretty(values).context("Failed to serialize preferences")?;
        let tmp_path = self.path.with_extension("json.tmp");
        std::fs::write(&tmp_path, json.as_bytes())
            .with_context(|| format!("Failed to write temp preferences: {}", tmp_path.display()))?;
        std::fs::rename(&tmp_path, &self.path)
            .with_context(|| format!("Failed to rename temp preferences to: {}", self.path.display()))?;
        Ok(())
    }
}

impl PreferenceStore for FilePreferenceStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut values = self.values.lock().unwrap_or_else(|e| e.into_inner());
        values.insert(key.to_string(), value.to_string());
        self.persist(&values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_store_roundtrips_flags() {
        let store = MemoryPreferenceStore::new();
        assert!(!store.get_bool(DONT_SHOW_TOOLS_WARNING_KEY));
        store.set(DONT_SHOW_TOOLS_WARNING_KEY, "true").unwrap();
        assert!(store.get_bool(DONT_SHOW_TOOLS_WARNING_KEY));
        store.set(DONT_SHOW_TOOLS_WARNING_KEY, "false").unwrap();
        assert!(!store.get_bool(DONT_SHOW_TOOLS_WARNING_KEY));
    }

    #[test]
    fn file_store_survives_reopen() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("state").join("preferences.json");

        let store = FilePreferenceStore::open(&path);
        store.set(INFO_DIALOG_SEEN_KEY, "true").unwrap();
        drop(store);

        let reopened = FilePreferenceStore::open(&path);
        assert!(reopened.get_bool(INFO_DIALOG_SEEN_KEY));
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn malformed_file_starts_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("preferences.json");
        std::fs::write(&path, "not json").unwrap();
        let store = FilePreferenceStore::open(&path);
        assert_eq!(store.get(INFO_DIALOG_SEEN_KEY), None);
    }

    #[test]
    fn only_literal_true_counts() {
        let store = MemoryPreferenceStore::new().with_value(DONT_SHOW_TOOLS_WARNING_KEY, "yes");
        assert!(!store.get_bool(DONT_SHOW_TOOLS_WARNING_KEY));
    }
}
