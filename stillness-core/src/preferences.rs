//! User preferences: the chosen vibration pattern and the theme.
//!
//! Values live behind the `PreferenceStore` trait so the host decides where
//! they are kept. Two backends ship with the crate: an in-memory map and a
//! TOML file written atomically. The `Preferences` facade turns raw keys into
//! typed values and republishes every change on a `watch` channel.

use crate::components::pattern::VibrationPattern;
use crate::config::StillnessConfig;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;
use tracing::{debug, info, warn};

pub const VIBRATION_PATTERN_KEY: &str = "vibration_pattern";
pub const DARK_THEME_KEY: &str = "dark_theme";

/// A key/value store for preferences.
pub trait PreferenceStore: Send + Sync {
    fn get_string(&self, key: &str) -> Option<String>;
    fn set_string(&self, key: &str, value: &str) -> Result<()>;
    fn get_bool(&self, key: &str) -> Option<bool>;
    fn set_bool(&self, key: &str, value: bool) -> Result<()>;
}

/// One persisted value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
enum StoredValue {
    Bool(bool),
    Text(String),
}

type Entries = BTreeMap<String, StoredValue>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn read_string(entries: &Entries, key: &str) -> Option<String> {
    match entries.get(key)? {
        StoredValue::Text(text) => Some(text.clone()),
        StoredValue::Bool(_) => None,
    }
}

fn read_bool(entries: &Entries, key: &str) -> Option<bool> {
    match entries.get(key)? {
        StoredValue::Bool(value) => Some(*value),
        StoredValue::Text(_) => None,
    }
}

/// Keeps preferences for the lifetime of the process only.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<Entries>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PreferenceStore for MemoryStore {
    fn get_string(&self, key: &str) -> Option<String> {
        read_string(&lock(&self.entries), key)
    }

    fn set_string(&self, key: &str, value: &str) -> Result<()> {
        lock(&self.entries).insert(key.to_string(), StoredValue::Text(value.to_string()));
        Ok(())
    }

    fn get_bool(&self, key: &str) -> Option<bool> {
        read_bool(&lock(&self.entries), key)
    }

    fn set_bool(&self, key: &str, value: bool) -> Result<()> {
        lock(&self.entries).insert(key.to_string(), StoredValue::Bool(value));
        Ok(())
    }
}

/// Persists preferences to a flat TOML table.
///
/// Every write rewrites the whole file through a temporary sibling and a
/// rename, so a crash never leaves a half-written file behind.
#[derive(Debug)]
pub struct TomlFileStore {
    path: PathBuf,
    entries: Mutex<Entries>,
}

impl TomlFileStore {
    /// Opens the store, reading the file if it exists. A missing or empty
    /// file is an empty store.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let entries = if path.exists() {
            let content = fs::read_to_string(&path)?;
            if content.trim().is_empty() {
                Entries::new()
            } else {
                toml::from_str(&content)?
            }
        } else {
            Entries::new()
        };
        debug!(path = %path.display(), entries = entries.len(), "Opened preference file");
        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write(&self, key: &str, value: StoredValue) -> Result<()> {
        let mut entries = lock(&self.entries);
        let previous = entries.insert(key.to_string(), value);
        if let Err(e) = self.save(&entries) {
            // Keep memory in step with the file.
            match previous {
                Some(previous) => entries.insert(key.to_string(), previous),
                None => entries.remove(key),
            };
            return Err(e);
        }
        Ok(())
    }

    fn save(&self, entries: &Entries) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }
        let content = toml::to_string_pretty(entries)?;

        let mut tmp_name = self.path.file_name().unwrap_or_default().to_os_string();
        tmp_name.push(".tmp");
        let tmp_path = self.path.with_file_name(tmp_name);

        let mut tmp_file = File::create(&tmp_path)?;
        tmp_file.write_all(content.as_bytes())?;
        tmp_file.sync_all()?;
        drop(tmp_file);

        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }
}

impl PreferenceStore for TomlFileStore {
    fn get_string(&self, key: &str) -> Option<String> {
        read_string(&lock(&self.entries), key)
    }

    fn set_string(&self, key: &str, value: &str) -> Result<()> {
        self.write(key, StoredValue::Text(value.to_string()))
    }

    fn get_bool(&self, key: &str) -> Option<bool> {
        read_bool(&lock(&self.entries), key)
    }

    fn set_bool(&self, key: &str, value: bool) -> Result<()> {
        self.write(key, StoredValue::Bool(value))
    }
}

/// The typed view of all preferences.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreferenceValues {
    pub vibration_pattern: VibrationPattern,
    pub dark_theme: bool,
}

impl Default for PreferenceValues {
    fn default() -> Self {
        Self {
            vibration_pattern: VibrationPattern::default(),
            dark_theme: true,
        }
    }
}

/// Typed, observable access to a `PreferenceStore`.
#[derive(Clone)]
pub struct Preferences {
    store: Arc<dyn PreferenceStore>,
    values: Arc<watch::Sender<PreferenceValues>>,
}

impl Preferences {
    pub fn new(store: Arc<dyn PreferenceStore>) -> Self {
        let current = PreferenceValues {
            vibration_pattern: load_pattern(store.as_ref()),
            dark_theme: store.get_bool(DARK_THEME_KEY).unwrap_or(true),
        };
        let (values, _) = watch::channel(current);
        Self {
            store,
            values: Arc::new(values),
        }
    }

    /// In-memory preferences with every value at its default.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    /// Opens the backend named by the configuration.
    pub fn open(config: &StillnessConfig) -> Result<Self> {
        match &config.preferences.path {
            Some(path) => {
                info!(path = %path.display(), "Using preference file");
                Ok(Self::new(Arc::new(TomlFileStore::open(path)?)))
            }
            None => Ok(Self::in_memory()),
        }
    }

    /// The selected alarm pattern; unknown stored keys read as the default.
    pub fn vibration_pattern(&self) -> VibrationPattern {
        self.values.borrow().vibration_pattern
    }

    /// Whether the dark theme is selected. Defaults to true.
    pub fn dark_theme(&self) -> bool {
        self.values.borrow().dark_theme
    }

    pub fn current(&self) -> PreferenceValues {
        *self.values.borrow()
    }

    /// Subscribes to preference changes.
    pub fn subscribe(&self) -> watch::Receiver<PreferenceValues> {
        self.values.subscribe()
    }

    pub fn set_vibration_pattern(&self, pattern: VibrationPattern) -> Result<()> {
        self.store.set_string(VIBRATION_PATTERN_KEY, pattern.key())?;
        self.values.send_if_modified(|values| {
            let changed = values.vibration_pattern != pattern;
            values.vibration_pattern = pattern;
            changed
        });
        info!(pattern = pattern.key(), "Vibration pattern saved");
        Ok(())
    }

    pub fn set_dark_theme(&self, dark: bool) -> Result<()> {
        self.store.set_bool(DARK_THEME_KEY, dark)?;
        self.values.send_if_modified(|values| {
            let changed = values.dark_theme != dark;
            values.dark_theme = dark;
            changed
        });
        Ok(())
    }
}

fn load_pattern(store: &dyn PreferenceStore) -> VibrationPattern {
    let Some(key) = store.get_string(VIBRATION_PATTERN_KEY) else {
        return VibrationPattern::default();
    };
    VibrationPattern::from_key(&key).unwrap_or_else(|| {
        warn!(stored = %key, "Unknown vibration pattern in preferences; using the default");
        VibrationPattern::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_without_stored_values() {
        let preferences = Preferences::in_memory();
        assert_eq!(preferences.vibration_pattern(), VibrationPattern::GentlePulse);
        assert!(preferences.dark_theme());
    }

    #[test]
    fn unknown_pattern_key_falls_back_to_default() {
        let store = Arc::new(MemoryStore::new());
        store.set_string(VIBRATION_PATTERN_KEY, "OLD_GENTLE").unwrap();
        let preferences = Preferences::new(store);
        assert_eq!(preferences.vibration_pattern(), VibrationPattern::default());
    }

    #[test]
    fn mismatched_value_types_read_as_missing() {
        let store = MemoryStore::new();
        store.set_bool(VIBRATION_PATTERN_KEY, true).unwrap();
        assert_eq!(store.get_string(VIBRATION_PATTERN_KEY), None);
    }

    #[test]
    fn changes_are_stored_and_published() {
        let store = Arc::new(MemoryStore::new());
        let preferences = Preferences::new(store.clone());
        let mut changes = preferences.subscribe();

        preferences.set_vibration_pattern(VibrationPattern::TripleChime).unwrap();
        assert!(changes.has_changed().unwrap());
        assert_eq!(
            changes.borrow_and_update().vibration_pattern,
            VibrationPattern::TripleChime
        );
        assert_eq!(
            store.get_string(VIBRATION_PATTERN_KEY).as_deref(),
            Some("TRIPLE_CHIME")
        );

        preferences.set_dark_theme(false).unwrap();
        assert!(!preferences.dark_theme());
        assert_eq!(store.get_bool(DARK_THEME_KEY), Some(false));
    }

    #[test]
    fn toml_file_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("prefs.toml");

        let preferences = Preferences::new(Arc::new(TomlFileStore::open(&path).unwrap()));
        preferences.set_vibration_pattern(VibrationPattern::FadeOut).unwrap();
        preferences.set_dark_theme(false).unwrap();

        let reopened = Preferences::new(Arc::new(TomlFileStore::open(&path).unwrap()));
        assert_eq!(reopened.vibration_pattern(), VibrationPattern::FadeOut);
        assert!(!reopened.dark_theme());

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("vibration_pattern = \"FADE_OUT\""));
    }

    #[test]
    fn empty_file_is_an_empty_store() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let store = TomlFileStore::open(file.path()).unwrap();
        assert_eq!(store.get_string(VIBRATION_PATTERN_KEY), None);
        assert_eq!(store.get_bool(DARK_THEME_KEY), None);
    }
}
