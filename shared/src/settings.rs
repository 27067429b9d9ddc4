//! Persistent extension settings.
//!
//! The settings record has a fixed schema. Every read returns a fully
//! populated record: keys missing from storage are filled from the store's
//! defaults. Every write replaces the whole record.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::{Error, Result};

pub const DEFAULT_API_ENDPOINT: &str = "http://localhost:8000/api";
pub const DEFAULT_EMBEDDING_MODEL: &str = "gemini";
pub const DEFAULT_MAX_RESULTS: u32 = 10;
pub const DEFAULT_CACHE_EXPIRATION_MINUTES: u32 = 30;

/// The persisted configuration record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    /// Base URL of the archive API
    pub api_endpoint: String,
    pub api_key: String,
    pub embedding_model: String,
    pub show_related_docs: bool,
    pub show_proximity_score: bool,
    pub max_results: u32,
    /// Save requests without an explicit flag summarize when set
    pub auto_summarize: bool,
    /// Minutes
    pub cache_expiration: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_endpoint: DEFAULT_API_ENDPOINT.to_string(),
            api_key: String::new(),
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            show_related_docs: true,
            show_proximity_score: true,
            max_results: DEFAULT_MAX_RESULTS,
            auto_summarize: true,
            cache_expiration: DEFAULT_CACHE_EXPIRATION_MINUTES,
        }
    }
}

impl Settings {
    /// Defaults with a different install-time endpoint.
    pub fn with_endpoint(endpoint: Option<&str>) -> Self {
        let mut settings = Self::default();
        if let Some(endpoint) = endpoint {
            settings.api_endpoint = endpoint.to_string();
        }
        settings.normalized()
    }

    /// Base URL every API call is built from. Falls back to the built-in
    /// endpoint when the stored one is blank.
    pub fn api_base(&self) -> &str {
        let endpoint = self.api_endpoint.trim().trim_end_matches('/');
        if endpoint.is_empty() {
            DEFAULT_API_ENDPOINT
        } else {
            endpoint
        }
    }

    pub fn api_key(&self) -> Option<&str> {
        let key = self.api_key.trim();
        (!key.is_empty()).then_some(key)
    }

    /// Apply the same clean-up the options page does before saving.
    pub fn normalized(mut self) -> Self {
        self.api_endpoint = self.api_base().to_string();
        self.api_key = self.api_key.trim().to_string();
        if self.embedding_model.trim().is_empty() {
            self.embedding_model = DEFAULT_EMBEDDING_MODEL.to_string();
        }
        if self.max_results == 0 {
            self.max_results = DEFAULT_MAX_RESULTS;
        }
        if self.cache_expiration == 0 {
            self.cache_expiration = DEFAULT_CACHE_EXPIRATION_MINUTES;
        }
        self
    }

    /// Overlay stored keys onto `defaults`. Unknown keys are ignored and a
    /// stored value of the wrong type falls back to the default. The result
    /// is normalized, so hand-edited zero or blank values never reach the API.
    pub fn from_stored(defaults: &Settings, stored: Map<String, Value>) -> Settings {
        let mut merged = match serde_json::to_value(defaults) {
            Ok(Value::Object(map)) => map,
            _ => return defaults.clone(),
        };

        for (key, value) in stored {
            let Some(default_value) = merged.get(&key) else {
                debug!(key = %key, "Ignoring unknown settings key");
                continue;
            };
            if same_json_kind(default_value, &value) {
                merged.insert(key, value);
            } else {
                warn!(key = %key, "Stored setting has the wrong type, using default");
            }
        }

        let settings: Settings = serde_json::from_value(Value::Object(merged)).unwrap_or_else(|e| {
            warn!(error = %e, "Stored settings unreadable, using defaults");
            defaults.clone()
        });
        settings.normalized()
    }
}

fn same_json_kind(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(_), Value::Number(n)) => n.as_u64().is_some_and(|n| n <= u64::from(u32::MAX)),
        (Value::String(_), Value::String(_)) | (Value::Bool(_), Value::Bool(_)) => true,
        _ => false,
    }
}

/// Partial settings record sent by the options page. Absent fields keep
/// their current value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsPatch {
    pub api_endpoint: Option<String>,
    pub api_key: Option<String>,
    pub embedding_model: Option<String>,
    pub show_related_docs: Option<bool>,
    pub show_proximity_score: Option<bool>,
    pub max_results: Option<u32>,
    pub auto_summarize: Option<bool>,
    pub cache_expiration: Option<u32>,
}

impl SettingsPatch {
    pub fn apply(self, mut base: Settings) -> Settings {
        if let Some(v) = self.api_endpoint {
            base.api_endpoint = v;
        }
        if let Some(v) = self.api_key {
            base.api_key = v;
        }
        if let Some(v) = self.embedding_model {
            base.embedding_model = v;
        }
        if let Some(v) = self.show_related_docs {
            base.show_related_docs = v;
        }
        if let Some(v) = self.show_proximity_score {
            base.show_proximity_score = v;
        }
        if let Some(v) = self.max_results {
            base.max_results = v;
        }
        if let Some(v) = self.auto_summarize {
            base.auto_summarize = v;
        }
        if let Some(v) = self.cache_expiration {
            base.cache_expiration = v;
        }
        base.normalized()
    }
}

/// Durable home of the settings record.
///
/// `load` never observes a half-written record: implementations replace the
/// stored record in one step.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// Record returned when nothing is stored and used to fill missing keys.
    fn defaults(&self) -> Settings;

    async fn load(&self) -> Result<Settings>;

    async fn save(&self, settings: &Settings) -> Result<()>;

    /// Write the default record on first run. Returns `true` when it did.
    async fn ensure_initialized(&self) -> Result<bool>;

    /// Merge `patch` over the current record and save the result.
    ///
    /// The load and save are separate steps, so this assumes a single writer:
    /// two concurrent updates may lose one patch.
    async fn update(&self, patch: SettingsPatch) -> Result<Settings> {
        let current = self.load().await?;
        let updated = patch.apply(current);
        self.save(&updated).await?;
        Ok(updated)
    }

    async fn reset(&self) -> Result<Settings> {
        let defaults = self.defaults();
        self.save(&defaults).await?;
        Ok(defaults)
    }
}

/// Settings kept as a JSON file. Saves go through a temp file that is
/// renamed over the target.
pub struct FileSettingsStore {
    path: PathBuf,
    defaults: Settings,
    write_lock: Mutex<()>,
}

impl FileSettingsStore {
    pub fn new(path: impl Into<PathBuf>, defaults: Settings) -> Self {
        Self {
            path: path.into(),
            defaults,
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "settings.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    async fn read_stored(&self) -> Result<Option<Map<String, Value>>> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        match serde_json::from_slice::<Value>(&bytes) {
            Ok(Value::Object(map)) => Ok(Some(map)),
            Ok(_) | Err(_) => {
                warn!(path = %self.path.display(), "Settings file is not a JSON object, using defaults");
                Ok(None)
            }
        }
    }

    async fn write_record(&self, settings: &Settings) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let contents = serde_json::to_vec_pretty(settings)?;
        let temp = self.temp_path();
        tokio::fs::write(&temp, contents).await?;
        tokio::fs::rename(&temp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl SettingsStore for FileSettingsStore {
    fn defaults(&self) -> Settings {
        self.defaults.clone()
    }

    async fn load(&self) -> Result<Settings> {
        Ok(match self.read_stored().await? {
            Some(stored) => Settings::from_stored(&self.defaults, stored),
            None => self.defaults.clone(),
        })
    }

    async fn save(&self, settings: &Settings) -> Result<()> {
        self.write_record(settings).await?;
        debug!(path = %self.path.display(), "Settings saved");
        Ok(())
    }

    async fn ensure_initialized(&self) -> Result<bool> {
        match tokio::fs::metadata(&self.path).await {
            Ok(_) => Ok(false),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                self.write_record(&self.defaults).await?;
                info!(path = %self.path.display(), "Created default settings");
                Ok(true)
            }
            Err(e) => Err(Error::Storage(e)),
        }
    }
}

/// In-process settings store.
pub struct MemorySettingsStore {
    defaults: Settings,
    stored: RwLock<Option<Map<String, Value>>>,
}

impl MemorySettingsStore {
    pub fn new(defaults: Settings) -> Self {
        Self {
            defaults,
            stored: RwLock::new(None),
        }
    }

    /// Store holding an already-saved record.
    pub fn with_settings(settings: Settings) -> Self {
        let stored = match serde_json::to_value(&settings) {
            Ok(Value::Object(map)) => Some(map),
            _ => None,
        };
        Self {
            defaults: Settings::default(),
            stored: RwLock::new(stored),
        }
    }

    /// Store holding a raw record, possibly with missing or stray keys.
    pub fn with_raw(stored: Map<String, Value>) -> Self {
        Self {
            defaults: Settings::default(),
            stored: RwLock::new(Some(stored)),
        }
    }
}

impl Default for MemorySettingsStore {
    fn default() -> Self {
        Self::new(Settings::default())
    }
}

#[async_trait]
impl SettingsStore for MemorySettingsStore {
    fn defaults(&self) -> Settings {
        self.defaults.clone()
    }

    async fn load(&self) -> Result<Settings> {
        let stored = self.stored.read().await;
        Ok(match stored.as_ref() {
            Some(map) => Settings::from_stored(&self.defaults, map.clone()),
            None => self.defaults.clone(),
        })
    }

    async fn save(&self, settings: &Settings) -> Result<()> {
        let record = match serde_json::to_value(settings)? {
            Value::Object(map) => map,
            _ => return Err(Error::Internal("settings did not serialize to an object".to_string())),
        };
        *self.stored.write().await = Some(record);
        Ok(())
    }

    async fn ensure_initialized(&self) -> Result<bool> {
        let mut stored = self.stored.write().await;
        if stored.is_some() {
            return Ok(false);
        }
        if let Value::Object(map) = serde_json::to_value(&self.defaults)? {
            *stored = Some(map);
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_load_after_install_returns_full_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSettingsStore::new(dir.path().join("settings.json"), Settings::default());

        assert!(store.ensure_initialized().await.unwrap());
        assert!(!store.ensure_initialized().await.unwrap());

        let settings = store.load().await.unwrap();
        assert_eq!(settings, Settings::default());

        let raw: Value = serde_json::from_slice(&std::fs::read(store.path()).unwrap()).unwrap();
        for key in [
            "apiEndpoint",
            "apiKey",
            "embeddingModel",
            "showRelatedDocs",
            "showProximityScore",
            "maxResults",
            "autoSummarize",
            "cacheExpiration",
        ] {
            assert!(raw.get(key).is_some(), "missing key {key}");
        }
    }

    #[tokio::test]
    async fn test_missing_file_loads_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSettingsStore::new(dir.path().join("nested/settings.json"), Settings::default());

        assert_eq!(store.load().await.unwrap(), Settings::default());
    }

    #[tokio::test]
    async fn test_missing_keys_filled_from_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"apiEndpoint":"http://archive:9000/api","maxResults":25,"legacy":1}"#).unwrap();

        let store = FileSettingsStore::new(&path, Settings::default());
        let settings = store.load().await.unwrap();

        assert_eq!(settings.api_endpoint, "http://archive:9000/api");
        assert_eq!(settings.max_results, 25);
        assert!(settings.auto_summarize);
        assert_eq!(settings.cache_expiration, DEFAULT_CACHE_EXPIRATION_MINUTES);
    }

    #[tokio::test]
    async fn test_corrupt_file_loads_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "not json").unwrap();

        let store = FileSettingsStore::new(&path, Settings::default());
        assert_eq!(store.load().await.unwrap(), Settings::default());
    }

    #[tokio::test]
    async fn test_save_replaces_whole_record() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSettingsStore::new(dir.path().join("settings.json"), Settings::default());

        let mut settings = Settings::default();
        settings.auto_summarize = false;
        settings.api_key = "secret".to_string();
        store.save(&settings).await.unwrap();

        assert_eq!(store.load().await.unwrap(), settings);
        assert!(!store.temp_path().exists());
    }

    #[tokio::test]
    async fn test_concurrent_load_never_sees_mixed_record() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FileSettingsStore::new(dir.path().join("settings.json"), Settings::default()));
        store.ensure_initialized().await.unwrap();

        let old = Settings::default();
        let mut new = Settings::default();
        new.api_endpoint = "http://other:1/api".to_string();
        new.max_results = 50;
        new.auto_summarize = false;

        let writer = {
            let store = Arc::clone(&store);
            let (old, new) = (old.clone(), new.clone());
            tokio::spawn(async move {
                for i in 0..50 {
                    let next = if i % 2 == 0 { &new } else { &old };
                    store.save(next).await.unwrap();
                }
            })
        };

        for _ in 0..200 {
            let seen = store.load().await.unwrap();
            assert!(seen == old || seen == new, "torn read: {seen:?}");
        }
        writer.await.unwrap();
    }

    #[tokio::test]
    async fn test_update_merges_patch_and_normalizes() {
        let store = MemorySettingsStore::default();

        let patch: SettingsPatch = serde_json::from_value(json!({
            "apiEndpoint": "  http://archive.local/api/  ",
            "maxResults": 0,
            "autoSummarize": false
        }))
        .unwrap();
        let updated = store.update(patch).await.unwrap();

        assert_eq!(updated.api_endpoint, "http://archive.local/api");
        assert_eq!(updated.max_results, DEFAULT_MAX_RESULTS);
        assert!(!updated.auto_summarize);
        assert!(updated.show_related_docs);
        assert_eq!(store.load().await.unwrap(), updated);
    }

    #[tokio::test]
    async fn test_reset_restores_defaults() {
        let mut custom = Settings::default();
        custom.embedding_model = "vertex".to_string();
        let store = MemorySettingsStore::with_settings(custom);

        let reset = store.reset().await.unwrap();
        assert_eq!(reset, Settings::default());
        assert_eq!(store.load().await.unwrap(), Settings::default());
    }

    #[tokio::test]
    async fn test_wrong_typed_value_falls_back_to_default() {
        let mut raw = Map::new();
        raw.insert("maxResults".to_string(), json!("lots"));
        raw.insert("showRelatedDocs".to_string(), json!(false));
        let store = MemorySettingsStore::with_raw(raw);

        let settings = store.load().await.unwrap();
        assert_eq!(settings.max_results, DEFAULT_MAX_RESULTS);
        assert!(!settings.show_related_docs);
    }

    #[tokio::test]
    async fn test_hand_edited_values_are_normalized_on_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{"apiEndpoint":" http://archive:9000/api/ ","maxResults":0,"cacheExpiration":0,"embeddingModel":""}"#,
        )
        .unwrap();

        let settings = FileSettingsStore::new(&path, Settings::default()).load().await.unwrap();

        assert_eq!(settings.api_endpoint, "http://archive:9000/api");
        assert_eq!(settings.max_results, DEFAULT_MAX_RESULTS);
        assert_eq!(settings.cache_expiration, DEFAULT_CACHE_EXPIRATION_MINUTES);
        assert_eq!(settings.embedding_model, DEFAULT_EMBEDDING_MODEL);
    }

    #[test]
    fn test_api_base_falls_back_when_blank() {
        let mut settings = Settings::default();
        settings.api_endpoint = "   ".to_string();
        assert_eq!(settings.api_base(), DEFAULT_API_ENDPOINT);

        settings.api_endpoint = "https://archive.example.com/api/".to_string();
        assert_eq!(settings.api_base(), "https://archive.example.com/api");
    }

    #[test]
    fn test_install_endpoint_override() {
        let settings = Settings::with_endpoint(Some("http://10.0.0.5:8000/api/"));
        assert_eq!(settings.api_endpoint, "http://10.0.0.5:8000/api");
        assert_eq!(settings.cache_expiration, DEFAULT_CACHE_EXPIRATION_MINUTES);
    }
}
