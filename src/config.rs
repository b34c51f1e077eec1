//! Runtime settings.
//!
//! Settings are layered: built-in defaults, then an optional TOML file, then
//! environment variables prefixed with `LUMENDB_` (nested keys use `__`, e.g.
//! `LUMENDB_STORAGE__BACKEND=local`).

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

use crate::error::{Error, Result};
use crate::storage::{LocalStore, MemoryStore, ObjectStore, DEFAULT_MAX_KEYS};

const ENV_PREFIX: &str = "LUMENDB";
const DEFAULT_INSTANCE: &str = "default";
const DEFAULT_ROOT: &str = "data/lumendb";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Memory,
    Local,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageSettings {
    pub backend: StorageBackend,
    /// Root directory of the `local` backend.
    pub root: PathBuf,
    /// Default page size for scans and listings.
    pub max_keys: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    pub instance: String,
    pub storage: StorageSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            instance: DEFAULT_INSTANCE.to_string(),
            storage: StorageSettings {
                backend: StorageBackend::Local,
                root: PathBuf::from(DEFAULT_ROOT),
                max_keys: DEFAULT_MAX_KEYS,
            },
        }
    }
}

impl Settings {
    /// Loads settings from defaults, `file` (when given) and the environment.
    pub fn load(file: Option<&Path>) -> Result<Self> {
        let defaults = Settings::default();
        let mut builder = config::Config::builder()
            .set_default("instance", defaults.instance)?
            .set_default("storage.backend", "local")?
            .set_default("storage.root", DEFAULT_ROOT)?
            .set_default("storage.max_keys", DEFAULT_MAX_KEYS as i64)?;

        if let Some(path) = file {
            debug!(path = %path.display(), "Loading settings file");
            builder = builder.add_source(config::File::from(path).required(true));
        }

        let settings: Settings = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        if settings.storage.max_keys == 0 {
            return Err(Error::Config("storage.max_keys must be positive".to_string()));
        }
        Ok(settings)
    }

    /// Renders the effective settings as TOML.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))
    }

    /// Opens the configured object store.
    pub fn open_store(&self) -> Result<Arc<dyn ObjectStore>> {
        let store: Arc<dyn ObjectStore> = match self.storage.backend {
            StorageBackend::Memory => Arc::new(MemoryStore::with_max_keys(self.storage.max_keys)),
            StorageBackend::Local => Arc::new(LocalStore::with_max_keys(
                &self.storage.root,
                self.storage.max_keys,
            )?),
        };
        Ok(store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_file(name: &str, contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "lumendb_config_{}_{}_{}.toml",
            name,
            std::process::id(),
            uuid::Uuid::new_v4()
        ));
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.instance, "default");
        assert_eq!(settings.storage.backend, StorageBackend::Local);
        assert_eq!(settings.storage.max_keys, 100);
    }

    #[test]
    fn test_load_from_file() {
        let path = temp_file(
            "file",
            r#"
instance = "staging"

[storage]
backend = "memory"
max_keys = 25
"#,
        );

        let settings = Settings::load(Some(&path)).unwrap();
        assert_eq!(settings.instance, "staging");
        assert_eq!(settings.storage.backend, StorageBackend::Memory);
        assert_eq!(settings.storage.max_keys, 25);
        assert_eq!(settings.storage.root, PathBuf::from(DEFAULT_ROOT));

        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let missing = std::env::temp_dir().join("lumendb_config_definitely_missing.toml");
        let err = Settings::load(Some(&missing)).unwrap_err();
        assert_eq!(err.code(), "ConfigError");
    }

    #[test]
    fn test_zero_max_keys_rejected() {
        let path = temp_file("zero", "[storage]\nmax_keys = 0\n");
        assert!(Settings::load(Some(&path)).is_err());
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_to_toml() {
        let rendered = Settings::default().to_toml().unwrap();
        assert!(rendered.contains("instance = \"default\""));
        assert!(rendered.contains("backend = \"local\""));
    }

    #[tokio::test]
    async fn test_open_memory_store() {
        let mut settings = Settings::default();
        settings.storage.backend = StorageBackend::Memory;
        let store = settings.open_store().unwrap();
        assert!(store.get_one("nothing/here").await.unwrap().is_none());
    }
}
