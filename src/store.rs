use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tracing::warn;

use crate::error::ApiError;

/// Fixed key the configuration record is stored under.
pub const STORAGE_KEY: &str = "deepl-demo-config";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Configuration {
    pub deepl_api_key: String,
    #[serde(default)]
    pub openai_proxy_url: String,
    #[serde(default)]
    pub show_debug_logs: bool,
    #[serde(default)]
    pub last_updated: String,
}

impl Configuration {
    pub fn default_with(generator_endpoint: impl Into<String>) -> Self {
        Self {
            deepl_api_key: String::new(),
            openai_proxy_url: generator_endpoint.into(),
            show_debug_logs: false,
            last_updated: now_rfc3339(),
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.deepl_api_key.trim().is_empty() && !self.openai_proxy_url.trim().is_empty()
    }
}

pub trait SettingsStore {
    /// Never fails: a missing or unreadable record is reported as `None`.
    fn load(&self) -> Option<Configuration>;
    /// Stores the record with a refreshed `last_updated` and returns it.
    fn save(&self, config: Configuration) -> Result<Configuration, ApiError>;
    fn clear(&self) -> Result<(), ApiError>;
}

/// JSON file store, one record per directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(format!("{}.json", STORAGE_KEY))
    }
}

impl SettingsStore for FileStore {
    fn load(&self) -> Option<Configuration> {
        let path = self.path();
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return None,
            Err(err) => {
                warn!("failed to read config {}: {}", path.display(), err);
                return None;
            }
        };
        match serde_json::from_str(&content) {
            Ok(config) => Some(config),
            Err(err) => {
                warn!("ignoring corrupt config {}: {}", path.display(), err);
                None
            }
        }
    }

    fn save(&self, config: Configuration) -> Result<Configuration, ApiError> {
        let stored = Configuration {
            last_updated: now_rfc3339(),
            ..config
        };
        let json = serde_json::to_string_pretty(&stored)
            .map_err(|err| ApiError::Storage(format!("failed to encode configuration: {}", err)))?;
        fs::create_dir_all(&self.dir).map_err(|err| storage_error(&self.dir, err))?;
        let path = self.path();
        fs::write(&path, json).map_err(|err| storage_error(&path, err))?;
        Ok(stored)
    }

    fn clear(&self) -> Result<(), ApiError> {
        let path = self.path();
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(storage_error(&path, err)),
        }
    }
}

/// The stored record, or a fresh one with an empty credential.
pub fn load_or_default<S: SettingsStore + ?Sized>(
    store: &S,
    default_generator_endpoint: &str,
) -> Configuration {
    store
        .load()
        .unwrap_or_else(|| Configuration::default_with(default_generator_endpoint))
}

fn storage_error(path: &Path, err: std::io::Error) -> ApiError {
    ApiError::Storage(format!("failed to save configuration to {}: {}", path.display(), err))
}

pub(crate) fn now_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| OffsetDateTime::now_utc().unix_timestamp().to_string())
}
