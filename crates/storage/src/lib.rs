use directories::ProjectDirs;
use log::debug;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

const SETTINGS_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("unable to resolve local data directory")]
    NoDataDirectory,
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// User settings for previews and downloads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Scale applied to page size when rendering previews.
    pub preview_scale: f32,
    /// Directory exported files are written to; the working directory when unset.
    pub download_dir: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self { preview_scale: 0.5, download_dir: None }
    }
}

#[derive(Debug, Clone)]
pub struct Storage {
    root: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SettingsEnvelope {
    version: u32,
    settings: Settings,
}

impl Storage {
    pub fn from_default_project() -> Result<Self, StorageError> {
        let dirs =
            ProjectDirs::from("dev", "PagePick", "PagePick").ok_or(StorageError::NoDataDirectory)?;

        Ok(Self { root: dirs.config_dir().to_path_buf() })
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn load_settings(&self) -> Result<Settings, StorageError> {
        let path = self.settings_path();
        if !path.exists() {
            debug!("no settings at {}, using defaults", path.display());
            return Ok(Settings::default());
        }

        let bytes = fs::read(&path)?;
        let envelope: SettingsEnvelope = serde_json::from_slice(&bytes)?;
        debug!("loaded settings v{} from {}", envelope.version, path.display());

        Ok(envelope.settings)
    }

    pub fn save_settings(&self, settings: &Settings) -> Result<(), StorageError> {
        fs::create_dir_all(&self.root)?;

        let envelope =
            SettingsEnvelope { version: SETTINGS_SCHEMA_VERSION, settings: settings.clone() };

        let path = self.settings_path();
        let bytes = serde_json::to_vec_pretty(&envelope)?;
        fs::write(&path, bytes)?;
        debug!("saved settings v{SETTINGS_SCHEMA_VERSION} to {}", path.display());

        Ok(())
    }

    /// Location of the settings file under this store's root.
    pub fn settings_path(&self) -> PathBuf {
        self.root.join("settings.json")
    }
}
