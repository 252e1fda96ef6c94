use crate::error::App;
use crate::store::ResumeMap;
use log::info;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;

pub const DEFAULT_PORT: u16 = 5500;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    /// Preferred port of the local media server.
    pub port: u16,
    pub start_at_last_position: bool,
    /// Seconds skipped by `vnt forward` and `vnt backward`.
    pub forward_seek: u32,
    pub note_title: Option<String>,
    pub request_timeout_secs: Option<u64>,
    // Kept last: TOML wants tables after plain values.
    pub url_start_time_map: ResumeMap,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            start_at_last_position: false,
            forward_seek: 5,
            note_title: None,
            request_timeout_secs: None,
            url_start_time_map: ResumeMap::default(),
        }
    }
}

impl Settings {
    /// Reads the settings file over the defaults. A missing or blank file
    /// gives the defaults.
    pub async fn load(path: &Path) -> Result<Self, App> {
        if !path.exists() {
            info!("No settings at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path).await?;
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(toml::from_str(&content)?)
    }

    pub async fn save(&self, path: &Path) -> Result<(), App> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(path, toml::to_string(self)?).await?;
        Ok(())
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }
}

pub fn config_dir() -> Result<PathBuf, App> {
    let home_dir = std::env::var("HOME")
        .map_err(|e| App::Io(format!("Failed to get HOME environment variable: {e}")))?;
    Ok(PathBuf::from(home_dir).join(".config/videonote"))
}

pub fn default_settings_path() -> Result<PathBuf, App> {
    Ok(config_dir()?.join("settings.toml"))
}
