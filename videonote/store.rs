use crate::error::App;
use crate::settings::Settings;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Last watched second per display URL. Entries never expire.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResumeMap(BTreeMap<String, f64>);

impl ResumeMap {
    pub fn get(&self, display_url: &str) -> Option<f64> {
        self.0.get(display_url).copied()
    }

    pub fn set(&mut self, display_url: &str, seconds: f64) {
        self.0.insert(display_url.to_string(), seconds.max(0.0));
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// The settings file seen through the resume positions it carries.
#[derive(Debug, Clone)]
pub struct ResumeStore {
    path: PathBuf,
    settings: Settings,
}

impl ResumeStore {
    pub fn new(path: impl Into<PathBuf>, settings: Settings) -> Self {
        Self {
            path: path.into(),
            settings,
        }
    }

    pub async fn load(path: impl Into<PathBuf>) -> Result<Self, App> {
        let path = path.into();
        let settings = Settings::load(&path).await?;
        Ok(Self { path, settings })
    }

    pub fn get(&self, display_url: &str) -> Option<f64> {
        self.settings.url_start_time_map.get(display_url)
    }

    pub fn set(&mut self, display_url: &str, seconds: f64) {
        self.settings.url_start_time_map.set(display_url, seconds);
    }

    /// Where a fresh activation should start: the stored position in whole
    /// seconds when resuming is enabled, otherwise the beginning.
    pub fn start_position(&self, display_url: &str) -> f64 {
        if !self.settings.start_at_last_position {
            return 0.0;
        }
        self.get(display_url).map_or(0.0, f64::trunc)
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn save(&self) -> Result<(), App> {
        self.settings.save(&self.path).await
    }
}
