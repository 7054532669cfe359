//! Persistent layer settings.
//!
//! Settings are stored as JSON in the platform config directory so they
//! survive restarts.

use crate::error::SettingsError;
use crate::geo::EARTH_R;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Data sources, cache location and display tunables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Base URL of the Level-II archive; site files live under `<url>/<SITE>/`.
    pub nexrad_url: String,
    /// Directory URL holding CONUS mosaic images.
    pub conus_url: String,
    /// Root of the local file cache.
    pub cache_dir: PathBuf,
    /// Camera distance (metres) within which a site is loaded.
    /// Sites unload beyond twice this distance.
    pub load_distance_m: f64,
    /// Z offset of the near edge of a sweep mesh.
    pub near_height: f32,
    /// Texture v bias applied to sweep meshes.
    pub tex_v_bias: f32,
    /// External decompressor run as `<command> <input> <output>`.
    /// The built-in decoder is used when unset.
    pub decompress_command: Option<String>,
    /// Start in offline mode (cache only).
    pub offline: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            nexrad_url: "http://mesonet.agron.iastate.edu/data/nexrd2/raw".to_string(),
            conus_url: "http://radar.weather.gov/Conus/RadarImg/".to_string(),
            cache_dir: default_cache_dir(),
            load_distance_m: EARTH_R / 20.0,
            near_height: 2.0,
            tex_v_bias: 0.01,
            decompress_command: None,
            offline: false,
        }
    }
}

impl Settings {
    const FILE_NAME: &'static str = "settings.json";

    /// Default settings file location.
    pub fn default_path() -> Option<PathBuf> {
        project_dirs().map(|dirs| dirs.config_dir().join(Self::FILE_NAME))
    }

    /// Reads settings from `path`.
    pub fn read(path: &Path) -> Result<Self, SettingsError> {
        let json = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }

    /// Load settings, falling back to defaults when missing or malformed.
    pub fn load(path: &Path) -> Self {
        match Self::read(path) {
            Ok(settings) => {
                log::info!("Loaded settings from {}", path.display());
                settings
            }
            Err(SettingsError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("No settings at {}, using defaults", path.display());
                Self::default()
            }
            Err(e) => {
                log::warn!("Failed to load settings from {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Save settings to `path`, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<(), SettingsError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        log::info!("Saved settings to {}", path.display());
        Ok(())
    }

    /// Cache directory for one kind of data, e.g. `nexrad/level2`.
    pub fn cache_subdir(&self, sub: &str) -> PathBuf {
        sub.split('/')
            .filter(|part| !part.is_empty())
            .fold(self.cache_dir.clone(), |path, part| path.join(part))
    }
}

fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("org", "nexrad-layers", "nexrad-layers")
}

fn default_cache_dir() -> PathBuf {
    project_dirs()
        .map(|dirs| dirs.cache_dir().to_path_buf())
        .unwrap_or_else(|| std::env::temp_dir().join("nexrad-layers"))
}
