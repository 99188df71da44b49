use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::edit::{default_bindings, EditorAction, KeyBind, DEFAULT_ZOOM_STEP};
use crate::map::MapDefaults;
use crate::view::viewport::{DEFAULT_MAX_SCALE, DEFAULT_MIN_SCALE};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EditorConfig {
    pub key_bindings: HashMap<EditorAction, Vec<KeyBind>>,
    #[serde(default)]
    pub viewport: ViewportConfig,
    #[serde(default)]
    pub persistence: PersistenceConfig,
    #[serde(default)]
    pub defaults: MapDefaults,
    #[serde(default)]
    pub debug: DebugConfig,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewportConfig {
    pub min_scale: f64,
    pub max_scale: f64,
    /// Scale factor per wheel notch.
    pub zoom_step: f64,
    /// Screen-space margin kept around the map when centring.
    pub padding: f64,
}

impl Default for ViewportConfig {
    fn default() -> Self {
        Self {
            min_scale: DEFAULT_MIN_SCALE,
            max_scale: DEFAULT_MAX_SCALE,
            zoom_step: DEFAULT_ZOOM_STEP,
            padding: 40.0,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistenceConfig {
    pub save_debounce_ms: u64,
    /// Overrides the platform data directory for the file store.
    pub storage_root: Option<PathBuf>,
    pub draft_cache: bool,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            save_debounce_ms: 300,
            storage_root: None,
            draft_cache: true,
        }
    }
}

impl PersistenceConfig {
    pub fn save_debounce(&self) -> Duration {
        Duration::from_millis(self.save_debounce_ms)
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct DebugConfig {
    /// Trace pointer events and mode changes at debug level.
    pub log_pointer: bool,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            key_bindings: default_bindings(),
            viewport: ViewportConfig::default(),
            persistence: PersistenceConfig::default(),
            defaults: MapDefaults::default(),
            debug: DebugConfig::default(),
        }
    }
}

fn config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "hexboard")
        .map(|dirs| dirs.config_dir().join("settings.toml"))
}

impl EditorConfig {
    pub fn load() -> Self {
        match config_path() {
            Some(path) => Self::load_from(&path),
            None => Self::default(),
        }
    }

    /// Read `path`, writing defaults there if it does not exist yet.
    pub fn load_from(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => match toml::from_str::<Self>(&contents) {
                Ok(mut config) => {
                    config.fill_missing_bindings();
                    config
                }
                Err(e) => {
                    log::warn!("Failed to parse config: {e}. Using defaults.");
                    Self::default()
                }
            },
            Err(_) => {
                let config = Self::default();
                config.save_to(path);
                config
            }
        }
    }

    pub fn save(&self) {
        let Some(path) = config_path() else {
            log::warn!("Could not determine config directory");
            return;
        };
        self.save_to(&path);
    }

    pub fn save_to(&self, path: &Path) {
        if let Some(parent) = path.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                log::warn!("Failed to create config directory: {e}");
                return;
            }
        }

        match toml::to_string_pretty(self) {
            Ok(contents) => {
                if let Err(e) = std::fs::write(path, contents) {
                    log::warn!("Failed to write config: {e}");
                }
            }
            Err(e) => {
                log::warn!("Failed to serialize config: {e}");
            }
        }
    }

    /// Actions added since the file was written get their default keys.
    /// An explicitly empty list stays unbound.
    fn fill_missing_bindings(&mut self) {
        for (action, binds) in default_bindings() {
            self.key_bindings.entry(action).or_insert(binds);
        }
    }

    /// File-store root: the configured override or the platform default.
    pub fn storage_root(&self) -> Option<PathBuf> {
        self.persistence
            .storage_root
            .clone()
            .or_else(crate::persist::file::default_root)
    }
}
