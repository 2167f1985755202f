//! Configuration file handling for `<root>/config.json`.
//!
//! A missing file yields `Config::default()`, and `load_or_init` writes those
//! defaults back so the user has something to edit. Unknown keys are accepted
//! but logged as likely typos.
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::util::write_atomic;

/// Environment variable that overrides the application root directory.
pub const ROOT_ENV_VAR: &str = "RSSVIEW_HOME";

const APP_DIR_NAME: &str = "rssview";

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to access config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON in config file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Config file too large: {0}")]
    TooLarge(String),

    #[error("No user configuration directory on this platform; pass --root or set {ROOT_ENV_VAR}")]
    NoConfigDir,
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// HSL bounds for feed colors. Hue is in degrees, the rest in percent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ColorConfig {
    pub enable_paint: bool,
    pub max_hue: i32,
    pub min_hue: i32,
    #[serde(alias = "maxSaturatio")]
    pub max_saturation: i32,
    #[serde(alias = "minSaturatio")]
    pub min_saturation: i32,
    pub max_lightness: i32,
    pub min_lightness: i32,
}

impl Default for ColorConfig {
    fn default() -> Self {
        Self {
            enable_paint: true,
            max_hue: 360,
            min_hue: 0,
            max_saturation: 100,
            min_saturation: 30,
            max_lightness: 100,
            min_lightness: 60,
        }
    }
}

/// Limits for the fetch fan-out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SyncConfig {
    /// Upper bound on fetches in flight at once.
    pub max_concurrent_fetches: usize,

    /// Per-source deadline covering both URL and command sources.
    pub fetch_timeout_secs: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_concurrent_fetches: 16,
            fetch_timeout_secs: 30,
        }
    }
}

/// Top-level application configuration.
///
/// Every section uses `#[serde(default)]`, so any subset of keys is valid.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub color: ColorConfig,
    pub sync: SyncConfig,
}

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    const KNOWN_KEYS: [&'static str; 2] = ["color", "sync"];

    /// Load configuration from a JSON file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid JSON → `Err(ConfigError::Parse)`
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Ok(Self::default());
        }

        let raw: serde_json::Value = serde_json::from_str(&content)?;
        if let Some(table) = raw.as_object() {
            for key in table.keys() {
                if !Self::KNOWN_KEYS.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let config: Config = serde_json::from_value(raw)?;
        tracing::info!(
            path = %path.display(),
            paint = config.color.enable_paint,
            max_concurrent = config.sync.max_concurrent_fetches,
            "Loaded configuration"
        );
        Ok(config)
    }

    /// Load the config, writing the defaults first if no file exists yet.
    pub fn load_or_init(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            return Self::load(path);
        }
        let config = Self::default();
        config.save(path)?;
        tracing::info!(path = %path.display(), "Wrote default configuration");
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut json = serde_json::to_vec_pretty(self)?;
        json.push(b'\n');
        write_atomic(path, &json)?;
        Ok(())
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.sync.fetch_timeout_secs.max(1))
    }

    pub fn max_concurrent_fetches(&self) -> usize {
        self.sync.max_concurrent_fetches.max(1)
    }
}

// ============================================================================
// Paths
// ============================================================================

/// Locations of everything the application keeps on disk.
#[derive(Debug, Clone, PartialEq)]
pub struct AppPaths {
    pub root: PathBuf,
    /// One record file per feed and group.
    pub data_dir: PathBuf,
    pub config_file: PathBuf,
    /// Identities read by import.
    pub import_list: PathBuf,
    /// Identities written by export.
    pub export_list: PathBuf,
    /// Raw output of commands whose output did not parse.
    pub diagnostic_log: PathBuf,
}

impl AppPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            data_dir: root.join("data"),
            config_file: root.join("config.json"),
            import_list: root.join("list.txt"),
            export_list: root.join("list_export.txt"),
            diagnostic_log: root.join("fd.log"),
            root,
        }
    }

    /// Resolve the root: explicit override, then `RSSVIEW_HOME`, then the
    /// platform config directory.
    pub fn resolve(explicit: Option<PathBuf>) -> Result<Self, ConfigError> {
        if let Some(root) = explicit {
            return Ok(Self::new(root));
        }
        if let Some(root) = std::env::var_os(ROOT_ENV_VAR).filter(|v| !v.is_empty()) {
            return Ok(Self::new(PathBuf::from(root)));
        }
        Self::default_root().map(Self::new)
    }

    pub fn default_root() -> Result<PathBuf, ConfigError> {
        dirs::config_dir()
            .map(|d| d.join(APP_DIR_NAME))
            .ok_or(ConfigError::NoConfigDir)
    }

    /// Create the root and data directories.
    pub fn ensure(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.data_dir)
    }
}

// ============================================================================
// Tests
// ============================================================================
