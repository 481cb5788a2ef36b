use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::data::{COMPACT_FEED_URL, RICHER_FEED_URL, TILE_URL};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config `{path}`: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config `{path}`: {source}")]
    Toml {
        path: PathBuf,
        source: toml::de::Error,
    },
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub network: NetworkConfig,
    pub cache: CacheConfig,
    pub map: MapConfig,
    pub events: EventsConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub compact_base_url: String,
    pub richer_base_url: String,
    pub timeout_secs: u64,
    pub dedup_window_secs: u64,
    pub batch_size: usize,
    pub batch_concurrency: usize,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            compact_base_url: COMPACT_FEED_URL.to_string(),
            richer_base_url: RICHER_FEED_URL.to_string(),
            timeout_secs: 10,
            dedup_window_secs: 5 * 60,
            batch_size: 12,
            batch_concurrency: 2,
        }
    }
}

impl NetworkConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn dedup_window(&self) -> Duration {
        Duration::from_secs(self.dedup_window_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub retention_days: u64,
    pub dir: Option<PathBuf>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            retention_days: 7,
            dir: None,
        }
    }
}

impl CacheConfig {
    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_days * 24 * 60 * 60)
    }

    /// Configured directory, or the platform cache dir.
    pub fn resolved_dir(&self) -> PathBuf {
        self.dir.clone().unwrap_or_else(|| {
            dirs::cache_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join("timescape")
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MapConfig {
    pub tile_url: String,
    pub min_region_zoom: f64,
    pub region_throttle_ms: u64,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            tile_url: TILE_URL.to_string(),
            min_region_zoom: 2.0,
            region_throttle_ms: 2000,
        }
    }
}

impl MapConfig {
    pub fn region_throttle(&self) -> Duration {
        Duration::from_millis(self.region_throttle_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EventsConfig {
    pub year_min: i32,
    pub year_max: i32,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            year_min: 1000,
            year_max: 2024,
        }
    }
}

impl EventsConfig {
    pub fn year_range(&self) -> (i32, i32) {
        (self.year_min.min(self.year_max), self.year_min.max(self.year_max))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Config {
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("timescape").join("config.toml"))
    }

    pub fn from_toml_str(text: &str, path: &Path) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|source| ConfigError::Toml {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Reads `path`; a missing file yields the defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(text) => Self::from_toml_str(&text, path),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(source) => Err(ConfigError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    /// Loads the user config, falling back to defaults on any error.
    ///
    /// Runs before the logger exists, so problems go to stderr.
    pub fn load() -> Self {
        let Some(path) = Self::default_path() else {
            return Self::default();
        };

        match Self::load_from(&path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("{e}; using default configuration");
                Self::default()
            }
        }
    }
}
