use log::{debug, error, info};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::config::CacheConfig;
use crate::data::{GeocodedEvent, HistoricalEvent};

pub const EVENTS_KEY: &str = "timescape_events_cache";
pub const GEOCODED_KEY: &str = "timescape_geocoded_events";

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache i/o on `{path}`: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("cache record `{path}` is not valid JSON: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheRecord<T> {
    pub events: Vec<T>,
    /// Creation time, epoch milliseconds.
    pub timestamp: i64,
}

#[derive(Serialize)]
struct CacheRecordRef<'a, T> {
    events: &'a [T],
    timestamp: i64,
}

pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

pub struct CacheSlot<T> {
    path: PathBuf,
    retention_ms: i64,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Serialize + DeserializeOwned> CacheSlot<T> {
    pub fn new(dir: &Path, key: &str, retention: Duration) -> Self {
        Self {
            path: dir.join(format!("{}.json", key)),
            retention_ms: i64::try_from(retention.as_millis()).unwrap_or(i64::MAX),
            _marker: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Persists `events` stamped with the current time, replacing any prior record.
    pub fn save(&self, events: &[T]) {
        self.save_at(events, now_millis());
    }

    pub fn save_at(&self, events: &[T], timestamp: i64) {
        match self.write_record(events, timestamp) {
            Ok(()) => debug!("Cached {} events in {}", events.len(), self.path.display()),
            Err(e) => error!("Error caching events: {}", e),
        }
    }

    fn write_record(&self, events: &[T], timestamp: i64) -> Result<(), CacheError> {
        let io_err = |source| CacheError::Io {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }

        let body = serde_json::to_vec(&CacheRecordRef { events, timestamp }).map_err(|source| {
            CacheError::Json {
                path: self.path.clone(),
                source,
            }
        })?;

        // Write-then-rename so a crash never leaves half a record behind.
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, body).map_err(io_err)?;
        std::fs::rename(&tmp, &self.path).map_err(io_err)
    }

    fn read_record(&self) -> Result<Option<CacheRecord<T>>, CacheError> {
        let body = match std::fs::read(&self.path) {
            Ok(body) => body,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(CacheError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        serde_json::from_slice(&body)
            .map(Some)
            .map_err(|source| CacheError::Json {
                path: self.path.clone(),
                source,
            })
    }

    pub fn load(&self) -> Option<Vec<T>> {
        self.load_at(now_millis())
    }

    /// Stored events if the record is younger than the retention window.
    /// An expired record is removed.
    pub fn load_at(&self, now: i64) -> Option<Vec<T>> {
        let record = match self.read_record() {
            Ok(Some(record)) => record,
            Ok(None) => return None,
            Err(e) => {
                error!("Error retrieving cached events: {}", e);
                return None;
            }
        };

        if now - record.timestamp < self.retention_ms {
            return Some(record.events);
        }

        info!("Cache {} expired, clearing it", self.path.display());
        self.clear();
        None
    }

    pub fn is_valid(&self) -> bool {
        matches!(
            self.read_record(),
            Ok(Some(record)) if now_millis() - record.timestamp < self.retention_ms
        )
    }

    /// Age of the stored record in whole hours, rounded.
    pub fn age_hours(&self) -> Option<i64> {
        let record = self.read_record().ok().flatten()?;
        let age_ms = now_millis() - record.timestamp;
        Some((age_ms as f64 / 3_600_000.0).round() as i64)
    }

    pub fn clear(&self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => error!("Error clearing cache {}: {}", self.path.display(), e),
        }
    }
}

/// The two cache slots the shell consults, geocoded first.
pub struct LocalCache {
    pub events: CacheSlot<HistoricalEvent>,
    pub geocoded: CacheSlot<GeocodedEvent>,
}

impl LocalCache {
    pub fn new(config: &CacheConfig) -> Self {
        Self::in_dir(&config.resolved_dir(), config.retention())
    }

    pub fn in_dir(dir: &Path, retention: Duration) -> Self {
        Self {
            events: CacheSlot::new(dir, EVENTS_KEY, retention),
            geocoded: CacheSlot::new(dir, GEOCODED_KEY, retention),
        }
    }

    pub fn clear_all(&self) {
        self.events.clear();
        self.geocoded.clear();
    }
}
