//! Durable status records
//!
//! A [`StatusFile`] is one file on disk plus its in-memory mirror. Every
//! update replaces the whole payload and lands on disk through a temp file
//! and a rename, so readers of the canonical path only ever see a complete
//! old or a complete new version.

use chrono::{DateTime, Local};
use serde_json::Value;
use std::fmt;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, SystemTime};
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{debug, warn};

use crate::clock::{Clock, SystemClock};
use crate::constants::status::HEARTBEAT_FORMAT;

/// On-disk representation, fixed when the file is opened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataFormat {
    Raw,
    Json,
}

impl fmt::Display for DataFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataFormat::Raw => f.write_str("raw"),
            DataFormat::Json => f.write_str("json"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Text(String),
    Json(Value),
}

impl Payload {
    fn format(&self) -> DataFormat {
        match self {
            Payload::Text(_) => DataFormat::Raw,
            Payload::Json(_) => DataFormat::Json,
        }
    }
}

#[derive(Debug, Error)]
pub enum StatusError {
    #[error("failed to {action} {path}: {source}")]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path} does not hold valid JSON: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("cannot store a {payload} payload in {path} ({format} format)")]
    FormatMismatch {
        path: PathBuf,
        format: DataFormat,
        payload: DataFormat,
    },
}

impl StatusError {
    fn io(action: &'static str, path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            action,
            path: path.to_path_buf(),
            source,
        }
    }
}

#[derive(Debug, Default)]
struct Record {
    updated: Option<SystemTime>,
    data: Option<Payload>,
}

pub struct StatusFile {
    path: PathBuf,
    format: DataFormat,
    clock: Arc<dyn Clock>,
    record: Mutex<Record>,
}

impl fmt::Debug for StatusFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatusFile")
            .field("path", &self.path)
            .field("format", &self.format)
            .field("record", &*self.lock())
            .finish()
    }
}

impl StatusFile {
    /// Open a status file, reading its content eagerly; a missing file is not an error
    pub fn open(path: impl Into<PathBuf>, format: DataFormat) -> Result<Self, StatusError> {
        Self::open_with_clock(path, format, Arc::new(SystemClock))
    }

    pub fn open_with_clock(
        path: impl Into<PathBuf>,
        format: DataFormat,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, StatusError> {
        let path = path.into();
        let record = match fs::read_to_string(&path) {
            Ok(contents) => {
                let updated = fs::metadata(&path)
                    .and_then(|m| m.modified())
                    .map_err(|e| StatusError::io("stat", &path, e))?;
                let data = match format {
                    DataFormat::Raw => Payload::Text(contents),
                    DataFormat::Json => {
                        let value = serde_json::from_str(&contents).map_err(|source| {
                            StatusError::Malformed {
                                path: path.clone(),
                                source,
                            }
                        })?;
                        Payload::Json(value)
                    }
                };
                debug!(path = %path.display(), %format, "Loaded status file");
                Record {
                    updated: Some(updated),
                    data: Some(data),
                }
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Record::default(),
            Err(e) => return Err(StatusError::io("read", &path, e)),
        };

        Ok(Self {
            path,
            format,
            clock,
            record: Mutex::new(record),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Record> {
        self.record.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn format(&self) -> DataFormat {
        self.format
    }

    /// Field of a JSON object payload, or `default` when unset/absent/not an object
    pub fn get(&self, key: &str, default: Value) -> Value {
        match &self.lock().data {
            Some(Payload::Json(Value::Object(map))) => map.get(key).cloned().unwrap_or(default),
            _ => default,
        }
    }

    pub fn data(&self) -> Option<Payload> {
        self.lock().data.clone()
    }

    pub fn updated(&self) -> Option<SystemTime> {
        self.lock().updated
    }

    /// Timestamp and payload taken under a single lock acquisition
    pub fn snapshot(&self) -> (Option<SystemTime>, Option<Payload>) {
        let record = self.lock();
        (record.updated, record.data.clone())
    }

    /// Was the record updated less than `within` ago? Never-updated records are not.
    pub fn is_newer_than(&self, within: Duration) -> bool {
        let Some(updated) = self.lock().updated else {
            return false;
        };
        // a timestamp in the future (clock stepped back) counts as just now
        let elapsed = self
            .clock
            .now()
            .duration_since(updated)
            .unwrap_or(Duration::ZERO);
        elapsed < within
    }

    pub fn newer_than_minutes(&self, minutes: u64) -> bool {
        self.is_newer_than(Duration::from_secs(minutes.saturating_mul(60)))
    }

    pub fn newer_than_hours(&self, hours: u64) -> bool {
        self.is_newer_than(Duration::from_secs(hours.saturating_mul(60 * 60)))
    }

    /// Windows too large to represent clamp to "forever"
    pub fn newer_than_days(&self, days: u64) -> bool {
        self.is_newer_than(Duration::from_secs(days.saturating_mul(24 * 60 * 60)))
    }

    /// Replace the payload and persist it atomically.
    ///
    /// `None` writes only the current timestamp (a heartbeat). On failure the
    /// in-memory record keeps its previous payload and timestamp.
    pub fn update(&self, payload: Option<Payload>) -> Result<(), StatusError> {
        let mut record = self.lock();
        let now = self.clock.now();

        let contents = self.render(payload.as_ref(), now)?;
        write_atomic(&self.path, contents.as_bytes())?;

        record.updated = Some(now);
        record.data = payload;
        debug!(path = %self.path.display(), bytes = contents.len(), "Status file updated");
        Ok(())
    }

    pub fn heartbeat(&self) -> Result<(), StatusError> {
        self.update(None)
    }

    fn render(&self, payload: Option<&Payload>, now: SystemTime) -> Result<String, StatusError> {
        match (payload, self.format) {
            (None, DataFormat::Raw) => Ok(heartbeat_text(now)),
            // keep JSON files parseable: the heartbeat becomes a JSON string
            (None, DataFormat::Json) => Ok(Value::String(heartbeat_text(now)).to_string()),
            (Some(Payload::Text(text)), DataFormat::Raw) => Ok(text.clone()),
            (Some(Payload::Json(value)), DataFormat::Json) => Ok(value.to_string()),
            (Some(other), format) => Err(StatusError::FormatMismatch {
                path: self.path.clone(),
                format,
                payload: other.format(),
            }),
        }
    }
}

fn heartbeat_text(at: SystemTime) -> String {
    DateTime::<Local>::from(at).format(HEARTBEAT_FORMAT).to_string()
}

/// Write to a temp file in the target directory, then rename over the target
fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), StatusError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    // the temp file is removed on drop unless persisted
    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| StatusError::io("create temp file in", dir, e))?;
    tmp.write_all(contents)
        .and_then(|()| tmp.as_file().sync_all())
        .map_err(|e| StatusError::io("write temp file for", path, e))?;
    tmp.persist(path).map_err(|e| {
        warn!(path = %path.display(), error = %e.error, "Atomic rename failed");
        StatusError::io("rename into", path, e.error)
    })?;
    Ok(())
}
