//! Per-session statistics recorder
//!
//! Every epoch's data is stored under its wall-clock `HH:MM:SS` key inside
//! `{"data": {...}}` and the whole session file is rewritten through the
//! atomic [`StatusFile`] store. Past sessions stay on disk and can be
//! queried for plot series the same way as the current one.

use chrono::{DateTime, Local};
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::constants::status::{
    EPOCH_KEY_FORMAT, SESSION_DATA_KEY, SESSION_FILE_FORMAT, SESSION_FILE_PREFIX, SESSION_FILE_SUFFIX,
};
use crate::persistence::{DataFormat, Payload, StatusError, StatusFile};

/// Session name that always refers to the live session
pub const CURRENT_SESSION: &str = "Current";

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("{0:?} is not a session file name")]
    InvalidName(String),

    #[error(transparent)]
    Status(#[from] StatusError),
}

/// A named group of epoch keys plotted together
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatsView {
    Os,
    Temp,
    Nums,
    Duration,
    Epoch,
}

impl StatsView {
    pub const ALL: [StatsView; 5] = [
        StatsView::Os,
        StatsView::Temp,
        StatsView::Nums,
        StatsView::Duration,
        StatsView::Epoch,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            StatsView::Os => "os",
            StatsView::Temp => "temp",
            StatsView::Nums => "nums",
            StatsView::Duration => "duration",
            StatsView::Epoch => "epoch",
        }
    }

    pub fn keys(self) -> &'static [&'static str] {
        match self {
            StatsView::Os => &["cpu_load", "mem_usage"],
            StatsView::Temp => &["temperature"],
            StatsView::Nums => &[
                "missed_interactions",
                "num_hops",
                "num_peers",
                "tot_bond",
                "avg_bond",
                "num_deauths",
                "num_associations",
                "num_handshakes",
            ],
            StatsView::Duration => &["duration_secs", "slept_for_secs"],
            StatsView::Epoch => &["active_for_epochs", "blind_for_epochs"],
        }
    }
}

impl fmt::Display for StatsView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown stats view {0:?} (expected os, temp, nums, duration or epoch)")]
pub struct UnknownView(pub String);

impl FromStr for StatsView {
    type Err = UnknownView;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StatsView::ALL
            .into_iter()
            .find(|view| view.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownView(s.to_string()))
    }
}

/// Plot data: one label per key, one `[timestamp, value]` list per label
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Series {
    pub labels: Vec<String>,
    pub values: Vec<Vec<(String, Value)>>,
}

impl Series {
    /// Epochs that lack a key are skipped for that key only
    pub fn from_epochs(epochs: &Map<String, Value>, view: StatsView) -> Self {
        let keys = view.keys();
        let values = keys
            .iter()
            .map(|key| {
                epochs
                    .iter()
                    .filter_map(|(ts, epoch)| Some((ts.clone(), epoch.get(*key)?.clone())))
                    .collect()
            })
            .collect();
        Self {
            labels: keys.iter().map(|k| k.to_string()).collect(),
            values,
        }
    }
}

pub struct SessionLog {
    dir: PathBuf,
    clock: Arc<dyn Clock>,
    store: StatusFile,
    epochs: Mutex<Map<String, Value>>,
}

impl SessionLog {
    /// Start (or resume, within the same minute) a session file in `dir`
    pub fn create(dir: impl Into<PathBuf>, clock: Arc<dyn Clock>) -> Result<Self, StatusError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|source| StatusError::Io {
            action: "create",
            path: dir.clone(),
            source,
        })?;

        let name = DateTime::<Local>::from(clock.now())
            .format(SESSION_FILE_FORMAT)
            .to_string();
        let store = StatusFile::open_with_clock(dir.join(&name), DataFormat::Json, clock.clone())?;
        let epochs = epochs_of(store.data().as_ref());

        info!(session = %name, resumed = epochs.len(), "Session log opened");
        Ok(Self {
            dir,
            clock,
            store,
            epochs: Mutex::new(epochs),
        })
    }

    pub fn path(&self) -> &Path {
        self.store.path()
    }

    pub fn name(&self) -> String {
        self.store
            .path()
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Store one epoch's data and rewrite the session file
    ///
    /// A second epoch within the same second replaces the first.
    pub fn record_epoch(&self, data: Value) -> Result<(), StatusError> {
        let key = DateTime::<Local>::from(self.clock.now())
            .format(EPOCH_KEY_FORMAT)
            .to_string();

        let mut epochs = self.epochs.lock().unwrap_or_else(PoisonError::into_inner);
        let mut next = epochs.clone();
        next.insert(key.clone(), data);

        let mut doc = Map::new();
        doc.insert(SESSION_DATA_KEY.to_string(), Value::Object(next.clone()));
        self.store.update(Some(Payload::Json(Value::Object(doc))))?;

        *epochs = next;
        debug!(epoch = %key, count = epochs.len(), "Recorded epoch");
        Ok(())
    }

    /// Series for the live session, or for a past one by file name
    pub fn series(&self, view: StatsView, session: Option<&str>) -> Result<Series, SessionError> {
        match session {
            Some(name) if name != CURRENT_SESSION => load_series(&self.dir, name, view),
            _ => {
                let epochs = self.epochs.lock().unwrap_or_else(PoisonError::into_inner);
                Ok(Series::from_epochs(&epochs, view))
            }
        }
    }
}

fn epochs_of(payload: Option<&Payload>) -> Map<String, Value> {
    match payload {
        Some(Payload::Json(doc)) => match doc.get(SESSION_DATA_KEY) {
            Some(Value::Object(epochs)) => epochs.clone(),
            _ => Map::new(),
        },
        _ => Map::new(),
    }
}

/// Bare `stats_*.json` file name, no directory parts
fn is_session_name(name: &str) -> bool {
    Path::new(name).file_name().is_some_and(|file| file == name)
        && name.len() > SESSION_FILE_PREFIX.len() + SESSION_FILE_SUFFIX.len()
        && name.starts_with(SESSION_FILE_PREFIX)
        && name.ends_with(SESSION_FILE_SUFFIX)
}

/// Series from a session file in `dir`; a missing file or data block yields empty lists
///
/// Only bare session file names are accepted, so callers cannot reach outside `dir`.
pub fn load_series(dir: &Path, session: &str, view: StatsView) -> Result<Series, SessionError> {
    if !is_session_name(session) {
        warn!(session, "Rejected session name");
        return Err(SessionError::InvalidName(session.to_string()));
    }
    let store = StatusFile::open(dir.join(session), DataFormat::Json)?;
    Ok(Series::from_epochs(&epochs_of(store.data().as_ref()), view))
}

/// Session files in `dir`, sorted by name (which is also chronological)
pub fn list_sessions(dir: &Path) -> Result<Vec<String>, StatusError> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(source) => {
            return Err(StatusError::Io {
                action: "list",
                path: dir.to_path_buf(),
                source,
            });
        }
    };

    let mut names: Vec<String> = entries
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_ok_and(|t| t.is_file()))
        .filter_map(|entry| entry.file_name().into_string().ok())
        .filter(|name| is_session_name(name))
        .collect();
    names.sort();
    Ok(names)
}

/// `HH:MM:SS`, hours not wrapped at 24
pub fn format_hhmmss(secs: u64) -> String {
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
}
