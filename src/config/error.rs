//! Startup configuration failures
//!
//! Every variant is fatal: the entry point logs it and exits non-zero.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigFatal {
    #[error("failed to {action} {path}: {source}")]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("failed to parse legacy config {path}: {source}")]
    LegacyParse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("failed to write migrated config {path}: {source}")]
    Serialize {
        path: PathBuf,
        #[source]
        source: toml::ser::Error,
    },

    #[error("{path} does not contain a table at the top level")]
    NotATable { path: PathBuf },

    #[error("missing display type (expected key `ui.display.type`)")]
    MissingDisplayType,

    #[error("unsupported display type {0:?}")]
    UnsupportedDisplay(String),
}

impl ConfigFatal {
    pub(crate) fn io(action: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            action,
            path: path.into(),
            source,
        }
    }
}
