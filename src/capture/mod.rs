//! Wireless facts recovered from capture files
//!
//! Each [`WifiField`] owns a strategy: which management subtypes it looks
//! at, and how it reads its value out of the first suitable frame. Every
//! call re-reads and re-decodes the file; nothing is cached.
//!
//! Two entry points exist on purpose:
//! - [`extract`] stops at the first field that cannot be found and returns
//!   only that failure (all-or-nothing);
//! - [`extract_each`] evaluates every requested field and reports each
//!   outcome separately.

pub mod dot11;
pub mod pcap;
pub mod radiotap;

#[cfg(test)]
pub(crate) mod fixtures;

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;
use tracing::{debug, warn};

use crate::constants::dot11::{SUBTYPE_ASSOC_REQ, SUBTYPE_BEACON, SUBTYPE_REASSOC_REQ};
use crate::constants::pcap::{CAPTURE_EXTENSION, LINKTYPE_IEEE802_11, LINKTYPE_RADIOTAP};
use dot11::{Dot11Frame, MacAddr};
use radiotap::RadioInfo;

/// Fields that can be pulled out of a capture file
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WifiField {
    Bssid,
    Essid,
    Encryption,
    Channel,
    Rssi,
}

impl WifiField {
    pub const ALL: [WifiField; 5] = [
        WifiField::Bssid,
        WifiField::Essid,
        WifiField::Encryption,
        WifiField::Channel,
        WifiField::Rssi,
    ];

    /// Management subtypes considered, or `None` for "first frame of any kind"
    fn subtypes(self) -> Option<&'static [u8]> {
        match self {
            WifiField::Bssid | WifiField::Encryption => Some(&[SUBTYPE_BEACON]),
            WifiField::Essid => Some(&[SUBTYPE_BEACON, SUBTYPE_ASSOC_REQ, SUBTYPE_REASSOC_REQ]),
            WifiField::Channel | WifiField::Rssi => None,
        }
    }

    fn strategy(self) -> Strategy {
        match self {
            WifiField::Bssid => bssid,
            WifiField::Essid => essid,
            WifiField::Encryption => encryption,
            WifiField::Channel => channel,
            WifiField::Rssi => rssi,
        }
    }
}

impl fmt::Display for WifiField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WifiField::Bssid => "BSSID",
            WifiField::Essid => "ESSID",
            WifiField::Encryption => "ENCRYPTION",
            WifiField::Channel => "CHANNEL",
            WifiField::Rssi => "RSSI",
        };
        f.write_str(name)
    }
}

impl FromStr for WifiField {
    type Err = ExtractError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        WifiField::ALL
            .into_iter()
            .find(|field| field.to_string().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ExtractError::InvalidField(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Bssid(MacAddr),
    Essid(String),
    Encryption(BTreeSet<String>),
    Channel(u32),
    Rssi(i32),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractError {
    #[error("could not find field [{field}]: {reason}")]
    FieldNotFound { field: WifiField, reason: String },

    #[error("invalid field {0:?}")]
    InvalidField(String),
}

/// One decoded record: radio metadata (radiotap captures only) and the 802.11 frame
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Frame {
    pub radio: Option<RadioInfo>,
    pub dot11: Option<Dot11Frame>,
}

type Strategy = fn(&[&Frame]) -> Result<FieldValue, String>;

/// Decode every record of a capture file, in file order
pub fn decode_frames(path: &Path) -> Result<Vec<Frame>, String> {
    let capture = pcap::read_capture(path).map_err(|e| e.to_string())?;

    let frames = match capture.link_type {
        LINKTYPE_RADIOTAP => capture
            .records
            .iter()
            .map(|record| match radiotap::parse(record) {
                Some((radio, len)) => Frame {
                    radio: Some(radio),
                    dot11: dot11::parse(&record[len..], radio.has_fcs()),
                },
                None => Frame::default(),
            })
            .collect(),
        LINKTYPE_IEEE802_11 => capture
            .records
            .iter()
            .map(|record| Frame {
                radio: None,
                dot11: dot11::parse(record, false),
            })
            .collect(),
        other => return Err(format!("unsupported link type {other}")),
    };
    Ok(frames)
}

fn candidates<'a>(frames: &'a [Frame], subtypes: Option<&[u8]>) -> Vec<&'a Frame> {
    match subtypes {
        None => frames.iter().take(1).collect(),
        Some(subtypes) => frames
            .iter()
            .filter(|frame| {
                frame
                    .dot11
                    .as_ref()
                    .is_some_and(|d| subtypes.iter().any(|s| d.is_management(*s)))
            })
            .collect(),
    }
}

fn find(field: WifiField, decoded: &Result<Vec<Frame>, String>) -> Result<FieldValue, ExtractError> {
    let not_found = |reason: String| ExtractError::FieldNotFound { field, reason };
    let frames = decoded.as_ref().map_err(|e| not_found(e.clone()))?;

    let matching = candidates(frames, field.subtypes());
    if matching.is_empty() {
        return Err(not_found("no matching frames".to_string()));
    }
    (field.strategy())(&matching).map_err(not_found)
}

/// Look up every requested field, aborting at the first one that is missing
pub fn extract(
    path: impl AsRef<Path>,
    fields: &[WifiField],
) -> Result<BTreeMap<WifiField, FieldValue>, ExtractError> {
    if fields.is_empty() {
        return Ok(BTreeMap::new());
    }
    let path = path.as_ref();
    let decoded = decode_frames(path);

    let mut results = BTreeMap::new();
    for &field in fields {
        let value = find(field, &decoded).inspect_err(|e| debug!(path = %path.display(), error = %e, "Extraction aborted"))?;
        results.insert(field, value);
    }
    Ok(results)
}

/// Look up every requested field independently
pub fn extract_each(
    path: impl AsRef<Path>,
    fields: &[WifiField],
) -> BTreeMap<WifiField, Result<FieldValue, ExtractError>> {
    if fields.is_empty() {
        return BTreeMap::new();
    }
    let decoded = decode_frames(path.as_ref());
    fields
        .iter()
        .map(|&field| (field, find(field, &decoded)))
        .collect()
}

/// Number of capture files (`*.pcap`) in a handshake directory; unreadable dirs count as empty
pub fn total_unique_handshakes(dir: impl AsRef<Path>) -> usize {
    let dir = dir.as_ref();
    match fs::read_dir(dir) {
        Ok(entries) => entries
            .filter_map(Result::ok)
            .filter(|entry| entry.path().extension().is_some_and(|ext| ext == CAPTURE_EXTENSION))
            .count(),
        Err(e) => {
            warn!(dir = %dir.display(), error = %e, "Cannot list handshake directory");
            0
        }
    }
}

// ------------------------------------------------------------------------------
// Per-field strategies
// ------------------------------------------------------------------------------

fn bssid(frames: &[&Frame]) -> Result<FieldValue, String> {
    frames
        .iter()
        .find_map(|f| f.dot11.as_ref()?.addr3)
        .map(FieldValue::Bssid)
        .ok_or_else(|| "beacon without address 3".to_string())
}

fn essid(frames: &[&Frame]) -> Result<FieldValue, String> {
    let element = frames
        .iter()
        .find_map(|f| f.dot11.as_ref()?.management.as_ref()?.elements.first())
        .ok_or_else(|| "no information elements".to_string())?;
    String::from_utf8(element.data.clone())
        .map(FieldValue::Essid)
        .map_err(|e| format!("ESSID is not valid UTF-8: {e}"))
}

fn encryption(frames: &[&Frame]) -> Result<FieldValue, String> {
    frames
        .iter()
        .find_map(|f| f.dot11.as_ref()?.management.as_ref())
        .map(|mgmt| FieldValue::Encryption(dot11::crypto_summary(mgmt)))
        .ok_or_else(|| "beacon body could not be decoded".to_string())
}

fn first_radio(frames: &[&Frame]) -> Result<RadioInfo, String> {
    frames
        .first()
        .and_then(|f| f.radio)
        .ok_or_else(|| "first frame carries no radio metadata".to_string())
}

fn channel(frames: &[&Frame]) -> Result<FieldValue, String> {
    let freq = first_radio(frames)?
        .channel_freq
        .ok_or_else(|| "first frame has no channel frequency".to_string())?;
    radiotap::freq_to_channel(freq)
        .map(FieldValue::Channel)
        .ok_or_else(|| format!("{freq} MHz is not a known channel"))
}

fn rssi(frames: &[&Frame]) -> Result<FieldValue, String> {
    first_radio(frames)?
        .antenna_signal
        .map(|dbm| FieldValue::Rssi(i32::from(dbm)))
        .ok_or_else(|| "first frame has no antenna signal".to_string())
}
