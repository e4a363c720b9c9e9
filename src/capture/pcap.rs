//! Classic pcap container reader
//!
//! Only what the extractor needs: the link type and each record's captured
//! bytes, in file order. Both byte orders and both timestamp resolutions are
//! accepted; pcapng is not.

use std::fs;
use std::path::Path;
use thiserror::Error;
use tracing::warn;

use crate::constants::pcap::*;

/// Upper bound on a single record; anything larger means a corrupt header
const MAX_RECORD_LEN: usize = 256 * 1024;

#[derive(Debug, Error)]
pub enum PcapError {
    #[error("cannot read capture: {0}")]
    Io(#[from] std::io::Error),

    #[error("file too short for a pcap header ({0} bytes)")]
    TooShort(usize),

    #[error("not a pcap file (magic {0:#010x})")]
    BadMagic(u32),

    #[error("record {index} claims {len} bytes, larger than any real frame")]
    OversizedRecord { index: usize, len: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ByteOrder {
    Little,
    Big,
}

impl ByteOrder {
    fn u32(self, bytes: &[u8]) -> u32 {
        let raw = [bytes[0], bytes[1], bytes[2], bytes[3]];
        match self {
            ByteOrder::Little => u32::from_le_bytes(raw),
            ByteOrder::Big => u32::from_be_bytes(raw),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capture {
    pub link_type: u32,
    pub records: Vec<Vec<u8>>,
}

pub fn read_capture(path: &Path) -> Result<Capture, PcapError> {
    let bytes = fs::read(path)?;
    parse_capture(&bytes)
}

pub fn parse_capture(bytes: &[u8]) -> Result<Capture, PcapError> {
    if bytes.len() < GLOBAL_HEADER_LEN {
        return Err(PcapError::TooShort(bytes.len()));
    }

    let magic = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
    let order = match magic {
        MAGIC_MICROS | MAGIC_NANOS => ByteOrder::Little,
        m if m.swap_bytes() == MAGIC_MICROS || m.swap_bytes() == MAGIC_NANOS => ByteOrder::Big,
        m => return Err(PcapError::BadMagic(m)),
    };
    let link_type = order.u32(&bytes[20..24]);

    let mut records = Vec::new();
    let mut offset = GLOBAL_HEADER_LEN;
    while offset < bytes.len() {
        let index = records.len();
        if bytes.len() - offset < RECORD_HEADER_LEN {
            warn!(index, "Truncated pcap record header, ignoring the rest of the file");
            break;
        }
        let incl_len = order.u32(&bytes[offset + 8..offset + 12]) as usize;
        if incl_len > MAX_RECORD_LEN {
            return Err(PcapError::OversizedRecord { index, len: incl_len });
        }
        let start = offset + RECORD_HEADER_LEN;
        let Some(data) = bytes.get(start..start + incl_len) else {
            warn!(index, incl_len, "Truncated pcap record, ignoring the rest of the file");
            break;
        };
        records.push(data.to_vec());
        offset = start + incl_len;
    }

    Ok(Capture { link_type, records })
}
