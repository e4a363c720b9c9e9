//! Radiotap header decoding
//!
//! Reads the handful of fields from the first present word that the
//! extractor cares about. Field alignment is relative to the start of the
//! header, as the radiotap format requires. Vendor namespaces are skipped
//! with a warning.

use tracing::{debug, warn};

use crate::constants::radiotap::*;

/// Radio metadata attached to one captured frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RadioInfo {
    pub flags: Option<u8>,
    /// Center frequency in MHz
    pub channel_freq: Option<u16>,
    /// Antenna signal in dBm
    pub antenna_signal: Option<i8>,
}

impl RadioInfo {
    /// The 802.11 frame carries a trailing FCS
    pub fn has_fcs(&self) -> bool {
        self.flags.is_some_and(|f| f & FLAG_FCS != 0)
    }
}

/// (bit, alignment, size) for every field up to the antenna signal
const FIELDS: [(u32, usize, usize); 6] = [
    (TSFT, 8, 8),
    (FLAGS, 1, 1),
    (RATE, 1, 1),
    (CHANNEL, 2, 4),
    (FHSS, 1, 2),
    (DBM_ANTSIGNAL, 1, 1),
];

/// Decode a radiotap header; returns the metadata and the header length
pub fn parse(data: &[u8]) -> Option<(RadioInfo, usize)> {
    if data.len() < HEADER_LEN || data[0] != 0 {
        return None;
    }
    let len = u16::from_le_bytes([data[2], data[3]]) as usize;
    if len < HEADER_LEN || len > data.len() {
        return None;
    }
    let header = &data[..len];

    let present = read_u32(header, 4)?;
    let mut offset = HEADER_LEN;
    let mut word = present;
    let mut vendor_words = 0;
    while word & (1 << EXT) != 0 {
        if word & (1 << VENDOR_NAMESPACE) != 0 {
            vendor_words += 1;
        }
        word = read_u32(header, offset)?;
        offset += 4;
    }
    if vendor_words > 0 {
        // only fields of the first (default namespace) word are decoded
        warn!(vendor_words, len, "Skipping vendor radiotap namespace");
    }

    let mut info = RadioInfo::default();
    for (bit, align, size) in FIELDS {
        if present & (1 << bit) == 0 {
            continue;
        }
        offset = offset.next_multiple_of(align);
        let Some(field) = header.get(offset..offset + size) else {
            debug!(bit, len, "Radiotap field runs past header end");
            break;
        };
        match bit {
            FLAGS => info.flags = Some(field[0]),
            CHANNEL => info.channel_freq = Some(u16::from_le_bytes([field[0], field[1]])),
            DBM_ANTSIGNAL => info.antenna_signal = Some(field[0] as i8),
            _ => {}
        }
        offset += size;
    }

    Some((info, len))
}

fn read_u32(data: &[u8], at: usize) -> Option<u32> {
    let bytes = data.get(at..at + 4)?;
    Some(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

/// Map a center frequency (MHz) to its 802.11 channel number
pub fn freq_to_channel(freq: u16) -> Option<u32> {
    let freq = u32::from(freq);
    match freq {
        2412..=2472 if (freq - 2412) % 5 == 0 => Some((freq - 2412) / 5 + 1),
        2484 => Some(14),
        5150..=5895 if freq % 5 == 0 => Some((freq - 5000) / 5),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::fixtures::radiotap_header;

    #[test]
    fn test_parses_channel_and_signal() {
        let header = radiotap_header(Some(2437), Some(-42), false);

        let (info, len) = parse(&header).unwrap();

        assert_eq!(len, header.len());
        assert_eq!(info.channel_freq, Some(2437));
        assert_eq!(info.antenna_signal, Some(-42));
        assert!(!info.has_fcs());
    }

    #[test]
    fn test_fcs_flag() {
        let (info, _) = parse(&radiotap_header(None, None, true)).unwrap();
        assert!(info.has_fcs());
        assert_eq!(info.channel_freq, None);
    }

    #[test]
    fn test_tsft_forces_eight_byte_alignment() {
        // present: TSFT + channel + antenna signal, with an extended present word
        let present: u32 = (1 << TSFT) | (1 << CHANNEL) | (1 << DBM_ANTSIGNAL) | (1 << EXT);
        let mut header = vec![0, 0, 0, 0];
        header.extend_from_slice(&present.to_le_bytes());
        header.extend_from_slice(&0u32.to_le_bytes()); // second present word
        // offset 12 -> TSFT aligned to 16
        header.extend_from_slice(&[0; 4]);
        header.extend_from_slice(&7u64.to_le_bytes());
        header.extend_from_slice(&5180u16.to_le_bytes());
        header.extend_from_slice(&0u16.to_le_bytes());
        header.push((-67i8) as u8);
        let len = header.len() as u16;
        header[2..4].copy_from_slice(&len.to_le_bytes());

        let (info, _) = parse(&header).unwrap();

        assert_eq!(info.channel_freq, Some(5180));
        assert_eq!(info.antenna_signal, Some(-67));
    }

    #[test]
    fn test_vendor_namespace_is_skipped() {
        let present: u32 = (1 << FLAGS) | (1 << VENDOR_NAMESPACE) | (1 << EXT);
        let mut header = vec![0, 0, 0, 0];
        header.extend_from_slice(&present.to_le_bytes());
        header.extend_from_slice(&1u32.to_le_bytes()); // vendor word
        header.push(FLAG_FCS);
        // vendor namespace: oui, sub namespace, skip length, then the vendor data
        header.extend_from_slice(&[0; 3]);
        header.extend_from_slice(&[0x00, 0x11, 0x22, 0, 4, 0, 0xaa, 0xbb, 0xcc, 0xdd]);
        let len = header.len() as u16;
        header[2..4].copy_from_slice(&len.to_le_bytes());

        let (info, consumed) = parse(&header).unwrap();

        assert!(info.has_fcs());
        assert_eq!(info.channel_freq, None);
        assert_eq!(consumed, header.len());
    }

    #[test]
    fn test_rejects_bad_header() {
        assert_eq!(parse(&[0, 0, 4]), None);
        // length field beyond the buffer
        assert_eq!(parse(&[0, 0, 64, 0, 0, 0, 0, 0]), None);
        // unknown version
        assert_eq!(parse(&[1, 0, 8, 0, 0, 0, 0, 0]), None);
    }

    #[test]
    fn test_freq_to_channel() {
        assert_eq!(freq_to_channel(2412), Some(1));
        assert_eq!(freq_to_channel(2437), Some(6));
        assert_eq!(freq_to_channel(2472), Some(13));
        assert_eq!(freq_to_channel(2484), Some(14));
        assert_eq!(freq_to_channel(5180), Some(36));
        assert_eq!(freq_to_channel(5825), Some(165));
        assert_eq!(freq_to_channel(2413), None);
        assert_eq!(freq_to_channel(900), None);
    }
}
