//! In-memory builders for capture files used by the capture tests

use crate::constants::dot11::{IE_RSN, IE_SSID, IE_VENDOR, MS_WPA_PREFIX};
use crate::constants::pcap::MAGIC_MICROS;
use crate::constants::radiotap::{CHANNEL, DBM_ANTSIGNAL, FLAGS, FLAG_FCS};

pub const BSSID: [u8; 6] = [0xde, 0xad, 0xbe, 0xef, 0x00, 0x01];
const BROADCAST: [u8; 6] = [0xff; 6];
const CLIENT: [u8; 6] = [0x02, 0x11, 0x22, 0x33, 0x44, 0x55];

fn global_header(link_type: u32, be: bool) -> Vec<u8> {
    let fields: [u32; 6] = [MAGIC_MICROS, 0x0004_0002, 0, 0, 65535, link_type];
    let mut out = Vec::new();
    for (i, value) in fields.into_iter().enumerate() {
        // version is two u16s, everything else a u32
        if i == 1 {
            for half in [2u16, 4u16] {
                out.extend_from_slice(&if be { half.to_be_bytes() } else { half.to_le_bytes() });
            }
        } else {
            out.extend_from_slice(&if be { value.to_be_bytes() } else { value.to_le_bytes() });
        }
    }
    out
}

fn build(link_type: u32, records: &[Vec<u8>], be: bool) -> Vec<u8> {
    let mut out = global_header(link_type, be);
    for (i, record) in records.iter().enumerate() {
        let len = record.len() as u32;
        for value in [1_700_000_000 + i as u32, 0, len, len] {
            out.extend_from_slice(&if be { value.to_be_bytes() } else { value.to_le_bytes() });
        }
        out.extend_from_slice(record);
    }
    out
}

pub fn pcap_file(link_type: u32, records: &[Vec<u8>]) -> Vec<u8> {
    build(link_type, records, false)
}

pub fn pcap_file_be(link_type: u32, records: &[Vec<u8>]) -> Vec<u8> {
    build(link_type, records, true)
}

/// Radiotap header carrying flags, and optionally channel and signal
pub fn radiotap_header(freq: Option<u16>, signal: Option<i8>, fcs: bool) -> Vec<u8> {
    let mut present = 1u32 << FLAGS;
    let mut body = vec![if fcs { FLAG_FCS } else { 0 }];
    if let Some(freq) = freq {
        present |= 1 << CHANNEL;
        // flags ends at offset 9, channel is 2-byte aligned
        body.push(0);
        body.extend_from_slice(&freq.to_le_bytes());
        body.extend_from_slice(&0x00a0u16.to_le_bytes());
    }
    if let Some(signal) = signal {
        present |= 1 << DBM_ANTSIGNAL;
        body.push(signal as u8);
    }

    let len = (8 + body.len()) as u16;
    let mut out = vec![0, 0];
    out.extend_from_slice(&len.to_le_bytes());
    out.extend_from_slice(&present.to_le_bytes());
    out.extend_from_slice(&body);
    out
}

fn mgmt_header(subtype: u8, addr1: [u8; 6], addr2: [u8; 6], addr3: [u8; 6]) -> Vec<u8> {
    let mut out = vec![subtype << 4, 0, 0, 0];
    out.extend_from_slice(&addr1);
    out.extend_from_slice(&addr2);
    out.extend_from_slice(&addr3);
    out.extend_from_slice(&[0, 0]);
    out
}

pub fn beacon(bssid: [u8; 6], capability: u16, elements: &[Vec<u8>]) -> Vec<u8> {
    let mut out = mgmt_header(8, BROADCAST, bssid, bssid);
    out.extend_from_slice(&[0; 8]); // timestamp
    out.extend_from_slice(&100u16.to_le_bytes()); // beacon interval
    out.extend_from_slice(&capability.to_le_bytes());
    out.extend(elements.iter().flatten());
    out
}

pub fn assoc_request(bssid: [u8; 6], elements: &[Vec<u8>]) -> Vec<u8> {
    let mut out = mgmt_header(0, bssid, CLIENT, bssid);
    out.extend_from_slice(&0x0431u16.to_le_bytes()); // capability
    out.extend_from_slice(&10u16.to_le_bytes()); // listen interval
    out.extend(elements.iter().flatten());
    out
}

pub fn probe_request() -> Vec<u8> {
    let mut out = mgmt_header(4, BROADCAST, CLIENT, BROADCAST);
    out.extend(ssid_element(b""));
    out
}

pub fn ssid_element(ssid: &[u8]) -> Vec<u8> {
    let mut out = vec![IE_SSID, ssid.len() as u8];
    out.extend_from_slice(ssid);
    out
}

fn suite_lists(oui: [u8; 3], pairwise: &[u8], akm: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    for list in [pairwise, akm] {
        out.extend_from_slice(&(list.len() as u16).to_le_bytes());
        for suite in list {
            out.extend_from_slice(&oui);
            out.push(*suite);
        }
    }
    out
}

pub fn rsn_element(pairwise: &[u8], akm: &[u8], capabilities: Option<u16>) -> Vec<u8> {
    const OUI: [u8; 3] = [0x00, 0x0f, 0xac];
    let mut data = vec![1, 0, OUI[0], OUI[1], OUI[2], 4];
    data.extend(suite_lists(OUI, pairwise, akm));
    if let Some(caps) = capabilities {
        data.extend_from_slice(&caps.to_le_bytes());
    }
    let mut out = vec![IE_RSN, data.len() as u8];
    out.extend(data);
    out
}

pub fn wpa_element(unicast: &[u8], akm: &[u8]) -> Vec<u8> {
    const OUI: [u8; 3] = [0x00, 0x50, 0xf2];
    let mut data = MS_WPA_PREFIX.to_vec();
    data.extend_from_slice(&[1, 0, OUI[0], OUI[1], OUI[2], 2]);
    data.extend(suite_lists(OUI, unicast, akm));
    let mut out = vec![IE_VENDOR, data.len() as u8];
    out.extend(data);
    out
}

/// Radiotap-framed record
pub fn radio_frame(freq: Option<u16>, signal: Option<i8>, frame: &[u8]) -> Vec<u8> {
    let mut out = radiotap_header(freq, signal, false);
    out.extend_from_slice(frame);
    out
}
