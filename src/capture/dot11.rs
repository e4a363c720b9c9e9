//! IEEE 802.11 management frame decoding
//!
//! Just enough of the MAC header and management body to answer the
//! extractor's questions: frame type/subtype, the BSSID (address 3),
//! the capability field and the tagged information elements.

use serde::{Serialize, Serializer};
use std::collections::BTreeSet;
use std::fmt;

use crate::constants::dot11::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MacAddr(pub [u8; 6]);

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
    }
}

impl Serialize for MacAddr {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Tagged information element
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub id: u8,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Management {
    pub capability: u16,
    pub elements: Vec<Element>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dot11Frame {
    pub frame_type: u8,
    pub subtype: u8,
    pub addr3: Option<MacAddr>,
    /// Present for the management subtypes whose body layout we know
    pub management: Option<Management>,
}

impl Dot11Frame {
    pub fn is_management(&self, subtype: u8) -> bool {
        self.frame_type == TYPE_MANAGEMENT && self.subtype == subtype
    }
}

/// Decode one frame; `fcs` strips the trailing frame check sequence first
pub fn parse(data: &[u8], fcs: bool) -> Option<Dot11Frame> {
    let data = if fcs {
        data.get(..data.len().checked_sub(FCS_LEN)?)?
    } else {
        data
    };
    if data.len() < 2 {
        return None;
    }
    let fc = data[0];
    let frame_type = (fc >> 2) & 0b11;
    let subtype = fc >> 4;

    if frame_type != TYPE_MANAGEMENT {
        return Some(Dot11Frame {
            frame_type,
            subtype,
            addr3: None,
            management: None,
        });
    }
    if data.len() < MGMT_HEADER_LEN {
        return None;
    }

    let addr3 = mac_at(data, 16);
    let body = &data[MGMT_HEADER_LEN..];
    // fixed fields ahead of the capability word, then fixed fields after it
    let layout = match subtype {
        SUBTYPE_BEACON | SUBTYPE_PROBE_RESP => Some((10, 0)), // timestamp, interval
        SUBTYPE_ASSOC_REQ => Some((0, 2)),                    // listen interval
        SUBTYPE_REASSOC_REQ => Some((0, 8)),                  // listen interval, current AP
        _ => None,
    };
    let management = layout.and_then(|(before, after)| {
        let cap = body.get(before..before + 2)?;
        let capability = u16::from_le_bytes([cap[0], cap[1]]);
        let elements = parse_elements(body.get(before + 2 + after..)?);
        Some(Management {
            capability,
            elements,
        })
    });

    Some(Dot11Frame {
        frame_type,
        subtype,
        addr3,
        management,
    })
}

fn mac_at(data: &[u8], at: usize) -> Option<MacAddr> {
    let bytes: [u8; 6] = data.get(at..at + 6)?.try_into().ok()?;
    Some(MacAddr(bytes))
}

/// Parse tagged elements; a truncated trailing element is dropped
pub fn parse_elements(mut data: &[u8]) -> Vec<Element> {
    let mut elements = Vec::new();
    while data.len() >= 2 {
        let id = data[0];
        let len = data[1] as usize;
        let Some(payload) = data.get(2..2 + len) else {
            break;
        };
        elements.push(Element {
            id,
            data: payload.to_vec(),
        });
        data = &data[2 + len..];
    }
    elements
}

/// Cipher suite selectors (00-0F-AC / 00-50-F2 types) that rule out WPA3-only
const LEGACY_CIPHERS: [u8; 3] = [1, 2, 5];

const AKM_SAE: u8 = 8;
const AKM_PSK: u8 = 2;
const AKM_PSK_SHA256: u8 = 6;

fn akm_name(suite: u8) -> String {
    let name = match suite {
        0x00 => "Reserved",
        0x01 => "802.1X",
        0x02 => "PSK",
        0x03 => "FT-802.1X",
        0x04 => "FT-PSK",
        0x05 => "WPA-SHA256",
        0x06 => "PSK-SHA256",
        0x07 => "TDLS",
        0x08 => "SAE",
        0x09 => "FT-SAE",
        0x0a => "AP-PEER-KEY",
        0x0b => "WPA-SHA256-SUITE-B",
        0x0c => "WPA-SHA384-SUITE-B",
        0x0d => "FT-802.1X-SHA384",
        0x0e => "FILS-SHA256",
        0x0f => "FILS-SHA384",
        0x10 => "FT-FILS-SHA256",
        0x11 => "FT-FILS-SHA384",
        0x12 => "OWE",
        other => return format!("{other:#04x}"),
    };
    name.to_string()
}

/// Parsed body shared by the RSN element and the Microsoft WPA element
#[derive(Debug, Default)]
struct SecurityElement {
    pairwise: Vec<u8>,
    akm: Vec<u8>,
    capabilities: Option<u16>,
}

/// Read one `count + suites` list, keeping each suite's type byte
fn take_suites(rest: &mut &[u8], out: &mut Vec<u8>) -> bool {
    let Some(count) = rest.get(..2).map(|c| u16::from_le_bytes([c[0], c[1]]) as usize) else {
        return false;
    };
    *rest = &rest[2..];
    for _ in 0..count {
        let Some(suite) = rest.get(..4) else {
            return false;
        };
        out.push(suite[3]);
        *rest = &rest[4..];
    }
    true
}

/// Suite lists and capabilities after the version + group cipher; tolerant of truncation
fn parse_security(data: &[u8]) -> SecurityElement {
    let mut parsed = SecurityElement::default();
    // version (2) + group cipher suite (4)
    let mut rest = data.get(6..).unwrap_or_default();
    if take_suites(&mut rest, &mut parsed.pairwise) && take_suites(&mut rest, &mut parsed.akm) {
        parsed.capabilities = rest.get(..2).map(|c| u16::from_le_bytes([c[0], c[1]]));
    }
    parsed
}

fn label(version: &str, akm: &[u8]) -> String {
    match akm.first() {
        Some(&suite) => format!("{version}/{}", akm_name(suite)),
        None => version.to_string(),
    }
}

/// Summarize the advertised security: WPA/WPA2/WPA3 labels, else WEP or OPN
pub fn crypto_summary(mgmt: &Management) -> BTreeSet<String> {
    let mut crypto = BTreeSet::new();

    for element in &mgmt.elements {
        match element.id {
            IE_RSN => {
                let rsn = parse_security(&element.data);
                let caps = rsn.capabilities.unwrap_or(0);
                let mfp_capable = caps & RSN_CAP_MFPC != 0;
                let mfp_required = caps & RSN_CAP_MFPR != 0;

                let mut version = "WPA2";
                if rsn.akm.contains(&AKM_SAE) {
                    let wpa3_only = rsn.akm.iter().all(|s| *s != AKM_PSK && *s != AKM_PSK_SHA256)
                        && mfp_capable
                        && mfp_required
                        && rsn.pairwise.iter().all(|c| !LEGACY_CIPHERS.contains(c));
                    if wpa3_only {
                        version = "WPA3";
                    } else if rsn.akm.contains(&AKM_PSK) && mfp_capable && !mfp_required {
                        version = "WPA3-transition";
                    }
                }
                crypto.insert(label(version, &rsn.akm));
            }
            IE_VENDOR if element.data.starts_with(&MS_WPA_PREFIX) => {
                let wpa = parse_security(&element.data[MS_WPA_PREFIX.len()..]);
                crypto.insert(label("WPA", &wpa.akm));
            }
            _ => {}
        }
    }

    if crypto.is_empty() {
        let fallback = if mgmt.capability & CAP_PRIVACY != 0 {
            "WEP"
        } else {
            "OPN"
        };
        crypto.insert(fallback.to_string());
    }
    crypto
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::fixtures::{
        assoc_request, beacon, rsn_element, ssid_element, wpa_element, BSSID,
    };

    fn management(frame: &[u8]) -> Management {
        parse(frame, false).unwrap().management.unwrap()
    }

    fn summary(capability: u16, elements: Vec<Vec<u8>>) -> Vec<String> {
        crypto_summary(&management(&beacon(BSSID, capability, &elements)))
            .into_iter()
            .collect()
    }

    #[test]
    fn test_beacon_header_and_elements() {
        let frame = parse(&beacon(BSSID, 0, &[ssid_element(b"home")]), false).unwrap();

        assert!(frame.is_management(SUBTYPE_BEACON));
        assert_eq!(frame.addr3.unwrap().to_string(), "de:ad:be:ef:00:01");
        let mgmt = frame.management.unwrap();
        assert_eq!(mgmt.elements, vec![Element { id: IE_SSID, data: b"home".to_vec() }]);
    }

    #[test]
    fn test_assoc_request_body_layout() {
        let frame = parse(&assoc_request(BSSID, &[ssid_element(b"cafe")]), false).unwrap();

        assert!(frame.is_management(SUBTYPE_ASSOC_REQ));
        assert_eq!(frame.management.unwrap().elements[0].data, b"cafe".to_vec());
    }

    #[test]
    fn test_fcs_is_stripped() {
        let mut raw = beacon(BSSID, 0, &[ssid_element(b"x")]);
        raw.extend_from_slice(&[0xaa, 0xbb, 0xcc, 0xdd]);

        let mgmt = parse(&raw, true).unwrap().management.unwrap();
        assert_eq!(mgmt.elements.len(), 1);
        assert_eq!(mgmt.elements[0].data, b"x".to_vec());
    }

    #[test]
    fn test_short_management_frame_is_rejected() {
        assert_eq!(parse(&[0x80, 0x00, 0x00], false), None);
        assert_eq!(parse(&[0x80], false), None);
    }

    #[test]
    fn test_control_frame_has_no_management_body() {
        // ACK: type 1, subtype 13
        let frame = parse(&[0xd4, 0x00, 0, 0, 1, 2, 3, 4, 5, 6], false).unwrap();
        assert_eq!(frame.frame_type, 1);
        assert_eq!(frame.management, None);
    }

    #[test]
    fn test_truncated_element_is_dropped() {
        let elements = parse_elements(&[0, 2, b'a', b'b', 3, 5, 1]);
        assert_eq!(elements, vec![Element { id: 0, data: b"ab".to_vec() }]);
    }

    #[test]
    fn test_open_and_wep() {
        assert_eq!(summary(0, vec![ssid_element(b"a")]), vec!["OPN"]);
        assert_eq!(summary(CAP_PRIVACY, vec![ssid_element(b"a")]), vec!["WEP"]);
    }

    #[test]
    fn test_wpa2_psk() {
        let rsn = rsn_element(&[4], &[AKM_PSK], Some(0));
        assert_eq!(summary(CAP_PRIVACY, vec![rsn]), vec!["WPA2/PSK"]);
    }

    #[test]
    fn test_wpa3_sae_only() {
        let rsn = rsn_element(&[4], &[AKM_SAE], Some(RSN_CAP_MFPC | RSN_CAP_MFPR));
        assert_eq!(summary(CAP_PRIVACY, vec![rsn]), vec!["WPA3/SAE"]);
    }

    #[test]
    fn test_wpa3_transition() {
        let rsn = rsn_element(&[4], &[AKM_PSK, AKM_SAE], Some(RSN_CAP_MFPC));
        assert_eq!(summary(CAP_PRIVACY, vec![rsn]), vec!["WPA3-transition/PSK"]);
    }

    #[test]
    fn test_wpa_and_wpa2_mixed_mode() {
        let elements = vec![
            rsn_element(&[4, 2], &[AKM_PSK], None),
            wpa_element(&[2], &[AKM_PSK]),
        ];
        assert_eq!(summary(CAP_PRIVACY, elements), vec!["WPA/PSK", "WPA2/PSK"]);
    }

    #[test]
    fn test_rsn_without_akm_list() {
        // version + group cipher only
        let element = vec![IE_RSN, 6, 1, 0, 0x00, 0x0f, 0xac, 4];
        assert_eq!(summary(CAP_PRIVACY, vec![element]), vec!["WPA2"]);
    }

    #[test]
    fn test_other_vendor_elements_ignored() {
        let vendor = vec![IE_VENDOR, 4, 0x00, 0x50, 0xf2, 0x04];
        assert_eq!(summary(0, vec![vendor]), vec!["OPN"]);
    }
}
