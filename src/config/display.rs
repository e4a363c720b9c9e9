//! Display-device identifiers
//!
//! Older configs spell the same panel a dozen ways ("ws2", "waveshare_2", ...).
//! Everything downstream only ever sees the canonical [`DisplayType`].

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use super::error::ConfigFatal;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DisplayType {
    Inky,
    Papirus,
    OledHat,
    Waveshare1,
    Waveshare2,
    Waveshare27Inch,
    Waveshare29Inch,
    LcdHat,
    DfRobot,
    Waveshare154Inch,
    Waveshare144Lcd,
    Waveshare213D,
    Waveshare213Bc,
    Spotpear24Inch,
}

/// Alias table: canonical id followed by every accepted spelling
const ALIASES: &[(DisplayType, &[&str])] = &[
    (DisplayType::Inky, &["inky", "inkyphat"]),
    (DisplayType::Papirus, &["papirus", "papi"]),
    (DisplayType::OledHat, &["oledhat"]),
    (DisplayType::Waveshare1, &["ws_1", "ws1", "waveshare_1", "waveshare1"]),
    (DisplayType::Waveshare2, &["ws_2", "ws2", "waveshare_2", "waveshare2"]),
    (
        DisplayType::Waveshare27Inch,
        &["ws_27inch", "ws27inch", "waveshare_27inch", "waveshare27inch"],
    ),
    (
        DisplayType::Waveshare29Inch,
        &["ws_29inch", "ws29inch", "waveshare_29inch", "waveshare29inch"],
    ),
    (DisplayType::LcdHat, &["lcdhat"]),
    (DisplayType::DfRobot, &["dfrobot", "df"]),
    (
        DisplayType::Waveshare154Inch,
        &["ws_154inch", "ws154inch", "waveshare_154inch", "waveshare154inch"],
    ),
    (
        DisplayType::Waveshare144Lcd,
        &[
            "waveshare144lcd",
            "ws_144inch",
            "ws144inch",
            "waveshare_144inch",
            "waveshare144inch",
        ],
    ),
    (
        DisplayType::Waveshare213D,
        &["ws_213d", "ws213d", "waveshare_213d", "waveshare213d"],
    ),
    (
        DisplayType::Waveshare213Bc,
        &["ws_213bc", "ws213bc", "waveshare_213bc", "waveshare213bc"],
    ),
    (DisplayType::Spotpear24Inch, &["spotpear24inch"]),
];

impl DisplayType {
    /// Canonical identifier written back into the effective config
    pub fn as_str(self) -> &'static str {
        match self {
            DisplayType::Inky => "inky",
            DisplayType::Papirus => "papirus",
            DisplayType::OledHat => "oledhat",
            DisplayType::Waveshare1 => "waveshare_1",
            DisplayType::Waveshare2 => "waveshare_2",
            DisplayType::Waveshare27Inch => "waveshare27inch",
            DisplayType::Waveshare29Inch => "waveshare29inch",
            DisplayType::LcdHat => "lcdhat",
            DisplayType::DfRobot => "dfrobot",
            DisplayType::Waveshare154Inch => "waveshare154inch",
            DisplayType::Waveshare144Lcd => "waveshare144lcd",
            DisplayType::Waveshare213D => "waveshare213d",
            DisplayType::Waveshare213Bc => "waveshare213bc",
            DisplayType::Spotpear24Inch => "spotpear24inch",
        }
    }

    /// Resolve any historical spelling (case-insensitive, surrounding whitespace ignored)
    pub fn from_alias(alias: &str) -> Result<Self, ConfigFatal> {
        let wanted = alias.trim().to_ascii_lowercase();
        ALIASES
            .iter()
            .find(|(_, spellings)| spellings.contains(&wanted.as_str()))
            .map(|(display, _)| *display)
            .ok_or_else(|| ConfigFatal::UnsupportedDisplay(alias.to_string()))
    }
}

impl FromStr for DisplayType {
    type Err = ConfigFatal;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_alias(s)
    }
}

impl fmt::Display for DisplayType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for DisplayType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for DisplayType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let alias = String::deserialize(deserializer)?;
        Self::from_alias(&alias).map_err(serde::de::Error::custom)
    }
}
