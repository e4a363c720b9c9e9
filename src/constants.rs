//! Application-wide constants
//!
//! Well-known paths, file names and protocol numbers used throughout
//! the crate, kept in one place so the resolver, store and extractor agree.

/// Configuration file locations
pub mod config {
    /// Application directory name (under /etc, the staging mount, and XDG dirs)
    pub const APP_DIR: &str = "unitstate";

    /// Default system configuration directory
    pub const SYSTEM_CONFIG_DIR: &str = "/etc/unitstate";

    /// Installed copy of the shipped baseline
    pub const BASELINE_FILENAME: &str = "defaults.toml";

    /// Operator-edited override file
    pub const USER_FILENAME: &str = "config.toml";

    /// Extension of the legacy config format
    pub const LEGACY_EXTENSION: &str = "yml";

    /// Shipped baseline resource, relative to the working directory
    pub const DEFAULTS_RESOURCE: &str = "resources/defaults.toml";

    /// Removable boot volume that may carry a pre-staged override
    pub const STAGING_MOUNT: &str = "/boot";

    /// Staged override files, checked in order; the first one found wins
    pub const STAGED_FILES: [&str; 2] = ["config.yml", "config.toml"];

    /// Dotted path of the display-device identifier
    pub const DISPLAY_TYPE_KEY: [&str; 3] = ["ui", "display", "type"];
}

/// Status store and session recorder
pub mod status {
    /// Session file name pattern (chrono format string)
    pub const SESSION_FILE_FORMAT: &str = "stats_%Y_%m_%d_%H_%M.json";

    /// Fixed parts of every session file name
    pub const SESSION_FILE_PREFIX: &str = "stats_";
    pub const SESSION_FILE_SUFFIX: &str = ".json";

    /// Per-epoch key inside a session file (chrono format string)
    pub const EPOCH_KEY_FORMAT: &str = "%H:%M:%S";

    /// Textual heartbeat written by a payload-less update
    pub const HEARTBEAT_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

    /// Top-level key holding the epoch map in a session file
    pub const SESSION_DATA_KEY: &str = "data";
}

/// Capture file (pcap) container
pub mod pcap {
    /// Microsecond-resolution magic, native order
    pub const MAGIC_MICROS: u32 = 0xa1b2_c3d4;

    /// Nanosecond-resolution magic, native order
    pub const MAGIC_NANOS: u32 = 0xa1b2_3c4d;

    /// Global header length in bytes
    pub const GLOBAL_HEADER_LEN: usize = 24;

    /// Per-record header length in bytes
    pub const RECORD_HEADER_LEN: usize = 16;

    /// LINKTYPE_IEEE802_11: bare 802.11 frames
    pub const LINKTYPE_IEEE802_11: u32 = 105;

    /// LINKTYPE_IEEE802_11_RADIOTAP: radiotap header + 802.11 frame
    pub const LINKTYPE_RADIOTAP: u32 = 127;

    /// Handshake capture file extension
    pub const CAPTURE_EXTENSION: &str = "pcap";
}

/// IEEE 802.11 frame layout
pub mod dot11 {
    /// Frame type: management
    pub const TYPE_MANAGEMENT: u8 = 0;

    pub const SUBTYPE_ASSOC_REQ: u8 = 0;
    pub const SUBTYPE_REASSOC_REQ: u8 = 2;
    pub const SUBTYPE_PROBE_RESP: u8 = 5;
    pub const SUBTYPE_BEACON: u8 = 8;

    /// Management MAC header: fc, duration, addr1..3, sequence control
    pub const MGMT_HEADER_LEN: usize = 24;

    /// Trailing frame check sequence length
    pub const FCS_LEN: usize = 4;

    /// Capability information: privacy bit
    pub const CAP_PRIVACY: u16 = 0x0010;

    /// Information element IDs
    pub const IE_SSID: u8 = 0;
    pub const IE_RSN: u8 = 48;
    pub const IE_VENDOR: u8 = 221;

    /// Microsoft OUI + WPA type, the pre-RSN WPA vendor element
    pub const MS_WPA_PREFIX: [u8; 4] = [0x00, 0x50, 0xf2, 0x01];

    /// RSN capabilities: management frame protection required / capable
    pub const RSN_CAP_MFPR: u16 = 0x0040;
    pub const RSN_CAP_MFPC: u16 = 0x0080;
}

/// Radiotap header
pub mod radiotap {
    /// Present-bitmap bits for the fields we read (and the ones before them)
    pub const TSFT: u32 = 0;
    pub const FLAGS: u32 = 1;
    pub const RATE: u32 = 2;
    pub const CHANNEL: u32 = 3;
    pub const FHSS: u32 = 4;
    pub const DBM_ANTSIGNAL: u32 = 5;

    /// Next present word switches to a vendor namespace
    pub const VENDOR_NAMESPACE: u32 = 30;

    /// Another present word follows
    pub const EXT: u32 = 31;

    /// Flags field: frame includes FCS
    pub const FLAG_FCS: u8 = 0x10;

    /// Fixed header: version, pad, length, first present word
    pub const HEADER_LEN: usize = 8;
}
