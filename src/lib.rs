//! Runtime state plumbing for a wireless capture unit
//!
//! - **config**: layered TOML configuration with staged overrides and legacy YAML migration
//! - **persistence**: atomically written status files with recency queries
//! - **session**: per-epoch statistics recorder on top of the status store
//! - **capture**: field extraction from pcap handshake captures

#![forbid(unsafe_code)]

pub mod capture;
pub mod clock;
pub mod config;
pub mod constants;
pub mod persistence;
pub mod session;
