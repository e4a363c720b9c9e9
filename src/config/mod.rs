//! Configuration management
//!
//! - **resolver**: startup resolution (staged overrides, baseline refresh, legacy migration)
//! - **merge**: layering of the user tree over the baseline, YAML -> TOML conversion
//! - **display**: display-device alias table

pub mod display;
pub mod error;
pub mod merge;
pub mod resolver;

// Re-export commonly used types
pub use display::DisplayType;
pub use error::ConfigFatal;
pub use merge::merge_config;
pub use resolver::{resolve, ConfigPaths, EffectiveConfig};
