//! Configuration management module.
//!
//! Supports:
//! - YAML, TOML and JSON configuration files
//! - Split application config / account secrets files
//! - Typed access with descriptive error messages
//!
//! # Example
//!
//! ```rust,ignore
//! use sirocco_core::config::Settings;
//!
//! let settings = Settings::load()?;
//! let creds = settings.account("bybit")?;
//! ```

mod loader;
mod settings;

pub use loader::{ConfigFormat, ConfigLoader};
pub use settings::{
    AppConfig, Credentials, HeartbeatSettings, ProxySettings, Settings,
};
