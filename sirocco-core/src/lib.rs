//! Sirocco core: shared foundation for the connectivity stack.
//!
//! This crate provides the pieces every other Sirocco crate builds on:
//! - Hierarchical error types ([`error`])
//! - Configuration loading and application settings ([`config`])
//! - Logging bootstrap ([`logging`])
//! - Time helpers for auth payloads and heartbeats ([`time`])

#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod logging;
pub mod time;

pub use config::{ConfigFormat, ConfigLoader, Credentials, Settings};
pub use error::{ConfigError, ExchangeError, NetworkError, Result, SiroccoError};
