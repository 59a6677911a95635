//! Configuration module for the device gate.
//!
//! This module handles loading the TOML configuration file that describes the
//! listener, the protected backend, the rule document and the subtype table.

mod config;

pub use config::{
    Config,
    ConfigError,
    ProxySettings,
    SubtypeEntry,
    ValidationSettings,
};
