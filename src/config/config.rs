//! Configuration structures for the device gate.
//!
//! This module provides the TOML-backed configuration for the gateway: where
//! it listens, which backend it protects, where the validation rule document
//! lives and which request fields drive rule selection. The subtype table used
//! by the built-in resolver is declared here as well.

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Main configuration structure
#[derive(Debug, Deserialize)]
pub struct Config {
    pub proxy: ProxySettings,
    #[serde(default)]
    pub validation: ValidationSettings,
    #[serde(default)]
    pub subtypes: Vec<SubtypeEntry>,
}

/// Proxy server settings
#[derive(Debug, Deserialize, Clone)]
pub struct ProxySettings {
    pub listen_address: String,
    pub backend_address: String,
    pub timeout_seconds: u64,
    /// Largest request body the gate will buffer for inspection
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

/// Where the rule document lives and which requests it applies to.
///
/// # Example TOML
/// ```toml
/// [validation]
/// rules_file = "example_validation_rules.json"
/// resource_prefix = "/api/devices"
/// methods = ["POST", "PUT"]
/// ```
#[derive(Debug, Deserialize, Clone)]
pub struct ValidationSettings {
    #[serde(default = "default_rules_file")]
    pub rules_file: PathBuf,

    #[serde(default = "default_resource_prefix")]
    pub resource_prefix: String,

    #[serde(default = "default_methods")]
    pub methods: Vec<String>,

    /// Body field carrying the subtype id (or name)
    #[serde(default = "default_subtype_field")]
    pub subtype_field: String,

    /// Body field whose value gates rule group selection
    #[serde(default = "default_trigger_field")]
    pub trigger_field: String,

    /// Body field holding the free-form attribute bag
    #[serde(default = "default_attributes_field")]
    pub attributes_field: String,

    /// Re-read the rule document on every protected request
    #[serde(default)]
    pub reload_per_request: bool,
}

/// One row of the subtype table served by the built-in resolver
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct SubtypeEntry {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

fn default_max_body_bytes() -> usize {
    1024 * 1024
}

fn default_rules_file() -> PathBuf {
    PathBuf::from("example_validation_rules.json")
}

fn default_resource_prefix() -> String {
    "/api/devices".to_string()
}

fn default_methods() -> Vec<String> {
    vec!["POST".to_string(), "PUT".to_string()]
}

fn default_subtype_field() -> String {
    "typeId".to_string()
}

fn default_trigger_field() -> String {
    "isEnabled".to_string()
}

fn default_attributes_field() -> String {
    "additionalProperties".to_string()
}

impl Default for ValidationSettings {
    fn default() -> Self {
        Self {
            rules_file: default_rules_file(),
            resource_prefix: default_resource_prefix(),
            methods: default_methods(),
            subtype_field: default_subtype_field(),
            trigger_field: default_trigger_field(),
            attributes_field: default_attributes_field(),
            reload_per_request: false,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(contents)?;
        Ok(config)
    }

    /// Check settings that TOML deserialization cannot express
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.proxy.listen_address.trim().is_empty() {
            return Err(ConfigError::Invalid("proxy.listen_address is empty".into()));
        }
        if self.proxy.backend_address.trim().is_empty() {
            return Err(ConfigError::Invalid("proxy.backend_address is empty".into()));
        }
        if self.proxy.timeout_seconds == 0 {
            return Err(ConfigError::Invalid("proxy.timeout_seconds must be > 0".into()));
        }

        let validation = &self.validation;
        if !validation.resource_prefix.starts_with('/') {
            return Err(ConfigError::Invalid(format!(
                "validation.resource_prefix must start with '/': {}",
                validation.resource_prefix
            )));
        }
        if validation.methods.is_empty() {
            return Err(ConfigError::Invalid("validation.methods is empty".into()));
        }
        for (label, field) in [
            ("subtype_field", &validation.subtype_field),
            ("trigger_field", &validation.trigger_field),
            ("attributes_field", &validation.attributes_field),
        ] {
            if field.is_empty() {
                return Err(ConfigError::Invalid(format!("validation.{} is empty", label)));
            }
        }

        let mut seen = std::collections::HashSet::new();
        for entry in &self.subtypes {
            if !seen.insert(entry.id) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate subtype id {}",
                    entry.id
                )));
            }
        }

        Ok(())
    }
}
