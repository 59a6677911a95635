use anyhow::{Context, Result};
use clap::Parser;
use device_gate::config::Config;
use device_gate::interceptor::Interceptor;
use device_gate::proxy::{self, ProxyContext};
use device_gate::validators::{RuleCatalog, StaticSubtypeResolver};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Validating gateway for device create/update requests
#[derive(Debug, Parser)]
#[command(name = "device-gate", version, about)]
struct Args {
    /// Path to the TOML configuration file
    #[arg(default_value = "device-gate.toml")]
    config: PathBuf,

    /// Load configuration and rule document, report, and exit
    #[arg(long)]
    check: bool,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    log_level: String,
}

/// Rule catalog and device type table, ready to serve
#[derive(Debug)]
struct LoadedGate {
    catalog: RuleCatalog,
    resolver: StaticSubtypeResolver,
    shadowed: Vec<usize>,
}

impl LoadedGate {
    /// One-line report printed by `--check`
    fn summary(&self) -> String {
        format!(
            "configuration OK: {} rule group(s), {} unreachable, {} device type(s)",
            self.catalog.len(),
            self.shadowed.len(),
            self.resolver.len()
        )
    }
}

/// Load the rule document named by `config` and build the device type table.
///
/// A service must never run on a partially loaded rule set, so any load
/// failure is returned instead of starting with fewer rules.
fn load_gate(config: &Config) -> Result<LoadedGate> {
    let rules_file = &config.validation.rules_file;
    let catalog = RuleCatalog::from_file(rules_file)
        .with_context(|| format!("failed to load validation rules {}", rules_file.display()))?;

    let shadowed = catalog.shadowed_groups();
    for &index in &shadowed {
        let group = &catalog.groups()[index];
        warn!(
            "⚠️  Rule group #{} ({} / {}={}) is unreachable: an earlier group has the same key",
            index, group.subtype_name, group.trigger_field_name, group.trigger_field_value
        );
    }

    let resolver = StaticSubtypeResolver::from_entries(&config.subtypes);
    Ok(LoadedGate {
        catalog,
        resolver,
        shadowed,
    })
}

fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level)),
        )
        .init();

    info!("🔧 Loading configuration from: {}", args.config.display());
    let config = Config::from_file(&args.config)
        .with_context(|| format!("failed to load config {}", args.config.display()))?;
    config.validate().context("configuration validation failed")?;

    let gate = load_gate(&config)?;
    info!(
        "✅ {} rule group(s), {} device type(s)",
        gate.catalog.len(),
        gate.resolver.len()
    );

    if args.check {
        println!("{}", gate.summary());
        return Ok(());
    }

    if config.validation.reload_per_request {
        info!("🔄 Rule document will be re-read for every guarded request");
    }

    let interceptor =
        Interceptor::from_settings(&config.validation, gate.catalog, Arc::new(gate.resolver));
    let context = ProxyContext::new(&config.proxy, interceptor);

    proxy::run(&config.proxy.listen_address, context)
        .with_context(|| format!("server on {} failed", config.proxy.listen_address))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const RULES: &str = r#"{ "validations": [
        { "type": "PC", "preRequestName": "isEnabled", "preRequestValue": "true", "rules": [] },
        { "type": "Smartwatch", "preRequestName": "isEnabled", "preRequestValue": "true", "rules": [] },
        { "type": "PC", "preRequestName": "isEnabled", "preRequestValue": "TRUE", "rules": [] }
    ] }"#;

    fn config_for(rules_file: &std::path::Path) -> Config {
        let mut config = Config::from_toml_str(
            r#"
[proxy]
listen_address = "127.0.0.1:8080"
backend_address = "127.0.0.1:5000"
timeout_seconds = 30

[[subtypes]]
id = 1
name = "PC"

[[subtypes]]
id = 2
name = "Smartwatch"
"#,
        )
        .unwrap();
        config.validation.rules_file = rules_file.to_path_buf();
        config
    }

    #[test]
    fn test_load_gate_reports_summary() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(RULES.as_bytes()).unwrap();

        let gate = load_gate(&config_for(file.path())).unwrap();
        assert_eq!(gate.shadowed, vec![2]);
        assert_eq!(
            gate.summary(),
            "configuration OK: 3 rule group(s), 1 unreachable, 2 device type(s)"
        );
    }

    #[test]
    fn test_load_gate_fails_on_bad_rules() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(br#"{ "validations": [ { "type": "PC" } ] }"#).unwrap();
        assert!(load_gate(&config_for(file.path())).is_err());

        let missing = config_for(std::path::Path::new("/nonexistent/rules.json"));
        let err = load_gate(&missing).unwrap_err();
        assert!(err.to_string().contains("failed to load validation rules"));
    }
}
