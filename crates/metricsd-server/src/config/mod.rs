//! Server config loader.
//!
//! Layers, lowest priority first: built-in defaults, optional YAML file
//! (strict parsing), command-line flags, environment variables. The merged
//! result is validated once at the end.

pub mod args;
pub mod schema;

use std::fs;
use std::path::Path;

use metricsd_core::error::{MetricsError, Result};

pub use args::{parse_interval, Args};
pub use schema::{IntegritySection, ServerConfig, ServerSection, StorageSection};

pub fn load_from_file(path: impl AsRef<Path>) -> Result<ServerConfig> {
    let path = path.as_ref();
    let s = fs::read_to_string(path).map_err(|e| {
        MetricsError::Config(format!("read config `{}` failed: {e}", path.display()))
    })?;
    load_from_str(&s)
}

pub fn load_from_str(s: &str) -> Result<ServerConfig> {
    let cfg: ServerConfig = serde_yaml::from_str(s)
        .map_err(|e| MetricsError::Config(format!("invalid yaml: {e}")))?;
    cfg.validate()?;
    Ok(cfg)
}

fn parse_bool(name: &str, v: &str) -> Result<bool> {
    match v.trim().to_ascii_lowercase().as_str() {
        "1" | "t" | "true" | "yes" => Ok(true),
        "0" | "f" | "false" | "no" => Ok(false),
        other => Err(MetricsError::Config(format!("{name}: invalid bool `{other}`"))),
    }
}

/// Overlay environment variables onto `cfg`.
///
/// `lookup` abstracts `std::env::var` so tests can inject values.
pub fn apply_env<F>(cfg: &mut ServerConfig, lookup: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(v) = lookup("ADDRESS") {
        cfg.server.address = v;
    }
    if let Some(v) = lookup("LOG_LEVEL") {
        cfg.server.log_level = v;
    }
    if let Some(v) = lookup("RESTORE") {
        cfg.storage.restore = parse_bool("RESTORE", &v)?;
    }
    if let Some(v) = lookup("STORE_INTERVAL") {
        cfg.storage.store_interval =
            parse_interval(&v).map_err(|e| MetricsError::Config(format!("STORE_INTERVAL: {e}")))?;
    }
    if let Some(v) = lookup("STORE_FILE") {
        cfg.storage.store_file = v;
    }
    if let Some(v) = lookup("DATABASE_DSN") {
        cfg.storage.database_dsn = v;
    }
    if let Some(v) = lookup("KEY") {
        cfg.integrity.key = v;
    }
    Ok(())
}

/// Build the effective config from flags, an optional file and `lookup`.
pub fn resolve<F>(args: &Args, lookup: F) -> Result<ServerConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let mut cfg = match &args.config {
        Some(path) => load_from_file(path)?,
        None => ServerConfig::default(),
    };
    args.apply(&mut cfg);
    apply_env(&mut cfg, lookup)?;
    cfg.validate()?;
    Ok(cfg)
}

/// [`resolve`] against the process environment.
pub fn from_env(args: &Args) -> Result<ServerConfig> {
    resolve(args, |name| std::env::var(name).ok())
}
