//! Command-line flags. Each one, when given, overrides the YAML value.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use super::ServerConfig;

/// Parse a dump interval: bare integers are seconds, anything else goes
/// through `humantime` (`90s`, `5m`, `1h 30m`).
pub fn parse_interval(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    if let Ok(secs) = s.parse::<u64>() {
        return Ok(Duration::from_secs(secs));
    }
    humantime::parse_duration(s).map_err(|e| format!("invalid duration `{s}`: {e}"))
}

#[derive(Parser, Debug, Clone, Default)]
#[command(name = "metricsd-server", version, about = "Telemetry metrics collection server")]
pub struct Args {
    /// YAML configuration file
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Listen address (host:port)
    #[arg(short = 'a', long)]
    pub address: Option<String>,

    /// Restore metrics from the backend on start
    #[arg(short = 'r', long)]
    pub restore: Option<bool>,

    /// Dump interval; 0 dumps after every write
    #[arg(short = 'i', long = "store-interval", value_parser = parse_interval)]
    pub store_interval: Option<Duration>,

    /// JSON snapshot file; empty disables it
    #[arg(short = 'f', long = "store-file")]
    pub store_file: Option<String>,

    /// Shared HMAC key; empty disables hashing
    #[arg(short = 'k', long)]
    pub key: Option<String>,

    /// SQLite database path; takes priority over the snapshot file
    #[arg(short = 'd', long = "database-dsn")]
    pub database_dsn: Option<String>,

    /// Default log filter
    #[arg(long = "log-level")]
    pub log_level: Option<String>,
}

impl Args {
    pub fn apply(&self, cfg: &mut ServerConfig) {
        if let Some(v) = &self.address {
            cfg.server.address = v.clone();
        }
        if let Some(v) = &self.log_level {
            cfg.server.log_level = v.clone();
        }
        if let Some(v) = self.restore {
            cfg.storage.restore = v;
        }
        if let Some(v) = self.store_interval {
            cfg.storage.store_interval = v;
        }
        if let Some(v) = &self.store_file {
            cfg.storage.store_file = v.clone();
        }
        if let Some(v) = &self.database_dsn {
            cfg.storage.database_dsn = v.clone();
        }
        if let Some(v) = &self.key {
            cfg.integrity.key = v.clone();
        }
    }
}
