use std::time::Duration;

use metricsd_core::error::{MetricsError, Result};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    #[serde(default = "default_version")]
    pub version: u32,

    #[serde(default)]
    pub server: ServerSection,

    #[serde(default)]
    pub storage: StorageSection,

    #[serde(default)]
    pub integrity: IntegritySection,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            server: ServerSection::default(),
            storage: StorageSection::default(),
            integrity: IntegritySection::default(),
        }
    }
}

impl ServerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(MetricsError::Config(format!(
                "unsupported config version {}",
                self.version
            )));
        }
        self.server.validate()?;
        self.storage.validate()?;
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerSection {
    /// `host:port` to listen on. Host names are resolved at bind time.
    #[serde(default = "default_address")]
    pub address: String,

    /// Default `tracing` filter; `RUST_LOG` takes precedence.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            address: default_address(),
            log_level: default_log_level(),
        }
    }
}

impl ServerSection {
    pub fn validate(&self) -> Result<()> {
        match self.address.rsplit_once(':') {
            Some((host, port)) if !host.is_empty() && port.parse::<u16>().is_ok() => {}
            _ => {
                return Err(MetricsError::Config(format!(
                    "server.address must be host:port, got `{}`",
                    self.address
                )))
            }
        }
        if !LOG_LEVELS.contains(&self.log_level.to_ascii_lowercase().as_str()) {
            return Err(MetricsError::Config(format!(
                "server.log_level must be one of {LOG_LEVELS:?}, got `{}`",
                self.log_level
            )));
        }
        Ok(())
    }
}

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StorageSection {
    /// Load the backend's snapshot before serving.
    #[serde(default = "default_restore")]
    pub restore: bool,

    /// Dump period; `0s` dumps after every write.
    #[serde(default = "default_store_interval", with = "humantime_serde")]
    pub store_interval: Duration,

    /// JSON snapshot path. Empty disables the file backend.
    #[serde(default = "default_store_file")]
    pub store_file: String,

    /// SQLite database path. Takes priority over `store_file` when set.
    #[serde(default)]
    pub database_dsn: String,

    /// Upper bound for a single backend call.
    #[serde(default = "default_io_timeout", with = "humantime_serde")]
    pub io_timeout: Duration,
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            restore: default_restore(),
            store_interval: default_store_interval(),
            store_file: default_store_file(),
            database_dsn: String::new(),
            io_timeout: default_io_timeout(),
        }
    }
}

impl StorageSection {
    pub fn validate(&self) -> Result<()> {
        if !(Duration::from_millis(100)..=Duration::from_secs(60)).contains(&self.io_timeout) {
            return Err(MetricsError::Config(
                "storage.io_timeout must be between 100ms and 60s".into(),
            ));
        }
        Ok(())
    }

    pub fn persistent(&self) -> bool {
        !self.database_dsn.is_empty() || !self.store_file.is_empty()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IntegritySection {
    /// Shared HMAC key. Empty disables hashing.
    #[serde(default)]
    pub key: String,
}

fn default_version() -> u32 {
    1
}
fn default_address() -> String {
    "127.0.0.1:8080".into()
}
fn default_log_level() -> String {
    "info".into()
}
fn default_restore() -> bool {
    true
}
fn default_store_interval() -> Duration {
    Duration::from_secs(300)
}
fn default_store_file() -> String {
    "/tmp/devops-metrics-db.json".into()
}
fn default_io_timeout() -> Duration {
    Duration::from_secs(5)
}
