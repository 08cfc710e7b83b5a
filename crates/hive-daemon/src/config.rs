//! Configuration file management.

use std::path::PathBuf;
use std::time::Duration;

use hive_transport::TransportConfig;
use serde::{Deserialize, Serialize};

/// Environment variable naming the data directory (and config location).
pub const ENV_DATA_DIR: &str = "HIVE_DATA_DIR";

/// Environment variable overriding `server.listen_addr`.
pub const ENV_LISTEN_ADDR: &str = "HIVE_LISTEN_ADDR";

/// Complete daemon configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DaemonConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub reconcile: ReconcileConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// WebSocket server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    #[serde(default = "default_ws_path")]
    pub ws_path: String,
    /// Events buffered per session before new ones are dropped.
    #[serde(default = "default_outbound_queue_depth")]
    pub outbound_queue_depth: usize,
    /// Larger inbound frames are dropped.
    #[serde(default = "default_max_frame_bytes")]
    pub max_frame_bytes: usize,
}

/// Storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Data directory. Empty = platform default.
    #[serde(default)]
    pub data_dir: String,
    /// Database file name inside the data directory.
    #[serde(default = "default_db_file")]
    pub db_file: String,
}

/// Reconciliation configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcileConfig {
    /// Seconds between periodic sweeps. Values below 1 are raised to 1.
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: "trace" | "debug" | "info" | "warn" | "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

// Default value functions

fn default_listen_addr() -> String {
    "0.0.0.0:11451".to_string()
}

fn default_ws_path() -> String {
    hive_transport::server::DEFAULT_WS_PATH.to_string()
}

fn default_outbound_queue_depth() -> usize {
    hive_transport::server::DEFAULT_OUTBOUND_QUEUE_DEPTH
}

fn default_max_frame_bytes() -> usize {
    hive_transport::server::DEFAULT_MAX_FRAME_BYTES
}

fn default_db_file() -> String {
    "hive.db".to_string()
}

fn default_interval_secs() -> u64 {
    30
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            ws_path: default_ws_path(),
            outbound_queue_depth: default_outbound_queue_depth(),
            max_frame_bytes: default_max_frame_bytes(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: String::new(),
            db_file: default_db_file(),
        }
    }
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

impl DaemonConfig {
    /// Load configuration from the default config file location, then apply
    /// environment overrides.
    ///
    /// Falls back to defaults if file does not exist.
    pub fn load() -> anyhow::Result<Self> {
        let config_path = Self::config_path();
        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            Self::parse(&content)?
        } else {
            Self::default()
        };
        config.apply_overrides(std::env::var(ENV_LISTEN_ADDR).ok());
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML document. Missing sections and keys take defaults.
    pub fn parse(content: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(content)?)
    }

    fn apply_overrides(&mut self, listen_addr: Option<String>) {
        if let Some(addr) = listen_addr.filter(|a| !a.trim().is_empty()) {
            self.server.listen_addr = addr;
        }
    }

    fn validate(&self) -> anyhow::Result<()> {
        let path = self.server.ws_path.trim_start_matches('/');
        if path.is_empty() || path == "health" {
            anyhow::bail!("server.ws_path {:?} is reserved", self.server.ws_path);
        }
        if self.storage.db_file.trim().is_empty() {
            anyhow::bail!("storage.db_file must not be empty");
        }
        Ok(())
    }

    /// Get the data directory path.
    pub fn data_dir(&self) -> PathBuf {
        if self.storage.data_dir.is_empty() {
            Self::default_data_dir()
        } else {
            PathBuf::from(&self.storage.data_dir)
        }
    }

    /// Full path of the database file.
    pub fn db_path(&self) -> PathBuf {
        self.data_dir().join(&self.storage.db_file)
    }

    /// Period of the reconciliation sweep.
    pub fn reconcile_interval(&self) -> Duration {
        Duration::from_secs(self.reconcile.interval_secs.max(1))
    }

    /// Settings handed to the transport.
    pub fn transport(&self) -> TransportConfig {
        TransportConfig {
            ws_path: self.server.ws_path.clone(),
            outbound_queue_depth: self.server.outbound_queue_depth,
            max_frame_bytes: self.server.max_frame_bytes,
        }
    }

    /// Get the config file path.
    fn config_path() -> PathBuf {
        Self::default_data_dir().join("config.toml")
    }

    /// Platform-specific default data directory.
    fn default_data_dir() -> PathBuf {
        if let Ok(dir) = std::env::var(ENV_DATA_DIR) {
            return PathBuf::from(dir);
        }
        #[cfg(target_os = "macos")]
        {
            dirs_fallback("Library/Application Support/Hive")
        }
        #[cfg(target_os = "windows")]
        {
            dirs_fallback("Hive")
        }
        #[cfg(not(any(target_os = "macos", target_os = "windows")))]
        {
            dirs_fallback(".hive")
        }
    }
}

/// Fallback home directory resolution.
fn dirs_fallback(subpath: &str) -> PathBuf {
    std::env::var("HOME")
        .map(|h| PathBuf::from(h).join(subpath))
        .unwrap_or_else(|_| PathBuf::from("/tmp/hive"))
}
