//! Server configuration.
//!
//! Configuration can be loaded from:
//! - Environment variables (PARLOR_*)
//! - TOML configuration file

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};
use std::path::Path;

use parlor_core::DEFAULT_GRAWLIX;
use parlor_protocol::DEFAULT_BUFFER_CAPACITY;

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Host to bind to. The default `::` listens dual-stack.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Seconds between periodic status log lines. Zero disables them.
    #[serde(default = "default_status_interval")]
    pub status_interval_secs: u64,

    /// Relay behavior.
    #[serde(default)]
    pub relay: RelayConfig,

    /// Socket tuning.
    #[serde(default)]
    pub transport: TransportConfig,

    /// Profanity filtering.
    #[serde(default)]
    pub moderation: ModerationConfig,

    /// Metrics configuration.
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Relay behavior configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Per-connection receive buffer capacity in bytes.
    #[serde(default = "default_buffer_capacity")]
    pub buffer_capacity: usize,

    /// Whether broadcasts include the sender.
    #[serde(default = "default_true")]
    pub send_own_messages_back: bool,
}

/// Socket tuning configuration. Pure pass-through; failures are logged, not
/// fatal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Disable Nagle's algorithm on accepted connections.
    #[serde(default = "default_true")]
    pub no_delay: bool,

    /// TCP keep-alive idle time in seconds; zero disables keep-alive.
    #[serde(default = "default_keep_alive_secs")]
    pub keep_alive_secs: u64,
}

/// Profanity filtering configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModerationConfig {
    /// Flagged words, matched whole-word and case-insensitively.
    #[serde(default)]
    pub words: Vec<String>,

    /// Replacement string for flagged words.
    #[serde(default = "default_grawlix")]
    pub grawlix: String,
}

/// Metrics configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Enable metrics export.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Metrics port.
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

// Default value functions
fn default_host() -> String {
    std::env::var("PARLOR_HOST").unwrap_or_else(|_| "::".to_string())
}

fn default_port() -> u16 {
    std::env::var("PARLOR_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(1337)
}

fn default_true() -> bool {
    true
}

fn default_status_interval() -> u64 {
    60
}

fn default_buffer_capacity() -> usize {
    DEFAULT_BUFFER_CAPACITY
}

fn default_keep_alive_secs() -> u64 {
    300
}

fn default_grawlix() -> String {
    DEFAULT_GRAWLIX.to_string()
}

fn default_metrics_port() -> u16 {
    9090
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            status_interval_secs: default_status_interval(),
            relay: RelayConfig::default(),
            transport: TransportConfig::default(),
            moderation: ModerationConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            buffer_capacity: default_buffer_capacity(),
            send_own_messages_back: true,
        }
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            no_delay: true,
            keep_alive_secs: default_keep_alive_secs(),
        }
    }
}

impl Default for ModerationConfig {
    fn default() -> Self {
        Self {
            words: Vec::new(),
            grawlix: default_grawlix(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: default_metrics_port(),
        }
    }
}

impl Config {
    /// Load configuration from file or defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file exists but cannot be parsed.
    pub fn load() -> Result<Self> {
        // Try to load from default paths
        let config_paths = [
            "parlor.toml",
            "/etc/parlor/parlor.toml",
            "~/.config/parlor/parlor.toml",
        ];

        for path in &config_paths {
            let expanded = shellexpand::tilde(path);
            if Path::new(expanded.as_ref()).exists() {
                return Self::from_file(expanded.as_ref());
            }
        }

        // Fall back to defaults with environment overrides
        Ok(Self::default())
    }

    /// Load configuration from a specific file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Get the socket address to bind to.
    ///
    /// The host is parsed as a bare IP address, so the dual-stack `::` and
    /// IPv4 addresses both work.
    ///
    /// # Errors
    ///
    /// Returns an error if the host is not a valid IP address.
    pub fn bind_addr(&self) -> Result<SocketAddr> {
        let ip: IpAddr = self
            .host
            .parse()
            .with_context(|| format!("Invalid listen host: {}", self.host))?;
        Ok(SocketAddr::new(ip, self.port))
    }
}
