// Configuration - TOML configuration for the full pipeline

use crate::error::PipelineError;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub certstream: CertstreamConfig,

    /// Wildcard source APIs, polled by the refresher
    #[serde(default)]
    pub apis: Vec<ApiSourceConfig>,

    /// Seconds between wildcard refreshes
    #[serde(default = "default_wildcards_update_interval")]
    pub wildcards_update_interval: u64,

    #[serde(default)]
    pub http: HttpConfig,

    #[serde(default)]
    pub dns: DnsConfig,

    pub fingerprinter: Option<FingerprinterConfig>,

    #[serde(default)]
    pub discord: DiscordConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub shutdown: ShutdownConfig,

    #[serde(default)]
    pub concurrency: ConcurrencyConfig,

    #[serde(default)]
    pub database: DatabaseConfig,
}

/// Certstream ingestion settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CertstreamConfig {
    /// WebSocket URL of the certstream server
    #[serde(default = "default_certstream_url")]
    pub url: String,

    /// Suffixes rejected before any other processing (literal endswith)
    #[serde(default)]
    pub exclusions: Vec<String>,

    /// Process names that arrived as `*.suffix` instead of dropping them
    #[serde(default)]
    pub keep_wildcard_names: bool,

    /// Block the ingest loop when the queue is full instead of dropping
    #[serde(default)]
    pub block_on_full: bool,
}

impl Default for CertstreamConfig {
    fn default() -> Self {
        Self {
            url: default_certstream_url(),
            exclusions: Vec::new(),
            keep_wildcard_names: false,
            block_on_full: false,
        }
    }
}

/// A single wildcard source API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiSourceConfig {
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

/// HTTP probing settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Protocol/port pairs probed per discovered host
    #[serde(default = "default_probe_ports")]
    pub ports: Vec<ProbePortConfig>,

    /// Per-request timeout in seconds
    #[serde(default = "default_http_timeout")]
    pub timeout: u64,

    /// Overall per-host probe ceiling in seconds
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout: u64,

    /// Concurrent probes per host
    #[serde(default = "default_probe_concurrency")]
    pub concurrency: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            ports: default_probe_ports(),
            timeout: default_http_timeout(),
            probe_timeout: default_probe_timeout(),
            concurrency: default_probe_concurrency(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbePortConfig {
    pub protocol: String,
    pub port: u16,
}

/// DNS resolution settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DnsConfig {
    /// Per-query timeout in seconds
    #[serde(default = "default_dns_timeout")]
    pub timeout: u64,

    /// Also issue AAAA queries
    #[serde(default)]
    pub lookup_ipv6: bool,

    /// Result cache capacity
    #[serde(default = "default_dns_cache_size")]
    pub cache_size: usize,
}

impl Default for DnsConfig {
    fn default() -> Self {
        Self {
            timeout: default_dns_timeout(),
            lookup_ipv6: false,
            cache_size: default_dns_cache_size(),
        }
    }
}

/// Fingerprinter service settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FingerprinterConfig {
    pub url: String,
    pub api_key: Option<String>,
    #[serde(default)]
    pub callback_urls: Vec<String>,
}

/// Discord webhook settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscordConfig {
    /// Webhook receiving discovery notifications
    pub messages_webhook: Option<String>,

    /// Webhook receiving operational logs and stats reports
    pub logs_webhook: Option<String>,

    /// Seconds between webhook stats reports
    #[serde(default = "default_stats_interval")]
    pub stats_interval: u64,

    #[serde(default = "default_discord_username")]
    pub username: String,
}

impl Default for DiscordConfig {
    fn default() -> Self {
        Self {
            messages_webhook: None,
            logs_webhook: None,
            stats_interval: default_stats_interval(),
            username: default_discord_username(),
        }
    }
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_true")]
    pub console_colors: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            console_colors: true,
        }
    }
}

/// Shutdown settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShutdownConfig {
    /// Seconds the worker pool is allowed to drain after the first signal
    #[serde(default = "default_shutdown_timeout")]
    pub timeout: u64,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            timeout: default_shutdown_timeout(),
        }
    }
}

/// Worker pool sizing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConcurrencyConfig {
    #[serde(default = "default_min_concurrency")]
    pub min: usize,

    #[serde(default = "default_max_concurrency")]
    pub max: usize,

    /// Ingest queue hard cap
    #[serde(default = "default_queue_max")]
    pub queue_max: usize,

    /// Deduplicator capacity
    #[serde(default = "default_dedup_max")]
    pub dedup_max: usize,
}

impl Default for ConcurrencyConfig {
    fn default() -> Self {
        Self {
            min: default_min_concurrency(),
            max: default_max_concurrency(),
            queue_max: default_queue_max(),
            dedup_max: default_dedup_max(),
        }
    }
}

/// Database and retry-queue settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite database path
    #[serde(default = "default_db_path")]
    pub path: String,

    /// Seconds between retry sweeps
    #[serde(default = "default_retry_interval")]
    pub retry_interval: u64,

    /// Retries before an unresolvable row is abandoned
    #[serde(default = "default_max_retries")]
    pub max_retries: i64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            retry_interval: default_retry_interval(),
            max_retries: default_max_retries(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            certstream: CertstreamConfig::default(),
            apis: Vec::new(),
            wildcards_update_interval: default_wildcards_update_interval(),
            http: HttpConfig::default(),
            dns: DnsConfig::default(),
            fingerprinter: None,
            discord: DiscordConfig::default(),
            logging: LoggingConfig::default(),
            shutdown: ShutdownConfig::default(),
            concurrency: ConcurrencyConfig::default(),
            database: DatabaseConfig::default(),
        }
    }
}

fn default_certstream_url() -> String {
    "wss://certstream.calidog.io/domains-only".to_string()
}

fn default_wildcards_update_interval() -> u64 {
    86_400
}

fn default_probe_ports() -> Vec<ProbePortConfig> {
    vec![
        ProbePortConfig {
            protocol: "http".to_string(),
            port: 80,
        },
        ProbePortConfig {
            protocol: "https".to_string(),
            port: 443,
        },
    ]
}

fn default_http_timeout() -> u64 {
    5
}

fn default_probe_timeout() -> u64 {
    15
}

fn default_probe_concurrency() -> usize {
    5
}

fn default_dns_timeout() -> u64 {
    2
}

fn default_dns_cache_size() -> usize {
    10_000
}

fn default_stats_interval() -> u64 {
    10_800
}

fn default_discord_username() -> String {
    "CertHound".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_shutdown_timeout() -> u64 {
    30
}

fn default_min_concurrency() -> usize {
    10
}

fn default_max_concurrency() -> usize {
    50
}

fn default_queue_max() -> usize {
    50_000
}

fn default_dedup_max() -> usize {
    100_000
}

fn default_db_path() -> String {
    "certhound.db".to_string()
}

fn default_retry_interval() -> u64 {
    10_800
}

fn default_max_retries() -> i64 {
    10
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path.as_ref()).map_err(|e| {
            PipelineError::ConfigError {
                message: format!("Failed to read config file {:?}: {}", path.as_ref(), e),
            }
        })?;

        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate settings that serde cannot express
    pub fn validate(&self) -> Result<()> {
        if self.certstream.url.is_empty() {
            return Err(PipelineError::ConfigError {
                message: "certstream.url must not be empty".to_string(),
            });
        }

        if !self.certstream.url.starts_with("ws://") && !self.certstream.url.starts_with("wss://") {
            return Err(PipelineError::ConfigError {
                message: format!(
                    "certstream.url must be a ws:// or wss:// URL, got '{}'",
                    self.certstream.url
                ),
            });
        }

        if self.concurrency.min == 0 || self.concurrency.max < self.concurrency.min {
            return Err(PipelineError::ConfigError {
                message: format!(
                    "concurrency.min ({}) must be > 0 and <= concurrency.max ({})",
                    self.concurrency.min, self.concurrency.max
                ),
            });
        }

        if self.concurrency.queue_max == 0 {
            return Err(PipelineError::ConfigError {
                message: "concurrency.queue_max must be > 0".to_string(),
            });
        }

        for port in &self.http.ports {
            if port.protocol != "http" && port.protocol != "https" {
                return Err(PipelineError::ConfigError {
                    message: format!(
                        "http.ports protocol must be http or https, got '{}'",
                        port.protocol
                    ),
                });
            }
        }

        if self.database.max_retries < 0 {
            return Err(PipelineError::ConfigError {
                message: "database.max_retries must be >= 0".to_string(),
            });
        }

        Ok(())
    }

    /// Write a commented example configuration file
    pub fn create_example<P: AsRef<Path>>(path: P) -> Result<()> {
        let example = r#"# CertHound configuration

# Seconds between wildcard refreshes (default: 1 day)
wildcards_update_interval = 86400

[certstream]
url = "wss://certstream.calidog.io/domains-only"
# Suffixes dropped before any processing
exclusions = [".nflxvideo.net", ".cloudfront.net"]
# Process names that arrived as "*.suffix" instead of dropping them
keep_wildcard_names = false
# Block ingestion when the queue is full instead of dropping the newest
block_on_full = false

# Wildcard source APIs. Each response is walked for "*.suffix" strings.
[[apis]]
name = "programs"
url = "https://api.example.org/v1/scopes"
enabled = true

[apis.headers]
Authorization = "Bearer changeme"

[http]
timeout = 5
probe_timeout = 15
concurrency = 5
ports = [
    { protocol = "http", port = 80 },
    { protocol = "https", port = 443 },
    { protocol = "https", port = 8443 },
]

[dns]
timeout = 2
lookup_ipv6 = false
cache_size = 10000

[fingerprinter]
url = "https://fingerprinter.example.org/api/fingerprint"
api_key = "changeme"
callback_urls = ["https://hooks.example.org/fingerprints"]

[discord]
messages_webhook = "https://discord.com/api/webhooks/..."
logs_webhook = "https://discord.com/api/webhooks/..."
stats_interval = 10800
username = "CertHound"

[logging]
level = "info"
console_colors = true

[shutdown]
timeout = 30

[concurrency]
min = 10
max = 50
queue_max = 50000
dedup_max = 100000

[database]
path = "certhound.db"
retry_interval = 10800
max_retries = 10
"#;

        fs::write(path.as_ref(), example).map_err(|e| PipelineError::ConfigError {
            message: format!("Failed to write example config: {}", e),
        })?;

        Ok(())
    }

    /// Enabled wildcard sources
    pub fn enabled_apis(&self) -> Vec<&ApiSourceConfig> {
        self.apis.iter().filter(|a| a.enabled).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.wildcards_update_interval, 86_400);
        assert_eq!(config.concurrency.min, 10);
        assert_eq!(config.concurrency.max, 50);
        assert_eq!(config.concurrency.queue_max, 50_000);
        assert_eq!(config.concurrency.dedup_max, 100_000);
        assert_eq!(config.dns.timeout, 2);
        assert_eq!(config.http.timeout, 5);
        assert_eq!(config.http.probe_timeout, 15);
        assert_eq!(config.shutdown.timeout, 30);
        assert_eq!(config.database.retry_interval, 10_800);
        assert!(!config.certstream.block_on_full);
    }

    #[test]
    fn test_validate_default_ok() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_scheme() {
        let mut config = Config::default();
        config.certstream.url = "https://not-a-websocket".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_concurrency() {
        let mut config = Config::default();
        config.concurrency.min = 20;
        config.concurrency.max = 10;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_protocol() {
        let mut config = Config::default();
        config.http.ports.push(ProbePortConfig {
            protocol: "ftp".to_string(),
            port: 21,
        });
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_toml() {
        let toml_str = r#"
            [certstream]
            url = "wss://certstream.example.org/"
            exclusions = [".nflxvideo.net"]

            [[apis]]
            name = "programs"
            url = "https://api.example.org/scopes"
            enabled = true

            [discord]
            messages_webhook = "https://discord.com/api/webhooks/1"
            logs_webhook = "https://discord.com/api/webhooks/2"

            [concurrency]
            min = 5
            max = 25
        "#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.certstream.url, "wss://certstream.example.org/");
        assert_eq!(config.certstream.exclusions, vec![".nflxvideo.net"]);
        assert_eq!(config.apis.len(), 1);
        assert_eq!(config.apis[0].name, "programs");
        assert_eq!(config.concurrency.min, 5);
        assert_eq!(config.concurrency.max, 25);
        // Unspecified sections fall back to defaults
        assert_eq!(config.database.max_retries, 10);
        assert_eq!(config.discord.stats_interval, 10_800);
    }

    #[test]
    fn test_example_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("example.toml");

        Config::create_example(&path).unwrap();
        let config = Config::from_file(&path).unwrap();

        assert_eq!(config.apis.len(), 1);
        assert!(config.apis[0].headers.contains_key("Authorization"));
        assert_eq!(config.http.ports.len(), 3);
        assert!(config.fingerprinter.is_some());
    }

    #[test]
    fn test_enabled_apis_filter() {
        let mut config = Config::default();
        config.apis = vec![
            ApiSourceConfig {
                name: "on".to_string(),
                url: "https://a.example".to_string(),
                headers: HashMap::new(),
                enabled: true,
            },
            ApiSourceConfig {
                name: "off".to_string(),
                url: "https://b.example".to_string(),
                headers: HashMap::new(),
                enabled: false,
            },
        ];

        let enabled = config.enabled_apis();
        assert_eq!(enabled.len(), 1);
        assert_eq!(enabled[0].name, "on");
    }
}
