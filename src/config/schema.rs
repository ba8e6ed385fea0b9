//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the client.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Default endpoint of Elasticsearch on the local machine.
pub const DEFAULT_URL: &str = "http://127.0.0.1:9200";

/// Default scheme used when normalising sniffed node addresses.
pub const DEFAULT_SCHEME: &str = "http";

/// Root configuration for the client.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Seed URLs of the cluster nodes.
    pub urls: Vec<String>,

    /// Scheme (http or https) applied to sniffed node addresses.
    pub scheme: String,

    /// Optional HTTP basic auth credentials.
    pub basic_auth: Option<BasicAuthConfig>,

    /// Health check settings.
    pub healthcheck: HealthcheckConfig,

    /// Topology discovery settings.
    pub sniffer: SnifferConfig,

    /// Retry configuration.
    pub retries: RetryConfig,

    /// Compress request bodies with gzip.
    pub gzip: bool,

    /// HTTP method used when a GET request carries a body.
    pub send_get_body_as: String,

    /// Headers added to every request.
    pub headers: BTreeMap<String, String>,

    /// Plugins that must be installed in the cluster.
    pub required_plugins: Vec<String>,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            urls: vec![DEFAULT_URL.to_string()],
            scheme: DEFAULT_SCHEME.to_string(),
            basic_auth: None,
            healthcheck: HealthcheckConfig::default(),
            sniffer: SnifferConfig::default(),
            retries: RetryConfig::default(),
            gzip: false,
            send_get_body_as: "GET".to_string(),
            headers: BTreeMap::new(),
            required_plugins: Vec::new(),
            observability: ObservabilityConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Configuration for a short-lived client: no health checks, no
    /// sniffing, no background tasks.
    pub fn simple() -> Self {
        Self {
            healthcheck: HealthcheckConfig {
                enabled: false,
                ..HealthcheckConfig::default()
            },
            sniffer: SnifferConfig {
                enabled: false,
                ..SnifferConfig::default()
            },
            ..Self::default()
        }
    }
}

/// HTTP basic auth credentials.
#[derive(Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct BasicAuthConfig {
    pub username: String,
    #[serde(default)]
    pub password: String,
}

impl std::fmt::Debug for BasicAuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BasicAuthConfig")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// Health check configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthcheckConfig {
    /// Enable health checks.
    pub enabled: bool,

    /// Time to wait for a node while constructing the client.
    pub timeout_startup_ms: u64,

    /// Time to wait for a node during periodic checks.
    pub timeout_ms: u64,

    /// Interval between two health checks.
    pub interval_ms: u64,
}

impl Default for HealthcheckConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            timeout_startup_ms: 5_000,
            timeout_ms: 1_000,
            interval_ms: 60_000,
        }
    }
}

impl HealthcheckConfig {
    pub fn timeout_startup(&self) -> Duration {
        Duration::from_millis(self.timeout_startup_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

/// Topology discovery (sniffing) configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SnifferConfig {
    /// Enable sniffing.
    pub enabled: bool,

    /// Time to wait for the nodes info API while constructing the client.
    pub timeout_startup_ms: u64,

    /// Time to wait for the nodes info API during periodic sniffing.
    pub timeout_ms: u64,

    /// Interval between two sniffing runs.
    pub interval_ms: u64,
}

impl Default for SnifferConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            timeout_startup_ms: 5_000,
            timeout_ms: 2_000,
            interval_ms: 15 * 60 * 1_000,
        }
    }
}

impl SnifferConfig {
    pub fn timeout_startup(&self) -> Duration {
        Duration::from_millis(self.timeout_startup_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum number of retries. Zero disables retries.
    pub max_retries: u32,

    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,

    /// Maximum delay for exponential backoff in milliseconds.
    pub max_delay_ms: u64,

    /// HTTP status codes that are retried through the retry policy.
    pub status_codes: Vec<u16>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 0,
            base_delay_ms: 100,
            max_delay_ms: 8_000,
            status_codes: Vec::new(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level used by the CLI (trace, debug, info, warn, error).
    pub log_level: String,

    /// Dump raw requests and responses on the trace target.
    pub trace_bodies: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            trace_bodies: false,
        }
    }
}
