//! Gateway configuration types.

use std::time::Duration;

use serde::Deserialize;

/// Floor for the readiness poll interval.
pub const MIN_READY_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Configuration for the gateway.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    /// Namespace used when a descriptor names none.
    #[serde(default = "GatewayConfig::default_namespace")]
    pub default_namespace: String,

    /// Interval between readiness polls in milliseconds.
    #[serde(default = "GatewayConfig::default_poll_interval")]
    pub ready_poll_interval_ms: u64,

    /// Connect timeout for orchestrator calls in seconds.
    #[serde(default = "GatewayConfig::default_connect_timeout")]
    pub connect_timeout_seconds: u64,

    /// Read timeout for orchestrator calls in seconds.
    #[serde(default = "GatewayConfig::default_read_timeout")]
    pub read_timeout_seconds: u64,

    /// Impersonate the namespace's default service account when a descriptor
    /// carries a target namespace.
    #[serde(default = "GatewayConfig::default_impersonate")]
    pub impersonate_namespace_identity: bool,

    /// Log lines returned when the caller does not ask for a count.
    #[serde(default = "GatewayConfig::default_log_tail_lines")]
    pub log_tail_lines: i64,

    /// Value of the managed-by label put on created workloads.
    #[serde(default = "GatewayConfig::default_managed_by")]
    pub managed_by: String,
}

impl GatewayConfig {
    fn default_namespace() -> String {
        "default".to_string()
    }

    const fn default_poll_interval() -> u64 {
        2000
    }

    const fn default_connect_timeout() -> u64 {
        5
    }

    const fn default_read_timeout() -> u64 {
        30
    }

    const fn default_impersonate() -> bool {
        true
    }

    const fn default_log_tail_lines() -> i64 {
        100
    }

    fn default_managed_by() -> String {
        "podgate".to_string()
    }

    /// Load configuration from environment variables.
    ///
    /// Supported environment variables:
    /// - `PODGATE_DEFAULT_NAMESPACE`: namespace used when a descriptor names none
    /// - `PODGATE_READY_POLL_INTERVAL_MS`: readiness poll interval, floored at
    ///   [`MIN_READY_POLL_INTERVAL`]
    /// - `PODGATE_CONNECT_TIMEOUT_SECONDS`: connect timeout
    /// - `PODGATE_READ_TIMEOUT_SECONDS`: read timeout
    /// - `PODGATE_IMPERSONATE`: `true`/`false`
    /// - `PODGATE_LOG_TAIL_LINES`: default log tail
    /// - `PODGATE_MANAGED_BY`: managed-by label value
    ///
    /// Values that fail to parse leave the default in place.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("PODGATE_DEFAULT_NAMESPACE") {
            if !val.is_empty() {
                config.default_namespace = val;
            }
        }
        if let Ok(val) = std::env::var("PODGATE_READY_POLL_INTERVAL_MS") {
            if let Ok(n) = val.parse() {
                config.ready_poll_interval_ms = n;
            }
        }
        if let Ok(val) = std::env::var("PODGATE_CONNECT_TIMEOUT_SECONDS") {
            if let Ok(n) = val.parse() {
                config.connect_timeout_seconds = n;
            }
        }
        if let Ok(val) = std::env::var("PODGATE_READ_TIMEOUT_SECONDS") {
            if let Ok(n) = val.parse() {
                config.read_timeout_seconds = n;
            }
        }
        if let Ok(val) = std::env::var("PODGATE_IMPERSONATE") {
            if let Ok(b) = val.to_lowercase().parse() {
                config.impersonate_namespace_identity = b;
            }
        }
        if let Ok(val) = std::env::var("PODGATE_LOG_TAIL_LINES") {
            if let Ok(n) = val.parse() {
                config.log_tail_lines = n;
            }
        }
        if let Ok(val) = std::env::var("PODGATE_MANAGED_BY") {
            if !val.is_empty() {
                config.managed_by = val;
            }
        }

        config
    }

    /// Get the readiness poll interval as a `Duration`, never shorter than
    /// [`MIN_READY_POLL_INTERVAL`].
    #[must_use]
    pub fn ready_poll_interval(&self) -> Duration {
        Duration::from_millis(self.ready_poll_interval_ms).max(MIN_READY_POLL_INTERVAL)
    }

    /// Get the connect timeout as a `Duration`.
    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_seconds)
    }

    /// Get the read timeout as a `Duration`.
    #[must_use]
    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_seconds)
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            default_namespace: Self::default_namespace(),
            ready_poll_interval_ms: Self::default_poll_interval(),
            connect_timeout_seconds: Self::default_connect_timeout(),
            read_timeout_seconds: Self::default_read_timeout(),
            impersonate_namespace_identity: Self::default_impersonate(),
            log_tail_lines: Self::default_log_tail_lines(),
            managed_by: Self::default_managed_by(),
        }
    }
}
