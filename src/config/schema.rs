//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from TOML files and
//! fall back to the built-in defaults for any field left out.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default delay between trip checks while Alive, in seconds.
pub const DEFAULT_CHECK_HYSTRIX_INTERVAL_SECS: u64 = 10;
/// Default delay between recovery probes while tripped, in seconds.
pub const DEFAULT_CHECK_ALIVE_INTERVAL_SECS: u64 = 60;
/// Default period of the counter cleanup loop, in seconds.
pub const DEFAULT_CLEANUP_INTERVAL_SECS: u64 = 60 * 5;
/// Default failure threshold for the built-in trip check.
pub const DEFAULT_MAX_FAILED_NUMBER: i64 = 100;
/// Default age after which a counter bucket is evicted, in minutes.
pub const DEFAULT_RETENTION_MINUTES: u64 = 30;
/// Largest accepted retention window: one week of minute buckets.
pub const MAX_RETENTION_MINUTES: u64 = 60 * 24 * 7;
/// Default time in the tripped state before the built-in recovery check passes.
pub const DEFAULT_RECOVERY_PROBE_INTERVAL_SECS: u64 = 60 * 5;

/// Root configuration for the breaker daemon.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Default)]
#[serde(default)]
pub struct HystrixConfig {
    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Monitored dependencies, one breaker each.
    pub breakers: Vec<BreakerEntry>,
}

/// A named breaker in the config file.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct BreakerEntry {
    /// Breaker identifier used in logs and metrics.
    pub id: String,

    /// Free-form description handed to transition callbacks.
    #[serde(default)]
    pub description: Option<String>,

    #[serde(flatten)]
    pub settings: BreakerConfig,
}

/// Tuning of a single breaker.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct BreakerConfig {
    /// Delay between trip checks while Alive (and right after recovery).
    pub check_hystrix_interval_secs: u64,

    /// Delay between recovery probes while tripped.
    pub check_alive_interval_secs: u64,

    /// Period of the counter cleanup loop.
    pub cleanup_interval_secs: u64,

    /// Trip when the current bucket's count exceeds this.
    pub max_failed_number: i64,

    /// Buckets older than this are evicted by the cleanup loop.
    pub retention_minutes: u64,

    /// Built-in recovery check passes once tripped for longer than this.
    pub recovery_probe_interval_secs: u64,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            check_hystrix_interval_secs: DEFAULT_CHECK_HYSTRIX_INTERVAL_SECS,
            check_alive_interval_secs: DEFAULT_CHECK_ALIVE_INTERVAL_SECS,
            cleanup_interval_secs: DEFAULT_CLEANUP_INTERVAL_SECS,
            max_failed_number: DEFAULT_MAX_FAILED_NUMBER,
            retention_minutes: DEFAULT_RETENTION_MINUTES,
            recovery_probe_interval_secs: DEFAULT_RECOVERY_PROBE_INTERVAL_SECS,
        }
    }
}

impl BreakerConfig {
    pub fn check_hystrix_interval(&self) -> Duration {
        Duration::from_secs(self.check_hystrix_interval_secs)
    }

    pub fn check_alive_interval(&self) -> Duration {
        Duration::from_secs(self.check_alive_interval_secs)
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs)
    }

    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_minutes.saturating_mul(60))
    }

    pub fn recovery_probe_interval(&self) -> Duration {
        Duration::from_secs(self.recovery_probe_interval_secs)
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable, for development.
    #[default]
    Pretty,
    /// One JSON object per line, for log aggregation.
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error) or a full filter directive.
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable Prometheus metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
