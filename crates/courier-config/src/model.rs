// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Courier dispatch service.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup. Provider credentials are deliberately absent:
//! secrets are environment-only and read by the binary at boot.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Top-level Courier configuration.
///
/// Loaded from TOML files following the XDG hierarchy, with environment
/// variable overrides. All sections are optional and default to sensible
/// values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CourierConfig {
    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Broker queue settings.
    #[serde(default)]
    pub broker: BrokerConfig,

    /// Scheduled-message release settings.
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Per-user rate limiting settings.
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Per-channel provider selection.
    #[serde(default)]
    pub platforms: PlatformsConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Host address to bind.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to bind.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Per-request timeout in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_request_timeout_secs() -> u64 {
    15
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
        }
    }
}

fn default_database_path() -> String {
    "courier.db".to_string()
}

/// Broker queue configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BrokerConfig {
    /// Maximum in-flight deliveries per consumer.
    #[serde(default = "default_prefetch")]
    pub prefetch: usize,

    /// Fallback poll interval in milliseconds when no wakeup arrives.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Seconds a claimed entry stays locked before it is redelivered.
    #[serde(default = "default_lock_timeout_secs")]
    pub lock_timeout_secs: u64,

    /// Redeliveries after which an entry is parked as failed.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: i64,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            prefetch: default_prefetch(),
            poll_interval_ms: default_poll_interval_ms(),
            lock_timeout_secs: default_lock_timeout_secs(),
            max_attempts: default_max_attempts(),
        }
    }
}

fn default_prefetch() -> usize {
    10
}

fn default_poll_interval_ms() -> u64 {
    500
}

fn default_lock_timeout_secs() -> u64 {
    300
}

fn default_max_attempts() -> i64 {
    3
}

/// Scheduler configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SchedulerConfig {
    /// Seconds between scans for due scheduled messages.
    #[serde(default = "default_scheduler_interval_secs")]
    pub interval_secs: u64,

    /// Maximum due messages released per scan.
    #[serde(default = "default_scheduler_batch_size")]
    pub batch_size: i64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_scheduler_interval_secs(),
            batch_size: default_scheduler_batch_size(),
        }
    }
}

fn default_scheduler_interval_secs() -> u64 {
    10
}

fn default_scheduler_batch_size() -> i64 {
    50
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RateLimitConfig {
    /// Master switch; disabled skips the middleware entirely.
    #[serde(default = "default_rate_limit_enabled")]
    pub enabled: bool,

    /// Requests per minute by tier name. Users whose tier is absent fall
    /// back to [`RateLimitConfig::default_limit`].
    #[serde(default = "default_tiers")]
    pub tiers: HashMap<String, u64>,

    /// Fallback requests-per-minute for unknown tiers.
    #[serde(default = "default_rate_limit")]
    pub default_limit: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: default_rate_limit_enabled(),
            tiers: default_tiers(),
            default_limit: default_rate_limit(),
        }
    }
}

fn default_rate_limit_enabled() -> bool {
    true
}

fn default_tiers() -> HashMap<String, u64> {
    HashMap::from([("free".to_string(), 60), ("pro".to_string(), 600)])
}

fn default_rate_limit() -> u64 {
    60
}

/// Per-channel provider selection.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PlatformsConfig {
    #[serde(default)]
    pub sms: PlatformConfig,
    #[serde(default)]
    pub email: PlatformConfig,
    #[serde(default)]
    pub whatsapp: PlatformConfig,
    #[serde(default)]
    pub telegram: PlatformConfig,
}

/// Provider selection for a single channel.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PlatformConfig {
    /// Provider name: "mock", or a real provider the channel supports
    /// ("twilio" for sms, "sendgrid" for email). Credentials come from the
    /// environment.
    #[serde(default = "default_provider")]
    pub provider: String,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
        }
    }
}

fn default_provider() -> String {
    "mock".to_string()
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}
