use serde::Deserialize;

use super::security::{AnonymizationConfig, IpSecurityConfig, RateLimitConfig};

/// Logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error"
    /// Default: "info"
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Show module path (target) in log messages
    /// Default: false
    #[serde(default = "default_false")]
    pub show_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: default_log_level(), show_target: false }
    }
}

/// Periodic memory reclamation
#[derive(Debug, Deserialize, Clone)]
pub struct MaintenanceConfig {
    /// Interval between cleanup sweeps in seconds
    /// Default: 3600 (hourly)
    #[serde(default = "default_cleanup_interval")]
    pub cleanup_interval_secs: u64,
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self { cleanup_interval_secs: default_cleanup_interval() }
    }
}

/// Main configuration structure
///
/// Every section is optional; an empty document yields the defaults.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
    /// IP allow/deny policy
    #[serde(default)]
    pub ip_security: IpSecurityConfig,
    /// Rate limiting policy
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    /// Anonymization policy
    #[serde(default)]
    pub anonymization: AnonymizationConfig,
    /// Cleanup scheduling
    #[serde(default)]
    pub maintenance: MaintenanceConfig,
}

fn default_false() -> bool {
    false
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_cleanup_interval() -> u64 {
    3600
}
