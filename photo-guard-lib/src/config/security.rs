use serde::Deserialize;
use std::path::PathBuf;

/// IP filtering configuration
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct IpSecurityConfig {
    /// Install the built-in loopback/private-range whitelist at startup
    /// Default: true
    #[serde(default = "default_true")]
    pub default_rules: bool,
    /// Whitelist configuration
    #[serde(default)]
    pub whitelist: WhitelistConfig,
    /// Blacklist and auto-blocking configuration
    #[serde(default)]
    pub blacklist: BlacklistConfig,
    /// Country-based blocking
    #[serde(default)]
    pub geo_blocking: GeoBlockingConfig,
    /// JSON file holding user-created, non-permanent rules
    /// Read once at startup and rewritten after every rule mutation
    #[serde(default)]
    pub rule_cache_path: Option<PathBuf>,
    /// HTTP endpoint returning an array of rules to merge at startup
    #[serde(default)]
    pub remote_rules_url: Option<String>,
}

impl Default for IpSecurityConfig {
    fn default() -> Self {
        Self {
            default_rules: true,
            whitelist: WhitelistConfig::default(),
            blacklist: BlacklistConfig::default(),
            geo_blocking: GeoBlockingConfig::default(),
            rule_cache_path: None,
            remote_rules_url: None,
        }
    }
}

/// Whitelist configuration
#[derive(Debug, Deserialize, Clone, PartialEq, Default)]
pub struct WhitelistConfig {
    /// Whitelist mode: deny every IP that no whitelist rule matches
    /// Default: false
    #[serde(default)]
    pub enabled: bool,
    /// Extra whitelist entries installed as permanent system rules
    /// Accepts exact IPs, CIDR blocks, wildcards and ranges
    #[serde(default)]
    pub ips: Vec<String>,
}

/// Blacklist configuration
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct BlacklistConfig {
    /// Blacklist entries installed as permanent system rules
    #[serde(default)]
    pub ips: Vec<String>,
    /// Failed attempts inside the window that trigger an automatic block
    /// Must be between 1 and 50 (the per-IP attempt buffer holds 50 entries)
    /// Default: 50
    #[serde(default = "default_auto_blacklist_threshold")]
    pub auto_blacklist_threshold: u32,
    /// Duration of an automatic block in seconds
    /// Default: 86400 (24 hours)
    #[serde(default = "default_auto_blacklist_duration_secs")]
    pub auto_blacklist_duration_secs: u64,
    /// Window in which failed attempts are counted, in seconds
    /// Default: 600 (10 minutes)
    #[serde(default = "default_auto_blacklist_window_secs")]
    pub auto_blacklist_window_secs: u64,
}

impl Default for BlacklistConfig {
    fn default() -> Self {
        Self {
            ips: vec![],
            auto_blacklist_threshold: default_auto_blacklist_threshold(),
            auto_blacklist_duration_secs: default_auto_blacklist_duration_secs(),
            auto_blacklist_window_secs: default_auto_blacklist_window_secs(),
        }
    }
}

/// Country-based blocking configuration
#[derive(Debug, Deserialize, Clone, PartialEq, Default)]
pub struct GeoBlockingConfig {
    #[serde(default)]
    pub enabled: bool,
    /// ISO country codes to deny, matched case-insensitively
    #[serde(default)]
    pub countries: Vec<String>,
}

/// Rate limiting algorithm
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum RateLimitAlgorithm {
    /// Lazily refilled token bucket
    #[default]
    TokenBucket,
    /// Trailing window of request timestamps
    SlidingWindow,
}

/// A single quota: at most `max` requests per `window_ms`
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitRule {
    pub window_ms: u64,
    pub max: u32,
}

impl RateLimitRule {
    pub const fn new(window_ms: u64, max: u32) -> Self {
        Self { window_ms, max }
    }
}

/// Rate limiting configuration
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct RateLimitConfig {
    /// Enable rate limiting
    /// Default: true
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Algorithm used by every limiter
    /// Default: "token_bucket"
    #[serde(default)]
    pub algorithm: RateLimitAlgorithm,
    /// Shared limit across all traffic
    /// Default: 1000 requests per minute
    #[serde(default = "default_global_rule")]
    pub global: RateLimitRule,
    /// Per-client limit for `api` endpoints
    /// Default: 100 requests per 15 minutes
    #[serde(default = "default_api_rule")]
    pub api: RateLimitRule,
    /// Per-client limit for `auth` endpoints
    /// Default: 5 requests per 15 minutes
    #[serde(default = "default_auth_rule")]
    pub auth: RateLimitRule,
    /// Per-client limit for `password-reset` endpoints
    /// Default: 3 requests per hour
    #[serde(default = "default_password_reset_rule")]
    pub password_reset: RateLimitRule,
    /// Per-client limit for every other endpoint
    /// Default: 60 requests per minute
    #[serde(default = "default_default_rule")]
    pub default: RateLimitRule,
    /// Addresses or CIDR blocks that bypass rate limiting
    /// Default: ["127.0.0.1", "::1"]
    #[serde(default = "default_rate_limit_whitelist")]
    pub whitelist: Vec<String>,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            algorithm: RateLimitAlgorithm::default(),
            global: default_global_rule(),
            api: default_api_rule(),
            auth: default_auth_rule(),
            password_reset: default_password_reset_rule(),
            default: default_default_rule(),
            whitelist: default_rate_limit_whitelist(),
        }
    }
}

/// Digest used by the hashing method
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    #[default]
    Sha256,
    Sha512,
}

/// Anonymization configuration
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct AnonymizationConfig {
    /// Salt mixed into hashes and pseudonyms
    #[serde(default = "default_salt")]
    pub salt: String,
    /// Number of hash rounds
    /// Default: 1
    #[serde(default = "default_hash_iterations")]
    pub hash_iterations: u32,
    #[serde(default)]
    pub hash_algorithm: HashAlgorithm,
    /// Hash user ids (otherwise they are pseudonymized)
    /// Default: true
    #[serde(default = "default_true")]
    pub user_id_hashing: bool,
    /// Mask IP addresses (otherwise they are hashed)
    /// Default: true
    #[serde(default = "default_true")]
    pub ip_address_masking: bool,
    /// Leading IPv4 bits kept when masking
    /// Default: 24
    #[serde(default = "default_ipv4_mask_bits")]
    pub ipv4_mask_bits: u8,
    /// Leading IPv6 bits kept when masking
    /// Default: 64
    #[serde(default = "default_ipv6_mask_bits")]
    pub ipv6_mask_bits: u8,
    /// Pseudonym mappings older than this are purged
    /// Default: 30
    #[serde(default = "default_pseudonym_retention_days")]
    pub pseudonym_retention_days: u64,
    /// Key for reversible encryption; without it encrypted types are suppressed
    #[serde(default)]
    pub encryption_key: Option<String>,
    /// Replacement used by suppression
    /// Default: "[REDACTED]"
    #[serde(default = "default_suppression_placeholder")]
    pub suppression_placeholder: String,
}

impl Default for AnonymizationConfig {
    fn default() -> Self {
        Self {
            salt: default_salt(),
            hash_iterations: default_hash_iterations(),
            hash_algorithm: HashAlgorithm::default(),
            user_id_hashing: true,
            ip_address_masking: true,
            ipv4_mask_bits: default_ipv4_mask_bits(),
            ipv6_mask_bits: default_ipv6_mask_bits(),
            pseudonym_retention_days: default_pseudonym_retention_days(),
            encryption_key: None,
            suppression_placeholder: default_suppression_placeholder(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_auto_blacklist_threshold() -> u32 {
    50
}

fn default_auto_blacklist_duration_secs() -> u64 {
    86_400 // 24 hours
}

fn default_auto_blacklist_window_secs() -> u64 {
    600 // 10 minutes
}

fn default_global_rule() -> RateLimitRule {
    RateLimitRule::new(60_000, 1000)
}

fn default_api_rule() -> RateLimitRule {
    RateLimitRule::new(900_000, 100)
}

fn default_auth_rule() -> RateLimitRule {
    RateLimitRule::new(900_000, 5)
}

fn default_password_reset_rule() -> RateLimitRule {
    RateLimitRule::new(3_600_000, 3)
}

fn default_default_rule() -> RateLimitRule {
    RateLimitRule::new(60_000, 60)
}

fn default_rate_limit_whitelist() -> Vec<String> {
    vec!["127.0.0.1".to_string(), "::1".to_string()]
}

fn default_salt() -> String {
    "photo-guard".to_string()
}

fn default_hash_iterations() -> u32 {
    1
}

fn default_ipv4_mask_bits() -> u8 {
    24
}

fn default_ipv6_mask_bits() -> u8 {
    64
}

fn default_pseudonym_retention_days() -> u64 {
    30
}

fn default_suppression_placeholder() -> String {
    "[REDACTED]".to_string()
}
