mod loader;
pub mod security;
pub mod types;

pub use loader::{load_from_path, load_from_str, validate_config, MAX_AUTO_BLACKLIST_THRESHOLD};
pub use security::{
    AnonymizationConfig, BlacklistConfig, GeoBlockingConfig, HashAlgorithm, IpSecurityConfig,
    RateLimitAlgorithm, RateLimitConfig, RateLimitRule, WhitelistConfig,
};
pub use types::{Config, LoggingConfig, MaintenanceConfig};
