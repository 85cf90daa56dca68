use ipnet::IpNet;
use std::fs;
use std::net::IpAddr;
use std::path::Path;

use crate::config::{Config, RateLimitRule};
use crate::error::{GuardError, Result};

/// Largest auto-block threshold the per-IP attempt buffer can ever reach
pub const MAX_AUTO_BLACKLIST_THRESHOLD: u32 = 50;

pub fn load_from_path<P: AsRef<Path>>(p: P) -> Result<Config> {
    let txt = fs::read_to_string(p)
        .map_err(|e| GuardError::Config(format!("Failed to read config file: {e}")))?;
    load_from_str(&txt)
}

pub fn load_from_str(txt: &str) -> Result<Config> {
    let cfg: Config = toml::from_str(txt)
        .map_err(|e| GuardError::Config(format!("Failed to parse config: {e}")))?;

    validate_config(&cfg)?;

    Ok(cfg)
}

pub fn validate_config(cfg: &Config) -> Result<()> {
    let rl = &cfg.rate_limit;
    for (name, rule) in [
        ("global", &rl.global),
        ("api", &rl.api),
        ("auth", &rl.auth),
        ("password_reset", &rl.password_reset),
        ("default", &rl.default),
    ] {
        validate_rule(name, rule)?;
    }

    for entry in &rl.whitelist {
        if entry.parse::<IpNet>().is_err() && entry.parse::<IpAddr>().is_err() {
            return Err(GuardError::Config(format!(
                "rate_limit.whitelist entry is not an IP or CIDR block: {entry}"
            )));
        }
    }

    let bl = &cfg.ip_security.blacklist;
    let threshold = bl.auto_blacklist_threshold;
    if threshold == 0 || threshold > MAX_AUTO_BLACKLIST_THRESHOLD {
        return Err(GuardError::Config(format!(
            "auto_blacklist_threshold {threshold} is outside 1..={MAX_AUTO_BLACKLIST_THRESHOLD}"
        )));
    }
    if bl.auto_blacklist_window_secs == 0 {
        return Err(GuardError::Config("auto_blacklist_window_secs must be > 0".into()));
    }

    let an = &cfg.anonymization;
    if an.hash_iterations == 0 {
        return Err(GuardError::Config("hash_iterations must be >= 1".into()));
    }
    if an.ipv4_mask_bits > 32 {
        return Err(GuardError::Config(format!(
            "ipv4_mask_bits must be <= 32, got {}",
            an.ipv4_mask_bits
        )));
    }
    if an.ipv6_mask_bits > 128 {
        return Err(GuardError::Config(format!(
            "ipv6_mask_bits must be <= 128, got {}",
            an.ipv6_mask_bits
        )));
    }

    if cfg.maintenance.cleanup_interval_secs == 0 {
        return Err(GuardError::Config("cleanup_interval_secs must be > 0".into()));
    }

    Ok(())
}

fn validate_rule(name: &str, rule: &RateLimitRule) -> Result<()> {
    if rule.window_ms == 0 {
        return Err(GuardError::Config(format!("rate_limit.{name}.window_ms must be > 0")));
    }
    Ok(())
}
