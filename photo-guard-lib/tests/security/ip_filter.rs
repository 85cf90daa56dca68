use photo_guard_lib::config::{GeoBlockingConfig, IpSecurityConfig, WhitelistConfig};
use photo_guard_lib::security::ip_filter::{
    load_rule_cache, AccessContext, AccessReason, IpFilter, RuleKind, RuleOptions, RuleSource,
    MAX_FAILED_ATTEMPTS,
};
use photo_guard_lib::security::{RiskLevel, SecurityEventType};
use std::time::Duration;

use crate::{fixtures, TestResult, START_MS};

fn no_defaults() -> IpSecurityConfig {
    IpSecurityConfig { default_rules: false, ..IpSecurityConfig::default() }
}

#[test]
fn test_cidr_rule_contains_whole_block() -> TestResult {
    let (clock, sink) = fixtures();
    let filter = IpFilter::new(&no_defaults(), sink, clock)?;
    filter.add_rule(RuleKind::Blacklist, "198.51.100.0/24", RuleOptions::default())?;
    let ctx = AccessContext::default();

    for ip in ["198.51.100.0", "198.51.100.1", "198.51.100.128", "198.51.100.255"] {
        let decision = filter.is_ip_allowed(ip, &ctx);
        assert!(!decision.allowed, "{ip} should be inside the block");
        assert_eq!(decision.reason, AccessReason::Blacklisted);
    }
    for ip in ["198.51.99.255", "198.51.101.0"] {
        assert!(filter.is_ip_allowed(ip, &ctx).allowed, "{ip} should be outside the block");
    }
    Ok(())
}

#[test]
fn test_wildcard_and_range_rules() -> TestResult {
    let (clock, sink) = fixtures();
    let filter = IpFilter::new(&no_defaults(), sink, clock)?;
    filter.add_rule(RuleKind::Blacklist, "203.0.*.*", RuleOptions::default())?;
    filter.add_rule(RuleKind::Blacklist, "192.0.2.10-192.0.2.20", RuleOptions::default())?;
    let ctx = AccessContext::default();

    assert!(!filter.is_ip_allowed("203.0.113.9", &ctx).allowed);
    assert!(filter.is_ip_allowed("203.1.0.1", &ctx).allowed);
    assert!(!filter.is_ip_allowed("192.0.2.10", &ctx).allowed);
    assert!(!filter.is_ip_allowed("192.0.2.20", &ctx).allowed);
    assert!(filter.is_ip_allowed("192.0.2.21", &ctx).allowed);
    Ok(())
}

#[test]
fn test_blacklist_beats_whitelist() -> TestResult {
    let (clock, sink) = fixtures();
    let filter = IpFilter::new(&IpSecurityConfig::default(), sink.clone(), clock)?;
    let ctx = AccessContext::default();

    // 192.168.0.0/16 is whitelisted by default
    let allowed = filter.is_ip_allowed("192.168.1.20", &ctx);
    assert!(allowed.allowed);
    assert_eq!(allowed.reason, AccessReason::Whitelisted);

    let rule_id = filter.add_rule(
        RuleKind::Blacklist,
        "192.168.1.20",
        RuleOptions::default().with_description("compromised host"),
    )?;
    let denied = filter.is_ip_allowed("192.168.1.20", &ctx);
    assert!(!denied.allowed);
    assert_eq!(denied.reason, AccessReason::Blacklisted);
    assert_eq!(denied.rule_id.as_deref(), Some(rule_id.as_str()));
    assert_eq!(denied.action.as_deref(), Some("compromised host"));

    let event = sink
        .events()
        .into_iter()
        .rev()
        .find(|e| e.event_type == SecurityEventType::AccessDenied)
        .ok_or("no denial event")?;
    assert_eq!(event.risk, RiskLevel::High);
    assert_eq!(event.payload["reason"], "blacklisted");

    assert!(filter.remove_rule(&rule_id));
    assert!(filter.is_ip_allowed("192.168.1.20", &ctx).allowed);
    Ok(())
}

#[test]
fn test_most_specific_blacklist_rule_is_reported() -> TestResult {
    let (clock, sink) = fixtures();
    let filter = IpFilter::new(&no_defaults(), sink, clock)?;
    filter.add_rule(RuleKind::Blacklist, "10.0.0.0/8", RuleOptions::default())?;
    let narrow = filter.add_rule(RuleKind::Blacklist, "10.1.2.0/24", RuleOptions::default())?;
    filter.add_rule(RuleKind::Blacklist, "10.1.0.0/16", RuleOptions::default())?;

    let decision = filter.is_ip_allowed("10.1.2.3", &AccessContext::default());
    assert_eq!(decision.rule_id, Some(narrow));
    Ok(())
}

#[test]
fn test_auto_block_after_threshold() -> TestResult {
    let (clock, sink) = fixtures();
    let filter = IpFilter::new(&IpSecurityConfig::default(), sink.clone(), clock.clone())?;
    let ctx = AccessContext::default().with_endpoint("auth");
    let ip = "203.0.113.5";

    for _ in 0..MAX_FAILED_ATTEMPTS - 1 {
        filter.record_failed_attempt(ip, &ctx);
        clock.advance(Duration::from_millis(100));
    }
    assert!(filter.is_ip_allowed(ip, &ctx).allowed);
    assert!(filter.temporary_blocks().is_empty());

    assert_eq!(filter.record_failed_attempt(ip, &ctx), MAX_FAILED_ATTEMPTS);
    let decision = filter.is_ip_allowed(ip, &ctx);
    assert!(!decision.allowed);
    assert_eq!(decision.reason, AccessReason::TemporaryBlock);

    let blocks = filter.temporary_blocks();
    assert_eq!(blocks.len(), 1);
    assert!(blocks[0].automatic);
    assert_eq!(blocks[0].attempts, MAX_FAILED_ATTEMPTS);
    assert_eq!(blocks[0].ip, ip);
    assert_eq!(blocks[0].expires_at_ms - blocks[0].created_at_ms, 86_400_000);

    let auto = sink
        .events()
        .into_iter()
        .find(|e| e.action() == Some("auto_blocked"))
        .ok_or("no auto-block event")?;
    assert_eq!(auto.risk, RiskLevel::High);

    // Further failures keep the buffer capped and do not re-block
    filter.record_failed_attempt(ip, &ctx);
    assert_eq!(filter.failed_attempts(ip), MAX_FAILED_ATTEMPTS);
    assert_eq!(sink.events().iter().filter(|e| e.action() == Some("auto_blocked")).count(), 1);

    clock.advance(Duration::from_secs(86_400));
    assert!(filter.is_ip_allowed(ip, &ctx).allowed);
    assert!(filter.temporary_blocks().is_empty());
    Ok(())
}

#[test]
fn test_attempts_outside_window_do_not_block() -> TestResult {
    let (clock, sink) = fixtures();
    let mut config = IpSecurityConfig::default();
    config.blacklist.auto_blacklist_threshold = 3;
    config.blacklist.auto_blacklist_window_secs = 60;
    let filter = IpFilter::new(&config, sink, clock.clone())?;
    let ctx = AccessContext::default();

    for _ in 0..5 {
        filter.record_failed_attempt("203.0.113.5", &ctx);
        clock.advance(Duration::from_secs(40));
    }
    assert!(filter.temporary_blocks().is_empty());

    filter.record_failed_attempt("203.0.113.5", &ctx);
    filter.record_failed_attempt("203.0.113.5", &ctx);
    assert_eq!(filter.temporary_blocks().len(), 1);
    Ok(())
}

#[test]
fn test_rule_expires() -> TestResult {
    let (clock, sink) = fixtures();
    let filter = IpFilter::new(&no_defaults(), sink, clock.clone())?;
    let options = RuleOptions { duration_ms: Some(60_000), ..RuleOptions::default() };
    filter.add_rule(RuleKind::Blacklist, "198.51.100.7", options)?;
    filter.add_rule(
        RuleKind::Blacklist,
        "198.51.100.8",
        RuleOptions::default().expiring_at(START_MS + 30_000),
    )?;
    let ctx = AccessContext::default();

    assert!(!filter.is_ip_allowed("198.51.100.7", &ctx).allowed);
    assert!(!filter.is_ip_allowed("198.51.100.8", &ctx).allowed);

    clock.advance(Duration::from_secs(30));
    assert!(filter.is_ip_allowed("198.51.100.8", &ctx).allowed);
    assert!(!filter.is_ip_allowed("198.51.100.7", &ctx).allowed);

    clock.advance(Duration::from_secs(30));
    assert!(filter.is_ip_allowed("198.51.100.7", &ctx).allowed);
    assert!(filter.rules().is_empty());
    Ok(())
}

#[test]
fn test_permanent_rule_ignores_expiry() -> TestResult {
    let (clock, sink) = fixtures();
    let filter = IpFilter::new(&no_defaults(), sink, clock.clone())?;
    filter.add_rule(
        RuleKind::Blacklist,
        "198.51.100.7",
        RuleOptions::permanent().expiring_at(START_MS + 1),
    )?;
    clock.advance(Duration::from_secs(3600));
    assert!(!filter.is_ip_allowed("198.51.100.7", &AccessContext::default()).allowed);
    Ok(())
}

#[test]
fn test_geo_blocking_and_whitelist_mode() -> TestResult {
    let (clock, sink) = fixtures();
    let config = IpSecurityConfig {
        geo_blocking: GeoBlockingConfig { enabled: true, countries: vec!["xx".to_string()] },
        ..IpSecurityConfig::default()
    };
    let filter = IpFilter::new(&config, sink, clock)?;

    let geo = filter.is_ip_allowed("8.8.8.8", &AccessContext::default().with_country("XX"));
    assert_eq!(geo.reason, AccessReason::GeoBlocked);
    // Whitelisted addresses skip geo-blocking
    assert!(filter.is_ip_allowed("10.0.0.1", &AccessContext::default().with_country("XX")).allowed);

    assert!(filter.add_geo_block("yy"));
    assert!(!filter.add_geo_block("YY"));
    assert!(!filter.is_ip_allowed("8.8.8.8", &AccessContext::default().with_country("yy")).allowed);
    assert!(filter.remove_geo_block("YY"));

    filter.set_whitelist_mode(true);
    let decision = filter.is_ip_allowed("8.8.8.8", &AccessContext::default());
    assert_eq!(decision.reason, AccessReason::NotInWhitelist);
    assert!(filter.is_ip_allowed("127.0.0.1", &AccessContext::default()).allowed);
    Ok(())
}

#[test]
fn test_whitelist_mode_from_config() -> TestResult {
    let (clock, sink) = fixtures();
    let config = IpSecurityConfig {
        default_rules: false,
        whitelist: WhitelistConfig { enabled: true, ips: vec!["203.0.113.0/24".to_string()] },
        ..IpSecurityConfig::default()
    };
    let filter = IpFilter::new(&config, sink, clock)?;
    assert!(filter.is_ip_allowed("203.0.113.44", &AccessContext::default()).allowed);
    assert!(!filter.is_ip_allowed("127.0.0.1", &AccessContext::default()).allowed);
    Ok(())
}

#[test]
fn test_temporary_block_lifecycle() -> TestResult {
    let (clock, sink) = fixtures();
    let filter = IpFilter::new(&IpSecurityConfig::default(), sink, clock)?;
    let ctx = AccessContext::default();

    filter.add_temporary_block("127.0.0.1", "manual review", Duration::from_secs(60))?;
    let decision = filter.is_ip_allowed("127.0.0.1", &ctx);
    assert_eq!(decision.reason, AccessReason::TemporaryBlock);
    assert_eq!(decision.action.as_deref(), Some("manual review"));

    assert!(filter.remove_temporary_block("127.0.0.1"));
    assert!(!filter.remove_temporary_block("127.0.0.1"));
    assert!(filter.is_ip_allowed("127.0.0.1", &ctx).allowed);
    assert!(filter.add_temporary_block("not-an-ip", "x", Duration::from_secs(1)).is_err());
    Ok(())
}

#[test]
fn test_invalid_rule_rejected() -> TestResult {
    let (clock, sink) = fixtures();
    let filter = IpFilter::new(&no_defaults(), sink, clock)?;
    for bad in ["999.1.1.1", "10.0.0.0/33", "10.0.0.9-10.0.0.1", "1.2.*", "::1-10.0.0.1"] {
        let added = filter.add_rule(RuleKind::Blacklist, bad, RuleOptions::default());
        assert!(added.is_err(), "{bad}");
    }
    assert!(filter.rules().is_empty());
    Ok(())
}

#[test]
fn test_user_rules_survive_restart() -> TestResult {
    let dir = tempfile::tempdir()?;
    let config = IpSecurityConfig {
        default_rules: false,
        rule_cache_path: Some(dir.path().join("ip-rules.json")),
        ..IpSecurityConfig::default()
    };

    let (clock, sink) = fixtures();
    let filter = IpFilter::new(&config, sink, clock.clone())?;
    let cached = filter.add_rule(
        RuleKind::Blacklist,
        "198.51.100.7",
        RuleOptions { duration_ms: Some(3_600_000), ..RuleOptions::default() },
    )?;
    filter.add_rule(RuleKind::Blacklist, "198.51.100.8", RuleOptions::permanent())?;
    filter.add_rule(
        RuleKind::Whitelist,
        "198.51.100.9",
        RuleOptions::default().with_source(RuleSource::Server),
    )?;
    drop(filter);

    let (_, sink) = fixtures();
    let restored = IpFilter::new(&config, sink, clock.clone())?;
    let rules = restored.rules();
    assert_eq!(rules.len(), 1);
    assert_eq!(rules[0].id, cached);
    assert_eq!(rules[0].source, RuleSource::User);
    assert!(!restored.is_ip_allowed("198.51.100.7", &AccessContext::default()).allowed);

    // Expired cached rules are not loaded
    clock.advance(Duration::from_secs(3600));
    let (_, sink) = fixtures();
    let later = IpFilter::new(&config, sink, clock)?;
    assert!(later.rules().is_empty());
    Ok(())
}

#[test]
fn test_lookup_leaves_rule_cache_to_cleanup() -> TestResult {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("ip-rules.json");
    let config = IpSecurityConfig {
        default_rules: false,
        rule_cache_path: Some(path.clone()),
        ..IpSecurityConfig::default()
    };
    let (clock, sink) = fixtures();
    let filter = IpFilter::new(&config, sink, clock.clone())?;
    filter.add_rule(
        RuleKind::Blacklist,
        "203.0.113.7",
        RuleOptions::default().expiring_at(START_MS + 500),
    )?;
    assert_eq!(load_rule_cache(&path)?.len(), 1);
    std::fs::remove_file(&path)?;

    clock.advance(Duration::from_secs(1));
    let decision = filter.is_ip_allowed("203.0.113.7", &AccessContext::default());
    assert_eq!(decision.reason, AccessReason::DefaultAllow);
    assert!(filter.rules().is_empty());
    assert!(!path.exists(), "lookup must not write the rule cache");

    // The stale cache is flushed by the next sweep
    filter.cleanup();
    assert!(path.exists());
    assert!(load_rule_cache(&path)?.is_empty());
    Ok(())
}

#[test]
fn test_failed_attempt_count_is_not_capped() -> TestResult {
    let (clock, sink) = fixtures();
    let mut config = IpSecurityConfig::default();
    config.blacklist.auto_blacklist_window_secs = 1;
    let filter = IpFilter::new(&config, sink, clock.clone())?;
    let ip = "198.51.100.4";

    let mut last = 0;
    for _ in 0..60 {
        last = filter.record_failed_attempt(ip, &AccessContext::default());
        clock.advance(Duration::from_secs(2));
    }
    assert_eq!(last, 60);
    assert!(filter.temporary_blocks().is_empty());

    let record = filter.failed_attempt_record(ip).ok_or("no attempt record")?;
    assert_eq!(record.count, 60);
    assert_eq!(record.first_attempt_ms, START_MS);
    assert_eq!(record.last_attempt_ms, START_MS + 59 * 2_000);
    assert_eq!(record.attempts.len(), MAX_FAILED_ATTEMPTS);
    assert_eq!(record.attempts.first().copied(), Some(START_MS + 10 * 2_000));
    assert_eq!(filter.failed_attempts(ip), MAX_FAILED_ATTEMPTS);
    assert!(filter.failed_attempt_record("198.51.100.5").is_none());
    Ok(())
}

#[test]
fn test_subscribers_see_stats() -> TestResult {
    let (clock, sink) = fixtures();
    let filter = IpFilter::new(&IpSecurityConfig::default(), sink, clock)?;
    assert!(filter.is_ready());
    let rx = filter.subscribe();
    assert_eq!(rx.borrow().total_rules, 5);

    filter.add_rule(RuleKind::Blacklist, "198.51.100.7", RuleOptions::default())?;
    filter.add_temporary_block("198.51.100.8", "test", Duration::from_secs(60))?;
    let stats = rx.borrow().clone();
    assert_eq!(stats.total_rules, 6);
    assert_eq!(stats.blacklist_rules, 1);
    assert_eq!(stats.whitelist_rules, 5);
    assert_eq!(stats.temporary_blocks, 1);
    assert_eq!(stats, filter.stats());
    Ok(())
}
