use ahash::{AHashMap, AHashSet};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock, RwLockWriteGuard};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use super::pattern::{parse_ip, IpPattern};
use super::persistence::{load_rule_cache, save_rule_cache};
use super::rules::{
    AccessContext, AccessDecision, AccessReason, FailedAttemptRecord, FilterStats, IpRule,
    RemoteRule, RuleKind, RuleOptions, RuleSource, TemporaryBlock,
};
use crate::clock::Clock;
use crate::config::{BlacklistConfig, IpSecurityConfig};
use crate::error::{GuardError, Result};
use crate::maintenance::Maintenance;
use crate::security::events::{RiskLevel, SecurityEvent, SecurityEventSink, SecurityEventType};
use crate::telemetry::Metrics;

/// Whitelisted at startup unless `default_rules` is off
pub const DEFAULT_WHITELIST: [&str; 5] =
    ["127.0.0.1", "::1", "10.0.0.0/8", "172.16.0.0/12", "192.168.0.0/16"];

/// Failed attempts remembered per IP
pub const MAX_FAILED_ATTEMPTS: usize = 50;

/// Failed-attempt logs idle for this long are reclaimed by `cleanup`
pub const FAILED_ATTEMPT_TTL: Duration = Duration::from_secs(24 * 3600);

const REMOTE_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Default)]
struct AttemptLog {
    count: usize,
    first_ms: u64,
    last_ms: u64,
    /// Capped at `MAX_FAILED_ATTEMPTS`
    attempts: VecDeque<u64>,
}

impl AttemptLog {
    fn record(&mut self, now_ms: u64) {
        if self.count == 0 {
            self.first_ms = now_ms;
        }
        self.count = self.count.saturating_add(1);
        self.last_ms = now_ms;
        self.attempts.push_back(now_ms);
        while self.attempts.len() > MAX_FAILED_ATTEMPTS {
            self.attempts.pop_front();
        }
    }

    fn snapshot(&self) -> FailedAttemptRecord {
        FailedAttemptRecord {
            count: self.count,
            first_attempt_ms: self.first_ms,
            last_attempt_ms: self.last_ms,
            attempts: self.attempts.iter().copied().collect(),
        }
    }
}

#[derive(Debug, Default)]
struct FilterState {
    /// Registration order
    rules: Vec<IpRule>,
    temp_blocks: AHashMap<IpAddr, TemporaryBlock>,
    failed: AHashMap<IpAddr, AttemptLog>,
    geo_blocked: AHashSet<String>,
    whitelist_mode: bool,
}

impl FilterState {
    fn stats(&self) -> FilterStats {
        let whitelist_rules = self.rules.iter().filter(|r| r.kind == RuleKind::Whitelist).count();
        FilterStats {
            total_rules: self.rules.len(),
            whitelist_rules,
            blacklist_rules: self.rules.len() - whitelist_rules,
            temporary_blocks: self.temp_blocks.len(),
            tracked_ips: self.failed.len(),
            geo_blocked_countries: self.geo_blocked.len(),
            whitelist_mode: self.whitelist_mode,
        }
    }

    fn evict_expired_rules(&mut self, now_ms: u64) -> usize {
        let before = self.rules.len();
        self.rules.retain(|rule| !rule.is_expired(now_ms));
        before - self.rules.len()
    }

    /// Most specific matching rule of `kind`, earliest registered on ties
    fn best_match(&self, kind: RuleKind, ip: &IpAddr) -> Option<&IpRule> {
        self.rules
            .iter()
            .filter(|rule| rule.kind == kind && rule.pattern.matches(ip))
            .fold(None, |best: Option<&IpRule>, rule| match best {
                Some(b) if b.pattern.specificity() >= rule.pattern.specificity() => Some(b),
                _ => Some(rule),
            })
    }

    fn cacheable_rules(&self) -> Vec<super::rules::StoredRule> {
        self.rules.iter().filter(|r| r.is_cacheable()).map(IpRule::to_stored).collect()
    }
}

/// IP access policy engine
///
/// Decides allow/deny per address from temporary blocks, blacklist and whitelist
/// rules, geo-blocking and whitelist mode, in that order.
pub struct IpFilter {
    state: RwLock<FilterState>,
    blacklist: BlacklistConfig,
    cache_path: Option<PathBuf>,
    /// Serializes cache writes; never taken while `state` is held
    cache_lock: Mutex<()>,
    /// Set when a lookup evicted rules without rewriting the cache
    cache_dirty: AtomicBool,
    sink: Arc<dyn SecurityEventSink>,
    clock: Arc<dyn Clock>,
    metrics: Option<Arc<Metrics>>,
    ready: AtomicBool,
    stats_tx: watch::Sender<FilterStats>,
}

impl IpFilter {
    /// Build the filter and install its default rules
    ///
    /// Fails if any default or configured rule does not parse; the rule cache is
    /// best effort.
    pub fn new(
        config: &IpSecurityConfig,
        sink: Arc<dyn SecurityEventSink>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let now = clock.now_millis();
        let mut state = FilterState {
            whitelist_mode: config.whitelist.enabled,
            ..FilterState::default()
        };
        if config.geo_blocking.enabled {
            state.geo_blocked = config
                .geo_blocking
                .countries
                .iter()
                .map(|c| c.trim().to_ascii_uppercase())
                .collect();
        }

        let defaults = config
            .default_rules
            .then_some(DEFAULT_WHITELIST.as_slice())
            .unwrap_or_default()
            .iter()
            .map(|ip| (RuleKind::Whitelist, *ip))
            .chain(config.whitelist.ips.iter().map(|ip| (RuleKind::Whitelist, ip.as_str())))
            .chain(config.blacklist.ips.iter().map(|ip| (RuleKind::Blacklist, ip.as_str())));

        let system = RuleOptions::permanent().with_source(RuleSource::System);
        for (kind, ip) in defaults {
            match build_rule(kind, ip, system.clone(), now) {
                Ok(rule) => state.rules.push(rule),
                Err(e) => {
                    error!(ip, error = %e, "failed to install default IP rule");
                    sink.log_security_event(SecurityEvent::new(
                        SecurityEventType::SystemConfigChange,
                        json!({
                            "action": "default_rules_failed",
                            "ip": ip,
                            "error": e.to_string(),
                        }),
                        RiskLevel::High,
                        now,
                    ));
                    return Err(GuardError::Initialization(format!(
                        "invalid default IP rule '{ip}': {e}"
                    )));
                }
            }
        }

        if let Some(path) = &config.rule_cache_path {
            match load_rule_cache(path) {
                Ok(stored) => {
                    for entry in stored {
                        match IpRule::from_stored(entry) {
                            Ok(rule) if !rule.is_expired(now) => state.rules.push(rule),
                            Ok(_) => {}
                            Err(e) => warn!(error = %e, "skipping invalid cached IP rule"),
                        }
                    }
                }
                Err(e) => warn!(path = %path.display(), error = %e, "failed to read IP rule cache"),
            }
        }

        let (stats_tx, _) = watch::channel(state.stats());
        let rule_count = state.rules.len();

        let filter = Self {
            state: RwLock::new(state),
            blacklist: config.blacklist.clone(),
            cache_path: config.rule_cache_path.clone(),
            cache_lock: Mutex::new(()),
            cache_dirty: AtomicBool::new(false),
            sink,
            clock,
            metrics: None,
            ready: AtomicBool::new(false),
            stats_tx,
        };

        filter.ready.store(true, Ordering::Release);
        info!(
            rules = rule_count,
            whitelist_mode = config.whitelist.enabled,
            "IP filter initialized"
        );
        filter.emit(
            SecurityEventType::SystemConfigChange,
            json!({ "action": "ip_filter_initialized", "rules": rule_count }),
            RiskLevel::Low,
            now,
        );
        Ok(filter)
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// True once default rules are installed
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    fn emit(&self, event_type: SecurityEventType, payload: Value, risk: RiskLevel, now: u64) {
        self.sink.log_security_event(SecurityEvent::new(event_type, payload, risk, now));
    }

    fn write_state(&self) -> Option<RwLockWriteGuard<'_, FilterState>> {
        match self.state.write() {
            Ok(guard) => Some(guard),
            Err(_) => {
                warn!("IP filter lock poisoned");
                None
            }
        }
    }

    fn publish(&self, state: &FilterState) {
        self.stats_tx.send_replace(state.stats());
    }

    /// Rewrite the rule cache from current state
    ///
    /// Must be called without the state lock held.
    fn persist_rules(&self) {
        let Some(path) = &self.cache_path else {
            return;
        };
        let Ok(_guard) = self.cache_lock.lock() else {
            warn!("IP rule cache lock poisoned");
            return;
        };
        self.cache_dirty.store(false, Ordering::Release);
        let snapshot = match self.state.read() {
            Ok(state) => state.cacheable_rules(),
            Err(_) => {
                warn!("IP filter lock poisoned");
                return;
            }
        };
        if let Err(e) = save_rule_cache(path, &snapshot) {
            self.cache_dirty.store(true, Ordering::Release);
            warn!(path = %path.display(), error = %e, "failed to write IP rule cache");
        }
    }

    fn unavailable() -> GuardError {
        GuardError::Unavailable("IP filter state lock poisoned".to_string())
    }

    /// Register a rule and return its id
    pub fn add_rule(&self, kind: RuleKind, ip: &str, options: RuleOptions) -> Result<String> {
        let now = self.clock.now_millis();
        let rule = build_rule(kind, ip, options, now)?;
        let id = rule.id.clone();
        let payload = json!({
            "action": "rule_added",
            "rule_id": id,
            "type": kind.as_str(),
            "ip": rule.ip,
            "format": rule.pattern.kind(),
            "source": rule.source,
            "expires_at": rule.expires_at_ms,
        });

        let mut state = self.write_state().ok_or_else(Self::unavailable)?;
        state.rules.push(rule);
        self.publish(&state);
        drop(state);
        self.persist_rules();

        info!(rule_id = %id, kind = kind.as_str(), ip, "IP rule added");
        self.emit(SecurityEventType::SystemConfigChange, payload, RiskLevel::Medium, now);
        Ok(id)
    }

    pub fn remove_rule(&self, rule_id: &str) -> bool {
        let now = self.clock.now_millis();
        let Some(mut state) = self.write_state() else {
            return false;
        };
        let Some(pos) = state.rules.iter().position(|r| r.id == rule_id) else {
            return false;
        };
        let rule = state.rules.remove(pos);
        self.publish(&state);
        drop(state);
        self.persist_rules();

        info!(rule_id, ip = %rule.ip, "IP rule removed");
        self.emit(
            SecurityEventType::SystemConfigChange,
            json!({
                "action": "rule_removed",
                "rule_id": rule_id,
                "type": rule.kind.as_str(),
                "ip": rule.ip,
            }),
            RiskLevel::Medium,
            now,
        );
        true
    }

    /// Decide whether `ip` may proceed
    ///
    /// Expired blocks and rules met during the lookup are removed. The rule
    /// cache is only marked stale here and rewritten by the next mutation or
    /// `cleanup`, so lookups never touch the disk.
    pub fn is_ip_allowed(&self, ip: &str, context: &AccessContext) -> AccessDecision {
        let now = self.clock.now_millis();

        let decision = match parse_ip(ip) {
            None => AccessDecision::deny(AccessReason::InvalidAddress),
            Some(addr) => match self.write_state() {
                Some(mut state) => {
                    let (decision, rules_changed, blocks_changed) =
                        evaluate(&mut state, &addr, context, now);
                    if rules_changed || blocks_changed {
                        self.publish(&state);
                    }
                    if rules_changed {
                        self.cache_dirty.store(true, Ordering::Release);
                    }
                    decision
                }
                None => AccessDecision::deny(AccessReason::Unavailable),
            },
        };

        if let Some(m) = &self.metrics {
            if decision.allowed {
                m.record_ip_filter_allowed(decision.reason.as_str());
            } else {
                m.record_ip_filter_denied(decision.reason.as_str());
            }
        }

        if decision.allowed {
            debug!(ip, reason = decision.reason.as_str(), "IP allowed");
        } else {
            warn!(ip, reason = decision.reason.as_str(), "IP denied");
            self.emit(
                SecurityEventType::AccessDenied,
                json!({
                    "action": "access_denied",
                    "ip": ip,
                    "reason": decision.reason.as_str(),
                    "rule_id": decision.rule_id,
                    "detail": decision.action,
                    "country": context.country,
                    "endpoint": context.endpoint,
                    "user_agent": context.user_agent,
                    "user_id": context.user_id,
                }),
                denial_risk(decision.reason),
                now,
            );
        }
        decision
    }

    /// Record a failed attempt and auto-block the IP once the threshold is reached
    ///
    /// Returns the total number of failed attempts recorded for this IP.
    pub fn record_failed_attempt(&self, ip: &str, context: &AccessContext) -> usize {
        let now = self.clock.now_millis();
        let Some(addr) = parse_ip(ip) else {
            warn!(ip, "ignoring failed attempt for invalid IP");
            return 0;
        };
        let Some(mut state) = self.write_state() else {
            return 0;
        };

        let log = state.failed.entry(addr).or_default();
        log.record(now);
        let total = log.count;

        let window_ms = self.blacklist.auto_blacklist_window_secs.saturating_mul(1000);
        let recent = log.attempts.iter().filter(|&&t| now.saturating_sub(t) < window_ms).count();
        debug!(
            ip,
            attempts = total,
            recent,
            endpoint = ?context.endpoint,
            "failed attempt recorded"
        );

        let already_blocked = state.temp_blocks.get(&addr).is_some_and(|b| b.is_active(now));
        let threshold = self.blacklist.auto_blacklist_threshold as usize;
        let auto_block = !already_blocked && recent >= threshold;
        if auto_block {
            let duration_ms = self.blacklist.auto_blacklist_duration_secs.saturating_mul(1000);
            state.temp_blocks.insert(
                addr,
                TemporaryBlock {
                    ip: addr.to_string(),
                    reason: format!("auto_block: {recent} failed attempts"),
                    created_at_ms: now,
                    expires_at_ms: now.saturating_add(duration_ms),
                    attempts: recent,
                    automatic: true,
                },
            );
        }
        self.publish(&state);
        drop(state);

        if auto_block {
            warn!(ip, attempts = recent, "IP auto-blocked");
            if let Some(m) = &self.metrics {
                m.record_auto_block();
            }
            self.emit(
                SecurityEventType::SystemConfigChange,
                json!({
                    "action": "auto_blocked",
                    "ip": addr.to_string(),
                    "attempts": recent,
                    "duration_secs": self.blacklist.auto_blacklist_duration_secs,
                    "endpoint": context.endpoint,
                }),
                RiskLevel::High,
                now,
            );
        }
        total
    }

    /// Deny an exact address for `duration`, replacing any existing block
    pub fn add_temporary_block(&self, ip: &str, reason: &str, duration: Duration) -> Result<()> {
        let now = self.clock.now_millis();
        let addr = parse_ip(ip)
            .ok_or_else(|| GuardError::Validation(format!("invalid IP address: {ip}")))?;
        let duration_ms = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);

        let mut state = self.write_state().ok_or_else(Self::unavailable)?;
        state.temp_blocks.insert(
            addr,
            TemporaryBlock {
                ip: addr.to_string(),
                reason: reason.to_string(),
                created_at_ms: now,
                expires_at_ms: now.saturating_add(duration_ms),
                attempts: 0,
                automatic: false,
            },
        );
        self.publish(&state);
        drop(state);

        info!(ip = %addr, reason, duration_ms, "temporary block added");
        self.emit(
            SecurityEventType::SystemConfigChange,
            json!({
                "action": "temporary_block_added",
                "ip": addr.to_string(),
                "reason": reason,
                "duration_ms": duration_ms,
            }),
            RiskLevel::Medium,
            now,
        );
        Ok(())
    }

    pub fn remove_temporary_block(&self, ip: &str) -> bool {
        let now = self.clock.now_millis();
        let Some(addr) = parse_ip(ip) else {
            return false;
        };
        let Some(mut state) = self.write_state() else {
            return false;
        };
        if state.temp_blocks.remove(&addr).is_none() {
            return false;
        }
        self.publish(&state);
        drop(state);

        info!(ip = %addr, "temporary block removed");
        self.emit(
            SecurityEventType::SystemConfigChange,
            json!({ "action": "temporary_block_removed", "ip": addr.to_string() }),
            RiskLevel::Low,
            now,
        );
        true
    }

    /// Deny requests whose context resolves to `country`
    pub fn add_geo_block(&self, country: &str) -> bool {
        self.update_geo_block(country, true)
    }

    pub fn remove_geo_block(&self, country: &str) -> bool {
        self.update_geo_block(country, false)
    }

    fn update_geo_block(&self, country: &str, block: bool) -> bool {
        let now = self.clock.now_millis();
        let code = country.trim().to_ascii_uppercase();
        if code.is_empty() {
            return false;
        }
        let Some(mut state) = self.write_state() else {
            return false;
        };
        let changed = if block {
            state.geo_blocked.insert(code.clone())
        } else {
            state.geo_blocked.remove(&code)
        };
        if !changed {
            return false;
        }
        self.publish(&state);
        drop(state);

        let action = if block { "geo_block_added" } else { "geo_block_removed" };
        info!(country = %code, action, "geo-blocking updated");
        self.emit(
            SecurityEventType::SystemConfigChange,
            json!({ "action": action, "country": code }),
            RiskLevel::Medium,
            now,
        );
        true
    }

    /// Deny every address that no whitelist rule matches
    pub fn set_whitelist_mode(&self, enabled: bool) {
        let now = self.clock.now_millis();
        let Some(mut state) = self.write_state() else {
            return;
        };
        if state.whitelist_mode == enabled {
            return;
        }
        state.whitelist_mode = enabled;
        self.publish(&state);
        drop(state);

        info!(enabled, "whitelist mode changed");
        self.emit(
            SecurityEventType::SystemConfigChange,
            json!({ "action": "whitelist_mode_changed", "enabled": enabled }),
            RiskLevel::High,
            now,
        );
    }

    /// Rules in registration order
    pub fn rules(&self) -> Vec<IpRule> {
        self.state.read().map(|s| s.rules.clone()).unwrap_or_default()
    }

    pub fn temporary_blocks(&self) -> Vec<TemporaryBlock> {
        self.state
            .read()
            .map(|s| s.temp_blocks.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Attempts currently held in the ring for `ip`
    pub fn failed_attempts(&self, ip: &str) -> usize {
        let Some(addr) = parse_ip(ip) else {
            return 0;
        };
        self.state
            .read()
            .map(|s| s.failed.get(&addr).map_or(0, |log| log.attempts.len()))
            .unwrap_or(0)
    }

    /// Full failed-attempt history for `ip`, if any was recorded
    pub fn failed_attempt_record(&self, ip: &str) -> Option<FailedAttemptRecord> {
        let addr = parse_ip(ip)?;
        let state = self.state.read().ok()?;
        state.failed.get(&addr).map(AttemptLog::snapshot)
    }

    pub fn stats(&self) -> FilterStats {
        self.state.read().map(|s| s.stats()).unwrap_or_default()
    }

    /// Receiver updated after every mutation
    pub fn subscribe(&self) -> watch::Receiver<FilterStats> {
        self.stats_tx.subscribe()
    }

    /// Drop expired rules and blocks, and failed-attempt logs idle for a day
    ///
    /// Also flushes a rule cache left stale by lookups.
    pub fn cleanup(&self) -> usize {
        let now = self.clock.now_millis();
        let ttl = u64::try_from(FAILED_ATTEMPT_TTL.as_millis()).unwrap_or(u64::MAX);
        let Some(mut state) = self.write_state() else {
            return 0;
        };
        let rules = state.evict_expired_rules(now);
        let before_blocks = state.temp_blocks.len();
        state.temp_blocks.retain(|_, block| block.is_active(now));
        let blocks = before_blocks - state.temp_blocks.len();
        let before_failed = state.failed.len();
        state.failed.retain(|_, log| now.saturating_sub(log.last_ms) < ttl);
        let attempts = before_failed - state.failed.len();

        let removed = rules + blocks + attempts;
        if removed > 0 {
            self.publish(&state);
            debug!(rules, blocks, attempts, "IP filter cleanup");
        }
        drop(state);
        if rules > 0 || self.cache_dirty.load(Ordering::Acquire) {
            self.persist_rules();
        }
        removed
    }

    /// Merge rules from the remote source as `server` rules
    ///
    /// Failures are logged and swallowed; returns the number of rules merged.
    pub async fn sync_remote_rules(&self, url: &str) -> usize {
        let rules = match fetch_remote_rules(url).await {
            Ok(rules) => rules,
            Err(e) => {
                warn!(url, error = %e, "failed to fetch remote IP rules");
                self.emit(
                    SecurityEventType::SystemConfigChange,
                    json!({ "action": "remote_rules_failed", "url": url, "error": e.to_string() }),
                    RiskLevel::High,
                    self.clock.now_millis(),
                );
                return 0;
            }
        };

        let mut merged = 0;
        for remote in rules {
            let options = remote.options.with_source(RuleSource::Server);
            match self.add_rule(remote.kind, &remote.ip, options) {
                Ok(_) => merged += 1,
                Err(e) => warn!(ip = %remote.ip, error = %e, "skipping invalid remote IP rule"),
            }
        }
        info!(url, merged, "remote IP rules merged");
        merged
    }
}

impl Maintenance for IpFilter {
    fn name(&self) -> &'static str {
        "ip_filter"
    }

    fn cleanup(&self) -> usize {
        IpFilter::cleanup(self)
    }
}

/// Returns the decision and whether rules or blocks were evicted on the way
fn evaluate(
    state: &mut FilterState,
    addr: &IpAddr,
    context: &AccessContext,
    now: u64,
) -> (AccessDecision, bool, bool) {
    let mut blocks_changed = false;
    if let Some(block) = state.temp_blocks.get(addr) {
        if block.is_active(now) {
            let mut decision = AccessDecision::deny(AccessReason::TemporaryBlock);
            decision.action = Some(block.reason.clone());
            return (decision, false, false);
        }
        state.temp_blocks.remove(addr);
        blocks_changed = true;
    }

    let rules_changed = state.evict_expired_rules(now) > 0;

    if let Some(rule) = state.best_match(RuleKind::Blacklist, addr) {
        let decision = AccessDecision::deny(AccessReason::Blacklisted).from_rule(rule);
        return (decision, rules_changed, blocks_changed);
    }

    if let Some(rule) = state.best_match(RuleKind::Whitelist, addr) {
        let decision = AccessDecision::allow(AccessReason::Whitelisted).from_rule(rule);
        return (decision, rules_changed, blocks_changed);
    }

    let geo_blocked = context
        .country
        .as_deref()
        .map(|c| c.trim().to_ascii_uppercase())
        .is_some_and(|c| state.geo_blocked.contains(&c));
    let decision = if geo_blocked {
        AccessDecision::deny(AccessReason::GeoBlocked)
    } else if state.whitelist_mode {
        AccessDecision::deny(AccessReason::NotInWhitelist)
    } else {
        AccessDecision::allow(AccessReason::DefaultAllow)
    };
    (decision, rules_changed, blocks_changed)
}

fn denial_risk(reason: AccessReason) -> RiskLevel {
    match reason {
        AccessReason::TemporaryBlock | AccessReason::Blacklisted | AccessReason::Unavailable => {
            RiskLevel::High
        }
        _ => RiskLevel::Medium,
    }
}

fn build_rule(kind: RuleKind, ip: &str, options: RuleOptions, now: u64) -> Result<IpRule> {
    let pattern = IpPattern::parse(ip)?;
    let expires_at_ms = if options.permanent {
        None
    } else {
        options.expires_at.or_else(|| options.duration_ms.map(|d| now.saturating_add(d)))
    };
    Ok(IpRule {
        id: uuid::Uuid::new_v4().to_string(),
        kind,
        ip: ip.trim().to_string(),
        pattern,
        description: options.description,
        source: options.source.unwrap_or_default(),
        permanent: options.permanent,
        created_at_ms: now,
        expires_at_ms,
    })
}

async fn fetch_remote_rules(url: &str) -> Result<Vec<RemoteRule>> {
    let client = reqwest::Client::builder().timeout(REMOTE_FETCH_TIMEOUT).build()?;
    let rules = client
        .get(url)
        .send()
        .await?
        .error_for_status()?
        .json::<Vec<RemoteRule>>()
        .await?;
    Ok(rules)
}
