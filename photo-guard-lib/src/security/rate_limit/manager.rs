use ahash::AHashMap;
use http::{HeaderMap, HeaderName, HeaderValue};
use ipnet::IpNet;
use serde_json::json;
use std::net::IpAddr;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::limiter::{ceil_secs, Limiter, RateLimitResult};
use crate::clock::Clock;
use crate::config::{RateLimitConfig, RateLimitRule};
use crate::error::{GuardError, Result};
use crate::maintenance::Maintenance;
use crate::security::events::{RiskLevel, SecurityEvent, SecurityEventSink, SecurityEventType};
use crate::telemetry::Metrics;

/// Per-client limiters untouched for this long are reclaimed by `cleanup`
pub const CLIENT_IDLE_TTL: Duration = Duration::from_secs(3600);

const ANONYMOUS_USER: &str = "anonymous";

/// Who is making the request
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ClientIdentifier {
    pub ip: String,
    pub user_id: Option<String>,
    pub user_agent: Option<String>,
}

impl ClientIdentifier {
    pub fn new(ip: impl Into<String>) -> Self {
        Self { ip: ip.into(), user_id: None, user_agent: None }
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    fn client_part(&self) -> String {
        format!("{}|{}", self.ip.trim(), self.user_id.as_deref().unwrap_or(ANONYMOUS_USER))
    }

    /// Key of the limiter owning `(ip, user, endpoint)`
    pub fn key(&self, endpoint: &str) -> String {
        format!("{}|{}", self.client_part(), endpoint)
    }

    fn block_key(&self) -> String {
        format!("{}|*", self.client_part())
    }
}

/// Endpoint classes with their own quota
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EndpointClass {
    Auth,
    PasswordReset,
    Api,
    Default,
}

impl EndpointClass {
    /// Classify an endpoint name or path, e.g. `"auth"`, `"/auth/login"`, `"password-reset"`
    pub fn classify(endpoint: &str) -> Self {
        let normalized = endpoint.trim().trim_start_matches('/').to_ascii_lowercase();
        if normalized.contains("password-reset") || normalized.contains("password_reset") {
            EndpointClass::PasswordReset
        } else if normalized.starts_with("auth")
            || normalized.contains("/auth")
            || normalized.contains("login")
        {
            EndpointClass::Auth
        } else if normalized.starts_with("api") {
            EndpointClass::Api
        } else {
            EndpointClass::Default
        }
    }

    /// Rejections on sensitive endpoints are always high risk
    pub fn is_sensitive(&self) -> bool {
        matches!(self, EndpointClass::Auth | EndpointClass::PasswordReset)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EndpointClass::Auth => "auth",
            EndpointClass::PasswordReset => "password-reset",
            EndpointClass::Api => "api",
            EndpointClass::Default => "default",
        }
    }
}

/// Which limiter decided
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitScope {
    Global,
    Client,
}

impl LimitScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            LimitScope::Global => "global",
            LimitScope::Client => "client",
        }
    }
}

/// Per-call overrides for `check_rate_limit`
#[derive(Debug, Clone, Default)]
pub struct CheckOptions {
    /// Quota used when the client limiter is first created
    pub rule: Option<RateLimitRule>,
    /// Skip the shared global limiter
    pub skip_global: bool,
}

/// Outcome of a rate limit check for one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitOutcome {
    pub scope: LimitScope,
    pub result: RateLimitResult,
    /// Unix epoch milliseconds at which the quota resets
    pub reset_time_ms: u64,
    /// Set on rejection
    pub risk: Option<RiskLevel>,
}

impl RateLimitOutcome {
    fn new(scope: LimitScope, result: RateLimitResult, now_ms: u64) -> Self {
        let reset_ms = u64::try_from(result.reset_after().as_millis()).unwrap_or(u64::MAX);
        Self { scope, result, reset_time_ms: now_ms.saturating_add(reset_ms), risk: None }
    }

    pub fn allowed(&self) -> bool {
        self.result.is_allowed()
    }

    pub fn limit(&self) -> u64 {
        self.result.limit()
    }

    pub fn remaining(&self) -> u64 {
        self.result.remaining()
    }

    /// Rate limit response headers
    ///
    /// `Retry-After` is only present on rejection.
    pub fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            HeaderName::from_static("x-ratelimit-limit"),
            HeaderValue::from(self.result.limit()),
        );
        headers.insert(
            HeaderName::from_static("x-ratelimit-remaining"),
            HeaderValue::from(self.result.remaining()),
        );
        headers.insert(
            HeaderName::from_static("x-ratelimit-reset"),
            HeaderValue::from(ceil_secs(Duration::from_millis(self.reset_time_ms))),
        );
        headers.insert(
            HeaderName::from_static("x-ratelimit-scope"),
            HeaderValue::from_static(self.scope.as_str()),
        );
        if let Some(retry_after) = self.result.retry_after_secs() {
            headers.insert(http::header::RETRY_AFTER, HeaderValue::from(retry_after));
        }
        headers
    }
}

/// Snapshot of limiter bookkeeping
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitStats {
    pub tracked_clients: usize,
    pub blocked_clients: usize,
    pub global_remaining: Option<u64>,
}

struct ClientEntry {
    limiter: Limiter,
    last_access_ms: u64,
    window_ms: u64,
    window_started_ms: u64,
    window_hits: u64,
}

impl ClientEntry {
    fn new(limiter: Limiter, window_ms: u64, now_ms: u64) -> Self {
        Self {
            limiter,
            last_access_ms: now_ms,
            window_ms,
            window_started_ms: now_ms,
            window_hits: 0,
        }
    }

    fn touch(&mut self, now_ms: u64) {
        self.last_access_ms = now_ms;
        if now_ms.saturating_sub(self.window_started_ms) >= self.window_ms {
            self.window_started_ms = now_ms;
            self.window_hits = 0;
        }
        self.window_hits = self.window_hits.saturating_add(1);
    }

    /// Requests seen in the current window as a percentage of the limit
    fn usage_percent(&self) -> u64 {
        let limit = self.limiter.limit();
        if limit == 0 {
            return 0;
        }
        self.window_hits.saturating_mul(100) / limit
    }
}

/// Risk of a rejection: sensitive endpoints are always high, otherwise it follows
/// how far past its limit the client is.
pub fn rejection_risk(class: EndpointClass, usage_percent: Option<u64>) -> RiskLevel {
    if class.is_sensitive() {
        return RiskLevel::High;
    }
    match usage_percent {
        Some(p) if p > 150 => RiskLevel::High,
        Some(p) if p > 120 => RiskLevel::Medium,
        Some(_) => RiskLevel::Low,
        None => RiskLevel::Medium,
    }
}

/// Rate limit policy engine
///
/// Holds one shared global limiter plus one lazily created limiter per
/// `(ip, user, endpoint)` key.
pub struct RateLimitManager {
    config: RateLimitConfig,
    whitelist: Vec<IpNet>,
    global: Option<Mutex<Limiter>>,
    clients: Arc<RwLock<AHashMap<String, ClientEntry>>>,
    sink: Arc<dyn SecurityEventSink>,
    clock: Arc<dyn Clock>,
    metrics: Option<Arc<Metrics>>,
    cancel: CancellationToken,
}

impl RateLimitManager {
    /// Create a new rate limit manager from configuration
    ///
    /// Fails when a whitelist entry is neither an IP nor a CIDR block.
    pub fn new(
        config: &RateLimitConfig,
        sink: Arc<dyn SecurityEventSink>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let whitelist = config
            .whitelist
            .iter()
            .map(|entry| parse_whitelist_entry(entry))
            .collect::<Result<Vec<_>>>()?;

        let now = clock.now_millis();
        let global = config
            .enabled
            .then(|| Mutex::new(Limiter::from_rule(config.algorithm, &config.global, now)));

        info!(
            enabled = config.enabled,
            algorithm = ?config.algorithm,
            whitelist = whitelist.len(),
            "rate limiter initialized"
        );

        Ok(Self {
            config: config.clone(),
            whitelist,
            global,
            clients: Arc::new(RwLock::new(AHashMap::new())),
            sink,
            clock,
            metrics: None,
            cancel: CancellationToken::new(),
        })
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Quota applied to an endpoint class
    pub fn rule_for(&self, class: EndpointClass) -> RateLimitRule {
        match class {
            EndpointClass::Auth => self.config.auth,
            EndpointClass::PasswordReset => self.config.password_reset,
            EndpointClass::Api => self.config.api,
            EndpointClass::Default => self.config.default,
        }
    }

    /// Check if a request is allowed
    ///
    /// The global limiter is consulted first, then the client's limiter for this
    /// endpoint, which is created on first use.
    pub fn check_rate_limit(
        &self,
        identifier: &ClientIdentifier,
        endpoint: &str,
        options: &CheckOptions,
    ) -> RateLimitOutcome {
        let now = self.clock.now_millis();

        if !self.config.enabled {
            return RateLimitOutcome::new(
                LimitScope::Client,
                RateLimitResult::Allowed {
                    limit: u64::MAX,
                    remaining: u64::MAX,
                    reset_after: Duration::ZERO,
                },
                now,
            );
        }

        let class = EndpointClass::classify(endpoint);

        if !options.skip_global {
            if let Some(global) = &self.global {
                let result = match global.lock() {
                    Ok(mut limiter) => limiter.check(now),
                    Err(_) => {
                        warn!("Global rate limiter lock poisoned");
                        return fail_closed(now);
                    }
                };
                if result.is_limited() {
                    return self.reject(
                        LimitScope::Global,
                        result,
                        identifier,
                        endpoint,
                        class,
                        None,
                        now,
                    );
                }
                if let Some(m) = &self.metrics {
                    m.record_rate_limit_allowed(LimitScope::Global.as_str(), class.as_str());
                }
            }
        }

        let mut clients = match self.clients.write() {
            Ok(guard) => guard,
            Err(_) => {
                warn!("Rate limit manager lock poisoned");
                return fail_closed(now);
            }
        };

        let block_key = identifier.block_key();
        if let Some(entry) = clients.get(&block_key) {
            if entry.limiter.is_blocked_at(now) {
                let result = entry.limiter.check_only(now);
                drop(clients);
                return self.reject(
                    LimitScope::Client,
                    result,
                    identifier,
                    endpoint,
                    class,
                    None,
                    now,
                );
            }
            clients.remove(&block_key);
        }

        let rule = options.rule.unwrap_or_else(|| self.rule_for(class));
        let algorithm = self.config.algorithm;
        let entry = clients
            .entry(identifier.key(endpoint))
            .or_insert_with(|| {
                ClientEntry::new(Limiter::from_rule(algorithm, &rule, now), rule.window_ms, now)
            });
        entry.touch(now);
        let result = entry.limiter.check(now);
        let usage = entry.usage_percent();
        drop(clients);

        if result.is_limited() {
            return self.reject(
                LimitScope::Client,
                result,
                identifier,
                endpoint,
                class,
                Some(usage),
                now,
            );
        }

        debug!(
            ip = %identifier.ip,
            endpoint,
            limit = result.limit(),
            remaining = result.remaining(),
            "Rate limit check passed"
        );
        if let Some(m) = &self.metrics {
            m.record_rate_limit_allowed(LimitScope::Client.as_str(), class.as_str());
        }

        RateLimitOutcome::new(LimitScope::Client, result, now)
    }

    #[allow(clippy::too_many_arguments)]
    fn reject(
        &self,
        scope: LimitScope,
        result: RateLimitResult,
        identifier: &ClientIdentifier,
        endpoint: &str,
        class: EndpointClass,
        usage_percent: Option<u64>,
        now: u64,
    ) -> RateLimitOutcome {
        let risk = rejection_risk(class, usage_percent);
        let retry_after = result.retry_after_secs();

        warn!(
            ip = %identifier.ip,
            endpoint,
            scope = scope.as_str(),
            risk = risk.as_str(),
            "Rate limit exceeded"
        );
        if let Some(m) = &self.metrics {
            m.record_rate_limit_rejection(scope.as_str(), class.as_str());
        }
        self.sink.log_security_event(SecurityEvent::new(
            SecurityEventType::RateLimitExceeded,
            json!({
                "action": "rate_limited",
                "scope": scope.as_str(),
                "ip": identifier.ip,
                "user_id": identifier.user_id,
                "user_agent": identifier.user_agent,
                "endpoint": endpoint,
                "endpoint_class": class.as_str(),
                "limit": result.limit(),
                "usage_percent": usage_percent,
                "retry_after": retry_after,
            }),
            risk,
            now,
        ));

        let mut outcome = RateLimitOutcome::new(scope, result, now);
        outcome.risk = Some(risk);
        outcome
    }

    /// Forget all quota consumed by a client on an endpoint
    pub fn reset_client_limit(&self, identifier: &ClientIdentifier, endpoint: &str) -> bool {
        match self.clients.write() {
            Ok(mut guard) => guard.remove(&identifier.key(endpoint)).is_some(),
            Err(_) => {
                warn!("Rate limit manager lock poisoned");
                false
            }
        }
    }

    /// Deny every request from a client for `duration`, on every endpoint
    ///
    /// When called inside a tokio runtime the block also removes itself once it
    /// expires; otherwise it is dropped lazily on the next check or cleanup.
    pub fn block_client(&self, identifier: &ClientIdentifier, duration: Duration) {
        let now = self.clock.now_millis();
        let duration_ms = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
        let until = now.saturating_add(duration_ms);
        let key = identifier.block_key();

        match self.clients.write() {
            Ok(mut guard) => {
                let entry = ClientEntry::new(Limiter::blocked(until), duration_ms, now);
                guard.insert(key.clone(), entry);
            }
            Err(_) => {
                warn!("Rate limit manager lock poisoned");
                return;
            }
        }

        info!(ip = %identifier.ip, duration_ms, "client blocked");
        self.sink.log_security_event(SecurityEvent::new(
            SecurityEventType::SystemConfigChange,
            json!({
                "action": "client_blocked",
                "ip": identifier.ip,
                "user_id": identifier.user_id,
                "duration_ms": duration_ms,
            }),
            RiskLevel::Medium,
            now,
        ));

        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            let clients = Arc::clone(&self.clients);
            let token = self.cancel.clone();
            handle.spawn(async move {
                tokio::select! {
                    _ = token.cancelled() => {}
                    _ = tokio::time::sleep(duration) => {
                        if let Ok(mut guard) = clients.write() {
                            let same_block = matches!(
                                guard.get(&key).map(|e| &e.limiter),
                                Some(Limiter::Blocked { until_ms }) if *until_ms == until
                            );
                            if same_block {
                                guard.remove(&key);
                                debug!(key = %key, "client block expired");
                            }
                        }
                    }
                }
            });
        }
    }

    /// Read-only view of a client's quota on an endpoint
    ///
    /// A client never seen reports its full quota.
    pub fn get_client_status(
        &self,
        identifier: &ClientIdentifier,
        endpoint: &str,
    ) -> RateLimitOutcome {
        let now = self.clock.now_millis();
        let rule = self.rule_for(EndpointClass::classify(endpoint));
        let guard = match self.clients.read() {
            Ok(guard) => guard,
            Err(_) => {
                warn!("Rate limit manager lock poisoned");
                return fail_closed(now);
            }
        };

        if let Some(entry) = guard.get(&identifier.block_key()) {
            if entry.limiter.is_blocked_at(now) {
                let result = entry.limiter.check_only(now);
                return RateLimitOutcome::new(LimitScope::Client, result, now);
            }
        }

        let result = match guard.get(&identifier.key(endpoint)) {
            Some(entry) => entry.limiter.check_only(now),
            None => RateLimitResult::Allowed {
                limit: u64::from(rule.max),
                remaining: u64::from(rule.max),
                reset_after: Duration::ZERO,
            },
        };
        RateLimitOutcome::new(LimitScope::Client, result, now)
    }

    /// Whether the client bypasses rate limiting entirely
    ///
    /// Loopback addresses and configured whitelist entries bypass. The host calls
    /// this before `check_rate_limit`.
    pub fn apply_whitelist(&self, identifier: &ClientIdentifier) -> bool {
        let ip = identifier.ip.trim();
        if ip.eq_ignore_ascii_case("localhost") {
            return true;
        }
        let Ok(addr) = ip.parse::<IpAddr>() else {
            return false;
        };
        addr.is_loopback() || self.whitelist.iter().any(|net| net.contains(&addr))
    }

    pub fn stats(&self) -> RateLimitStats {
        let now = self.clock.now_millis();
        let (tracked_clients, blocked_clients) = match self.clients.read() {
            Ok(guard) => {
                // Lapsed blocks awaiting cleanup count as neither
                let blocks = guard
                    .values()
                    .filter(|e| matches!(e.limiter, Limiter::Blocked { .. }))
                    .count();
                let active = guard.values().filter(|e| e.limiter.is_blocked_at(now)).count();
                (guard.len() - blocks, active)
            }
            Err(_) => (0, 0),
        };
        let global_remaining = self
            .global
            .as_ref()
            .and_then(|g| g.lock().ok().map(|limiter| limiter.check_only(now).remaining()));
        RateLimitStats { tracked_clients, blocked_clients, global_remaining }
    }

    /// Drop limiters idle for over an hour and expired blocks
    pub fn cleanup(&self) -> usize {
        let now = self.clock.now_millis();
        let ttl = u64::try_from(CLIENT_IDLE_TTL.as_millis()).unwrap_or(u64::MAX);
        let Ok(mut guard) = self.clients.write() else {
            warn!("Rate limit manager lock poisoned");
            return 0;
        };
        let before = guard.len();
        guard.retain(|_, entry| match entry.limiter {
            Limiter::Blocked { until_ms } => now < until_ms,
            _ => now.saturating_sub(entry.last_access_ms) <= ttl,
        });
        let removed = before - guard.len();
        if removed > 0 {
            debug!(removed, "rate limiter cleanup");
        }
        removed
    }

    /// Cancel pending auto-unblock timers
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

impl Drop for RateLimitManager {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl Maintenance for RateLimitManager {
    fn name(&self) -> &'static str {
        "rate_limiter"
    }

    fn cleanup(&self) -> usize {
        RateLimitManager::cleanup(self)
    }
}

fn fail_closed(now: u64) -> RateLimitOutcome {
    RateLimitOutcome::new(
        LimitScope::Client,
        RateLimitResult::Limited { limit: 0, remaining: 0, reset_after: Duration::from_secs(1) },
        now,
    )
}

fn parse_whitelist_entry(entry: &str) -> Result<IpNet> {
    let entry = entry.trim();
    if let Ok(net) = entry.parse::<IpNet>() {
        return Ok(net);
    }
    entry
        .parse::<IpAddr>()
        .map(IpNet::from)
        .map_err(|_| GuardError::Config(format!("invalid rate limit whitelist entry: {entry}")))
}
