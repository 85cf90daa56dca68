use serde::{Deserialize, Serialize};

use super::pattern::IpPattern;
use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleKind {
    Whitelist,
    Blacklist,
}

impl RuleKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleKind::Whitelist => "whitelist",
            RuleKind::Blacklist => "blacklist",
        }
    }
}

/// Who created a rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RuleSource {
    /// Built-in defaults and configured entries
    System,
    #[default]
    User,
    /// Merged from the remote rule source
    Server,
}

/// Options accepted by `add_rule`, also the `options` object of remote rules
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RuleOptions {
    pub description: Option<String>,
    /// Permanent rules never expire
    pub permanent: bool,
    /// Unix epoch milliseconds
    pub expires_at: Option<u64>,
    /// Relative expiry, used when `expires_at` is absent
    pub duration_ms: Option<u64>,
    #[serde(skip)]
    pub source: Option<RuleSource>,
}

impl RuleOptions {
    pub fn permanent() -> Self {
        Self { permanent: true, ..Self::default() }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn expiring_at(mut self, expires_at_ms: u64) -> Self {
        self.expires_at = Some(expires_at_ms);
        self
    }

    pub fn with_source(mut self, source: RuleSource) -> Self {
        self.source = Some(source);
        self
    }
}

/// A whitelist or blacklist entry
#[derive(Debug, Clone)]
pub struct IpRule {
    pub id: String,
    pub kind: RuleKind,
    /// The literal as registered
    pub ip: String,
    pub pattern: IpPattern,
    pub description: Option<String>,
    pub source: RuleSource,
    pub permanent: bool,
    pub created_at_ms: u64,
    pub expires_at_ms: Option<u64>,
}

impl IpRule {
    pub fn is_expired(&self, now_ms: u64) -> bool {
        !self.permanent && self.expires_at_ms.is_some_and(|at| now_ms >= at)
    }

    /// Rules written to the local cache: user-created and not permanent
    pub fn is_cacheable(&self) -> bool {
        self.source == RuleSource::User && !self.permanent
    }

    pub fn to_stored(&self) -> StoredRule {
        StoredRule {
            id: self.id.clone(),
            kind: self.kind,
            ip: self.ip.clone(),
            description: self.description.clone(),
            source: self.source,
            permanent: self.permanent,
            created_at: self.created_at_ms,
            expires_at: self.expires_at_ms,
        }
    }

    pub fn from_stored(stored: StoredRule) -> Result<Self> {
        let pattern = IpPattern::parse(&stored.ip)?;
        Ok(Self {
            id: stored.id,
            kind: stored.kind,
            ip: stored.ip,
            pattern,
            description: stored.description,
            source: stored.source,
            permanent: stored.permanent,
            created_at_ms: stored.created_at,
            expires_at_ms: stored.expires_at,
        })
    }
}

/// Serialized form of a rule in the local cache
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredRule {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: RuleKind,
    pub ip: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub source: RuleSource,
    #[serde(default)]
    pub permanent: bool,
    pub created_at: u64,
    #[serde(default)]
    pub expires_at: Option<u64>,
}

/// Entry returned by the remote rule source
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RemoteRule {
    #[serde(rename = "type")]
    pub kind: RuleKind,
    pub ip: String,
    #[serde(default)]
    pub options: RuleOptions,
}

/// Hard deny for one exact address
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TemporaryBlock {
    pub ip: String,
    pub reason: String,
    pub created_at_ms: u64,
    pub expires_at_ms: u64,
    /// Failed attempts that triggered the block, 0 for manual blocks
    pub attempts: usize,
    /// Installed by the failed-attempt tracker
    pub automatic: bool,
}

impl TemporaryBlock {
    pub fn is_active(&self, now_ms: u64) -> bool {
        now_ms < self.expires_at_ms
    }
}

/// Failed-attempt history for one address
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedAttemptRecord {
    /// Every attempt ever recorded, not capped by the ring
    pub count: usize,
    pub first_attempt_ms: u64,
    pub last_attempt_ms: u64,
    /// Most recent attempt timestamps, oldest first
    pub attempts: Vec<u64>,
}

/// Request facts the host can supply alongside the address
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccessContext {
    /// ISO country code resolved by the host
    pub country: Option<String>,
    pub user_agent: Option<String>,
    pub endpoint: Option<String>,
    pub user_id: Option<String>,
}

impl AccessContext {
    pub fn with_country(mut self, country: impl Into<String>) -> Self {
        self.country = Some(country.into());
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessReason {
    TemporaryBlock,
    Blacklisted,
    Whitelisted,
    GeoBlocked,
    NotInWhitelist,
    DefaultAllow,
    /// The address could not be parsed
    InvalidAddress,
    /// Filter state could not be read; requests fail closed
    Unavailable,
}

impl AccessReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessReason::TemporaryBlock => "temporary_block",
            AccessReason::Blacklisted => "blacklisted",
            AccessReason::Whitelisted => "whitelisted",
            AccessReason::GeoBlocked => "geo_blocked",
            AccessReason::NotInWhitelist => "not_in_whitelist",
            AccessReason::DefaultAllow => "default_allow",
            AccessReason::InvalidAddress => "invalid_address",
            AccessReason::Unavailable => "unavailable",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccessDecision {
    pub allowed: bool,
    pub reason: AccessReason,
    /// Block reason or rule description behind the decision
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rule_id: Option<String>,
}

impl AccessDecision {
    pub(crate) fn allow(reason: AccessReason) -> Self {
        Self { allowed: true, reason, action: None, rule_id: None }
    }

    pub(crate) fn deny(reason: AccessReason) -> Self {
        Self { allowed: false, reason, action: None, rule_id: None }
    }

    pub(crate) fn from_rule(mut self, rule: &IpRule) -> Self {
        self.rule_id = Some(rule.id.clone());
        self.action = rule.description.clone();
        self
    }
}

/// Snapshot published to subscribers after every mutation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FilterStats {
    pub total_rules: usize,
    pub whitelist_rules: usize,
    pub blacklist_rules: usize,
    pub temporary_blocks: usize,
    pub tracked_ips: usize,
    pub geo_blocked_countries: usize,
    pub whitelist_mode: bool,
}
