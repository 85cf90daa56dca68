//! IP access filtering.
//!
//! Rules are written as exact addresses, CIDR blocks, IPv4 wildcards or
//! inclusive ranges (see [`IpPattern`]). A lookup walks, in order: temporary
//! blocks, blacklist, whitelist, geo-blocking and whitelist mode. The first
//! decisive step wins, so a blacklist hit always beats a whitelist hit.
//!
//! Expiry is enforced lazily during lookups. `cleanup` only reclaims memory.

mod filter;
mod pattern;
mod persistence;
mod rules;

pub use filter::{IpFilter, DEFAULT_WHITELIST, FAILED_ATTEMPT_TTL, MAX_FAILED_ATTEMPTS};
pub use pattern::{parse_ip, IpPattern};
pub use persistence::{load_rule_cache, save_rule_cache};
pub use rules::{
    AccessContext, AccessDecision, AccessReason, FailedAttemptRecord, FilterStats, IpRule,
    RemoteRule, RuleKind, RuleOptions, RuleSource, StoredRule, TemporaryBlock,
};
