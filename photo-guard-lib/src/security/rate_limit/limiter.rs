//! Single-key limiter built on the counting primitives.
//!
//! This module wraps a [`TokenBucket`] or [`SlidingWindow`] with admission logic and
//! the result type shared by every scope.

use std::time::Duration;

use super::sliding_window::SlidingWindow;
use super::token_bucket::TokenBucket;
use crate::config::{RateLimitAlgorithm, RateLimitRule};

/// Result of a rate limit check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RateLimitResult {
    /// Request is allowed to proceed.
    Allowed {
        /// Maximum number of requests allowed in the window
        limit: u64,
        /// Number of requests remaining in the current window
        remaining: u64,
        /// Time until the quota is fully restored
        reset_after: Duration,
    },
    /// Request is rate limited and should be rejected.
    Limited {
        /// Maximum number of requests allowed in the window
        limit: u64,
        /// Number of requests remaining (always 0)
        remaining: u64,
        /// Time until the next request can be admitted
        reset_after: Duration,
    },
}

impl RateLimitResult {
    /// Returns true if the request is allowed.
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateLimitResult::Allowed { .. })
    }

    /// Returns true if the request is limited.
    pub fn is_limited(&self) -> bool {
        matches!(self, RateLimitResult::Limited { .. })
    }

    /// Get the limit value.
    pub fn limit(&self) -> u64 {
        match self {
            RateLimitResult::Allowed { limit, .. } => *limit,
            RateLimitResult::Limited { limit, .. } => *limit,
        }
    }

    /// Get the remaining count.
    pub fn remaining(&self) -> u64 {
        match self {
            RateLimitResult::Allowed { remaining, .. } => *remaining,
            RateLimitResult::Limited { remaining, .. } => *remaining,
        }
    }

    /// Get the reset duration.
    pub fn reset_after(&self) -> Duration {
        match self {
            RateLimitResult::Allowed { reset_after, .. } => *reset_after,
            RateLimitResult::Limited { reset_after, .. } => *reset_after,
        }
    }

    /// Whole seconds a rejected client should wait, rounded up and at least 1.
    pub fn retry_after_secs(&self) -> Option<u64> {
        match self {
            RateLimitResult::Limited { reset_after, .. } => Some(ceil_secs(*reset_after).max(1)),
            RateLimitResult::Allowed { .. } => None,
        }
    }
}

pub(crate) fn ceil_secs(d: Duration) -> u64 {
    let secs = d.as_secs();
    if d.subsec_nanos() > 0 {
        secs.saturating_add(1)
    } else {
        secs
    }
}

/// A limiter for one key.
#[derive(Debug, Clone)]
pub enum Limiter {
    TokenBucket(TokenBucket),
    SlidingWindow(SlidingWindow),
    /// Zero-capacity bucket that never refills before `until_ms`
    Blocked { until_ms: u64 },
}

impl Limiter {
    /// Build a limiter enforcing `rule`.
    ///
    /// The token bucket holds `max` tokens and refills all of them every `window_ms`.
    pub fn from_rule(algorithm: RateLimitAlgorithm, rule: &RateLimitRule, now_ms: u64) -> Self {
        let window = Duration::from_millis(rule.window_ms);
        let max = u64::from(rule.max);
        match algorithm {
            RateLimitAlgorithm::TokenBucket => {
                Limiter::TokenBucket(TokenBucket::new(max, max, window, now_ms))
            }
            RateLimitAlgorithm::SlidingWindow => {
                Limiter::SlidingWindow(SlidingWindow::new(window, max))
            }
        }
    }

    pub fn blocked(until_ms: u64) -> Self {
        Limiter::Blocked { until_ms }
    }

    pub fn is_blocked_at(&self, now_ms: u64) -> bool {
        matches!(self, Limiter::Blocked { until_ms } if now_ms < *until_ms)
    }

    pub fn limit(&self) -> u64 {
        match self {
            Limiter::TokenBucket(bucket) => bucket.capacity(),
            Limiter::SlidingWindow(window) => window.max_requests(),
            Limiter::Blocked { .. } => 0,
        }
    }

    /// Check if a request should be allowed or rate limited, recording it when allowed.
    pub fn check(&mut self, now_ms: u64) -> RateLimitResult {
        match self {
            Limiter::TokenBucket(bucket) => {
                let limit = bucket.capacity();
                if bucket.try_consume(1, now_ms) {
                    RateLimitResult::Allowed {
                        limit,
                        remaining: bucket.available(now_ms),
                        reset_after: bucket.time_until_refill(now_ms),
                    }
                } else {
                    RateLimitResult::Limited {
                        limit,
                        remaining: 0,
                        reset_after: bucket.time_until_available(now_ms),
                    }
                }
            }
            Limiter::SlidingWindow(window) => {
                let limit = window.max_requests();
                if window.try_acquire(now_ms) {
                    RateLimitResult::Allowed {
                        limit,
                        remaining: window.remaining(now_ms),
                        reset_after: window.window(),
                    }
                } else {
                    RateLimitResult::Limited {
                        limit,
                        remaining: 0,
                        reset_after: window.time_until_available(now_ms),
                    }
                }
            }
            Limiter::Blocked { .. } => self.check_only(now_ms),
        }
    }

    /// Check rate limit without recording the request.
    pub fn check_only(&self, now_ms: u64) -> RateLimitResult {
        match self {
            Limiter::TokenBucket(bucket) => {
                let limit = bucket.capacity();
                let remaining = bucket.available(now_ms);
                if remaining > 0 {
                    RateLimitResult::Allowed {
                        limit,
                        remaining,
                        reset_after: bucket.time_until_refill(now_ms),
                    }
                } else {
                    RateLimitResult::Limited {
                        limit,
                        remaining: 0,
                        reset_after: bucket.time_until_available(now_ms),
                    }
                }
            }
            Limiter::SlidingWindow(window) => {
                let limit = window.max_requests();
                let remaining = window.remaining(now_ms);
                if remaining > 0 {
                    RateLimitResult::Allowed { limit, remaining, reset_after: window.window() }
                } else {
                    RateLimitResult::Limited {
                        limit,
                        remaining: 0,
                        reset_after: window.time_until_available(now_ms),
                    }
                }
            }
            Limiter::Blocked { until_ms } => RateLimitResult::Limited {
                limit: 0,
                remaining: 0,
                reset_after: Duration::from_millis(until_ms.saturating_sub(now_ms)),
            },
        }
    }
}
