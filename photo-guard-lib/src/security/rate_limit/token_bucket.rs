//! Lazily refilled token bucket.

use std::time::Duration;

/// A bucket of up to `capacity` tokens, refilled by `refill_rate` tokens every
/// `refill_period_ms`.
///
/// Refill is computed on access as `floor(elapsed / refill_period) * refill_rate`
/// and `last_refill` advances by whole periods only, so partial periods carry over
/// and no timer is needed. While the bucket is full no refill credit accrues.
///
/// Invariant: `0 <= tokens <= capacity`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenBucket {
    capacity: u64,
    tokens: u64,
    refill_rate: u64,
    refill_period_ms: u64,
    last_refill_ms: u64,
}

impl TokenBucket {
    /// Create a full bucket.
    ///
    /// A zero `refill_period_ms` is treated as 1ms.
    pub fn new(capacity: u64, refill_rate: u64, refill_period: Duration, now_ms: u64) -> Self {
        let refill_period_ms = u64::try_from(refill_period.as_millis())
            .unwrap_or(u64::MAX)
            .max(1);
        Self { capacity, tokens: capacity, refill_rate, refill_period_ms, last_refill_ms: now_ms }
    }

    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    pub fn refill_period(&self) -> Duration {
        Duration::from_millis(self.refill_period_ms)
    }

    fn pending_refill(&self, now_ms: u64) -> (u64, u64) {
        let elapsed = now_ms.saturating_sub(self.last_refill_ms);
        let periods = elapsed / self.refill_period_ms;
        (periods, periods.saturating_mul(self.refill_rate))
    }

    /// Bring the token count up to date with the clock.
    pub fn refill(&mut self, now_ms: u64) {
        let (periods, added) = self.pending_refill(now_ms);
        if periods == 0 {
            return;
        }
        self.tokens = self.tokens.saturating_add(added).min(self.capacity);
        if self.tokens == self.capacity {
            self.last_refill_ms = now_ms;
        } else {
            self.last_refill_ms = self
                .last_refill_ms
                .saturating_add(periods.saturating_mul(self.refill_period_ms));
        }
    }

    /// Take `n` tokens if available. Returns whether they were taken.
    pub fn try_consume(&mut self, n: u64, now_ms: u64) -> bool {
        self.refill(now_ms);
        if self.tokens >= n {
            self.tokens -= n;
            true
        } else {
            false
        }
    }

    /// Tokens available at `now_ms`, without touching the bucket.
    pub fn available(&self, now_ms: u64) -> u64 {
        let (_, added) = self.pending_refill(now_ms);
        self.tokens.saturating_add(added).min(self.capacity)
    }

    /// Time until the next refill lands.
    ///
    /// Zero when the bucket is already full.
    pub fn time_until_refill(&self, now_ms: u64) -> Duration {
        if self.available(now_ms) >= self.capacity {
            return Duration::ZERO;
        }
        let elapsed = now_ms.saturating_sub(self.last_refill_ms) % self.refill_period_ms;
        Duration::from_millis(self.refill_period_ms - elapsed)
    }

    /// Time until at least one token is available.
    pub fn time_until_available(&self, now_ms: u64) -> Duration {
        if self.available(now_ms) > 0 {
            return Duration::ZERO;
        }
        if self.refill_rate == 0 {
            return Duration::MAX;
        }
        self.time_until_refill(now_ms)
    }
}
