//! Sliding window log.

use std::collections::VecDeque;
use std::time::Duration;

/// Admits at most `max_requests` within the trailing `window`.
///
/// A timestamp `t` is inside the window at `now` when `now - window < t <= now`:
/// a request made exactly `window` ago has already left it. Pruning happens on every
/// access.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlidingWindow {
    window_ms: u64,
    max_requests: u64,
    requests: VecDeque<u64>,
}

impl SlidingWindow {
    /// A zero window is treated as 1ms.
    pub fn new(window: Duration, max_requests: u64) -> Self {
        let window_ms = u64::try_from(window.as_millis()).unwrap_or(u64::MAX).max(1);
        Self { window_ms, max_requests, requests: VecDeque::new() }
    }

    pub fn max_requests(&self) -> u64 {
        self.max_requests
    }

    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }

    fn cutoff(&self, now_ms: u64) -> Option<u64> {
        now_ms.checked_sub(self.window_ms)
    }

    fn prune(&mut self, now_ms: u64) {
        let Some(cutoff) = self.cutoff(now_ms) else {
            return;
        };
        while self.requests.front().is_some_and(|&t| t <= cutoff) {
            self.requests.pop_front();
        }
    }

    /// Record a request at `now_ms` if the window has room.
    pub fn try_acquire(&mut self, now_ms: u64) -> bool {
        self.prune(now_ms);
        if (self.requests.len() as u64) < self.max_requests {
            self.requests.push_back(now_ms);
            true
        } else {
            false
        }
    }

    /// Requests inside the window at `now_ms`, without pruning.
    pub fn count(&self, now_ms: u64) -> u64 {
        match self.cutoff(now_ms) {
            Some(cutoff) => self.requests.iter().filter(|&&t| t > cutoff).count() as u64,
            None => self.requests.len() as u64,
        }
    }

    pub fn remaining(&self, now_ms: u64) -> u64 {
        self.max_requests.saturating_sub(self.count(now_ms))
    }

    /// Time until the oldest request in the window expires.
    ///
    /// Zero when the window has room.
    pub fn time_until_available(&self, now_ms: u64) -> Duration {
        if self.count(now_ms) < self.max_requests {
            return Duration::ZERO;
        }
        let cutoff = self.cutoff(now_ms);
        let oldest = self
            .requests
            .iter()
            .find(|&&t| cutoff.is_none_or(|c| t > c))
            .copied();
        match oldest {
            Some(t) => {
                Duration::from_millis(t.saturating_add(self.window_ms).saturating_sub(now_ms))
            }
            // max_requests == 0: never admits
            None => Duration::MAX,
        }
    }
}
