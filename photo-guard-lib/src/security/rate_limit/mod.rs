//! Rate limiting for the photo migration client.
//!
//! Requests are admitted by two layers of limiters:
//!
//! - **Global**: one shared limiter for every request the process makes
//! - **Client**: one limiter per `(ip, user, endpoint)`, created on first use
//!
//! Each limiter is either a token bucket or a sliding window log, selected by
//! configuration. Both are driven by an injected [`Clock`](crate::clock::Clock) so
//! refill and window expiry can be tested without sleeping.
//!
//! # Architecture
//!
//! 1. **TokenBucket** (`token_bucket.rs`): lazily refilled bucket, whole periods only.
//!
//! 2. **SlidingWindow** (`sliding_window.rs`): timestamp log pruned on access.
//!
//! 3. **Limiter** (`limiter.rs`): single-key admission on top of either primitive,
//!    plus the hard `Blocked` state.
//!
//! 4. **RateLimitManager** (`manager.rs`): endpoint quotas, whitelist, blocks,
//!    risk scoring and security events.
//!
//! # Example Usage
//!
//! ```ignore
//! use photo_guard_lib::security::rate_limit::{CheckOptions, ClientIdentifier, RateLimitManager};
//!
//! let manager = RateLimitManager::new(&config.rate_limit, sink, clock)?;
//! let client = ClientIdentifier::new("203.0.113.7").with_user("u-42");
//!
//! if !manager.apply_whitelist(&client) {
//!     let outcome = manager.check_rate_limit(&client, "api", &CheckOptions::default());
//!     if !outcome.allowed() {
//!         // Return 429 with outcome.headers()
//!     }
//! }
//! ```
//!
//! # Configuration
//!
//! ```toml
//! [rate_limit]
//! enabled = true
//! algorithm = "token_bucket"
//! auth = { window_ms = 900000, max = 5 }
//! ```

mod limiter;
mod manager;
mod sliding_window;
mod token_bucket;

pub use limiter::{Limiter, RateLimitResult};
pub use manager::{
    rejection_risk, CheckOptions, ClientIdentifier, EndpointClass, LimitScope, RateLimitManager,
    RateLimitOutcome, RateLimitStats, CLIENT_IDLE_TTL,
};
pub use sliding_window::SlidingWindow;
pub use token_bucket::TokenBucket;
