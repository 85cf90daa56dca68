#![forbid(unsafe_code)]

pub mod clock;
pub mod config;
pub mod error;
pub mod maintenance;
pub mod security;
pub mod telemetry;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{load_from_path, Config};
pub use error::{GuardError, Result};
pub use maintenance::{spawn_cleanup_task, Maintenance};
pub use security::{DataAnonymizer, IpFilter, RateLimitManager};
