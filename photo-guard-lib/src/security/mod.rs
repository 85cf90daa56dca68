pub mod anonymize;
pub mod events;
pub mod ip_filter;
pub mod middleware;
pub mod rate_limit;

pub use anonymize::{AnonymizeOptions, DataAnonymizer, DataType};
pub use events::{
    MemoryEventSink, RiskLevel, SecurityEvent, SecurityEventSink, SecurityEventType,
    TracingEventSink,
};
pub use ip_filter::{AccessContext, AccessDecision, AccessReason, IpFilter, RuleKind, RuleOptions};
pub use middleware::{guard_request, GuardOutcome, RequestInfo};
pub use rate_limit::{
    CheckOptions, ClientIdentifier, RateLimitManager, RateLimitOutcome, RateLimitResult,
};
