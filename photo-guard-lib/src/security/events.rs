//! Security events emitted by the policy engines.
//!
//! Engines hand every event to a [`SecurityEventSink`] and never wait on it or inspect
//! its outcome. Persistence, shipping and alerting are the sink's business.

use serde::Serialize;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Mutex;
use tracing::{error, info, warn};

/// Kind of security event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SecurityEventType {
    /// A rule, block or policy switch changed
    SystemConfigChange,
    /// An IP was denied by the filter
    AccessDenied,
    /// A client ran over its quota
    RateLimitExceeded,
    /// Data was read for anonymization
    DataAccess,
}

impl SecurityEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SecurityEventType::SystemConfigChange => "SYSTEM_CONFIG_CHANGE",
            SecurityEventType::AccessDenied => "ACCESS_DENIED",
            SecurityEventType::RateLimitExceeded => "RATE_LIMIT_EXCEEDED",
            SecurityEventType::DataAccess => "DATA_ACCESS",
        }
    }
}

/// Risk attached to an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
            RiskLevel::Critical => "critical",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SecurityEvent {
    pub event_type: SecurityEventType,
    pub risk: RiskLevel,
    pub payload: Value,
    /// Unix epoch milliseconds
    pub timestamp_ms: u64,
}

impl SecurityEvent {
    pub fn new(event_type: SecurityEventType, payload: Value, risk: RiskLevel, now: u64) -> Self {
        Self { event_type, risk, payload, timestamp_ms: now }
    }

    /// Value of `payload.action`, if present
    pub fn action(&self) -> Option<&str> {
        self.payload.get("action").and_then(Value::as_str)
    }
}

/// Fire-and-forget destination for security events
pub trait SecurityEventSink: Send + Sync {
    fn log_security_event(&self, event: SecurityEvent);
}

/// Writes events to `tracing` on the `security` target
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEventSink;

impl SecurityEventSink for TracingEventSink {
    fn log_security_event(&self, event: SecurityEvent) {
        let event_type = event.event_type.as_str();
        let risk = event.risk.as_str();
        let payload = event.payload.to_string();
        match event.risk {
            RiskLevel::Critical | RiskLevel::High => {
                error!(target: "security", event_type, risk, %payload, "security event")
            }
            RiskLevel::Medium => {
                warn!(target: "security", event_type, risk, %payload, "security event")
            }
            RiskLevel::Low => {
                info!(target: "security", event_type, risk, %payload, "security event")
            }
        }
    }
}

/// Keeps the most recent events in memory
pub struct MemoryEventSink {
    events: Mutex<VecDeque<SecurityEvent>>,
    capacity: usize,
}

impl MemoryEventSink {
    pub fn new(capacity: usize) -> Self {
        Self { events: Mutex::new(VecDeque::new()), capacity: capacity.max(1) }
    }

    /// Snapshot of the buffered events, oldest first
    pub fn events(&self) -> Vec<SecurityEvent> {
        match self.events.lock() {
            Ok(guard) => guard.iter().cloned().collect(),
            Err(_) => {
                warn!("Memory event sink lock poisoned");
                vec![]
            }
        }
    }

    pub fn count(&self, event_type: SecurityEventType) -> usize {
        self.events()
            .iter()
            .filter(|e| e.event_type == event_type)
            .count()
    }

    /// Drain all buffered events
    pub fn take(&self) -> Vec<SecurityEvent> {
        match self.events.lock() {
            Ok(mut guard) => guard.drain(..).collect(),
            Err(_) => vec![],
        }
    }
}

impl Default for MemoryEventSink {
    fn default() -> Self {
        Self::new(10_000)
    }
}

impl SecurityEventSink for MemoryEventSink {
    fn log_security_event(&self, event: SecurityEvent) {
        if let Ok(mut guard) = self.events.lock() {
            if guard.len() >= self.capacity {
                guard.pop_front();
            }
            guard.push_back(event);
        }
    }
}
