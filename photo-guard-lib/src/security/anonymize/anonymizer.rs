use ahash::AHashMap;
use serde_json::{json, Map, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use tracing::{debug, warn};

use super::crypto::{decrypt, encrypt, hash_iterated};
use super::generalize::{generalize_location, generalize_timestamp, generalize_user_agent};
use super::mask::mask_value;
use super::pseudonym::PseudonymTable;
use super::scrub::Scrubber;
use super::types::{
    AnonymizationMethod, AnonymizationRule, AnonymizeOptions, AnonymizerStats, DataType,
    Generalization, LocationPrecision, Sensitivity, TimePrecision, ValidationReport,
};
use crate::clock::Clock;
use crate::config::AnonymizationConfig;
use crate::error::{GuardError, Result};
use crate::maintenance::Maintenance;
use crate::security::events::{RiskLevel, SecurityEvent, SecurityEventSink, SecurityEventType};
use crate::telemetry::Metrics;

const DAY_MS: u64 = 24 * 3600 * 1000;

/// Fields of activity and error log records and the data type they hold
const LOG_FIELDS: &[(&str, DataType)] = &[
    ("user_id", DataType::UserId),
    ("userId", DataType::UserId),
    ("email", DataType::Email),
    ("ip", DataType::IpAddress),
    ("ip_address", DataType::IpAddress),
    ("ipAddress", DataType::IpAddress),
    ("user_agent", DataType::UserAgent),
    ("userAgent", DataType::UserAgent),
    ("session_id", DataType::SessionId),
    ("sessionId", DataType::SessionId),
    ("device_id", DataType::DeviceId),
    ("deviceId", DataType::DeviceId),
    ("location", DataType::Location),
    ("phone", DataType::Phone),
    ("name", DataType::Name),
];

const MESSAGE_FIELDS: &[&str] = &["message", "error", "error_message", "errorMessage"];
const STACK_FIELDS: &[&str] = &["stack", "stack_trace", "stackTrace"];

/// Data anonymization policy engine
pub struct DataAnonymizer {
    config: AnonymizationConfig,
    rules: RwLock<AHashMap<DataType, AnonymizationRule>>,
    pseudonyms: Mutex<PseudonymTable>,
    scrubber: Scrubber,
    operations: AtomicU64,
    sink: Arc<dyn SecurityEventSink>,
    clock: Arc<dyn Clock>,
    metrics: Option<Arc<Metrics>>,
}

impl DataAnonymizer {
    pub fn new(
        config: &AnonymizationConfig,
        sink: Arc<dyn SecurityEventSink>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        if config.hash_iterations == 0 {
            return Err(GuardError::Config("hash_iterations must be at least 1".to_string()));
        }
        Ok(Self {
            rules: RwLock::new(default_rules(config)),
            config: config.clone(),
            pseudonyms: Mutex::new(PseudonymTable::new()),
            scrubber: Scrubber::new()?,
            operations: AtomicU64::new(0),
            sink,
            clock,
            metrics: None,
        })
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    fn hash_method(&self) -> AnonymizationMethod {
        AnonymizationMethod::Hash {
            algorithm: self.config.hash_algorithm,
            iterations: self.config.hash_iterations,
        }
    }

    fn mask_method(&self) -> AnonymizationMethod {
        AnonymizationMethod::Mask {
            ipv4_bits: self.config.ipv4_mask_bits,
            ipv6_bits: self.config.ipv6_mask_bits,
        }
    }

    /// Rule applied to `data_type`: the registered one, else the default for its sensitivity
    pub fn rule_for(&self, data_type: &DataType) -> AnonymizationRule {
        if let Ok(rules) = self.rules.read() {
            if let Some(rule) = rules.get(data_type) {
                return rule.clone();
            }
        }
        let sensitivity = data_type.default_sensitivity();
        let method = match sensitivity {
            Sensitivity::Restricted => AnonymizationMethod::Suppress,
            Sensitivity::Confidential => self.hash_method(),
            Sensitivity::Internal => self.mask_method(),
            Sensitivity::Public => AnonymizationMethod::Passthrough,
        };
        AnonymizationRule::new(method, sensitivity)
    }

    /// Register or replace the rule for a data type
    pub fn set_rule(&self, data_type: DataType, rule: AnonymizationRule) {
        let now = self.clock.now_millis();
        let payload = json!({
            "action": "anonymization_rule_set",
            "data_type": data_type.as_str(),
            "method": rule.method.name(),
            "sensitivity": rule.sensitivity,
        });
        match self.rules.write() {
            Ok(mut rules) => {
                rules.insert(data_type, rule);
            }
            Err(_) => {
                warn!("Anonymizer rule table lock poisoned");
                return;
            }
        }
        self.sink.log_security_event(SecurityEvent::new(
            SecurityEventType::SystemConfigChange,
            payload,
            RiskLevel::Medium,
            now,
        ));
    }

    pub fn remove_rule(&self, data_type: &DataType) -> bool {
        self.rules.write().map(|mut rules| rules.remove(data_type).is_some()).unwrap_or(false)
    }

    /// Anonymize one value with the rule for `data_type`
    pub fn anonymize_data(
        &self,
        value: &Value,
        data_type: &DataType,
        options: &AnonymizeOptions,
    ) -> Value {
        let method = match &options.method {
            Some(method) => method.clone(),
            None => self.rule_for(data_type).method,
        };
        let out = self.apply(value, &method);

        self.operations.fetch_add(1, Ordering::Relaxed);
        if let Some(m) = &self.metrics {
            m.record_anonymization(data_type.as_str(), method.name());
        }
        if !options.quiet {
            self.sink.log_security_event(SecurityEvent::new(
                SecurityEventType::DataAccess,
                json!({
                    "action": "data_anonymized",
                    "data_type": data_type.as_str(),
                    "method": method.name(),
                }),
                RiskLevel::Low,
                self.clock.now_millis(),
            ));
        }
        out
    }

    fn apply(&self, value: &Value, method: &AnonymizationMethod) -> Value {
        if value.is_null() {
            return Value::Null;
        }
        match method {
            AnonymizationMethod::Passthrough => value.clone(),
            AnonymizationMethod::Suppress => self.suppressed(),
            AnonymizationMethod::Hash { algorithm, iterations } => Value::String(hash_iterated(
                &canonical_text(value),
                &self.config.salt,
                *algorithm,
                *iterations,
            )),
            AnonymizationMethod::Mask { ipv4_bits, ipv6_bits } => match scalar_text(value) {
                Some(text) => Value::String(mask_value(&text, *ipv4_bits, *ipv6_bits)),
                None => self.suppressed(),
            },
            AnonymizationMethod::Pseudonym { prefix } => match scalar_text(value) {
                Some(text) => Value::String(self.pseudonymize(&text, prefix)),
                None => self.suppressed(),
            },
            AnonymizationMethod::Generalize(generalization) => {
                let generalized = match generalization {
                    Generalization::Location(precision) => generalize_location(value, *precision),
                    Generalization::Time(precision) => generalize_timestamp(value, *precision),
                    Generalization::UserAgent => value.as_str().map(generalize_user_agent),
                };
                generalized.unwrap_or_else(|| self.suppressed())
            }
            AnonymizationMethod::Encrypt => {
                let Some(key) = self.config.encryption_key.as_deref() else {
                    warn!("no encryption key configured, suppressing value");
                    return self.suppressed();
                };
                match encrypt(key.as_bytes(), &canonical_text(value)) {
                    Ok(sealed) => Value::String(sealed),
                    Err(e) => {
                        warn!(error = %e, "encryption failed, suppressing value");
                        self.suppressed()
                    }
                }
            }
        }
    }

    fn suppressed(&self) -> Value {
        Value::String(self.config.suppression_placeholder.clone())
    }

    fn pseudonymize(&self, value: &str, prefix: &str) -> String {
        let now = self.clock.now_millis();
        match self.pseudonyms.lock() {
            Ok(mut table) => table.pseudonymize(value, prefix, &self.config.salt, now),
            Err(_) => {
                warn!("Pseudonym table lock poisoned");
                // Unmapped but still not the original
                let digest = hash_iterated(value, &self.config.salt, Default::default(), 1);
                format!("{prefix}_{}", &digest[..8])
            }
        }
    }

    /// Stable pseudonym for `value` with the `user` prefix
    pub fn pseudonymize_value(&self, value: &str) -> String {
        self.pseudonymize(value, "user")
    }

    /// Original value behind a pseudonym, if still mapped
    pub fn resolve_pseudonym(&self, pseudonym: &str) -> Option<String> {
        self.pseudonyms
            .lock()
            .ok()
            .and_then(|table| table.resolve(pseudonym).map(str::to_string))
    }

    /// Recover a value produced by the `Encrypt` method
    pub fn decrypt(&self, value: &str) -> Result<String> {
        let key = self
            .config
            .encryption_key
            .as_deref()
            .ok_or_else(|| GuardError::Crypto("no encryption key configured".to_string()))?;
        decrypt(key.as_bytes(), value)
    }

    /// Anonymize the listed fields of every record, emitting one summary event
    pub fn anonymize_batch(
        &self,
        records: &[Value],
        fields: &[(&str, DataType)],
        options: &AnonymizeOptions,
    ) -> Vec<Value> {
        let quiet = AnonymizeOptions { quiet: true, ..options.clone() };
        let out: Vec<Value> = records
            .iter()
            .map(|record| match record {
                Value::Object(obj) => {
                    let mut obj = obj.clone();
                    for (field, data_type) in fields {
                        if let Some(v) = obj.get_mut(*field) {
                            *v = self.anonymize_data(v, data_type, &quiet);
                        }
                    }
                    Value::Object(obj)
                }
                other => other.clone(),
            })
            .collect();

        if !options.quiet {
            let field_names: Vec<&str> = fields.iter().map(|(f, _)| *f).collect();
            self.sink.log_security_event(SecurityEvent::new(
                SecurityEventType::DataAccess,
                json!({
                    "action": "batch_anonymized",
                    "records": records.len(),
                    "fields": field_names,
                }),
                RiskLevel::Low,
                self.clock.now_millis(),
            ));
        }
        debug!(records = records.len(), fields = fields.len(), "batch anonymized");
        out
    }

    fn anonymize_log_fields(&self, obj: &mut Map<String, Value>) {
        let quiet = AnonymizeOptions { quiet: true, ..AnonymizeOptions::default() };
        for (field, data_type) in LOG_FIELDS {
            if let Some(v) = obj.get_mut(*field) {
                *v = self.anonymize_data(v, data_type, &quiet);
            }
        }
        for field in ["details", "metadata"] {
            if let Some(Value::Object(nested)) = obj.get_mut(field) {
                self.anonymize_log_fields(nested);
            }
        }
    }

    /// Anonymize the known fields of an activity log record
    pub fn anonymize_activity_log(&self, record: &Value) -> Value {
        let Value::Object(obj) = record else {
            return record.clone();
        };
        let mut obj = obj.clone();
        self.anonymize_log_fields(&mut obj);
        Value::Object(obj)
    }

    /// Like `anonymize_activity_log`, also scrubbing messages and stack traces
    pub fn anonymize_error_log(&self, record: &Value) -> Value {
        let Value::Object(obj) = record else {
            return record.clone();
        };
        let mut obj = obj.clone();
        self.anonymize_log_fields(&mut obj);
        for field in MESSAGE_FIELDS {
            if let Some(Value::String(msg)) = obj.get_mut(*field) {
                *msg = self.scrubber.scrub_error_message(msg);
            }
        }
        for field in STACK_FIELDS {
            if let Some(Value::String(trace)) = obj.get_mut(*field) {
                *trace = self.scrubber.scrub_stack_trace(trace);
            }
        }
        Value::Object(obj)
    }

    pub fn scrub_error_message(&self, message: &str) -> String {
        self.scrubber.scrub_error_message(message)
    }

    pub fn scrub_stack_trace(&self, trace: &str) -> String {
        self.scrubber.scrub_stack_trace(trace)
    }

    /// Flag anonymizations that left the value recognisable
    ///
    /// Coarsening methods may return their input unchanged when it already sits
    /// at the target precision, such as a network address under IP masking or an
    /// hour-aligned timestamp under hour generalization. That output carries no
    /// more detail than any other output of the rule and is not flagged.
    pub fn validate_anonymization(
        &self,
        original: &Value,
        anonymized: &Value,
        data_type: &DataType,
    ) -> ValidationReport {
        let method = self.rule_for(data_type).method;
        let mut issues = vec![];

        match method {
            AnonymizationMethod::Passthrough => {}
            AnonymizationMethod::Encrypt => {
                if let (Some(sealed), Some(plain)) = (anonymized.as_str(), original.as_str()) {
                    if self.config.encryption_key.is_some()
                        && self.decrypt(sealed).ok().as_deref() != Some(plain)
                    {
                        issues.push("encrypted value does not decrypt to the original".to_string());
                    }
                }
            }
            _ => {
                if !original.is_null()
                    && original == anonymized
                    && !already_coarse(&method, original)
                {
                    issues.push(format!("{} output equals the original value", method.name()));
                }
                if let (Some(orig), Some(anon)) = (original.as_str(), anonymized.as_str()) {
                    if orig.len() >= 4 && orig != anon && anon.contains(orig) {
                        issues.push("original value appears inside the output".to_string());
                    }
                }
            }
        }

        ValidationReport { valid: issues.is_empty(), issues }
    }

    pub fn stats(&self) -> AnonymizerStats {
        AnonymizerStats {
            rules: self.rules.read().map(|r| r.len()).unwrap_or(0),
            pseudonyms: self.pseudonyms.lock().map(|t| t.len()).unwrap_or(0),
            operations: self.operations.load(Ordering::Relaxed),
        }
    }

    /// Purge pseudonym mappings past the retention period
    pub fn cleanup(&self) -> usize {
        let retention = self.config.pseudonym_retention_days.saturating_mul(DAY_MS);
        let cutoff = self.clock.now_millis().saturating_sub(retention);
        let Ok(mut table) = self.pseudonyms.lock() else {
            warn!("Pseudonym table lock poisoned");
            return 0;
        };
        let removed = table.purge_older_than(cutoff);
        if removed > 0 {
            debug!(removed, "expired pseudonym mappings purged");
        }
        removed
    }
}

/// True when `value` is a valid fixed point of a precision-reducing method
fn already_coarse(method: &AnonymizationMethod, value: &Value) -> bool {
    match method {
        AnonymizationMethod::Generalize(_) => true,
        AnonymizationMethod::Mask { .. } => {
            value.as_str().is_some_and(|v| v.trim().parse::<std::net::IpAddr>().is_ok())
        }
        _ => false,
    }
}

impl Maintenance for DataAnonymizer {
    fn name(&self) -> &'static str {
        "anonymizer"
    }

    fn cleanup(&self) -> usize {
        DataAnonymizer::cleanup(self)
    }
}

/// Strings as-is, other scalars stringified
fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Scalars as text, containers as compact JSON
fn canonical_text(value: &Value) -> String {
    scalar_text(value).unwrap_or_else(|| value.to_string())
}

fn default_rules(config: &AnonymizationConfig) -> AHashMap<DataType, AnonymizationRule> {
    use AnonymizationMethod as M;
    use Sensitivity as S;

    let hash = M::Hash { algorithm: config.hash_algorithm, iterations: config.hash_iterations };
    let mask = M::Mask { ipv4_bits: config.ipv4_mask_bits, ipv6_bits: config.ipv6_mask_bits };
    let user_id = if config.user_id_hashing {
        hash.clone()
    } else {
        M::Pseudonym { prefix: "user".to_string() }
    };
    let ip = if config.ip_address_masking { mask.clone() } else { hash.clone() };
    let city = M::Generalize(Generalization::Location(LocationPrecision::City));

    [
        (DataType::UserId, user_id, S::Confidential),
        (DataType::Email, mask.clone(), S::Confidential),
        (DataType::IpAddress, ip, S::Internal),
        (DataType::Phone, mask, S::Confidential),
        (DataType::Name, M::Pseudonym { prefix: "name".to_string() }, S::Confidential),
        (DataType::Location, city.clone(), S::Internal),
        (DataType::Address, city, S::Confidential),
        (DataType::Timestamp, M::Generalize(Generalization::Time(TimePrecision::Hour)), S::Public),
        (DataType::UserAgent, M::Generalize(Generalization::UserAgent), S::Internal),
        (DataType::SessionId, hash, S::Confidential),
        (DataType::DeviceId, M::Pseudonym { prefix: "device".to_string() }, S::Internal),
        (DataType::PaymentInfo, M::Suppress, S::Restricted),
        (DataType::Credentials, M::Suppress, S::Restricted),
    ]
    .into_iter()
    .map(|(data_type, method, sensitivity)| {
        (data_type, AnonymizationRule::new(method, sensitivity))
    })
    .collect()
}
