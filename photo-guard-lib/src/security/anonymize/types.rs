use serde::Serialize;
use std::fmt;
use std::str::FromStr;

use crate::config::HashAlgorithm;

/// Kind of data handed to the anonymizer
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DataType {
    UserId,
    Email,
    IpAddress,
    Phone,
    Name,
    Location,
    Timestamp,
    UserAgent,
    SessionId,
    DeviceId,
    Address,
    PaymentInfo,
    Credentials,
    ErrorMessage,
    StackTrace,
    Custom(String),
}

impl DataType {
    pub fn as_str(&self) -> &str {
        match self {
            DataType::UserId => "user_id",
            DataType::Email => "email",
            DataType::IpAddress => "ip_address",
            DataType::Phone => "phone",
            DataType::Name => "name",
            DataType::Location => "location",
            DataType::Timestamp => "timestamp",
            DataType::UserAgent => "user_agent",
            DataType::SessionId => "session_id",
            DataType::DeviceId => "device_id",
            DataType::Address => "address",
            DataType::PaymentInfo => "payment_info",
            DataType::Credentials => "credentials",
            DataType::ErrorMessage => "error_message",
            DataType::StackTrace => "stack_trace",
            DataType::Custom(name) => name,
        }
    }

    /// Sensitivity assumed when no rule is registered
    pub fn default_sensitivity(&self) -> Sensitivity {
        match self {
            DataType::PaymentInfo | DataType::Credentials => Sensitivity::Restricted,
            DataType::UserId
            | DataType::Email
            | DataType::Phone
            | DataType::Name
            | DataType::SessionId
            | DataType::Address => Sensitivity::Confidential,
            DataType::Timestamp => Sensitivity::Public,
            _ => Sensitivity::Internal,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DataType {
    type Err = std::convert::Infallible;

    /// Unknown names become `Custom`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        Ok(match normalized.as_str() {
            "user_id" | "userid" => DataType::UserId,
            "email" => DataType::Email,
            "ip_address" | "ip" => DataType::IpAddress,
            "phone" => DataType::Phone,
            "name" => DataType::Name,
            "location" => DataType::Location,
            "timestamp" => DataType::Timestamp,
            "user_agent" => DataType::UserAgent,
            "session_id" => DataType::SessionId,
            "device_id" => DataType::DeviceId,
            "address" => DataType::Address,
            "payment_info" => DataType::PaymentInfo,
            "credentials" => DataType::Credentials,
            "error_message" => DataType::ErrorMessage,
            "stack_trace" => DataType::StackTrace,
            _ => DataType::Custom(s.trim().to_string()),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Sensitivity {
    Public,
    Internal,
    Confidential,
    Restricted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LocationPrecision {
    Country,
    Region,
    City,
}

impl LocationPrecision {
    /// Decimal places kept on coordinates
    pub fn decimals(&self) -> usize {
        match self {
            LocationPrecision::Country => 0,
            LocationPrecision::Region => 1,
            LocationPrecision::City => 2,
        }
    }

    /// Trailing address components kept
    pub fn components(&self) -> usize {
        match self {
            LocationPrecision::Country => 1,
            LocationPrecision::Region => 2,
            LocationPrecision::City => 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimePrecision {
    Year,
    Month,
    Day,
    Hour,
    Minute,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Generalization {
    Location(LocationPrecision),
    Time(TimePrecision),
    UserAgent,
}

/// How a value is anonymized
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnonymizationMethod {
    /// Iterated salted digest, hex encoded
    Hash { algorithm: HashAlgorithm, iterations: u32 },
    /// Format-aware partial masking
    Mask { ipv4_bits: u8, ipv6_bits: u8 },
    /// Stable `prefix_xxxxxxxx` surrogate
    Pseudonym { prefix: String },
    Generalize(Generalization),
    Suppress,
    /// AES-256-GCM under the configured key
    Encrypt,
    /// Public data is returned unchanged
    Passthrough,
}

impl AnonymizationMethod {
    pub fn name(&self) -> &'static str {
        match self {
            AnonymizationMethod::Hash { .. } => "hash",
            AnonymizationMethod::Mask { .. } => "mask",
            AnonymizationMethod::Pseudonym { .. } => "pseudonym",
            AnonymizationMethod::Generalize(_) => "generalize",
            AnonymizationMethod::Suppress => "suppress",
            AnonymizationMethod::Encrypt => "encrypt",
            AnonymizationMethod::Passthrough => "passthrough",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnonymizationRule {
    pub method: AnonymizationMethod,
    pub sensitivity: Sensitivity,
}

impl AnonymizationRule {
    pub fn new(method: AnonymizationMethod, sensitivity: Sensitivity) -> Self {
        Self { method, sensitivity }
    }
}

/// Per-call overrides for `anonymize_data`
#[derive(Debug, Clone, Default)]
pub struct AnonymizeOptions {
    /// Use this method instead of the registered rule
    pub method: Option<AnonymizationMethod>,
    /// Do not emit a `DATA_ACCESS` event for this call
    pub quiet: bool,
}

/// Result of `validate_anonymization`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub issues: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnonymizerStats {
    pub rules: usize,
    pub pseudonyms: usize,
    pub operations: u64,
}
