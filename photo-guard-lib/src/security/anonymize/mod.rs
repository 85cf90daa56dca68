//! Data anonymization.
//!
//! Every value headed for logs or telemetry goes through [`DataAnonymizer`], which
//! picks a method from the rule registered for its [`DataType`]:
//!
//! - **Hash**: iterated salted SHA-256/512, for correlation without reversal
//! - **Mask**: emails, IPs and phone numbers keep their shape
//! - **Pseudonym**: stable `prefix_xxxxxxxx` surrogates, reversible by lookup only
//! - **Generalize**: coarser locations, truncated timestamps, user-agent buckets
//! - **Suppress**: a fixed placeholder
//! - **Encrypt**: AES-256-GCM, reversible with the configured key
//!
//! Types without a rule fall back on their sensitivity: restricted data is
//! suppressed, confidential data hashed, internal data masked and public data
//! passed through.

mod anonymizer;
mod crypto;
mod generalize;
mod mask;
mod pseudonym;
mod scrub;
mod types;

pub use anonymizer::DataAnonymizer;
pub use crypto::{decrypt, encrypt, hash_iterated};
pub use generalize::{generalize_location, generalize_timestamp, generalize_user_agent};
pub use mask::{mask_email, mask_generic, mask_ipv4, mask_ipv6, mask_phone, mask_value};
pub use pseudonym::{PseudonymTable, PSEUDONYM_HEX_LEN};
pub use scrub::Scrubber;
pub use types::{
    AnonymizationMethod, AnonymizationRule, AnonymizeOptions, AnonymizerStats, DataType,
    Generalization, LocationPrecision, Sensitivity, TimePrecision, ValidationReport,
};
