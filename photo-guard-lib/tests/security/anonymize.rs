use photo_guard_lib::config::AnonymizationConfig;
use photo_guard_lib::security::anonymize::{
    AnonymizationMethod, AnonymizationRule, AnonymizeOptions, DataAnonymizer, DataType,
    Sensitivity, PSEUDONYM_HEX_LEN,
};
use photo_guard_lib::security::SecurityEventType;
use serde_json::{json, Value};
use std::time::Duration;

use crate::{fixtures, TestResult};

fn quiet() -> AnonymizeOptions {
    AnonymizeOptions { quiet: true, ..AnonymizeOptions::default() }
}

#[test]
fn test_pseudonyms_are_stable_and_resolvable() -> TestResult {
    let (clock, sink) = fixtures();
    let config = AnonymizationConfig { user_id_hashing: false, ..AnonymizationConfig::default() };
    let anonymizer = DataAnonymizer::new(&config, sink, clock)?;

    let first = anonymizer.anonymize_data(&json!("user-123"), &DataType::UserId, &quiet());
    let second = anonymizer.anonymize_data(&json!("user-123"), &DataType::UserId, &quiet());
    let other = anonymizer.anonymize_data(&json!("user-456"), &DataType::UserId, &quiet());
    assert_eq!(first, second);
    assert_ne!(first, other);

    let pseudonym = first.as_str().ok_or("pseudonym is not a string")?;
    let suffix = pseudonym.strip_prefix("user_").ok_or("missing prefix")?;
    assert_eq!(suffix.len(), PSEUDONYM_HEX_LEN);
    assert!(suffix.chars().all(|c| c.is_ascii_hexdigit()));
    assert_eq!(anonymizer.resolve_pseudonym(pseudonym).as_deref(), Some("user-123"));
    assert_eq!(anonymizer.pseudonymize_value("user-123"), pseudonym);
    assert_eq!(anonymizer.stats().pseudonyms, 2);
    Ok(())
}

#[test]
fn test_masked_values_keep_shape() -> TestResult {
    let (clock, sink) = fixtures();
    let anonymizer = DataAnonymizer::new(&AnonymizationConfig::default(), sink, clock)?;

    let cases = [
        (DataType::Email, "test@example.com", "te**@ex****e.com"),
        (DataType::IpAddress, "203.0.113.77", "203.0.113.0"),
        (DataType::IpAddress, "2001:db8:85a3:1:2:3:4:5", "2001:db8:85a3:1::"),
        (DataType::Phone, "+1 (555) 123-4567", "+* (***) ***-4567"),
    ];
    for (data_type, original, expected) in cases {
        let masked = anonymizer.anonymize_data(&json!(original), &data_type, &quiet());
        assert_eq!(masked, json!(expected), "{data_type}");
        assert_ne!(masked, json!(original));
        assert!(anonymizer.validate_anonymization(&json!(original), &masked, &data_type).valid);
    }
    Ok(())
}

#[test]
fn test_hash_is_deterministic_and_salted() -> TestResult {
    let (clock, sink) = fixtures();
    let anonymizer =
        DataAnonymizer::new(&AnonymizationConfig::default(), sink.clone(), clock.clone())?;
    let salted =
        AnonymizationConfig { salt: "other".to_string(), ..AnonymizationConfig::default() };
    let other = DataAnonymizer::new(&salted, sink, clock)?;

    let a = anonymizer.anonymize_data(&json!("u-1"), &DataType::UserId, &quiet());
    let b = anonymizer.anonymize_data(&json!("u-1"), &DataType::UserId, &quiet());
    let c = other.anonymize_data(&json!("u-1"), &DataType::UserId, &quiet());
    assert_eq!(a, b);
    assert_ne!(a, c);
    let digest = a.as_str().ok_or("hash is not a string")?;
    assert_eq!(digest.len(), 64);
    assert!(!digest.contains("u-1"));
    Ok(())
}

#[test]
fn test_generalization() -> TestResult {
    let (clock, sink) = fixtures();
    let anonymizer = DataAnonymizer::new(&AnonymizationConfig::default(), sink, clock)?;

    let location =
        anonymizer.anonymize_data(&json!("37.7749,-122.4194"), &DataType::Location, &quiet());
    assert_eq!(location, json!("37.77,-122.42"));

    let address = anonymizer.anonymize_data(
        &json!("1 Infinite Loop, Cupertino, CA, USA"),
        &DataType::Address,
        &quiet(),
    );
    assert_eq!(address, json!("Cupertino, CA, USA"));

    let local_time = json!("2024-03-15T14:37:22+02:00");
    let ts = anonymizer.anonymize_data(&local_time, &DataType::Timestamp, &quiet());
    assert_eq!(ts, json!("2024-03-15T12:00:00Z"));

    let ua = anonymizer.anonymize_data(
        &json!(concat!(
            "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 ",
            "(KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36"
        )),
        &DataType::UserAgent,
        &quiet(),
    );
    assert_eq!(ua["browser"], "Chrome");
    assert_eq!(ua["os"], "Windows");
    assert_eq!(ua["device_type"], "desktop");
    Ok(())
}

#[test]
fn test_restricted_data_is_suppressed() -> TestResult {
    let (clock, sink) = fixtures();
    let anonymizer = DataAnonymizer::new(&AnonymizationConfig::default(), sink, clock)?;
    let card = json!({ "number": "4111111111111111", "cvv": "123" });
    let payment = anonymizer.anonymize_data(&card, &DataType::PaymentInfo, &quiet());
    assert_eq!(payment, json!("[REDACTED]"));
    assert_eq!(
        anonymizer.anonymize_data(&json!("hunter2"), &DataType::Credentials, &quiet()),
        json!("[REDACTED]")
    );
    assert_eq!(anonymizer.anonymize_data(&Value::Null, &DataType::Email, &quiet()), Value::Null);
    Ok(())
}

#[test]
fn test_unregistered_type_falls_back_on_sensitivity() -> TestResult {
    let (clock, sink) = fixtures();
    let anonymizer = DataAnonymizer::new(&AnonymizationConfig::default(), sink, clock)?;
    let album = DataType::Custom("album_title".to_string());

    let rule = anonymizer.rule_for(&album);
    assert_eq!(rule.sensitivity, Sensitivity::Internal);
    assert_eq!(rule.method.name(), "mask");
    let title = json!("Summer 2023");
    assert_eq!(anonymizer.anonymize_data(&title, &album, &quiet()), json!("Su********3"));

    let suppress = AnonymizationRule::new(AnonymizationMethod::Suppress, Sensitivity::Restricted);
    anonymizer.set_rule(album.clone(), suppress);
    assert_eq!(anonymizer.anonymize_data(&title, &album, &quiet()), json!("[REDACTED]"));
    assert!(anonymizer.remove_rule(&album));
    assert_eq!(anonymizer.rule_for(&album).method.name(), "mask");
    Ok(())
}

#[test]
fn test_encryption_round_trip() -> TestResult {
    let (clock, sink) = fixtures();
    let config = AnonymizationConfig {
        encryption_key: Some("correct horse battery staple".to_string()),
        ..AnonymizationConfig::default()
    };
    let anonymizer = DataAnonymizer::new(&config, sink, clock.clone())?;
    let notes = DataType::Custom("support_notes".to_string());
    let encrypt = AnonymizationRule::new(AnonymizationMethod::Encrypt, Sensitivity::Confidential);
    anonymizer.set_rule(notes.clone(), encrypt.clone());

    let sealed = anonymizer.anonymize_data(&json!("call back at 5pm"), &notes, &quiet());
    let sealed_text = sealed.as_str().ok_or("ciphertext is not a string")?;
    assert_ne!(sealed_text, "call back at 5pm");
    assert_eq!(anonymizer.decrypt(sealed_text)?, "call back at 5pm");
    assert!(anonymizer.validate_anonymization(&json!("call back at 5pm"), &sealed, &notes).valid);
    assert!(!anonymizer.validate_anonymization(&json!("something else"), &sealed, &notes).valid);

    let (_, sink) = fixtures();
    let keyless = DataAnonymizer::new(&AnonymizationConfig::default(), sink, clock)?;
    keyless.set_rule(notes.clone(), encrypt);
    let suppressed = keyless.anonymize_data(&json!("call back at 5pm"), &notes, &quiet());
    assert_eq!(suppressed, json!("[REDACTED]"));
    assert!(keyless.decrypt(sealed_text).is_err());
    Ok(())
}

#[test]
fn test_validation_flags_leaks() -> TestResult {
    let (clock, sink) = fixtures();
    let anonymizer = DataAnonymizer::new(&AnonymizationConfig::default(), sink, clock)?;

    let email = json!("test@example.com");
    let same = anonymizer.validate_anonymization(&email, &email, &DataType::Email);
    assert!(!same.valid);
    assert_eq!(same.issues.len(), 1);

    let embedded = anonymizer.validate_anonymization(
        &json!("alice"),
        &json!("user_alice_3f2a"),
        &DataType::Name,
    );
    assert!(!embedded.valid);
    Ok(())
}

#[test]
fn test_values_already_at_target_precision_validate() -> TestResult {
    let (clock, sink) = fixtures();
    let anonymizer = DataAnonymizer::new(&AnonymizationConfig::default(), sink, clock)?;

    let network = json!("10.0.0.0");
    let masked = anonymizer.anonymize_data(&network, &DataType::IpAddress, &quiet());
    assert_eq!(masked, network);
    assert!(anonymizer.validate_anonymization(&network, &masked, &DataType::IpAddress).valid);

    let hour = json!("2024-03-15T12:00:00Z");
    let generalized = anonymizer.anonymize_data(&hour, &DataType::Timestamp, &quiet());
    assert_eq!(generalized, hour);
    assert!(anonymizer.validate_anonymization(&hour, &generalized, &DataType::Timestamp).valid);

    // Unchanged non-address output under masking is still a leak
    let phone = json!("+1 555 123 4567");
    assert!(!anonymizer.validate_anonymization(&phone, &phone, &DataType::Phone).valid);
    Ok(())
}

#[test]
fn test_batch_emits_one_event() -> TestResult {
    let (clock, sink) = fixtures();
    let anonymizer = DataAnonymizer::new(&AnonymizationConfig::default(), sink.clone(), clock)?;
    let records = vec![
        json!({ "email": "alice@example.com", "ip": "203.0.113.7", "album": "Paris" }),
        json!({ "email": "bob@example.com", "ip": "203.0.113.8" }),
        json!("not an object"),
    ];

    let out = anonymizer.anonymize_batch(
        &records,
        &[("email", DataType::Email), ("ip", DataType::IpAddress)],
        &AnonymizeOptions::default(),
    );
    assert_eq!(out.len(), 3);
    assert_eq!(out[0]["email"], "al***@ex****e.com");
    assert_eq!(out[0]["ip"], "203.0.113.0");
    assert_eq!(out[0]["album"], "Paris");
    assert_eq!(out[2], json!("not an object"));

    assert_eq!(sink.count(SecurityEventType::DataAccess), 1);
    let event = sink.events().pop().ok_or("no event")?;
    assert_eq!(event.action(), Some("batch_anonymized"));
    assert_eq!(event.payload["records"], 3);
    assert_eq!(anonymizer.stats().operations, 4);
    Ok(())
}

#[test]
fn test_single_value_emits_data_access_unless_quiet() -> TestResult {
    let (clock, sink) = fixtures();
    let anonymizer = DataAnonymizer::new(&AnonymizationConfig::default(), sink.clone(), clock)?;
    anonymizer.anonymize_data(&json!("a@b.co"), &DataType::Email, &AnonymizeOptions::default());
    anonymizer.anonymize_data(&json!("a@b.co"), &DataType::Email, &quiet());
    assert_eq!(sink.count(SecurityEventType::DataAccess), 1);
    let event = sink.events().pop().ok_or("no event")?;
    assert_eq!(event.payload["data_type"], "email");
    assert_eq!(event.payload["method"], "mask");
    Ok(())
}

#[test]
fn test_error_log_is_scrubbed() -> TestResult {
    let (clock, sink) = fixtures();
    let anonymizer = DataAnonymizer::new(&AnonymizationConfig::default(), sink, clock)?;
    let record = json!({
        "level": "error",
        "user_id": "u-1",
        "message": "upload failed for alice@example.com at /Users/alice/Pictures/a.jpg",
        "stack": "Error: boom\n    at upload (/Users/alice/app/upload.js:10:5)",
        "details": { "email": "test@example.com", "retries": 3 },
    });

    let out = anonymizer.anonymize_error_log(&record);
    assert_eq!(out["level"], "error");
    assert_ne!(out["user_id"], "u-1");
    assert_eq!(out["message"], "upload failed for [EMAIL] at [PATH]");
    assert_eq!(out["stack"], "Error: boom\n    at upload ([PATH]:10:5)");
    assert_eq!(out["details"]["email"], "te**@ex****e.com");
    assert_eq!(out["details"]["retries"], 3);

    let activity =
        anonymizer.anonymize_activity_log(&json!({ "userAgent": "curl/8.0", "action": "login" }));
    assert_eq!(activity["action"], "login");
    assert_eq!(activity["userAgent"]["browser"], "Other");
    Ok(())
}

#[test]
fn test_cleanup_purges_old_pseudonyms() -> TestResult {
    let (clock, sink) = fixtures();
    let anonymizer = DataAnonymizer::new(&AnonymizationConfig::default(), sink, clock.clone())?;
    let pseudonym = anonymizer.pseudonymize_value("u-1");

    clock.advance(Duration::from_secs(30 * 24 * 3600));
    assert_eq!(anonymizer.cleanup(), 0);
    clock.advance(Duration::from_millis(1));
    assert_eq!(anonymizer.cleanup(), 1);
    assert_eq!(anonymizer.resolve_pseudonym(&pseudonym), None);
    Ok(())
}

#[test]
fn test_zero_hash_iterations_rejected() {
    let (clock, sink) = fixtures();
    let config = AnonymizationConfig { hash_iterations: 0, ..AnonymizationConfig::default() };
    assert!(DataAnonymizer::new(&config, sink, clock).is_err());
}
