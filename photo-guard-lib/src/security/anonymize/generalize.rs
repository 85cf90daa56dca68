//! Precision reduction for locations, timestamps and user agents.

use chrono::{DateTime, Datelike, SecondsFormat, TimeZone, Timelike, Utc};
use serde_json::{json, Map, Value};

use super::types::{LocationPrecision, TimePrecision};

/// Round coordinates or keep the trailing address components
///
/// Accepts `"lat,lng"`, `{"lat": .., "lng": ..}` (also `latitude`/`longitude`) and
/// comma-separated addresses. `None` when the value has none of these shapes.
pub fn generalize_location(value: &Value, precision: LocationPrecision) -> Option<Value> {
    match value {
        Value::String(s) => {
            if let Some((lat, lng)) = parse_coordinates(s) {
                let d = precision.decimals();
                return Some(Value::String(format!("{lat:.d$},{lng:.d$}")));
            }
            let parts: Vec<&str> = s.split(',').map(str::trim).filter(|p| !p.is_empty()).collect();
            if parts.is_empty() {
                return None;
            }
            let keep = precision.components().min(parts.len());
            Some(Value::String(parts[parts.len() - keep..].join(", ")))
        }
        Value::Object(obj) => {
            let mut out = Map::new();
            let mut rounded = false;
            for (key, v) in obj {
                let is_coordinate =
                    matches!(key.as_str(), "lat" | "lng" | "lon" | "latitude" | "longitude");
                match v.as_f64() {
                    Some(n) if is_coordinate => {
                        out.insert(key.clone(), json!(round_to(n, precision.decimals())));
                        rounded = true;
                    }
                    _ if is_coordinate => return None,
                    // Only coarse fields survive
                    _ if matches!(key.as_str(), "country" | "region" | "state" | "city") => {
                        out.insert(key.clone(), v.clone());
                    }
                    _ => {}
                }
            }
            rounded.then_some(Value::Object(out))
        }
        _ => None,
    }
}

fn parse_coordinates(s: &str) -> Option<(f64, f64)> {
    let (lat, lng) = s.split_once(',')?;
    let lat: f64 = lat.trim().parse().ok()?;
    let lng: f64 = lng.trim().parse().ok()?;
    ((-90.0..=90.0).contains(&lat) && (-180.0..=180.0).contains(&lng)).then_some((lat, lng))
}

fn round_to(n: f64, decimals: usize) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (n * factor).round() / factor
}

/// Truncate a timestamp to `precision`, never rounding up
///
/// Strings are parsed as RFC 3339, numbers as Unix epoch milliseconds. The result is
/// an RFC 3339 UTC string.
pub fn generalize_timestamp(value: &Value, precision: TimePrecision) -> Option<Value> {
    let ts: DateTime<Utc> = match value {
        Value::String(s) => DateTime::parse_from_rfc3339(s.trim()).ok()?.with_timezone(&Utc),
        Value::Number(n) => DateTime::from_timestamp_millis(n.as_i64()?)?,
        _ => return None,
    };
    let truncated = truncate(ts, precision)?;
    Some(Value::String(truncated.to_rfc3339_opts(SecondsFormat::Secs, true)))
}

fn truncate(ts: DateTime<Utc>, precision: TimePrecision) -> Option<DateTime<Utc>> {
    let (month, day, hour, minute) = match precision {
        TimePrecision::Year => (1, 1, 0, 0),
        TimePrecision::Month => (ts.month(), 1, 0, 0),
        TimePrecision::Day => (ts.month(), ts.day(), 0, 0),
        TimePrecision::Hour => (ts.month(), ts.day(), ts.hour(), 0),
        TimePrecision::Minute => (ts.month(), ts.day(), ts.hour(), ts.minute()),
    };
    Utc.with_ymd_and_hms(ts.year(), month, day, hour, minute, 0).single()
}

/// Reduce a user agent to `{browser, os, device_type}`
pub fn generalize_user_agent(ua: &str) -> Value {
    let browser = if ua.contains("Edg/") || ua.contains("Edge/") {
        "Edge"
    } else if ua.contains("OPR/") || ua.contains("Opera") {
        "Opera"
    } else if ua.contains("Firefox/") {
        "Firefox"
    } else if ua.contains("Chrome/") || ua.contains("CriOS/") {
        "Chrome"
    } else if ua.contains("Safari/") {
        "Safari"
    } else {
        "Other"
    };

    let os = if ua.contains("Windows") {
        "Windows"
    } else if ua.contains("iPhone") || ua.contains("iPad") || ua.contains("iPod") {
        "iOS"
    } else if ua.contains("Mac OS X") || ua.contains("Macintosh") {
        "macOS"
    } else if ua.contains("Android") {
        "Android"
    } else if ua.contains("Linux") || ua.contains("X11") {
        "Linux"
    } else {
        "Other"
    };

    let lower = ua.to_ascii_lowercase();
    let is_bot = ["bot", "crawler", "spider"].iter().any(|needle| lower.contains(*needle));
    let device_type = if is_bot {
        "bot"
    } else if lower.contains("ipad") || lower.contains("tablet") {
        "tablet"
    } else if lower.contains("mobile") || lower.contains("iphone") || lower.contains("android") {
        "mobile"
    } else {
        "desktop"
    };

    json!({ "browser": browser, "os": os, "device_type": device_type })
}
