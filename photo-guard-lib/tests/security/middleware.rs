use http::{HeaderMap, HeaderValue, StatusCode};
use photo_guard_lib::config::{IpSecurityConfig, RateLimitConfig, RateLimitRule};
use photo_guard_lib::security::ip_filter::{AccessContext, IpFilter, RuleKind, RuleOptions};
use photo_guard_lib::security::rate_limit::RateLimitManager;
use photo_guard_lib::security::{
    guard_request, GuardOutcome, MemoryEventSink, RequestInfo, SecurityEventType,
};
use photo_guard_lib::GuardError;
use std::net::SocketAddr;
use std::sync::Arc;

use crate::{fixtures, TestResult};

struct Guard {
    filter: IpFilter,
    limiter: RateLimitManager,
}

fn guard() -> Result<(Guard, Arc<MemoryEventSink>), GuardError> {
    let (clock, sink) = fixtures();
    let rate =
        RateLimitConfig { auth: RateLimitRule::new(60_000, 2), ..RateLimitConfig::default() };
    let filter = IpFilter::new(&IpSecurityConfig::default(), sink.clone(), clock.clone())?;
    let limiter = RateLimitManager::new(&rate, sink.clone(), clock)?;
    Ok((Guard { filter, limiter }, sink))
}

fn request(ip: &str) -> RequestInfo {
    let mut headers = HeaderMap::new();
    headers.insert(http::header::USER_AGENT, HeaderValue::from_static("photo-migrate/1.4"));
    let peer: SocketAddr = SocketAddr::new([192, 0, 2, 1].into(), 50_000);
    let mut info = RequestInfo::from_peer(peer, headers);
    info.ip = ip.to_string();
    info
}

#[test]
fn test_allowed_request_carries_rate_limit_headers() -> TestResult {
    let (g, _) = guard()?;
    let ctx = AccessContext::default();
    let outcome = guard_request(&g.filter, &g.limiter, &request("203.0.113.7"), "auth", &ctx);
    let GuardOutcome::Proceed { headers } = outcome else {
        return Err("expected the request to proceed".into());
    };
    assert_eq!(headers.get("x-ratelimit-limit").ok_or("missing limit")?, "2");
    assert_eq!(headers.get("x-ratelimit-remaining").ok_or("missing remaining")?, "1");
    Ok(())
}

#[test]
fn test_blacklisted_ip_gets_403() -> TestResult {
    let (g, sink) = guard()?;
    g.filter.add_rule(RuleKind::Blacklist, "203.0.113.0/24", RuleOptions::default())?;

    let ctx = AccessContext::default();
    let outcome = guard_request(&g.filter, &g.limiter, &request("203.0.113.7"), "api", &ctx);
    let GuardOutcome::Reject(resp) = outcome else {
        return Err("expected a rejection".into());
    };
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    let reason = resp.headers().get("x-access-denied-reason").ok_or("missing reason")?;
    assert_eq!(reason, "blacklisted");

    let denial = sink
        .events()
        .into_iter()
        .find(|e| e.event_type == SecurityEventType::AccessDenied)
        .ok_or("no denial event")?;
    assert_eq!(denial.payload["endpoint"], "api");
    assert_eq!(denial.payload["user_agent"], "photo-migrate/1.4");
    // The rate limiter never saw the request
    assert_eq!(g.limiter.stats().tracked_clients, 0);
    Ok(())
}

#[test]
fn test_exhausted_quota_gets_429() -> TestResult {
    let (g, _) = guard()?;
    let req = request("203.0.113.7").with_user("u-1");
    let ctx = AccessContext::default();

    assert!(guard_request(&g.filter, &g.limiter, &req, "auth", &ctx).is_proceed());
    assert!(guard_request(&g.filter, &g.limiter, &req, "auth", &ctx).is_proceed());
    let GuardOutcome::Reject(resp) = guard_request(&g.filter, &g.limiter, &req, "auth", &ctx) else {
        return Err("expected a rejection".into());
    };
    assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(resp.headers().contains_key(http::header::RETRY_AFTER));
    assert_eq!(resp.headers().get("x-ratelimit-remaining").ok_or("missing remaining")?, "0");
    Ok(())
}

#[test]
fn test_loopback_bypasses_rate_limit() -> TestResult {
    let (g, _) = guard()?;
    let req = request("127.0.0.1");
    for _ in 0..10 {
        let outcome = guard_request(&g.filter, &g.limiter, &req, "auth", &AccessContext::default());
        let GuardOutcome::Proceed { headers } = outcome else {
            return Err("loopback should never be limited".into());
        };
        assert!(headers.is_empty());
    }
    Ok(())
}

#[test]
fn test_forwarded_for_selects_client() -> TestResult {
    let (g, _) = guard()?;
    g.filter.add_rule(RuleKind::Blacklist, "198.51.100.9", RuleOptions::default())?;
    let mut headers = HeaderMap::new();
    headers.insert("x-forwarded-for", HeaderValue::from_static("198.51.100.9, 10.0.0.1"));
    let req = RequestInfo::from_peer(SocketAddr::new([10, 0, 0, 1].into(), 443), headers);

    let outcome = guard_request(&g.filter, &g.limiter, &req, "api", &AccessContext::default());
    assert!(!outcome.is_proceed());
    Ok(())
}
