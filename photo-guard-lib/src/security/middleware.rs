//! Request guard for server-side hosts.
//!
//! Runs the IP filter, then the rate limiter (unless the client is whitelisted for
//! rate limiting), and turns the outcome into response headers or a ready-made
//! rejection.

use http::{HeaderMap, HeaderValue, Response, StatusCode};
use std::net::{IpAddr, SocketAddr};
use tracing::debug;

use super::ip_filter::{parse_ip, AccessContext, AccessDecision, IpFilter};
use super::rate_limit::{CheckOptions, ClientIdentifier, RateLimitManager, RateLimitOutcome};

/// The parts of a request the guard looks at
#[derive(Debug, Clone)]
pub struct RequestInfo {
    pub ip: String,
    pub user_id: Option<String>,
    pub headers: HeaderMap,
}

impl RequestInfo {
    /// Client address from the first `X-Forwarded-For` entry, else the peer
    pub fn from_peer(peer: SocketAddr, headers: HeaderMap) -> Self {
        let ip = client_ip(peer.ip(), &headers).to_string();
        Self { ip, user_id: None, headers }
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    fn user_agent(&self) -> Option<String> {
        self.headers
            .get(http::header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    }

    pub fn identifier(&self) -> ClientIdentifier {
        ClientIdentifier {
            ip: self.ip.clone(),
            user_id: self.user_id.clone(),
            user_agent: self.user_agent(),
        }
    }
}

fn client_ip(peer: IpAddr, headers: &HeaderMap) -> IpAddr {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .and_then(parse_ip)
        .unwrap_or(peer)
}

/// What the host should do with the request
#[derive(Debug)]
pub enum GuardOutcome {
    /// Continue, adding `headers` to the response
    Proceed { headers: HeaderMap },
    Reject(Response<String>),
}

impl GuardOutcome {
    pub fn is_proceed(&self) -> bool {
        matches!(self, GuardOutcome::Proceed { .. })
    }
}

/// Apply the IP filter and rate limiter to one request
pub fn guard_request(
    filter: &IpFilter,
    limiter: &RateLimitManager,
    request: &RequestInfo,
    endpoint: &str,
    context: &AccessContext,
) -> GuardOutcome {
    let mut context = context.clone();
    if context.endpoint.is_none() {
        context.endpoint = Some(endpoint.to_string());
    }
    if context.user_agent.is_none() {
        context.user_agent = request.user_agent();
    }
    if context.user_id.is_none() {
        context.user_id = request.user_id.clone();
    }

    let decision = filter.is_ip_allowed(&request.ip, &context);
    if !decision.allowed {
        return GuardOutcome::Reject(forbidden_response(&decision));
    }

    let identifier = request.identifier();
    if limiter.apply_whitelist(&identifier) {
        debug!(ip = %request.ip, "rate limiting bypassed for whitelisted client");
        return GuardOutcome::Proceed { headers: HeaderMap::new() };
    }

    let outcome = limiter.check_rate_limit(&identifier, endpoint, &CheckOptions::default());
    if outcome.allowed() {
        GuardOutcome::Proceed { headers: outcome.headers() }
    } else {
        GuardOutcome::Reject(too_many_requests_response(&outcome))
    }
}

fn forbidden_response(decision: &AccessDecision) -> Response<String> {
    let mut resp = Response::new("Forbidden".to_string());
    *resp.status_mut() = StatusCode::FORBIDDEN;
    resp.headers_mut().insert(
        http::header::HeaderName::from_static("x-access-denied-reason"),
        HeaderValue::from_static(decision.reason.as_str()),
    );
    resp
}

fn too_many_requests_response(outcome: &RateLimitOutcome) -> Response<String> {
    let mut resp = Response::new("Too Many Requests".to_string());
    *resp.status_mut() = StatusCode::TOO_MANY_REQUESTS;
    resp.headers_mut().extend(outcome.headers());
    resp
}
