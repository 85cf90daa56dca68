//! IP literal formats accepted by filter rules.

use ipnet::IpNet;
use regex::Regex;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr};

use crate::error::{GuardError, Result};

/// A parsed rule literal.
///
/// | Format   | Example                     |
/// |----------|-----------------------------|
/// | Exact    | `192.168.001.010`, `::1`    |
/// | CIDR     | `10.0.0.0/8`, `2001:db8::/32` |
/// | Wildcard | `192.168.*.*`               |
/// | Range    | `10.0.0.1-10.0.0.20`        |
#[derive(Clone)]
pub enum IpPattern {
    Exact(IpAddr),
    Cidr(IpNet),
    /// IPv4 only. Each `*` matches one or more digits within its segment.
    Wildcard(Regex),
    /// Inclusive interval over the numeric value of the address. Both ends share
    /// one address family.
    Range { start: IpAddr, end: IpAddr },
}

impl fmt::Debug for IpPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IpPattern::Exact(addr) => write!(f, "Exact({addr})"),
            IpPattern::Cidr(net) => write!(f, "Cidr({net})"),
            IpPattern::Wildcard(re) => write!(f, "Wildcard({})", re.as_str()),
            IpPattern::Range { start, end } => write!(f, "Range({start}-{end})"),
        }
    }
}

impl IpPattern {
    /// Parse a rule literal, rejecting anything that is not one of the known formats
    pub fn parse(literal: &str) -> Result<Self> {
        let literal = literal.trim();
        if literal.is_empty() {
            return Err(GuardError::Validation("empty IP literal".to_string()));
        }

        if literal.contains('/') {
            return literal
                .parse::<IpNet>()
                .map(IpPattern::Cidr)
                .map_err(|_| GuardError::Validation(format!("invalid CIDR block: {literal}")));
        }

        if let Some((start, end)) = literal.split_once('-') {
            return parse_range(literal, start, end);
        }

        if literal.contains('*') {
            return parse_wildcard(literal);
        }

        parse_ip(literal)
            .map(IpPattern::Exact)
            .ok_or_else(|| GuardError::Validation(format!("invalid IP address: {literal}")))
    }

    pub fn matches(&self, ip: &IpAddr) -> bool {
        match self {
            IpPattern::Exact(addr) => addr == ip,
            IpPattern::Cidr(net) => net.contains(ip),
            IpPattern::Wildcard(re) => ip.is_ipv4() && re.is_match(&ip.to_string()),
            IpPattern::Range { start, end } => match (start, end, ip) {
                (IpAddr::V4(s), IpAddr::V4(e), IpAddr::V4(x)) => {
                    (u32::from(*s)..=u32::from(*e)).contains(&u32::from(*x))
                }
                (IpAddr::V6(s), IpAddr::V6(e), IpAddr::V6(x)) => {
                    (u128::from(*s)..=u128::from(*e)).contains(&u128::from(*x))
                }
                _ => false,
            },
        }
    }

    /// Number of leading address bits the pattern pins down
    ///
    /// Used to report the most specific of several matching rules: an exact
    /// address pins every bit, `10.0.0.0/8` pins 8.
    pub fn specificity(&self) -> u32 {
        match self {
            IpPattern::Exact(IpAddr::V4(_)) => 32,
            IpPattern::Exact(IpAddr::V6(_)) => 128,
            IpPattern::Cidr(net) => u32::from(net.prefix_len()),
            IpPattern::Wildcard(re) => {
                let fixed = re.as_str().split("\\.").filter(|seg| !seg.contains("\\d")).count();
                8 * fixed as u32
            }
            IpPattern::Range { start, end } => match (start, end) {
                (IpAddr::V4(s), IpAddr::V4(e)) => {
                    u32::from(*e).saturating_sub(u32::from(*s)).leading_zeros()
                }
                (IpAddr::V6(s), IpAddr::V6(e)) => {
                    u128::from(*e).saturating_sub(u128::from(*s)).leading_zeros()
                }
                _ => 0,
            },
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            IpPattern::Exact(_) => "exact",
            IpPattern::Cidr(_) => "cidr",
            IpPattern::Wildcard(_) => "wildcard",
            IpPattern::Range { .. } => "range",
        }
    }
}

/// Parse a single address, tolerating leading zeros in IPv4 octets
pub fn parse_ip(s: &str) -> Option<IpAddr> {
    let s = s.trim();
    if let Ok(addr) = s.parse::<IpAddr>() {
        return Some(addr);
    }
    let octets: Vec<u8> = s
        .split('.')
        .map(|part| part.parse::<u8>().ok())
        .collect::<Option<_>>()?;
    match octets.as_slice() {
        [a, b, c, d] => Some(IpAddr::V4(Ipv4Addr::new(*a, *b, *c, *d))),
        _ => None,
    }
}

fn parse_range(literal: &str, start: &str, end: &str) -> Result<IpPattern> {
    let invalid = || GuardError::Validation(format!("invalid IP range: {literal}"));
    let start = parse_ip(start).ok_or_else(invalid)?;
    let end = parse_ip(end).ok_or_else(invalid)?;
    let ordered = match (start, end) {
        (IpAddr::V4(s), IpAddr::V4(e)) => u32::from(s) <= u32::from(e),
        (IpAddr::V6(s), IpAddr::V6(e)) => u128::from(s) <= u128::from(e),
        _ => false,
    };
    if !ordered {
        return Err(invalid());
    }
    Ok(IpPattern::Range { start, end })
}

fn parse_wildcard(literal: &str) -> Result<IpPattern> {
    let invalid = || GuardError::Validation(format!("invalid wildcard pattern: {literal}"));
    let segments: Vec<&str> = literal.split('.').collect();
    if segments.len() != 4 {
        return Err(invalid());
    }
    let mut parts = Vec::with_capacity(4);
    for seg in segments {
        if seg == "*" {
            parts.push(r"\d+".to_string());
        } else {
            let octet = seg.parse::<u8>().map_err(|_| invalid())?;
            parts.push(octet.to_string());
        }
    }
    let re = Regex::new(&format!("^{}$", parts.join(r"\.")))?;
    Ok(IpPattern::Wildcard(re))
}
