//! Format-aware masking.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

const MASK: char = '*';

/// Digits left visible at the end of a phone number
pub const PHONE_VISIBLE_DIGITS: usize = 4;

/// Mask `value` according to the format it looks like
pub fn mask_value(value: &str, ipv4_bits: u8, ipv6_bits: u8) -> String {
    let trimmed = value.trim();
    if let Some(masked) = mask_email(trimmed) {
        return masked;
    }
    match trimmed.parse::<IpAddr>() {
        Ok(IpAddr::V4(addr)) => return mask_ipv4(addr, ipv4_bits).to_string(),
        Ok(IpAddr::V6(addr)) => return mask_ipv6(addr, ipv6_bits).to_string(),
        Err(_) => {}
    }
    if looks_like_phone(trimmed) {
        return mask_phone(trimmed);
    }
    mask_generic(trimmed)
}

/// `test@example.com` becomes `te**@ex****e.com`. `None` if not an address.
pub fn mask_email(value: &str) -> Option<String> {
    let (local, domain) = value.split_once('@')?;
    if local.is_empty() || domain.is_empty() || domain.contains('@') {
        return None;
    }

    let local_len = local.chars().count();
    let keep = if local_len > 2 { 2 } else { 1 };
    let masked_local: String = local
        .chars()
        .take(keep)
        .chain(std::iter::repeat(MASK).take(local_len.saturating_sub(keep).max(1)))
        .collect();

    let masked_domain = match domain.rsplit_once('.') {
        Some((name, tld)) if !name.is_empty() => format!("{}.{}", mask_generic(name), tld),
        _ => mask_generic(domain),
    };
    Some(format!("{masked_local}@{masked_domain}"))
}

/// Zero every bit past the first `bits`
pub fn mask_ipv4(addr: Ipv4Addr, bits: u8) -> Ipv4Addr {
    let bits = u32::from(bits.min(32));
    let mask = u32::MAX.checked_shl(32 - bits).unwrap_or(0);
    Ipv4Addr::from(u32::from(addr) & mask)
}

pub fn mask_ipv6(addr: Ipv6Addr, bits: u8) -> Ipv6Addr {
    let bits = u32::from(bits.min(128));
    let mask = u128::MAX.checked_shl(128 - bits).unwrap_or(0);
    Ipv6Addr::from(u128::from(addr) & mask)
}

fn looks_like_phone(value: &str) -> bool {
    let digits = value.chars().filter(char::is_ascii_digit).count();
    digits >= 7
        && value
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | '(' | ')' | '.' | ' '))
}

/// Mask every digit but the last four, keeping punctuation in place
pub fn mask_phone(value: &str) -> String {
    let total = value.chars().filter(char::is_ascii_digit).count();
    let hidden = total.saturating_sub(PHONE_VISIBLE_DIGITS);
    let mut seen = 0;
    value
        .chars()
        .map(|c| {
            if c.is_ascii_digit() {
                seen += 1;
                if seen <= hidden {
                    return MASK;
                }
            }
            c
        })
        .collect()
}

/// Keep the first two and the last character; three characters or fewer are fully masked
pub fn mask_generic(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    if chars.len() <= 3 {
        return MASK.to_string().repeat(chars.len().max(1));
    }
    let mut out = String::with_capacity(value.len());
    out.extend(&chars[..2]);
    out.extend(std::iter::repeat(MASK).take(chars.len() - 3));
    out.push(chars[chars.len() - 1]);
    out
}
