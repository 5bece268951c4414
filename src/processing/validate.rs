//! Input validation for CIDR blocks, addresses and MAC addresses.
//!
//! All predicates are pure and fold every parse failure into `false`.

use crate::models::Ipv4;
use lazy_static::lazy_static;
use regex::Regex;
use std::net::IpAddr;

lazy_static! {
    static ref MAC_RE: Regex =
        Regex::new(r"^(?:[0-9A-Fa-f]{2}(?::[0-9A-Fa-f]{2}){5}|[0-9A-Fa-f]{2}(?:-[0-9A-Fa-f]{2}){5})$")
            .expect("Invalid Regex?");
}

/// True if `text` is an IPv4 network in CIDR notation.
///
/// Host bits may be set (`10.0.0.5/24` is accepted); a bare address counts
/// as a `/32`.
pub fn valid_cidr(text: &str) -> bool {
    Ipv4::new(text).is_ok()
}

/// True if `text` is a single IPv4 or IPv6 address literal.
///
/// The store runs port addresses through this before the IPv4 host check.
pub fn valid_ip(text: &str) -> bool {
    text.parse::<IpAddr>().is_ok()
}

/// True if `text` is six hex octets separated consistently by `:` or `-`.
pub fn valid_mac(text: &str) -> bool {
    MAC_RE.is_match(text)
}
