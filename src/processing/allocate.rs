//! Address allocation within a subnet.
//!
//! Occupancy is always passed in by the caller, built from the live set of
//! ports; nothing here keeps a free list.

use crate::models::Ipv4;
use std::collections::HashSet;
use std::iter::FusedIterator;
use std::net::Ipv4Addr;

/// Parse occupied addresses, skipping text that is not an IPv4 literal.
///
/// Unparseable entries can never match a host address, so dropping them
/// does not change any allocation result.
pub fn occupied_set<I, S>(occupied: I) -> HashSet<Ipv4Addr>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    occupied
        .into_iter()
        .filter_map(|ip| ip.as_ref().parse::<Ipv4Addr>().ok())
        .collect()
}

/// Lowest host address of `cidr` not present in `occupied`.
pub fn first_free_host(cidr: &Ipv4, occupied: &HashSet<Ipv4Addr>) -> Option<Ipv4Addr> {
    cidr.hosts().find(|host| !occupied.contains(host))
}

/// Allocate the lowest free host address of `cidr`.
///
/// The result depends only on the inputs, so two callers holding the same
/// snapshot get the same address.
///
/// # Arguments
/// * `cidr` - The subnet to allocate from
/// * `occupied` - Addresses already held; unparseable entries are ignored
///
/// # Returns
/// The address in dotted-decimal form, or an empty string when every host
/// address is occupied
///
/// # Examples
/// ```
/// use subnet_ipam::allocate_ip;
/// use subnet_ipam::models::Ipv4;
///
/// let cidr = Ipv4::new("10.0.0.0/30").unwrap();
/// assert_eq!(allocate_ip(&cidr, ["10.0.0.1"]), "10.0.0.2");
/// assert_eq!(allocate_ip(&cidr, ["10.0.0.1", "10.0.0.2"]), "");
/// ```
pub fn allocate_ip<I, S>(cidr: &Ipv4, occupied: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    match first_free_host(cidr, &occupied_set(occupied)) {
        Some(host) => host.to_string(),
        None => {
            log::debug!("allocate_ip({cidr}): no free host address");
            String::new()
        }
    }
}

/// The first `n` addresses after the network address, in ascending order.
///
/// No occupancy check is made: this is for re-addressing a whole subnet at
/// once, where the caller has checked `n` against the usable host count.
/// The sequence is lazy and can be restarted by cloning it.
pub fn allocate_ip_many(cidr: &Ipv4, n: u64) -> HostSequence {
    let base = u32::from(cidr.lo()) as u64;
    // never step past 255.255.255.255
    let end = n.saturating_add(1).min(u32::MAX as u64 - base + 1);
    HostSequence {
        base,
        next: 1.min(end),
        end,
    }
}

/// Lazy sequence produced by [`allocate_ip_many`].
#[derive(Debug, Clone)]
pub struct HostSequence {
    base: u64,
    next: u64,
    end: u64,
}

impl Iterator for HostSequence {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        if self.next >= self.end {
            return None;
        }
        let addr = Ipv4Addr::from((self.base + self.next) as u32);
        self.next += 1;
        Some(addr.to_string())
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = (self.end - self.next) as usize;
        (left, Some(left))
    }
}

impl ExactSizeIterator for HostSequence {}

impl FusedIterator for HostSequence {}
