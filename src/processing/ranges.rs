//! Subnet utilization: counts, netmask and contiguous free ranges.

use crate::models::Ipv4;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::net::Ipv4Addr;

/// Inclusive range of free host addresses.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct IpRange {
    pub start: String,
    pub end: String,
}

impl IpRange {
    fn new(start: u32, end: u32) -> IpRange {
        IpRange {
            start: Ipv4Addr::from(start).to_string(),
            end: Ipv4Addr::from(end).to_string(),
        }
    }
}

/// Utilization summary of one CIDR block.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct RangeInfo {
    /// Addresses in the block, network and broadcast included.
    pub total: u64,
    /// `total - |occupied| - 2`. Not clamped: a negative value means the
    /// occupied set does not fit the block.
    pub available: i64,
    /// Maximal runs of free hosts, in ascending order.
    pub ips: Vec<IpRange>,
    pub netmask: String,
}

/// Compute the utilization of `cidr` given the occupied addresses.
///
/// Network and broadcast addresses are never reported as free.
///
/// # Arguments
/// * `cidr` - The subnet to inspect
/// * `occupied` - Addresses held by ports; duplicates count once
///
/// # Returns
/// A [`RangeInfo`] with the block size, the unclamped free count, the free
/// runs and the dotted netmask
///
/// # Examples
/// ```
/// use subnet_ipam::compute_ips;
/// use subnet_ipam::models::Ipv4;
///
/// let cidr = Ipv4::new("192.168.1.0/29").unwrap();
/// let info = compute_ips(&cidr, ["192.168.1.1", "192.168.1.3"]);
/// assert_eq!(info.total, 8);
/// assert_eq!(info.available, 4);
/// assert_eq!(info.ips.len(), 2);
/// assert_eq!(info.netmask, "255.255.255.248");
/// ```
pub fn compute_ips<I, S>(cidr: &Ipv4, occupied: I) -> RangeInfo
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let occupied: HashSet<String> = occupied
        .into_iter()
        .map(|ip| ip.as_ref().to_string())
        .collect();

    let total = cidr.num_addresses();
    let available = total as i64 - occupied.len() as i64 - 2;

    let mut stray = Vec::new();
    let taken: Vec<u32> = occupied
        .iter()
        .filter_map(|text| match text.parse::<Ipv4Addr>() {
            Ok(addr) if cidr.is_host(addr) => Some(u32::from(addr)),
            _ => {
                stray.push(text.as_str());
                None
            }
        })
        .sorted_unstable()
        .collect();
    if !stray.is_empty() {
        log::warn!(
            "compute_ips({cidr}): {} occupied address(es) outside the host range: {}",
            stray.len(),
            stray.iter().sorted().join(", ")
        );
    }

    let ips = match cidr.host_span() {
        Some((first, last)) => free_runs(first, last, &taken),
        None => Vec::new(),
    };

    RangeInfo {
        total,
        available,
        ips,
        netmask: cidr.netmask().to_string(),
    }
}

/// Gaps of `first..=last` not covered by the sorted, de-duplicated `taken`.
fn free_runs(first: u32, last: u32, taken: &[u32]) -> Vec<IpRange> {
    let mut runs = Vec::new();
    let mut start = first as u64;
    for &used in taken {
        let used = used as u64;
        if used > start {
            runs.push(IpRange::new(start as u32, (used - 1) as u32));
        }
        start = used + 1;
    }
    if start <= last as u64 {
        runs.push(IpRange::new(start as u32, last));
    }
    runs
}
