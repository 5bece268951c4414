//! IPv4 address and CIDR notation utilities.
//!
//! Provides the [`Ipv4`] struct for representing an IPv4 network as it was
//! entered (address plus prefix length), along with the helper functions
//! used for host-range calculations.

use crate::error::IpamError;
use serde::de;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

/// Maximum length for an IPv4 subnet mask (32 bits).
const MAX_LENGTH: u8 = 32;

/// Subnet mask of a prefix length as u32, e.g. `0xFFFFFF00` for 24.
///
/// Callers guarantee `len <= MAX_LENGTH`.
fn prefix_mask(len: u8) -> u32 {
    u32::MAX.checked_shl(u32::from(MAX_LENGTH - len)).unwrap_or(0)
}

/// Prefix length of a dotted netmask, `None` when the ones are not contiguous.
fn prefix_from_netmask(mask: u32) -> Option<u8> {
    let ones = mask.leading_ones();
    if mask.checked_shl(ones).unwrap_or(0) == 0 {
        Some(ones as u8)
    } else {
        None
    }
}

/// Parse the part after the `/`: a prefix length, a netmask or a hostmask.
fn parse_prefix(text: &str) -> Option<u8> {
    if !text.is_empty() && text.bytes().all(|b| b.is_ascii_digit()) {
        return text.parse::<u8>().ok().filter(|len| *len <= MAX_LENGTH);
    }
    let bits = u32::from(Ipv4Addr::from_str(text).ok()?);
    prefix_from_netmask(bits).or_else(|| prefix_from_netmask(!bits))
}

/// IPv4 network in CIDR notation.
///
/// The address is kept exactly as entered, host bits included, so
/// `10.0.0.5/24` and `10.0.0.0/24` are different values that describe the
/// same network. All range calculations go through [`Ipv4::lo`].
#[derive(Eq, PartialEq, Ord, PartialOrd, Debug, Copy, Clone, Hash)]
pub struct Ipv4 {
    addr: Ipv4Addr,
    mask: u8,
}

impl Ipv4 {
    /// Create a new [`Ipv4`] from a CIDR string (e.g., "10.0.0.0/24").
    ///
    /// A bare address is read as a `/32` and the prefix may also be given as
    /// a dotted netmask. Host bits are not required to be zero.
    pub fn new(addr_cidr: &str) -> Result<Ipv4, IpamError> {
        let (addr_part, mask_part) = match addr_cidr.split_once('/') {
            Some((addr, mask)) => (addr, Some(mask)),
            None => (addr_cidr, None),
        };
        let addr = Ipv4Addr::from_str(addr_part)
            .map_err(|_| IpamError::InvalidCidr(format!("invalid address in {addr_cidr:?}")))?;
        let mask = match mask_part {
            Some(text) => parse_prefix(text).ok_or_else(|| {
                IpamError::InvalidCidr(format!("invalid prefix in {addr_cidr:?}"))
            })?,
            None => MAX_LENGTH,
        };
        Ok(Ipv4 { addr, mask })
    }

    /// The prefix length (0-32).
    pub fn mask(&self) -> u8 {
        self.mask
    }

    fn mask_bits(&self) -> u32 {
        prefix_mask(self.mask)
    }

    /// Get the lowest (network) address in the subnet.
    pub fn lo(&self) -> Ipv4Addr {
        Ipv4Addr::from(u32::from(self.addr) & self.mask_bits())
    }

    /// Get the highest (broadcast) address in the subnet.
    pub fn hi(&self) -> Ipv4Addr {
        Ipv4Addr::from(u32::from(self.lo()) | !self.mask_bits())
    }

    /// Dotted-decimal netmask, e.g. `255.255.255.252` for a `/30`.
    pub fn netmask(&self) -> Ipv4Addr {
        Ipv4Addr::from(self.mask_bits())
    }

    /// Number of addresses in the block, network and broadcast included.
    pub fn num_addresses(&self) -> u64 {
        1u64 << (MAX_LENGTH - self.mask)
    }

    /// Number of assignable host addresses, zero for `/31` and `/32`.
    pub fn usable_hosts(&self) -> u64 {
        self.num_addresses().saturating_sub(2)
    }

    /// First and last assignable host as numbers, `None` when there are none.
    pub fn host_span(&self) -> Option<(u32, u32)> {
        if self.usable_hosts() == 0 {
            return None;
        }
        Some((u32::from(self.lo()) + 1, u32::from(self.hi()) - 1))
    }

    /// Iterate the assignable hosts in ascending order.
    pub fn hosts(&self) -> impl Iterator<Item = Ipv4Addr> + Clone {
        let (start, end) = match self.host_span() {
            Some((start, end)) => (start as u64, end as u64 + 1),
            None => (0, 0),
        };
        (start..end).map(|bits| Ipv4Addr::from(bits as u32))
    }

    /// True if `addr` is strictly between the network and broadcast address.
    pub fn is_host(&self, addr: Ipv4Addr) -> bool {
        match self.host_span() {
            Some((start, end)) => (start..=end).contains(&u32::from(addr)),
            None => false,
        }
    }

    /// True if the two blocks share at least one address.
    pub fn overlaps(&self, other: &Ipv4) -> bool {
        self.lo() <= other.hi() && other.lo() <= self.hi()
    }
}

impl FromStr for Ipv4 {
    type Err = IpamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ipv4::new(s)
    }
}

impl Serialize for Ipv4 {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::ser::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Ipv4 {
    fn deserialize<D>(deserializer: D) -> Result<Ipv4, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ipv4::new(&s).map_err(de::Error::custom)
    }
}

impl fmt::Display for Ipv4 {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}/{}", self.addr, self.mask)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_mask() {
        assert_eq!(prefix_mask(0), 0x00000000);
        assert_eq!(prefix_mask(8), 0xFF000000);
        assert_eq!(prefix_mask(29), 0xFFFFFFF8);
        assert_eq!(prefix_mask(32), 0xFFFFFFFF);
    }

    #[test]
    fn test_parse_forms() {
        let plain = Ipv4::new("10.0.0.0/24").unwrap();
        assert_eq!(plain.mask(), 24);
        assert_eq!(plain.to_string(), "10.0.0.0/24");

        // host bits are kept but the network is normalised
        let loose = Ipv4::new("10.0.0.5/24").unwrap();
        assert_ne!(loose, plain);
        assert_eq!(loose.lo(), plain.lo());
        assert_eq!(loose.hi(), Ipv4Addr::new(10, 0, 0, 255));

        let bare = Ipv4::new("192.168.7.7").unwrap();
        assert_eq!(bare.mask(), 32);

        let netmask = Ipv4::new("10.1.0.0/255.255.0.0").unwrap();
        assert_eq!(netmask.mask(), 16);
        let hostmask = Ipv4::new("10.1.0.0/0.0.255.255").unwrap();
        assert_eq!(hostmask.mask(), 16);
    }

    #[test]
    fn test_parse_rejects() {
        for bad in [
            "",
            "10.0.0.0/",
            "10.0.0.0/33",
            "10.0.0/24",
            "10.0.0.256/24",
            "10.0.0.0/24/1",
            "10.0.0.0/255.0.255.0",
            " 10.0.0.0/24",
            "2001:db8::/32",
            "ten.zero/8",
        ] {
            assert!(Ipv4::new(bad).is_err(), "{bad:?} should not parse");
        }
    }

    #[test]
    fn test_sizes() {
        let ip = Ipv4::new("192.168.1.0/30").unwrap();
        assert_eq!(ip.num_addresses(), 4);
        assert_eq!(ip.usable_hosts(), 2);
        assert_eq!(ip.netmask(), Ipv4Addr::new(255, 255, 255, 252));
        assert_eq!(ip.hi(), Ipv4Addr::new(192, 168, 1, 3));

        assert_eq!(Ipv4::new("0.0.0.0/0").unwrap().num_addresses(), 1 << 32);
        assert_eq!(Ipv4::new("10.0.0.0/31").unwrap().usable_hosts(), 0);
        assert_eq!(Ipv4::new("10.0.0.0/32").unwrap().usable_hosts(), 0);
        assert_eq!(Ipv4::new("10.0.0.0/32").unwrap().hosts().count(), 0);
    }

    #[test]
    fn test_hosts_and_membership() {
        let ip = Ipv4::new("10.0.0.0/29").unwrap();
        let hosts: Vec<String> = ip.hosts().map(|h| h.to_string()).collect();
        assert_eq!(hosts.first().unwrap(), "10.0.0.1");
        assert_eq!(hosts.last().unwrap(), "10.0.0.6");
        assert_eq!(hosts.len(), 6);

        assert!(!ip.is_host(Ipv4Addr::new(10, 0, 0, 7)));
        assert!(!ip.is_host(Ipv4Addr::new(10, 0, 0, 0)));
        assert!(ip.is_host(Ipv4Addr::new(10, 0, 0, 3)));
        assert!(!ip.is_host(Ipv4Addr::new(10, 0, 0, 8)));

        let top = Ipv4::new("255.255.255.252/30").unwrap();
        assert_eq!(top.hosts().count(), 2);
    }

    #[test]
    fn test_overlaps() {
        let wide = Ipv4::new("10.0.0.0/16").unwrap();
        let inner = Ipv4::new("10.0.10.64/26").unwrap();
        let other = Ipv4::new("10.1.0.0/16").unwrap();
        assert!(wide.overlaps(&inner));
        assert!(inner.overlaps(&wide));
        assert!(!wide.overlaps(&other));
    }

    #[test]
    fn test_serde_as_text() {
        let ip = Ipv4::new("10.0.0.5/24").unwrap();
        let json = serde_json::to_string(&ip).unwrap();
        assert_eq!(json, "\"10.0.0.5/24\"");
        let back: Ipv4 = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ip);
        assert!(serde_json::from_str::<Ipv4>("\"10.0.0.0/40\"").is_err());
    }

    #[test]
    fn test_ip4_cmp() {
        let ip1 = Ipv4::new("10.0.0.1/24").unwrap();
        let ip2 = Ipv4::new("10.0.0.2/24").unwrap();
        assert!(ip1 < ip2);
        assert_eq!(ip1, Ipv4::new("10.0.0.1/24").unwrap());
    }
}
