//! Port data model.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;
use uuid::Uuid;

/// A port attached to exactly one subnet.
///
/// The address is stored in its text form; occupancy of a subnet is always
/// derived from the live set of its ports.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Port {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub mac: Option<String>,
    pub ip: String,
    pub subnet_id: Uuid,
}

impl Port {
    pub fn new(name: &str, mac: Option<&str>, ip: &str, subnet_id: Uuid) -> Port {
        Port {
            id: Uuid::new_v4(),
            name: name.to_string(),
            mac: mac.map(str::to_string),
            ip: ip.to_string(),
            subnet_id,
        }
    }

    /// The address as a number, `None` if the stored text is not an IPv4 literal.
    pub fn ip_bits(&self) -> Option<u32> {
        self.ip.parse::<Ipv4Addr>().ok().map(u32::from)
    }
}

impl fmt::Display for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Port<{}: {}>", self.name, self.ip)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ip_bits() {
        let subnet_id = Uuid::new_v4();
        let port = Port::new("eth0", None, "10.0.0.2", subnet_id);
        assert_eq!(port.ip_bits(), Some(0x0A000002));
        assert_eq!(port.to_string(), "Port<eth0: 10.0.0.2>");

        let broken = Port::new("eth1", None, "", subnet_id);
        assert_eq!(broken.ip_bits(), None);
    }
}
