//! Subnet data model.

use super::Ipv4;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// An address block inside a network. Ports of the subnet draw their
/// addresses from the host range of `cidr`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Subnet {
    pub id: Uuid,
    pub name: String,
    /// CIDR block as entered, host bits allowed.
    pub cidr: Ipv4,
    pub network_id: Uuid,
}

impl Subnet {
    pub fn new(name: &str, cidr: Ipv4, network_id: Uuid) -> Subnet {
        Subnet {
            id: Uuid::new_v4(),
            name: name.to_string(),
            cidr,
            network_id,
        }
    }
}

impl fmt::Display for Subnet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Subnet<{}: {}>", self.name, self.cidr)
    }
}
