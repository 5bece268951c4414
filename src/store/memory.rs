//! In-memory [`TopologyStore`].
//!
//! One reader/writer lock guards all tables, so every store call, including
//! [`TopologyStore::apply_reallocation`], is atomic with respect to the
//! others. Constraints are checked before anything is written.

use super::{Topology, TopologyStore};
use crate::error::{IpamError, Result};
use crate::models::{Network, Port, Subnet};
use crate::processing::{valid_ip, Assignment};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashSet};
use std::net::Ipv4Addr;
use uuid::Uuid;

#[derive(Default)]
struct Tables {
    networks: BTreeMap<Uuid, Network>,
    subnets: BTreeMap<Uuid, Subnet>,
    ports: BTreeMap<Uuid, Port>,
}

impl Tables {
    fn network(&self, id: Uuid) -> Result<&Network> {
        self.networks
            .get(&id)
            .ok_or_else(|| IpamError::not_found("Network", id))
    }

    fn subnet(&self, id: Uuid) -> Result<&Subnet> {
        self.subnets
            .get(&id)
            .ok_or_else(|| IpamError::not_found("Subnet", id))
    }

    fn port(&self, id: Uuid) -> Result<&Port> {
        self.ports
            .get(&id)
            .ok_or_else(|| IpamError::not_found("Port", id))
    }

    fn port_count(&self, subnet_id: Uuid) -> usize {
        self.ports
            .values()
            .filter(|p| p.subnet_id == subnet_id)
            .count()
    }

    fn check_network(&self, network: &Network) -> Result<()> {
        let taken = self.networks.values().any(|n| {
            n.id != network.id
                && n.name == network.name
                && n.availability_zone_hints == network.availability_zone_hints
        });
        if taken {
            return Err(IpamError::ConstraintViolation(format!(
                "network '{}' already exists in zone '{}'",
                network.name, network.availability_zone_hints
            )));
        }
        Ok(())
    }

    fn check_subnet(&self, subnet: &Subnet) -> Result<()> {
        self.network(subnet.network_id)?;
        let clash = self.subnets.values().find(|s| {
            s.id != subnet.id
                && s.network_id == subnet.network_id
                && s.cidr.overlaps(&subnet.cidr)
        });
        if let Some(other) = clash {
            return Err(IpamError::ConstraintViolation(format!(
                "{} overlaps subnet '{}' ({}) in network {}",
                subnet.cidr, other.name, other.cidr, subnet.network_id
            )));
        }
        Ok(())
    }

    fn check_port(&self, port: &Port) -> Result<()> {
        let subnet = self.subnet(port.subnet_id)?;
        if !valid_ip(&port.ip) {
            return Err(IpamError::InvalidAddress(port.ip.clone()));
        }
        let addr: Ipv4Addr = port.ip.parse().map_err(|_| {
            IpamError::InvalidAddress(format!("{} is not IPv4, subnet is {}", port.ip, subnet.cidr))
        })?;
        if !subnet.cidr.is_host(addr) {
            return Err(IpamError::InvalidAddress(format!(
                "{} is not a host address of {}",
                port.ip, subnet.cidr
            )));
        }
        let taken = self
            .ports
            .values()
            .any(|p| p.id != port.id && p.subnet_id == port.subnet_id && p.ip == port.ip);
        if taken {
            return Err(IpamError::AllocationConflict {
                ip: port.ip.clone(),
                subnet: port.subnet_id.to_string(),
            });
        }
        Ok(())
    }

    fn remove_subnet(&mut self, id: Uuid) -> usize {
        let before = self.ports.len();
        self.ports.retain(|_, p| p.subnet_id != id);
        let removed_ports = before - self.ports.len();
        match self.subnets.remove(&id) {
            Some(_) => removed_ports + 1,
            None => removed_ports,
        }
    }
}

/// Thread-safe in-memory store.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> MemoryStore {
        MemoryStore::default()
    }

    /// Build a store from a snapshot, checking every constraint on the way.
    pub fn from_topology(topology: Topology) -> Result<MemoryStore> {
        let store = MemoryStore::new();
        for network in topology.networks {
            store.insert_network(network)?;
        }
        for subnet in topology.subnets {
            store.insert_subnet(subnet)?;
        }
        for port in topology.ports {
            store.insert_port(port)?;
        }
        Ok(store)
    }

    /// Copy of every record, without a timestamp.
    pub fn snapshot(&self) -> Topology {
        let tables = self.tables.read();
        Topology {
            saved_at: None,
            networks: tables.networks.values().cloned().collect(),
            subnets: tables.subnets.values().cloned().collect(),
            ports: tables.ports.values().cloned().collect(),
        }
    }
}

impl TopologyStore for MemoryStore {
    fn insert_network(&self, network: Network) -> Result<Network> {
        let mut tables = self.tables.write();
        if tables.networks.contains_key(&network.id) {
            return Err(IpamError::ConstraintViolation(format!(
                "duplicate network id {}",
                network.id
            )));
        }
        tables.check_network(&network)?;
        tables.networks.insert(network.id, network.clone());
        Ok(network)
    }

    fn get_network(&self, id: Uuid) -> Result<Network> {
        self.tables.read().network(id).cloned()
    }

    fn list_networks(&self) -> Result<Vec<Network>> {
        Ok(self.tables.read().networks.values().cloned().collect())
    }

    fn update_network(&self, network: Network) -> Result<Network> {
        let mut tables = self.tables.write();
        tables.network(network.id)?;
        tables.check_network(&network)?;
        tables.networks.insert(network.id, network.clone());
        Ok(network)
    }

    fn delete_network(&self, id: Uuid) -> Result<usize> {
        let mut tables = self.tables.write();
        tables.network(id)?;
        let subnet_ids: Vec<Uuid> = tables
            .subnets
            .values()
            .filter(|s| s.network_id == id)
            .map(|s| s.id)
            .collect();
        let mut removed = 1;
        for subnet_id in subnet_ids {
            removed += tables.remove_subnet(subnet_id);
        }
        tables.networks.remove(&id);
        Ok(removed)
    }

    fn insert_subnet(&self, subnet: Subnet) -> Result<Subnet> {
        let mut tables = self.tables.write();
        if tables.subnets.contains_key(&subnet.id) {
            return Err(IpamError::ConstraintViolation(format!(
                "duplicate subnet id {}",
                subnet.id
            )));
        }
        tables.check_subnet(&subnet)?;
        tables.subnets.insert(subnet.id, subnet.clone());
        Ok(subnet)
    }

    fn get_subnet(&self, id: Uuid) -> Result<Subnet> {
        self.tables.read().subnet(id).cloned()
    }

    fn list_subnets(&self, network_id: Option<Uuid>) -> Result<Vec<Subnet>> {
        Ok(self
            .tables
            .read()
            .subnets
            .values()
            .filter(|s| network_id.map_or(true, |id| s.network_id == id))
            .cloned()
            .collect())
    }

    fn update_subnet(&self, subnet: Subnet) -> Result<Subnet> {
        let mut tables = self.tables.write();
        let existing = tables.subnet(subnet.id)?;
        if existing.cidr != subnet.cidr && tables.port_count(subnet.id) > 0 {
            return Err(IpamError::ConstraintViolation(format!(
                "subnet {} has ports; its CIDR can only change through reallocation",
                subnet.id
            )));
        }
        tables.check_subnet(&subnet)?;
        tables.subnets.insert(subnet.id, subnet.clone());
        Ok(subnet)
    }

    fn delete_subnet(&self, id: Uuid) -> Result<usize> {
        let mut tables = self.tables.write();
        tables.subnet(id)?;
        Ok(tables.remove_subnet(id))
    }

    fn insert_port(&self, port: Port) -> Result<Port> {
        let mut tables = self.tables.write();
        if tables.ports.contains_key(&port.id) {
            return Err(IpamError::ConstraintViolation(format!(
                "duplicate port id {}",
                port.id
            )));
        }
        tables.check_port(&port)?;
        tables.ports.insert(port.id, port.clone());
        Ok(port)
    }

    fn get_port(&self, id: Uuid) -> Result<Port> {
        self.tables.read().port(id).cloned()
    }

    fn list_ports(&self, subnet_id: Option<Uuid>) -> Result<Vec<Port>> {
        Ok(self
            .tables
            .read()
            .ports
            .values()
            .filter(|p| subnet_id.map_or(true, |id| p.subnet_id == id))
            .cloned()
            .collect())
    }

    fn update_port(&self, port: Port) -> Result<Port> {
        let mut tables = self.tables.write();
        tables.port(port.id)?;
        tables.check_port(&port)?;
        tables.ports.insert(port.id, port.clone());
        Ok(port)
    }

    fn delete_port(&self, id: Uuid) -> Result<usize> {
        let mut tables = self.tables.write();
        tables.port(id)?;
        tables.ports.remove(&id);
        Ok(1)
    }

    fn apply_reallocation(&self, subnet: Subnet, assignments: &[Assignment]) -> Result<Subnet> {
        let mut tables = self.tables.write();
        tables.subnet(subnet.id)?;
        tables.check_subnet(&subnet)?;

        let owned: HashSet<Uuid> = tables
            .ports
            .values()
            .filter(|p| p.subnet_id == subnet.id)
            .map(|p| p.id)
            .collect();
        let assigned: HashSet<Uuid> = assignments.iter().map(|a| a.port_id).collect();
        if owned != assigned || assigned.len() != assignments.len() {
            return Err(IpamError::ConstraintViolation(format!(
                "reallocation of subnet {} must address each of its {} port(s) exactly once",
                subnet.id,
                owned.len()
            )));
        }

        let mut seen = HashSet::new();
        for a in assignments {
            let addr: Ipv4Addr = a
                .ip
                .parse()
                .map_err(|_| IpamError::InvalidAddress(a.ip.clone()))?;
            if !subnet.cidr.is_host(addr) {
                return Err(IpamError::InvalidAddress(format!(
                    "{} is not a host address of {}",
                    a.ip, subnet.cidr
                )));
            }
            if !seen.insert(addr) {
                return Err(IpamError::AllocationConflict {
                    ip: a.ip.clone(),
                    subnet: subnet.id.to_string(),
                });
            }
        }

        for a in assignments {
            if let Some(port) = tables.ports.get_mut(&a.port_id) {
                port.ip = a.ip.clone();
            }
        }
        tables.subnets.insert(subnet.id, subnet.clone());
        Ok(subnet)
    }
}
