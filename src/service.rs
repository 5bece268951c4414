//! Address management over a [`TopologyStore`].
//!
//! [`Ipam`] composes the pure allocation logic with the store. Every
//! operation that reads a subnet's occupancy and then writes an address runs
//! under that subnet's lock, so two workers never hand out the same address
//! and a CIDR change never interleaves with port creation, moves or deletes
//! on the same subnet. Different subnets proceed in parallel.

use crate::config::Config;
use crate::error::{IpamError, Result};
use crate::models::{Ipv4, Network, Port, Subnet};
use crate::processing::{
    compute_ips, first_free_host, occupied_set, plan_reallocation, valid_cidr, valid_mac,
    RangeInfo,
};
use crate::store::TopologyStore;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// One mutex per subnet id. An entry lives only while some caller holds or
/// waits for it, so ids of failed or deleted subnets do not accumulate.
#[derive(Default)]
pub struct SubnetLocks {
    locks: Mutex<HashMap<Uuid, Arc<Mutex<()>>>>,
}

impl SubnetLocks {
    /// Run `f` holding the locks of every id in `subnet_ids`, taken in id
    /// order. Duplicate ids are locked once.
    pub fn with_locked<T>(&self, subnet_ids: &[Uuid], f: impl FnOnce() -> T) -> T {
        let mut ids = subnet_ids.to_vec();
        ids.sort();
        ids.dedup();
        let locks: Vec<Arc<Mutex<()>>> = {
            let mut map = self.locks.lock();
            ids.iter()
                .map(|id| map.entry(*id).or_default().clone())
                .collect()
        };

        let result = {
            let _guards: Vec<_> = locks.iter().map(|lock| lock.lock()).collect();
            f()
        };

        let mut map = self.locks.lock();
        for (id, lock) in ids.iter().zip(locks) {
            // the map and this call are the only holders
            if Arc::strong_count(&lock) == 2 {
                map.remove(id);
            }
        }
        result
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.locks.lock().len()
    }
}

/// Fields of a network that may be edited.
#[derive(Debug, Default, Clone)]
pub struct NetworkUpdate {
    pub name: Option<String>,
    pub availability_zone_hints: Option<String>,
    pub status: Option<String>,
}

/// Subnet record with its current utilization.
#[derive(Serialize, Debug, Clone)]
pub struct SubnetUsage {
    #[serde(flatten)]
    pub subnet: Subnet,
    pub available_ip: RangeInfo,
}

/// Fields of a subnet that may be edited.
#[derive(Debug, Default, Clone)]
pub struct SubnetUpdate {
    pub name: Option<String>,
    pub cidr: Option<String>,
}

/// Fields of a port that may be edited. Changing `subnet_id` moves the port
/// and gives it a fresh address in the destination.
#[derive(Debug, Default, Clone)]
pub struct PortUpdate {
    pub name: Option<String>,
    pub mac: Option<String>,
    pub subnet_id: Option<Uuid>,
}

/// Coordinator for networks, subnets and port addresses.
pub struct Ipam<S: TopologyStore> {
    store: S,
    locks: SubnetLocks,
    max_retries: u32,
}

impl<S: TopologyStore> Ipam<S> {
    pub fn new(store: S, config: &Config) -> Ipam<S> {
        Ipam {
            store,
            locks: SubnetLocks::default(),
            max_retries: config.allocation_retries,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    // ---- networks

    pub fn create_network(&self, name: &str, availability_zone_hints: &str) -> Result<Network> {
        let network = self
            .store
            .insert_network(Network::new(name, availability_zone_hints))?;
        log::info!("Created {network} ({})", network.id);
        Ok(network)
    }

    pub fn list_networks(&self) -> Result<Vec<Network>> {
        self.store.list_networks()
    }

    pub fn get_network(&self, id: Uuid) -> Result<Network> {
        self.store.get_network(id)
    }

    /// Rename a network or change its zone hint or status.
    ///
    /// The name must stay unique within the availability zone hint.
    pub fn update_network(&self, id: Uuid, update: NetworkUpdate) -> Result<Network> {
        let mut network = self.store.get_network(id)?;
        if let Some(name) = update.name {
            network.name = name;
        }
        if let Some(hints) = update.availability_zone_hints {
            network.availability_zone_hints = hints;
        }
        if let Some(status) = update.status {
            network.status = status;
        }
        let saved = self.store.update_network(network)?;
        log::info!("Updated {saved} ({id})");
        Ok(saved)
    }

    /// Delete a network with all its subnets and ports.
    pub fn delete_network(&self, id: Uuid) -> Result<usize> {
        let subnet_ids: Vec<Uuid> = self
            .store
            .list_subnets(Some(id))?
            .iter()
            .map(|s| s.id)
            .collect();
        let affected = self
            .locks
            .with_locked(&subnet_ids, || self.store.delete_network(id))?;
        log::info!("Deleted network {id}, {affected} record(s) removed");
        Ok(affected)
    }

    // ---- subnets

    /// Create a subnet after validating its CIDR.
    pub fn create_subnet(&self, name: &str, cidr: &str, network_id: Uuid) -> Result<Subnet> {
        if !valid_cidr(cidr) {
            return Err(IpamError::InvalidCidr(cidr.to_string()));
        }
        let subnet = self
            .store
            .insert_subnet(Subnet::new(name, Ipv4::new(cidr)?, network_id))?;
        log::info!("Created {subnet} ({}) in network {network_id}", subnet.id);
        Ok(subnet)
    }

    pub fn list_subnets(&self, network_id: Option<Uuid>) -> Result<Vec<Subnet>> {
        self.store.list_subnets(network_id)
    }

    /// The subnet with its utilization, computed from its live ports.
    pub fn subnet_usage(&self, id: Uuid) -> Result<SubnetUsage> {
        let subnet = self.store.get_subnet(id)?;
        let ports = self.store.list_ports(Some(id))?;
        let available_ip = compute_ips(&subnet.cidr, ports.iter().map(|p| p.ip.as_str()));
        Ok(SubnetUsage {
            subnet,
            available_ip,
        })
    }

    /// Rename a subnet and/or change its CIDR.
    ///
    /// A CIDR change re-addresses every port of the subnet. It is refused
    /// with [`IpamError::ReallocationInfeasible`] when the new block is too
    /// small, in which case nothing changes.
    pub fn update_subnet(&self, id: Uuid, update: SubnetUpdate) -> Result<Subnet> {
        self.locks.with_locked(&[id], || -> Result<Subnet> {
            let mut subnet = self.store.get_subnet(id)?;
            if let Some(name) = update.name {
                subnet.name = name;
            }

            let requested = match update.cidr {
                Some(cidr) => cidr,
                None => return self.store.update_subnet(subnet),
            };
            if !valid_cidr(&requested) {
                return Err(IpamError::InvalidCidr(requested));
            }

            let ports = self.store.list_ports(Some(id))?;
            match plan_reallocation(&subnet.cidr, &requested, &ports)? {
                None => self.store.update_subnet(subnet),
                Some(plan) => {
                    let old = subnet.cidr;
                    subnet.cidr = plan.cidr;
                    let saved = self.store.apply_reallocation(subnet, &plan.assignments)?;
                    log::info!(
                        "Subnet {id}: CIDR {old} -> {}, {} port(s) re-addressed",
                        saved.cidr,
                        plan.assignments.len()
                    );
                    Ok(saved)
                }
            }
        })
    }

    /// Delete a subnet and its ports.
    pub fn delete_subnet(&self, id: Uuid) -> Result<usize> {
        let affected = self
            .locks
            .with_locked(&[id], || self.store.delete_subnet(id))?;
        log::info!("Deleted subnet {id}, {affected} record(s) removed");
        Ok(affected)
    }

    // ---- ports

    pub fn list_ports(&self, subnet_id: Option<Uuid>) -> Result<Vec<Port>> {
        self.store.list_ports(subnet_id)
    }

    pub fn get_port(&self, id: Uuid) -> Result<Port> {
        self.store.get_port(id)
    }

    /// Create a port holding the lowest free address of `subnet_id`.
    pub fn create_port(&self, name: &str, mac: Option<&str>, subnet_id: Uuid) -> Result<Port> {
        check_mac(mac)?;
        let port = self.locks.with_locked(&[subnet_id], || {
            self.with_fresh_address(subnet_id, |ip| {
                self.store.insert_port(Port::new(name, mac, ip, subnet_id))
            })
        })?;
        log::info!("Created {port} ({}) in subnet {subnet_id}", port.id);
        Ok(port)
    }

    /// Rename a port, change its MAC, or move it to another subnet.
    pub fn update_port(&self, id: Uuid, update: PortUpdate) -> Result<Port> {
        check_mac(update.mac.as_deref())?;
        loop {
            let current = self.store.get_port(id)?;
            let target = update.subnet_id.unwrap_or(current.subnet_id);

            let saved = self
                .locks
                .with_locked(&[current.subnet_id, target], || -> Result<Option<Port>> {
                    let mut port = self.store.get_port(id)?;
                    if port.subnet_id != current.subnet_id {
                        log::debug!("Port {id} moved while waiting for locks, retrying");
                        return Ok(None);
                    }
                    if let Some(name) = &update.name {
                        port.name = name.clone();
                    }
                    if let Some(mac) = &update.mac {
                        port.mac = Some(mac.clone());
                    }
                    if target == port.subnet_id {
                        return self.store.update_port(port).map(Some);
                    }

                    let from = port.subnet_id;
                    let moved = self.with_fresh_address(target, |ip| {
                        let mut candidate = port.clone();
                        candidate.subnet_id = target;
                        candidate.ip = ip.to_string();
                        self.store.update_port(candidate)
                    })?;
                    log::info!("Moved port {id} from subnet {from} to {target} as {}", moved.ip);
                    Ok(Some(moved))
                })?;
            if let Some(port) = saved {
                return Ok(port);
            }
        }
    }

    /// Delete a port; its address becomes free again.
    pub fn delete_port(&self, id: Uuid) -> Result<usize> {
        loop {
            let port = self.store.get_port(id)?;
            let affected = self.locks.with_locked(&[port.subnet_id], || -> Result<Option<usize>> {
                if self.store.get_port(id)?.subnet_id != port.subnet_id {
                    return Ok(None);
                }
                self.store.delete_port(id).map(Some)
            })?;
            if let Some(affected) = affected {
                log::info!("Deleted {port} from subnet {}", port.subnet_id);
                return Ok(affected);
            }
        }
    }

    /// Pick the lowest free address of `subnet_id` and hand it to `write`.
    ///
    /// Occupancy is re-read on every attempt. A write that loses a race to
    /// the same address is retried up to the configured limit. The caller
    /// holds the subnet lock.
    fn with_fresh_address<T>(&self, subnet_id: Uuid, write: impl Fn(&str) -> Result<T>) -> Result<T> {
        let mut attempt = 0;
        loop {
            let subnet = self.store.get_subnet(subnet_id)?;
            let ports = self.store.list_ports(Some(subnet_id))?;
            let occupied = occupied_set(ports.iter().map(|p| p.ip.as_str()));
            let ip = match first_free_host(&subnet.cidr, &occupied) {
                Some(ip) => ip.to_string(),
                None => {
                    log::warn!("Subnet {subnet_id} ({}) has no free address", subnet.cidr);
                    return Err(IpamError::PoolExhausted {
                        subnet: subnet_id.to_string(),
                        cidr: subnet.cidr.to_string(),
                    });
                }
            };

            match write(&ip) {
                Err(e) if e.is_retryable() && attempt < self.max_retries => {
                    attempt += 1;
                    log::warn!(
                        "Allocation of {ip} in subnet {subnet_id} conflicted, retry {attempt}/{}",
                        self.max_retries
                    );
                }
                result => return result,
            }
        }
    }
}

fn check_mac(mac: Option<&str>) -> Result<()> {
    match mac {
        Some(mac) if !valid_mac(mac) => Err(IpamError::InvalidAddress(format!("bad MAC {mac}"))),
        _ => Ok(()),
    }
}
