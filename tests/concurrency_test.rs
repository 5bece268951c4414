//! Concurrent allocation against a single subnet.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use subnet_ipam::{
    allocate_ip, models::Network, models::Port, models::Subnet, processing::Assignment,
    Config, Ipam, IpamError, MemoryStore, SubnetUpdate, TopologyStore,
};
use uuid::Uuid;

fn ipam_with_subnet(cidr: &str) -> (Arc<Ipam<MemoryStore>>, Uuid) {
    let ipam = Ipam::new(MemoryStore::new(), &Config::default());
    let network = ipam.create_network("net", "az1").unwrap();
    let subnet = ipam.create_subnet("sub", cidr, network.id).unwrap();
    (Arc::new(ipam), subnet.id)
}

#[test]
fn test_serialized_allocation_has_no_duplicates() {
    // /27 has exactly 30 hosts
    let (ipam, subnet_id) = ipam_with_subnet("10.1.0.0/27");
    let workers = 30;
    let barrier = Arc::new(Barrier::new(workers));

    let handles: Vec<_> = (0..workers)
        .map(|i| {
            let ipam = Arc::clone(&ipam);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                ipam.create_port(&format!("w{i}"), None, subnet_id)
            })
        })
        .collect();

    let ips: Vec<String> = handles
        .into_iter()
        .map(|h| h.join().unwrap().expect("every worker gets an address").ip)
        .collect();
    let distinct: HashSet<&String> = ips.iter().collect();
    assert_eq!(distinct.len(), workers);

    assert!(matches!(
        ipam.create_port("one-too-many", None, subnet_id),
        Err(IpamError::PoolExhausted { .. })
    ));
}

#[test]
fn test_unserialized_snapshots_race_to_same_address() {
    // Without the subnet lock, workers that read occupancy before anyone
    // writes all pick the same address.
    let (ipam, subnet_id) = ipam_with_subnet("10.2.0.0/27");
    let workers = 8;
    let barrier = Arc::new(Barrier::new(workers));

    let handles: Vec<_> = (0..workers)
        .map(|i| {
            let ipam = Arc::clone(&ipam);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let store = ipam.store();
                let subnet = store.get_subnet(subnet_id).unwrap();
                let occupied: Vec<String> = store
                    .list_ports(Some(subnet_id))
                    .unwrap()
                    .into_iter()
                    .map(|p| p.ip)
                    .collect();
                barrier.wait();
                let ip = allocate_ip(&subnet.cidr, &occupied);
                let written = store.insert_port(Port::new(&format!("w{i}"), None, &ip, subnet_id));
                (ip, written)
            })
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let picked: HashSet<&str> = results.iter().map(|(ip, _)| ip.as_str()).collect();
    assert_eq!(picked.len(), 1, "all workers chose the same address");

    // the uniqueness constraint lets exactly one of them through
    let won = results.iter().filter(|(_, w)| w.is_ok()).count();
    assert_eq!(won, 1);
    for (_, written) in &results {
        if let Err(e) = written {
            assert!(e.is_retryable(), "loser should see a conflict: {e}");
        }
    }
}

#[test]
fn test_reallocation_excludes_concurrent_creates() {
    let (ipam, subnet_id) = ipam_with_subnet("10.3.0.0/28");
    for i in 0..6 {
        ipam.create_port(&format!("p{i}"), None, subnet_id).unwrap();
    }
    let barrier = Arc::new(Barrier::new(2));

    let creator = {
        let ipam = Arc::clone(&ipam);
        let barrier = Arc::clone(&barrier);
        thread::spawn(move || {
            barrier.wait();
            (0..4)
                .map(|i| ipam.create_port(&format!("late{i}"), None, subnet_id))
                .collect::<Vec<_>>()
        })
    };
    let resizer = {
        let ipam = Arc::clone(&ipam);
        let barrier = Arc::clone(&barrier);
        thread::spawn(move || {
            barrier.wait();
            let update = SubnetUpdate {
                cidr: Some("10.4.0.0/27".to_string()),
                ..Default::default()
            };
            ipam.update_subnet(subnet_id, update)
        })
    };

    let created = creator.join().unwrap();
    resizer.join().unwrap().expect("reallocation fits");
    assert!(created.iter().all(|r| r.is_ok()));

    // whatever the interleaving, every port ends up inside the final block
    let subnet = ipam.store().get_subnet(subnet_id).unwrap();
    assert_eq!(subnet.cidr.to_string(), "10.4.0.0/27");
    let ports = ipam.list_ports(Some(subnet_id)).unwrap();
    assert_eq!(ports.len(), 10);
    let distinct: HashSet<&str> = ports.iter().map(|p| p.ip.as_str()).collect();
    assert_eq!(distinct.len(), 10);
    for p in &ports {
        assert!(subnet.cidr.is_host(p.ip.parse().unwrap()), "{p} escaped {}", subnet.cidr);
    }
}

/// Store that lets another writer take the chosen address once, as if a
/// second coordinator raced this one.
struct RacingStore {
    inner: MemoryStore,
    raced: AtomicBool,
}

impl TopologyStore for RacingStore {
    fn insert_network(&self, network: Network) -> subnet_ipam::error::Result<Network> {
        self.inner.insert_network(network)
    }
    fn get_network(&self, id: Uuid) -> subnet_ipam::error::Result<Network> {
        self.inner.get_network(id)
    }
    fn list_networks(&self) -> subnet_ipam::error::Result<Vec<Network>> {
        self.inner.list_networks()
    }
    fn update_network(&self, network: Network) -> subnet_ipam::error::Result<Network> {
        self.inner.update_network(network)
    }
    fn delete_network(&self, id: Uuid) -> subnet_ipam::error::Result<usize> {
        self.inner.delete_network(id)
    }
    fn insert_subnet(&self, subnet: Subnet) -> subnet_ipam::error::Result<Subnet> {
        self.inner.insert_subnet(subnet)
    }
    fn get_subnet(&self, id: Uuid) -> subnet_ipam::error::Result<Subnet> {
        self.inner.get_subnet(id)
    }
    fn list_subnets(&self, network_id: Option<Uuid>) -> subnet_ipam::error::Result<Vec<Subnet>> {
        self.inner.list_subnets(network_id)
    }
    fn update_subnet(&self, subnet: Subnet) -> subnet_ipam::error::Result<Subnet> {
        self.inner.update_subnet(subnet)
    }
    fn delete_subnet(&self, id: Uuid) -> subnet_ipam::error::Result<usize> {
        self.inner.delete_subnet(id)
    }
    fn insert_port(&self, port: Port) -> subnet_ipam::error::Result<Port> {
        if !self.raced.swap(true, Ordering::SeqCst) {
            let squatter = Port::new("squatter", None, &port.ip, port.subnet_id);
            self.inner.insert_port(squatter)?;
        }
        self.inner.insert_port(port)
    }
    fn get_port(&self, id: Uuid) -> subnet_ipam::error::Result<Port> {
        self.inner.get_port(id)
    }
    fn list_ports(&self, subnet_id: Option<Uuid>) -> subnet_ipam::error::Result<Vec<Port>> {
        self.inner.list_ports(subnet_id)
    }
    fn update_port(&self, port: Port) -> subnet_ipam::error::Result<Port> {
        self.inner.update_port(port)
    }
    fn delete_port(&self, id: Uuid) -> subnet_ipam::error::Result<usize> {
        self.inner.delete_port(id)
    }
    fn apply_reallocation(
        &self,
        subnet: Subnet,
        assignments: &[Assignment],
    ) -> subnet_ipam::error::Result<Subnet> {
        self.inner.apply_reallocation(subnet, assignments)
    }
}

#[test]
fn test_lost_race_is_retried_against_fresh_occupancy() {
    let store = RacingStore {
        inner: MemoryStore::new(),
        raced: AtomicBool::new(false),
    };
    let ipam = Ipam::new(store, &Config::default());
    let network = ipam.create_network("net", "az1").unwrap();
    let subnet = ipam.create_subnet("sub", "10.5.0.0/29", network.id).unwrap();

    let port = ipam.create_port("mine", None, subnet.id).unwrap();
    assert_eq!(port.ip, "10.5.0.2", "10.5.0.1 went to the squatter");
    assert_eq!(ipam.list_ports(Some(subnet.id)).unwrap().len(), 2);
}

#[test]
fn test_retries_can_be_disabled() {
    let store = RacingStore {
        inner: MemoryStore::new(),
        raced: AtomicBool::new(false),
    };
    let config = Config {
        allocation_retries: 0,
        ..Config::default()
    };
    let ipam = Ipam::new(store, &config);
    let network = ipam.create_network("net", "az1").unwrap();
    let subnet = ipam.create_subnet("sub", "10.5.0.0/29", network.id).unwrap();

    let err = ipam.create_port("mine", None, subnet.id).unwrap_err();
    assert!(matches!(err, IpamError::AllocationConflict { .. }));
}
