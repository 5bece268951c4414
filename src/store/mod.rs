//! Persistence collaborator for networks, subnets and ports.
//!
//! - [`TopologyStore`] - the operations the address logic needs from storage
//! - [`MemoryStore`] - in-memory store enforcing the uniqueness constraints
//! - [`file`] - JSON snapshot loading and saving

pub mod file;
mod memory;

pub use file::{load_topology, save_topology, Topology};
pub use memory::MemoryStore;

use crate::error::Result;
use crate::models::{Network, Port, Subnet};
use crate::processing::Assignment;
use uuid::Uuid;

/// Synchronous record store shared between request workers.
///
/// Implementations enforce the record constraints:
/// - network `(availability_zone_hints, name)` is unique
/// - subnet CIDRs of one network do not overlap
/// - port `(ip, subnet_id)` is unique, reported as
///   [`crate::IpamError::AllocationConflict`]
/// - a port address is a host address of its subnet
///
/// Deletes cascade and return the number of records removed.
pub trait TopologyStore: Send + Sync {
    fn insert_network(&self, network: Network) -> Result<Network>;
    fn get_network(&self, id: Uuid) -> Result<Network>;
    fn list_networks(&self) -> Result<Vec<Network>>;
    fn update_network(&self, network: Network) -> Result<Network>;
    fn delete_network(&self, id: Uuid) -> Result<usize>;

    fn insert_subnet(&self, subnet: Subnet) -> Result<Subnet>;
    fn get_subnet(&self, id: Uuid) -> Result<Subnet>;
    fn list_subnets(&self, network_id: Option<Uuid>) -> Result<Vec<Subnet>>;
    /// Rename or re-home a subnet. A CIDR change is refused while the subnet
    /// has ports; use [`TopologyStore::apply_reallocation`] for that.
    fn update_subnet(&self, subnet: Subnet) -> Result<Subnet>;
    fn delete_subnet(&self, id: Uuid) -> Result<usize>;

    fn insert_port(&self, port: Port) -> Result<Port>;
    fn get_port(&self, id: Uuid) -> Result<Port>;
    fn list_ports(&self, subnet_id: Option<Uuid>) -> Result<Vec<Port>>;
    fn update_port(&self, port: Port) -> Result<Port>;
    fn delete_port(&self, id: Uuid) -> Result<usize>;

    /// Write `subnet` (with its new CIDR) and the address of every one of its
    /// ports as a single unit. Either everything is written or nothing is.
    fn apply_reallocation(&self, subnet: Subnet, assignments: &[Assignment]) -> Result<Subnet>;
}
