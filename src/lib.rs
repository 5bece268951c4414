//! Address management for virtual networks.
//!
//! Networks own subnets, subnets own ports, and every port holds one host
//! address of its subnet's CIDR block. The crate is split into:
//! - [`models`] - records and the [`models::Ipv4`] CIDR type
//! - [`processing`] - validation, allocation, utilization and reallocation
//! - [`store`] - the persistence collaborator and its in-memory implementation
//! - [`service`] - the per-subnet locking coordinator
//! - [`output`] - utilization report

pub mod cli;
pub mod config;
pub mod error;
pub mod models;
pub mod output;
pub mod processing;
pub mod service;
pub mod store;

pub use config::Config;
pub use error::IpamError;
pub use processing::{
    allocate_ip, allocate_ip_many, compute_ips, plan_reallocation, valid_cidr, valid_ip,
};
pub use service::{Ipam, NetworkUpdate, PortUpdate, SubnetUpdate, SubnetUsage};
pub use store::{MemoryStore, TopologyStore};
