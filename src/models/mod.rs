//! Domain models for subnet address management.
//!
//! This module contains the core data structures used throughout the crate:
//! - [`Ipv4`] - IPv4 network in CIDR notation
//! - [`Network`] - a virtual network grouping subnets
//! - [`Subnet`] - an address block owned by a network
//! - [`Port`] - an attachment holding one address of its subnet

mod ipv4;
mod network;
mod port;
mod subnet;

// Re-export public types
pub use ipv4::Ipv4;
pub use network::Network;
pub use port::Port;
pub use subnet::Subnet;
