//! Address management logic.
//!
//! This module contains the pure business logic over CIDR blocks:
//! - [`validate`] - CIDR, address and MAC validation
//! - [`allocate`] - single and bulk host address allocation
//! - [`ranges`] - utilization and free range calculation
//! - [`realloc`] - planning a CIDR change for a populated subnet

pub mod allocate;
pub mod ranges;
pub mod realloc;
pub mod validate;

// Re-export public functions
pub use allocate::{allocate_ip, allocate_ip_many, first_free_host, occupied_set, HostSequence};
pub use ranges::{compute_ips, IpRange, RangeInfo};
pub use realloc::{plan_reallocation, reallocation_order, Assignment, ReallocationPlan};
pub use validate::{valid_cidr, valid_ip, valid_mac};
