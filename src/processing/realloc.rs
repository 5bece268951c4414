//! Re-addressing every port of a subnet after its CIDR changes.
//!
//! Planning is pure: it reads the current ports and returns the complete
//! set of new addresses. Applying the plan atomically is the job of the
//! store, under the subnet lock held by the caller.

use super::allocate::allocate_ip_many;
use crate::error::IpamError;
use crate::models::{Ipv4, Port};
use serde::Serialize;
use uuid::Uuid;

/// New address for one port.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    pub port_id: Uuid,
    pub ip: String,
}

/// Accepted CIDR change with the address of every port in the subnet.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct ReallocationPlan {
    pub cidr: Ipv4,
    pub assignments: Vec<Assignment>,
}

/// Ports in re-addressing order: by current address, unparseable addresses
/// last, ties broken by port id.
pub fn reallocation_order(ports: &[Port]) -> Vec<&Port> {
    let mut ordered: Vec<&Port> = ports.iter().collect();
    ordered.sort_by_key(|p| (p.ip_bits().is_none(), p.ip_bits(), p.id));
    ordered
}

/// Plan moving a subnet from `current` to the `requested` CIDR text.
///
/// # Arguments
/// * `current` - The subnet's CIDR as stored
/// * `requested` - The new CIDR as entered
/// * `ports` - Every port of the subnet
///
/// # Returns
/// `Ok(None)` when the CIDR is unchanged, otherwise the new CIDR and one
/// address per port in [`reallocation_order`]. Fails with
/// [`IpamError::InvalidCidr`] for bad text and
/// [`IpamError::ReallocationInfeasible`] when the new block has fewer usable
/// hosts than there are ports.
pub fn plan_reallocation(
    current: &Ipv4,
    requested: &str,
    ports: &[Port],
) -> Result<Option<ReallocationPlan>, IpamError> {
    let cidr = Ipv4::new(requested)?;
    if cidr == *current {
        return Ok(None);
    }

    let usable = cidr.usable_hosts();
    if usable < ports.len() as u64 {
        log::warn!(
            "Rejecting CIDR change {current} -> {cidr}: {} port(s), {usable} usable host(s)",
            ports.len()
        );
        return Err(IpamError::ReallocationInfeasible {
            cidr: cidr.to_string(),
            usable,
            ports: ports.len(),
        });
    }

    let assignments = reallocation_order(ports)
        .into_iter()
        .zip(allocate_ip_many(&cidr, ports.len() as u64))
        .map(|(port, ip)| Assignment {
            port_id: port.id,
            ip,
        })
        .collect();

    log::debug!(
        "Planned CIDR change {current} -> {cidr} for {} port(s)",
        ports.len()
    );
    Ok(Some(ReallocationPlan { cidr, assignments }))
}
