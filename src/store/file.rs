//! JSON snapshot of the whole topology.
//!
//! The binary keeps its state in a single file between runs.

use super::MemoryStore;
use crate::error::{IpamError, Result};
use crate::models::{Network, Port, Subnet};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Every record of a store, as written to disk.
#[derive(Serialize, Deserialize, Debug, Default, Clone)]
pub struct Topology {
    /// When the snapshot was written.
    #[serde(default)]
    pub saved_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub networks: Vec<Network>,
    #[serde(default)]
    pub subnets: Vec<Subnet>,
    #[serde(default)]
    pub ports: Vec<Port>,
}

/// Parse snapshot JSON, naming the failing path on error.
pub fn parse_topology(json: &str) -> Result<Topology> {
    let mut deserializer = serde_json::Deserializer::from_str(json);
    let topology: Topology = serde_path_to_error::deserialize(&mut deserializer)?;
    Ok(topology)
}

/// Load a store from `state_file`.
///
/// A missing file gives an empty store. Malformed JSON or records that break
/// a constraint are errors.
pub fn load_topology(state_file: &str) -> Result<MemoryStore> {
    if !Path::new(state_file).exists() {
        log::warn!("State file not found: {state_file}, starting with an empty topology");
        return Ok(MemoryStore::new());
    }

    log::info!("Reading from state file: {state_file}");
    let json = std::fs::read_to_string(state_file)?;
    let topology = parse_topology(&json).map_err(|e| {
        log::error!("Error parsing state file {state_file}: {e}");
        e
    })?;
    log::info!(
        "Loaded {} network(s), {} subnet(s), {} port(s) saved at {}",
        topology.networks.len(),
        topology.subnets.len(),
        topology.ports.len(),
        topology
            .saved_at
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| "unknown".to_string())
    );
    MemoryStore::from_topology(topology)
}

/// Write every record of `store` to `state_file`, stamped with the current time.
pub fn save_topology(store: &MemoryStore, state_file: &str) -> Result<()> {
    let topology = Topology {
        saved_at: Some(Utc::now()),
        ..store.snapshot()
    };
    let json = serde_json::to_string_pretty(&topology)?;
    log::info!("Writing state file: {state_file}");
    std::fs::write(state_file, json).map_err(|e| {
        log::error!("Error writing state file {state_file}: {e}");
        IpamError::Io(e)
    })
}
