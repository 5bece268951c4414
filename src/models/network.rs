//! Virtual network data model.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Status given to networks created without one.
pub const DEFAULT_STATUS: &str = "INACTIVE";

fn default_status() -> String {
    DEFAULT_STATUS.to_string()
}

/// A virtual network. Names are unique per availability zone hint.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Network {
    pub id: Uuid,
    pub name: String,
    pub availability_zone_hints: String,
    #[serde(default = "default_status")]
    pub status: String,
}

impl Network {
    /// Create a new inactive network with a fresh id.
    pub fn new(name: &str, availability_zone_hints: &str) -> Network {
        Network {
            id: Uuid::new_v4(),
            name: name.to_string(),
            availability_zone_hints: availability_zone_hints.to_string(),
            status: default_status(),
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Network<{}: {} {}>",
            self.name, self.availability_zone_hints, self.status
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_defaults_when_missing() {
        let json = r#"{"id":"6f1c1b8e-4d0a-4a5e-9f43-0b2f6f7d2a11","name":"core","availability_zone_hints":"az1"}"#;
        let network: Network = serde_json::from_str(json).unwrap();
        assert_eq!(network.status, "INACTIVE");
        assert_eq!(network.to_string(), "Network<core: az1 INACTIVE>");
    }
}
