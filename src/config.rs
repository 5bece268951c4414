//! Runtime configuration from the environment.
//!
//! Values come from process environment variables, optionally seeded from a
//! `.env` file by the binary.

/// JSON snapshot holding networks, subnets and ports.
pub const ENV_STATE_FILE: &str = "IPAM_STATE_FILE";
/// log4rs YAML configuration.
pub const ENV_LOG_CONFIG: &str = "IPAM_LOG_CONFIG";
/// Retries after losing an address race.
pub const ENV_ALLOCATION_RETRIES: &str = "IPAM_ALLOCATION_RETRIES";

const DEFAULT_STATE_FILE: &str = "ipam_state.json";
const DEFAULT_LOG_CONFIG: &str = "log4rs.yml";
const DEFAULT_ALLOCATION_RETRIES: u32 = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub state_file: String,
    pub log_config: String,
    pub allocation_retries: u32,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            state_file: DEFAULT_STATE_FILE.to_string(),
            log_config: DEFAULT_LOG_CONFIG.to_string(),
            allocation_retries: DEFAULT_ALLOCATION_RETRIES,
        }
    }
}

impl Config {
    /// Read the configuration from the process environment.
    pub fn from_env() -> Config {
        Config::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read the configuration through `lookup`, defaulting anything unset.
    pub fn from_lookup<F>(lookup: F) -> Config
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();
        let allocation_retries = match lookup(ENV_ALLOCATION_RETRIES) {
            Some(text) => text.trim().parse().unwrap_or_else(|_| {
                log::warn!(
                    "Ignoring {ENV_ALLOCATION_RETRIES}={text:?}, using {}",
                    defaults.allocation_retries
                );
                defaults.allocation_retries
            }),
            None => defaults.allocation_retries,
        };
        Config {
            state_file: lookup(ENV_STATE_FILE).unwrap_or(defaults.state_file),
            log_config: lookup(ENV_LOG_CONFIG).unwrap_or(defaults.log_config),
            allocation_retries,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(|_| None);
        assert_eq!(config, Config::default());
        assert_eq!(config.state_file, "ipam_state.json");
        assert_eq!(config.allocation_retries, 3);
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            (ENV_STATE_FILE, "/var/lib/ipam/state.json"),
            (ENV_ALLOCATION_RETRIES, " 7 "),
        ]);
        let config = Config::from_lookup(|key| env.get(key).map(|v| v.to_string()));
        assert_eq!(config.state_file, "/var/lib/ipam/state.json");
        assert_eq!(config.log_config, "log4rs.yml");
        assert_eq!(config.allocation_retries, 7);
    }

    #[test]
    fn test_bad_retry_count_falls_back() {
        let config = Config::from_lookup(|key| {
            (key == ENV_ALLOCATION_RETRIES).then(|| "many".to_string())
        });
        assert_eq!(config.allocation_retries, 3);
    }
}
