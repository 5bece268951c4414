//! Error types for subnet address management.

use thiserror::Error;

/// Everything that can go wrong while validating, allocating or persisting.
#[derive(Error, Debug)]
pub enum IpamError {
    #[error("Invalid CIDR: {0}")]
    InvalidCidr(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("No addresses available in subnet {subnet} ({cidr})")]
    PoolExhausted { subnet: String, cidr: String },

    #[error("Cannot move {ports} port(s) into {cidr}: only {usable} usable host address(es)")]
    ReallocationInfeasible {
        cidr: String,
        usable: u64,
        ports: usize,
    },

    #[error("Address {ip} is already assigned in subnet {subnet}")]
    AllocationConflict { ip: String, subnet: String },

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error at {path}: {message}")]
    Json { path: String, message: String },
}

impl IpamError {
    /// Only a lost allocation race is worth retrying, against fresh occupancy.
    pub fn is_retryable(&self) -> bool {
        matches!(self, IpamError::AllocationConflict { .. })
    }

    /// True for rejected requests, false for faults of the store itself.
    pub fn is_rejection(&self) -> bool {
        !matches!(self, IpamError::Io(_) | IpamError::Json { .. })
    }

    pub(crate) fn not_found(kind: &'static str, id: impl ToString) -> Self {
        IpamError::NotFound {
            kind,
            id: id.to_string(),
        }
    }
}

impl From<serde_json::Error> for IpamError {
    fn from(e: serde_json::Error) -> Self {
        IpamError::Json {
            path: ".".to_string(),
            message: e.to_string(),
        }
    }
}

impl From<serde_path_to_error::Error<serde_json::Error>> for IpamError {
    fn from(e: serde_path_to_error::Error<serde_json::Error>) -> Self {
        IpamError::Json {
            path: e.path().to_string(),
            message: e.into_inner().to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, IpamError>;
