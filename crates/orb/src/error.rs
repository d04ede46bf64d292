//! Error types for the object request plumbing

use proven_protocol::ParseError;
use thiserror::Error;

/// Result type for invocations and reference handling
pub type Result<T> = std::result::Result<T, OrbError>;

/// Errors raised while reaching or talking to a remote object
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OrbError {
    /// The call could not be delivered or its reply never arrived
    #[error("Object at {endpoint} unreachable: {reason}")]
    Unreachable { endpoint: String, reason: String },

    #[error("Object does not exist: {0}")]
    ObjectNotExist(String),

    /// The remote side failed outside the operation contract
    #[error("Remote system exception: {0}")]
    System(String),

    #[error("Marshal error: {0}")]
    Marshal(String),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ParseError),
}
