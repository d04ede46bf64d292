//! Error types for the coordinator

use proven_resource::ResourceError;
use thiserror::Error;

/// Coordinator error types
#[derive(Error, Debug)]
pub enum CoordinatorError {
    #[error("Transaction not found: {0}")]
    TransactionNotFound(String),

    #[error("Invalid transaction state: {0}")]
    InvalidState(String),

    /// Reference could not be turned into a participant
    #[error("Enlistment failed: {0}")]
    Enlistment(#[from] ResourceError),
}

/// Result type for coordinator operations
pub type Result<T> = std::result::Result<T, CoordinatorError>;
