//! Error types for resource participants

use crate::state::{HeuristicOutcome, ParticipantState};
use proven_orb::OrbError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ResourceError>;

/// Errors raised by participants and the plumbing that reaches them
///
/// Participant errors cross the wire as JSON user-exception bodies, so the
/// variants carry only plain data.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResourceError {
    /// Reference does not assert the participant capability
    #[error("Reference {reference} does not implement {expected}")]
    CapabilityMismatch { expected: String, reference: String },

    /// Envelope tag and payload disagree or the payload is unreadable
    #[error("Malformed envelope: {0}")]
    MalformedEnvelope(String),

    /// Operation not permitted in the participant's current state
    #[error("{operation} not permitted in state {state}")]
    ProtocolViolation {
        state: ParticipantState,
        operation: String,
    },

    /// Call could not be delivered
    #[error("Participant unreachable: {0}")]
    RemoteUnreachable(String),

    /// Participant completed without being told to
    #[error("Heuristic outcome: {0}")]
    Heuristic(HeuristicOutcome),

    /// One-phase commit refused; nothing was applied
    #[error("One-phase commit failed: {0}")]
    OnePhaseFailed(String),

    #[error("Resource service is disabled")]
    ServiceDisabled,

    #[error("Branch {0} already enlisted")]
    DuplicateBranch(String),

    /// Remote side failed outside the participant contract
    #[error("Remote failure: {0}")]
    Remote(String),

    #[error("Marshal error: {0}")]
    Marshal(String),
}

impl ResourceError {
    /// Whether the caller could not ask, as opposed to being told no
    pub fn is_unreachable(&self) -> bool {
        matches!(self, ResourceError::RemoteUnreachable(_))
    }
}

impl From<OrbError> for ResourceError {
    fn from(err: OrbError) -> Self {
        match err {
            OrbError::Unreachable { endpoint, reason } => {
                ResourceError::RemoteUnreachable(format!("{}: {}", endpoint, reason))
            }
            OrbError::Marshal(msg) => ResourceError::Marshal(msg),
            other => ResourceError::Remote(other.to_string()),
        }
    }
}
