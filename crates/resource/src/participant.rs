//! The two-phase-commit participant capability

use crate::error::Result;
use crate::state::Vote;
use async_trait::async_trait;
use proven_orb::ObjectRef;
use std::sync::Arc;

pub const PREPARE: &str = "prepare";
pub const COMMIT: &str = "commit";
pub const ROLLBACK: &str = "rollback";
pub const COMMIT_ONE_PHASE: &str = "commit_one_phase";
pub const FORGET: &str = "forget";

/// A participant in one transaction branch
///
/// Implemented by remote proxies and by co-located participants alike.
/// Every operation is a blocking call from the coordinator's point of view.
#[async_trait]
pub trait OtsResource: Send + Sync {
    /// Reference to this participant
    ///
    /// The reference carries this very object, so narrowing it again hands
    /// it back without a capability query.
    fn this(self: Arc<Self>) -> ObjectRef;

    async fn prepare(&self) -> Result<Vote>;

    async fn commit(&self) -> Result<()>;

    async fn rollback(&self) -> Result<()>;

    /// Prepare and commit atomically; only valid for a sole participant
    async fn commit_one_phase(&self) -> Result<()>;

    async fn forget(&self) -> Result<()>;
}

pub type Participant = Arc<dyn OtsResource>;
