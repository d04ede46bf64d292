//! Transaction branch identifier
//!
//! A global transaction id (UUIDv7, time ordered) plus a branch qualifier
//! distinguishing each participant's branch of the same transaction.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identifier of one branch of a distributed transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Xid {
    /// Global transaction id shared by all branches
    gtrid: Uuid,
    /// Branch qualifier, 0 for the root branch
    bqual: u32,
}

impl Xid {
    /// Start a new global transaction (root branch)
    pub fn new() -> Self {
        Self {
            gtrid: Uuid::now_v7(),
            bqual: 0,
        }
    }

    /// Branch of the same global transaction
    pub fn branch(&self, bqual: u32) -> Self {
        Self {
            gtrid: self.gtrid,
            bqual,
        }
    }

    pub fn gtrid(&self) -> &Uuid {
        &self.gtrid
    }

    pub fn bqual(&self) -> u32 {
        self.bqual
    }
}

impl Default for Xid {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for Xid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.gtrid, self.bqual)
    }
}
