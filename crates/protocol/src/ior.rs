//! Delegate-level representation of an object reference
//!
//! An `Ior` is everything a transport needs to route a call to a remote
//! object: the broker endpoint hosting it and the key it is registered under.
//! The type id is the most-derived interface the object was exported with;
//! it is informational only and never replaces a capability query.

use crate::RepositoryId;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Key of an object within its hosting endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectKey(Uuid);

impl ObjectKey {
    /// Generate a fresh random key
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse from string representation
    pub fn parse(s: &str) -> Result<Self, String> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| format!("Invalid object key: {}", e))
    }
}

impl Default for ObjectKey {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Interoperable object reference
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Ior {
    /// Interface the object was exported as
    pub type_id: RepositoryId,
    /// Broker subject of the hosting object adapter
    pub endpoint: String,
    /// Key of the object within the adapter
    pub object_key: ObjectKey,
}

impl Ior {
    pub fn new(type_id: RepositoryId, endpoint: impl Into<String>, object_key: ObjectKey) -> Self {
        Self {
            type_id,
            endpoint: endpoint.into(),
            object_key,
        }
    }

    /// Whether both references address the same remote object
    ///
    /// The advertised type id does not take part in identity.
    pub fn same_object(&self, other: &Ior) -> bool {
        self.endpoint == other.endpoint && self.object_key == other.object_key
    }
}

impl fmt::Display for Ior {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}/{}", self.type_id, self.endpoint, self.object_key)
    }
}
