//! Structural type descriptors and their process-wide cache

use crate::RepositoryId;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// Kind of value a descriptor describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TypeKind {
    /// No value; the tag of an empty envelope
    Null,
    /// Reference to a remote object implementing an interface
    ObjectReference,
}

/// Descriptor of a value type, identified by its repository id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeDescriptor {
    kind: TypeKind,
    id: RepositoryId,
    name: String,
}

const NULL_ID: RepositoryId = RepositoryId::from_static("IDL:omg.org/CORBA/Null:1.0");

impl TypeDescriptor {
    /// Descriptor for an object reference to the given interface
    pub fn interface(id: RepositoryId, name: impl Into<String>) -> Self {
        Self {
            kind: TypeKind::ObjectReference,
            id,
            name: name.into(),
        }
    }

    /// Descriptor for the absence of a value
    pub fn null() -> Self {
        Self {
            kind: TypeKind::Null,
            id: NULL_ID,
            name: String::new(),
        }
    }

    pub fn kind(&self) -> TypeKind {
        self.kind
    }

    pub fn id(&self) -> &RepositoryId {
        &self.id
    }

    /// Human-readable interface name
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Compute-once slot for a descriptor shared by the whole process
///
/// Concurrent first callers race to `get_or_init`; exactly one initializer
/// runs and every caller observes the same instance. Reads after that are
/// lock-free.
pub struct DescriptorCell {
    cell: OnceLock<TypeDescriptor>,
}

impl DescriptorCell {
    pub const fn new() -> Self {
        Self {
            cell: OnceLock::new(),
        }
    }

    /// Return the cached descriptor, building it on first use
    pub fn get_or_init(&self, init: impl FnOnce() -> TypeDescriptor) -> &TypeDescriptor {
        self.cell.get_or_init(init)
    }

    /// Return the descriptor if it has been built
    pub fn get(&self) -> Option<&TypeDescriptor> {
        self.cell.get()
    }
}

impl Default for DescriptorCell {
    fn default() -> Self {
        Self::new()
    }
}
