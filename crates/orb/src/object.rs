//! Object references and the delegates that bind them to a transport

use crate::error::Result;
use crate::transport::{Reply, Transport};
use proven_protocol::{Ior, RepositoryId};
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Transport binding inside a reference
///
/// Proxies route every call through their delegate. Rebinding a reference to
/// a new proxy means cloning its delegate, never copying the remote object.
#[derive(Clone)]
pub struct Delegate {
    ior: Ior,
    transport: Arc<dyn Transport>,
}

impl Delegate {
    pub fn new(ior: Ior, transport: Arc<dyn Transport>) -> Self {
        Self { ior, transport }
    }

    pub fn ior(&self) -> &Ior {
        &self.ior
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    /// Capability query against the remote object
    pub async fn is_a(&self, id: &RepositoryId) -> Result<bool> {
        self.transport.is_a(&self.ior, id).await
    }

    /// Synchronous remote invocation
    pub async fn invoke(&self, operation: &str, body: Vec<u8>) -> Result<Reply> {
        self.transport.invoke(&self.ior, operation, body).await
    }
}

impl fmt::Debug for Delegate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Delegate")
            .field("ior", &self.ior)
            .finish_non_exhaustive()
    }
}

/// Opaque handle to an object, possibly hosted in another process
///
/// Absence of an object is modelled as `Option<ObjectRef>`, never as a
/// special reference value.
#[derive(Clone)]
pub struct ObjectRef {
    delegate: Delegate,
    /// In-process object behind this reference, if any
    local: Option<Arc<dyn Any + Send + Sync>>,
}

impl ObjectRef {
    /// Reference reachable only through its delegate
    pub fn remote(delegate: Delegate) -> Self {
        Self {
            delegate,
            local: None,
        }
    }

    /// Reference to an object living in this process
    ///
    /// The delegate is still required so the reference can be marshaled.
    pub fn local<T: Any + Send + Sync>(delegate: Delegate, object: T) -> Self {
        Self {
            delegate,
            local: Some(Arc::new(object)),
        }
    }

    pub fn delegate(&self) -> &Delegate {
        &self.delegate
    }

    pub fn ior(&self) -> &Ior {
        &self.delegate.ior
    }

    pub fn is_local(&self) -> bool {
        self.local.is_some()
    }

    /// The in-process object, if it has type `T`
    pub fn downcast_local<T: Any + Clone>(&self) -> Option<T> {
        self.local.as_ref()?.downcast_ref::<T>().cloned()
    }

    /// Whether both references designate the same remote object
    pub fn is_equivalent(&self, other: &ObjectRef) -> bool {
        self.ior().same_object(other.ior())
    }
}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectRef")
            .field("ior", self.ior())
            .field("local", &self.is_local())
            .finish()
    }
}
