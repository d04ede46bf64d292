//! Transport seam between references and the wire

use crate::error::{OrbError, Result};
use async_trait::async_trait;
use proven_protocol::{IS_A, Ior, RepositoryId};

/// Outcome of an invocation that reached the target object
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Normal return with the encoded result
    Ok(Vec<u8>),
    /// Declared error with the encoded exception
    UserException(Vec<u8>),
}

/// Delivers invocations to the object an `Ior` designates
///
/// Every call is a blocking round trip from the caller's point of view.
/// Delivery failures surface as `OrbError::Unreachable` so callers can tell
/// "could not ask" apart from any answer the object gave.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Invoke `operation` with encoded arguments
    async fn invoke(&self, ior: &Ior, operation: &str, body: Vec<u8>) -> Result<Reply>;

    /// Ask the object whether it implements the interface `id`
    ///
    /// Sends no operation of the interface itself.
    async fn is_a(&self, ior: &Ior, id: &RepositoryId) -> Result<bool> {
        let body = serde_json::to_vec(id).map_err(|e| OrbError::Marshal(e.to_string()))?;

        match self.invoke(ior, IS_A, body).await? {
            Reply::Ok(body) => {
                serde_json::from_slice(&body).map_err(|e| OrbError::Marshal(e.to_string()))
            }
            Reply::UserException(_) => Err(OrbError::System(format!(
                "Capability query on {} raised a user exception",
                ior
            ))),
        }
    }
}
