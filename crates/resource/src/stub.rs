//! Client-side participant proxies

use crate::error::{ResourceError, Result};
use crate::participant::{
    COMMIT, COMMIT_ONE_PHASE, FORGET, OtsResource, PREPARE, Participant, ROLLBACK,
};
use crate::servant::ResourceServant;
use crate::state::Vote;
use async_trait::async_trait;
use proven_orb::{Delegate, ObjectRef, Reply};
use std::sync::Arc;

/// Proxy forwarding every operation through a delegate
///
/// Carries no branch state; the servant behind the delegate owns it.
#[derive(Debug, Clone)]
pub struct ResourceStub {
    delegate: Delegate,
}

impl ResourceStub {
    /// Bind a proxy to `delegate`
    pub fn new(delegate: Delegate) -> Self {
        Self { delegate }
    }

    pub fn delegate(&self) -> &Delegate {
        &self.delegate
    }

    async fn call(&self, operation: &str) -> Result<Vec<u8>> {
        match self.delegate.invoke(operation, Vec::new()).await {
            Ok(Reply::Ok(body)) => Ok(body),
            Ok(Reply::UserException(body)) => {
                let err: ResourceError = serde_json::from_slice(&body)
                    .map_err(|e| ResourceError::Marshal(e.to_string()))?;
                Err(err)
            }
            Err(e) => {
                let err = ResourceError::from(e);
                if err.is_unreachable() {
                    tracing::warn!(
                        "{} on {} not delivered: {}",
                        operation,
                        self.delegate.ior(),
                        err
                    );
                }
                Err(err)
            }
        }
    }
}

#[async_trait]
impl OtsResource for ResourceStub {
    fn this(self: Arc<Self>) -> ObjectRef {
        let delegate = self.delegate.clone();
        ObjectRef::local(delegate, self as Participant)
    }

    async fn prepare(&self) -> Result<Vote> {
        let body = self.call(PREPARE).await?;
        serde_json::from_slice(&body).map_err(|e| ResourceError::Marshal(e.to_string()))
    }

    async fn commit(&self) -> Result<()> {
        self.call(COMMIT).await.map(drop)
    }

    async fn rollback(&self) -> Result<()> {
        self.call(ROLLBACK).await.map(drop)
    }

    async fn commit_one_phase(&self) -> Result<()> {
        self.call(COMMIT_ONE_PHASE).await.map(drop)
    }

    async fn forget(&self) -> Result<()> {
        self.call(FORGET).await.map(drop)
    }
}

/// Participant whose servant lives in this process
///
/// Calls go straight to the servant. The delegate is kept so the
/// participant can still be written into an envelope for another process.
pub struct ColocatedResource {
    delegate: Delegate,
    servant: Arc<ResourceServant>,
}

impl ColocatedResource {
    pub fn new(delegate: Delegate, servant: Arc<ResourceServant>) -> Self {
        Self { delegate, servant }
    }

    pub fn servant(&self) -> &Arc<ResourceServant> {
        &self.servant
    }
}

#[async_trait]
impl OtsResource for ColocatedResource {
    fn this(self: Arc<Self>) -> ObjectRef {
        let delegate = self.delegate.clone();
        ObjectRef::local(delegate, self as Participant)
    }

    async fn prepare(&self) -> Result<Vote> {
        self.servant.prepare()
    }

    async fn commit(&self) -> Result<()> {
        self.servant.commit()
    }

    async fn rollback(&self) -> Result<()> {
        self.servant.rollback()
    }

    async fn commit_one_phase(&self) -> Result<()> {
        self.servant.commit_one_phase()
    }

    async fn forget(&self) -> Result<()> {
        self.servant.forget()
    }
}
