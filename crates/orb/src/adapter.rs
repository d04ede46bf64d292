//! Object adapter hosting servants behind a broker endpoint
//!
//! The adapter serves one broker subject. Each request names an object key
//! and an operation; the adapter answers the built-in capability query
//! itself and hands every other operation to the servant registered under
//! the key.

use crate::broker::BrokerTransport;
use crate::error::{OrbError, Result};
use crate::object::{Delegate, ObjectRef};
use crate::transport::{Reply, Transport};
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use proven_engine::{Message, MockClient};
use proven_protocol::{IS_A, Ior, OBJECT_ID, ObjectKey, ReplyMessage, RepositoryId, RequestMessage};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Server-side implementation of an exported object
#[async_trait]
pub trait Servant: Send + Sync {
    /// Interfaces this servant implements, most derived first
    fn repository_ids(&self) -> Vec<RepositoryId>;

    /// Execute one operation
    ///
    /// An `Err` is reported to the caller as a system exception.
    async fn dispatch(&self, operation: &str, body: &[u8]) -> Result<Reply>;
}

type ServantMap = Arc<RwLock<HashMap<ObjectKey, Arc<dyn Servant>>>>;

pub struct ObjectAdapter {
    endpoint: String,
    client: MockClient,
    transport: Arc<dyn Transport>,
    servants: ServantMap,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl ObjectAdapter {
    /// Adapter on `endpoint`, references it exports use a broker transport
    pub fn new(client: MockClient, endpoint: impl Into<String>) -> Self {
        let transport = Arc::new(BrokerTransport::new(client.clone()));
        Self::with_transport(client, endpoint, transport)
    }

    pub fn with_transport(
        client: MockClient,
        endpoint: impl Into<String>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            client,
            transport,
            servants: Arc::new(RwLock::new(HashMap::new())),
            task: Mutex::new(None),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    /// Start answering requests, calling it again is a no-op
    pub fn start(&self) {
        let mut task = self.task.lock();
        if task.is_some() {
            return;
        }

        let mut stream = self.client.serve(&self.endpoint);
        let servants = self.servants.clone();
        let endpoint = self.endpoint.clone();

        *task = Some(tokio::spawn(async move {
            while let Some((msg, reply_to)) = stream.recv().await {
                let servants = servants.clone();
                let endpoint = endpoint.clone();
                tokio::spawn(async move {
                    let reply = Self::handle(&servants, &endpoint, msg).await;
                    // Caller may have timed out already
                    let _ = reply_to.send(reply);
                });
            }
            tracing::debug!("Adapter {} stopped serving", endpoint);
        }));

        tracing::info!("Adapter {} started", self.endpoint);
    }

    async fn handle(servants: &ServantMap, endpoint: &str, msg: Message) -> Message {
        let request = match RequestMessage::from_message(msg) {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!("Adapter {} received malformed request: {}", endpoint, e);
                return ReplyMessage::system_exception("", e.to_string()).into_message();
            }
        };

        let servant = servants.read().get(&request.object_key).cloned();
        let Some(servant) = servant else {
            tracing::debug!(
                "Adapter {} has no object {} for {}",
                endpoint,
                request.object_key,
                request.operation
            );
            return ReplyMessage::object_not_exist(request.request_id).into_message();
        };

        if request.operation == IS_A {
            return Self::answer_is_a(servant.as_ref(), request).into_message();
        }

        match servant.dispatch(&request.operation, &request.body).await {
            Ok(Reply::Ok(body)) => ReplyMessage::ok(request.request_id, body),
            Ok(Reply::UserException(body)) => {
                ReplyMessage::user_exception(request.request_id, body)
            }
            Err(e) => {
                tracing::error!(
                    "Servant {} failed {}: {}",
                    request.object_key,
                    request.operation,
                    e
                );
                ReplyMessage::system_exception(request.request_id, e.to_string())
            }
        }
        .into_message()
    }

    fn answer_is_a(servant: &dyn Servant, request: RequestMessage) -> ReplyMessage {
        let id: RepositoryId = match serde_json::from_slice(&request.body) {
            Ok(id) => id,
            Err(e) => {
                return ReplyMessage::system_exception(
                    request.request_id,
                    format!("Bad capability query: {}", e),
                );
            }
        };

        let answer = id.as_str() == OBJECT_ID.as_str() || servant.repository_ids().contains(&id);
        match serde_json::to_vec(&answer) {
            Ok(body) => ReplyMessage::ok(request.request_id, body),
            Err(e) => ReplyMessage::system_exception(request.request_id, e.to_string()),
        }
    }

    /// Register a servant under a fresh key and return its reference
    pub fn activate(&self, servant: Arc<dyn Servant>) -> Result<ObjectRef> {
        let type_id = servant
            .repository_ids()
            .into_iter()
            .next()
            .ok_or_else(|| OrbError::System("Servant implements no interface".to_string()))?;

        let key = ObjectKey::new();
        self.servants.write().insert(key, servant);

        let ior = Ior::new(type_id, self.endpoint.clone(), key);
        tracing::debug!("Activated {}", ior);
        Ok(ObjectRef::remote(Delegate::new(ior, self.transport.clone())))
    }

    /// Remove the servant behind `key`
    pub fn deactivate(&self, key: &ObjectKey) -> bool {
        self.servants.write().remove(key).is_some()
    }

    pub fn active_objects(&self) -> usize {
        self.servants.read().len()
    }

    /// Stop serving and withdraw the endpoint
    pub fn shutdown(&self) {
        if let Some(task) = self.task.lock().take() {
            task.abort();
            self.client.withdraw(&self.endpoint);
            tracing::info!("Adapter {} shut down", self.endpoint);
        }
    }
}

impl Drop for ObjectAdapter {
    fn drop(&mut self) {
        self.shutdown();
    }
}
