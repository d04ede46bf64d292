//! Client handle onto the mock broker
//!
//! Components hold a `MockClient` rather than the engine itself so every
//! request is attributed to a node.

use crate::{Message, MockEngine, Request, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Mock client for interacting with the mock broker
#[derive(Clone)]
pub struct MockClient {
    /// Node ID
    node_id: String,

    /// Reference to the mock broker
    engine: Arc<MockEngine>,
}

impl MockClient {
    /// Create a new mock client
    pub fn new(node_id: String, engine: Arc<MockEngine>) -> Self {
        Self { node_id, engine }
    }

    /// Get the node ID of this client
    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    /// Send a request and wait for a reply
    pub async fn request(
        &self,
        subject: &str,
        message: impl Into<Message>,
        timeout: Duration,
    ) -> Result<Message> {
        self.engine.request(subject, message.into(), timeout).await
    }

    /// Start answering requests addressed to a subject
    pub fn serve(&self, subject: &str) -> RequestStream {
        tracing::debug!("Node {} serving {}", self.node_id, subject);
        RequestStream {
            receiver: self.engine.register_handler(subject),
        }
    }

    /// Stop answering requests addressed to a subject
    pub fn withdraw(&self, subject: &str) -> bool {
        self.engine.unregister_handler(subject)
    }

    /// Check if anyone answers requests for a subject
    pub fn has_responders(&self, subject: &str) -> bool {
        self.engine.has_handler(subject)
    }
}

/// Stream of requests delivered to a served subject
pub struct RequestStream {
    receiver: mpsc::UnboundedReceiver<Request>,
}

impl RequestStream {
    /// Receive the next request
    pub async fn recv(&mut self) -> Option<Request> {
        self.receiver.recv().await
    }
}
