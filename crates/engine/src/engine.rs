//! Core mock broker implementation
//!
//! The broker maps subjects to request handlers. A handler is an unbounded
//! channel of `(request, reply_sender)` pairs; whoever holds the receiving end
//! answers requests for that subject.

use crate::{Message, MockEngineError, Result};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

/// A request paired with the channel its reply must be sent on
pub type Request = (Message, oneshot::Sender<Message>);

/// Type alias for request handler channels
type RequestHandler = mpsc::UnboundedSender<Request>;

/// Mock broker that routes requests to registered handlers
pub struct MockEngine {
    /// Request/reply handlers keyed by subject
    request_handlers: Arc<Mutex<HashMap<String, RequestHandler>>>,
}

impl MockEngine {
    /// Create a new mock broker
    pub fn new() -> Self {
        Self {
            request_handlers: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Register a request handler for a subject
    ///
    /// Registering again for the same subject replaces the previous handler.
    pub fn register_handler(&self, subject: &str) -> mpsc::UnboundedReceiver<Request> {
        let (tx, rx) = mpsc::unbounded_channel();

        let mut handlers = self.request_handlers.lock();
        if handlers.insert(subject.to_string(), tx).is_some() {
            tracing::debug!("Replaced request handler for {}", subject);
        }

        rx
    }

    /// Remove the request handler for a subject
    ///
    /// Returns whether a handler was registered.
    pub fn unregister_handler(&self, subject: &str) -> bool {
        self.request_handlers.lock().remove(subject).is_some()
    }

    /// Check whether a live handler is registered for a subject
    pub fn has_handler(&self, subject: &str) -> bool {
        self.request_handlers
            .lock()
            .get(subject)
            .is_some_and(|h| !h.is_closed())
    }

    /// Send a request and wait for reply
    pub async fn request(
        &self,
        subject: &str,
        message: Message,
        timeout: Duration,
    ) -> Result<Message> {
        // Hand the request over without holding the lock across the await
        let reply_rx = {
            let handlers = self.request_handlers.lock();
            let handler = handlers
                .get(subject)
                .ok_or_else(|| MockEngineError::NoSubscribers(subject.to_string()))?;

            let (reply_tx, reply_rx) = oneshot::channel();
            if handler.send((message, reply_tx)).is_err() {
                return Err(MockEngineError::ChannelClosed);
            }
            reply_rx
        };

        match tokio::time::timeout(timeout, reply_rx).await {
            Ok(Ok(reply)) => Ok(reply),
            Ok(Err(_)) => Err(MockEngineError::ChannelClosed),
            Err(_) => Err(MockEngineError::Timeout),
        }
    }
}

impl Default for MockEngine {
    fn default() -> Self {
        Self::new()
    }
}
