//! Transport over the message broker

use crate::error::{OrbError, Result};
use crate::transport::{Reply, Transport};
use async_trait::async_trait;
use proven_engine::MockClient;
use proven_protocol::{Ior, ReplyMessage, ReplyStatus, RequestMessage};
use std::time::Duration;

/// Default time to wait for an object adapter to answer
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Sends invocations as broker requests to the adapter's endpoint subject
#[derive(Clone)]
pub struct BrokerTransport {
    client: MockClient,
    timeout: Duration,
}

impl BrokerTransport {
    pub fn new(client: MockClient) -> Self {
        Self {
            client,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn client(&self) -> &MockClient {
        &self.client
    }
}

#[async_trait]
impl Transport for BrokerTransport {
    async fn invoke(&self, ior: &Ior, operation: &str, body: Vec<u8>) -> Result<Reply> {
        let request = RequestMessage::new(ior.object_key, operation, body);
        let request_id = request.request_id.clone();

        tracing::trace!(
            "Node {} invoking {} on {} ({})",
            self.client.node_id(),
            operation,
            ior,
            request_id
        );

        let msg = self
            .client
            .request(&ior.endpoint, request.into_message(), self.timeout)
            .await
            .map_err(|e| OrbError::Unreachable {
                endpoint: ior.endpoint.clone(),
                reason: e.to_string(),
            })?;

        let reply = ReplyMessage::from_message(msg)?;
        if reply.request_id != request_id {
            return Err(OrbError::System(format!(
                "Reply for {} answered request {}",
                request_id, reply.request_id
            )));
        }

        match reply.status {
            ReplyStatus::Ok => Ok(Reply::Ok(reply.body)),
            ReplyStatus::UserException => Ok(Reply::UserException(reply.body)),
            ReplyStatus::SystemException { message } => Err(OrbError::System(message)),
            ReplyStatus::ObjectNotExist => Err(OrbError::ObjectNotExist(ior.to_string())),
        }
    }
}
