//! Typed request wrapper for invocations on remote objects

use crate::ObjectKey;
use proven_engine::Message;
use std::collections::HashMap;

/// Operation name of the built-in capability query
pub const IS_A: &str = "_is_a";

/// Invocation of an operation on an object hosted by an adapter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestMessage {
    /// Target object within the adapter
    pub object_key: ObjectKey,
    /// Operation name
    pub operation: String,
    /// Request ID for matching replies and logs
    pub request_id: String,
    /// Serialized arguments
    pub body: Vec<u8>,
}

impl RequestMessage {
    pub fn new(object_key: ObjectKey, operation: impl Into<String>, body: Vec<u8>) -> Self {
        Self {
            object_key,
            operation: operation.into(),
            request_id: uuid::Uuid::new_v4().to_string(),
            body,
        }
    }

    /// Parse a Message into a typed RequestMessage
    pub fn from_message(msg: Message) -> Result<Self, ParseError> {
        let key_str = msg
            .get_header("object_key")
            .ok_or(ParseError::MissingHeader("object_key"))?;
        let object_key = ObjectKey::parse(key_str)
            .map_err(|_| ParseError::InvalidObjectKey(key_str.to_string()))?;

        let operation = msg
            .get_header("operation")
            .ok_or(ParseError::MissingHeader("operation"))?
            .to_string();

        let request_id = msg
            .get_header("request_id")
            .ok_or(ParseError::MissingHeader("request_id"))?
            .to_string();

        Ok(RequestMessage {
            object_key,
            operation,
            request_id,
            body: msg.body,
        })
    }

    /// Convert to a raw Message for sending
    pub fn into_message(self) -> Message {
        let mut headers = HashMap::new();
        headers.insert("object_key".to_string(), self.object_key.to_string());
        headers.insert("operation".to_string(), self.operation);
        headers.insert("request_id".to_string(), self.request_id);

        Message::new(self.body, headers)
    }
}

/// Errors that can occur when parsing messages
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("Missing required header: {0}")]
    MissingHeader(&'static str),

    #[error("Invalid object key: {0}")]
    InvalidObjectKey(String),

    #[error("Invalid reply status: {0}")]
    InvalidStatus(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_through_message() {
        let request = RequestMessage::new(ObjectKey::new(), "prepare", b"{}".to_vec());
        let parsed = RequestMessage::from_message(request.clone().into_message()).unwrap();
        assert_eq!(parsed, request);
    }

    #[test]
    fn test_missing_headers() {
        let msg = Message::with_body(Vec::new());
        assert_eq!(
            RequestMessage::from_message(msg).unwrap_err(),
            ParseError::MissingHeader("object_key")
        );

        let msg = Message::default().with_header("object_key", ObjectKey::new().to_string());
        assert_eq!(
            RequestMessage::from_message(msg).unwrap_err(),
            ParseError::MissingHeader("operation")
        );
    }

    #[test]
    fn test_invalid_object_key() {
        let msg = Message::default()
            .with_header("object_key", "nope")
            .with_header("operation", "commit")
            .with_header("request_id", "r1");

        assert_eq!(
            RequestMessage::from_message(msg).unwrap_err(),
            ParseError::InvalidObjectKey("nope".to_string())
        );
    }
}
