//! Typed reply wrapper for invocations on remote objects

use crate::messages::ParseError;
use proven_engine::Message;
use std::collections::HashMap;

/// Reply status from an object adapter
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyStatus {
    /// Operation returned normally; body holds the result
    Ok,
    /// Operation raised a declared error; body holds it
    UserException,
    /// Adapter or servant failed outside the operation contract
    SystemException { message: String },
    /// No object is registered under the requested key
    ObjectNotExist,
}

impl ReplyStatus {
    fn as_str(&self) -> &'static str {
        match self {
            ReplyStatus::Ok => "ok",
            ReplyStatus::UserException => "user_exception",
            ReplyStatus::SystemException { .. } => "system_exception",
            ReplyStatus::ObjectNotExist => "object_not_exist",
        }
    }
}

/// Typed reply to a `RequestMessage`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyMessage {
    /// Request ID this reply answers
    pub request_id: String,
    /// Reply status
    pub status: ReplyStatus,
    /// Reply body (result or user exception)
    pub body: Vec<u8>,
}

impl ReplyMessage {
    /// Normal return
    pub fn ok(request_id: impl Into<String>, body: Vec<u8>) -> Self {
        Self {
            request_id: request_id.into(),
            status: ReplyStatus::Ok,
            body,
        }
    }

    /// Declared error return
    pub fn user_exception(request_id: impl Into<String>, body: Vec<u8>) -> Self {
        Self {
            request_id: request_id.into(),
            status: ReplyStatus::UserException,
            body,
        }
    }

    /// Failure outside the operation contract
    pub fn system_exception(request_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            status: ReplyStatus::SystemException {
                message: message.into(),
            },
            body: Vec::new(),
        }
    }

    /// Unknown target object
    pub fn object_not_exist(request_id: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            status: ReplyStatus::ObjectNotExist,
            body: Vec::new(),
        }
    }

    /// Convert to a raw Message for sending
    pub fn into_message(self) -> Message {
        let mut headers = HashMap::new();
        headers.insert("request_id".to_string(), self.request_id);
        headers.insert("status".to_string(), self.status.as_str().to_string());

        if let ReplyStatus::SystemException { message } = self.status {
            headers.insert("error".to_string(), message);
        }

        Message::new(self.body, headers)
    }

    /// Parse from a raw Message
    pub fn from_message(msg: Message) -> Result<Self, ParseError> {
        let request_id = msg
            .get_header("request_id")
            .ok_or(ParseError::MissingHeader("request_id"))?
            .to_string();

        let status = match msg.get_header("status") {
            Some("ok") => ReplyStatus::Ok,
            Some("user_exception") => ReplyStatus::UserException,
            Some("system_exception") => ReplyStatus::SystemException {
                message: msg
                    .get_header("error")
                    .unwrap_or("Unknown error")
                    .to_string(),
            },
            Some("object_not_exist") => ReplyStatus::ObjectNotExist,
            Some(other) => return Err(ParseError::InvalidStatus(other.to_string())),
            None => return Err(ParseError::MissingHeader("status")),
        };

        Ok(ReplyMessage {
            request_id,
            status,
            body: msg.body,
        })
    }
}
