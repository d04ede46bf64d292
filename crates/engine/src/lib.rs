//! In-memory mock broker for testing remote invocations
//!
//! This crate stands in for the broker that carries object invocations
//! between processes. It only offers what the resource protocol needs:
//! subject-addressed request/reply with a bounded wait.

use thiserror::Error;

pub mod client;
pub mod engine;
pub mod message;

pub use client::{MockClient, RequestStream};
pub use engine::{MockEngine, Request};
pub use message::Message;

/// Mock broker errors
#[derive(Debug, Error)]
pub enum MockEngineError {
    #[error("No subscribers for subject: {0}")]
    NoSubscribers(String),

    #[error("Operation timed out")]
    Timeout,

    #[error("Channel closed")]
    ChannelClosed,
}

pub type Result<T> = std::result::Result<T, MockEngineError>;
