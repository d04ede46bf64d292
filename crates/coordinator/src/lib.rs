//! Distributed transaction coordinator
//!
//! Drives resource participants through two-phase commit. Participants are
//! registered from envelopes, which are decoded and narrowed before the
//! coordinator sends them anything, or registered already narrowed.
//! Each phase fans out to every participant and waits for all answers.

pub mod config;
pub mod coordinator;
pub mod error;
pub mod transaction;

pub use config::CoordinatorConfig;
pub use coordinator::Coordinator;
pub use error::{CoordinatorError, Result};
pub use transaction::{Completion, Outcome, TransactionStatus};
