//! Protocol definitions for remote transactional resources
//!
//! This crate defines the values that cross process boundaries when a
//! coordinator drives a remote participant: interface identity
//! (`RepositoryId`, `TypeDescriptor`), object references (`Ior`), the tagged
//! any-value container (`Envelope`), transaction branch ids (`Xid`), and
//! typed wrappers around the broker's generic `Message` for requests and
//! replies.

pub mod descriptor;
pub mod envelope;
pub mod ior;
pub mod messages;
pub mod repository;
pub mod responses;
pub mod xid;

pub use descriptor::{DescriptorCell, TypeDescriptor, TypeKind};
pub use envelope::{Envelope, EnvelopeError};
pub use ior::{Ior, ObjectKey};
pub use messages::{IS_A, ParseError, RequestMessage};
pub use repository::{OBJECT_ID, RepositoryId, RepositoryIdError};
pub use responses::{ReplyMessage, ReplyStatus};
pub use xid::Xid;
