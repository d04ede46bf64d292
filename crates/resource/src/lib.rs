//! Transactional resource participants
//!
//! A participant is reached through an opaque object reference. Before a
//! coordinator drives it through two-phase commit the reference is decoded
//! from its envelope and narrowed: nil stays nil, in-process participants
//! are used directly, and anything else must affirm the `OTSResource`
//! capability before a proxy is bound to it.
//!
//! - `helper`: repository id, descriptor, codec, narrowing, envelopes
//! - `servant`: the per-branch protocol state machine
//! - `stub`: proxies for remote and co-located participants
//! - `service`: hosting branches on a node

pub mod error;
pub mod helper;
pub mod manager;
pub mod participant;
pub mod servant;
pub mod service;
pub mod state;
pub mod stub;

pub use error::{ResourceError, Result};
pub use manager::{Fault, MemoryResource, MemoryStore, ResourceManager};
pub use participant::{OtsResource, Participant};
pub use servant::ResourceServant;
pub use service::ResourceService;
pub use state::{HeuristicDecision, HeuristicOutcome, ParticipantState, Transition, Vote};
pub use stub::{ColocatedResource, ResourceStub};
