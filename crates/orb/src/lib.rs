//! Object request plumbing
//!
//! References (`ObjectRef`) route calls through a `Delegate` bound to a
//! `Transport`. The broker transport sends each invocation as a request to
//! the endpoint subject of an `ObjectAdapter`, which dispatches it to the
//! registered `Servant`. The reference codec in `stream` moves references
//! across process boundaries.

pub mod adapter;
pub mod broker;
pub mod error;
pub mod object;
pub mod stream;
pub mod transport;

pub use adapter::{ObjectAdapter, Servant};
pub use broker::{BrokerTransport, DEFAULT_TIMEOUT};
pub use error::{OrbError, Result};
pub use object::{Delegate, ObjectRef};
pub use stream::{InputStream, OutputStream};
pub use transport::{Reply, Transport};
