//! Reference codec
//!
//! Object references travel as a CBOR record carrying the interface they
//! were written as and, unless the reference is nil, the `Ior` that locates
//! the object. Reading binds a plain remote reference to the stream's
//! transport; narrowing to a concrete interface is left to the caller.

use crate::error::{OrbError, Result};
use crate::object::{Delegate, ObjectRef};
use crate::transport::Transport;
use proven_protocol::{Ior, RepositoryId};
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use std::sync::Arc;

#[derive(Debug, Serialize, Deserialize)]
struct ObjectRecord {
    interface: RepositoryId,
    ior: Option<Ior>,
}

/// Write side of the reference codec
#[derive(Debug, Default)]
pub struct OutputStream {
    buf: Vec<u8>,
}

impl OutputStream {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one reference, `None` writes the nil record
    pub fn write_object(
        &mut self,
        interface: &RepositoryId,
        object: Option<&ObjectRef>,
    ) -> Result<()> {
        let record = ObjectRecord {
            interface: interface.clone(),
            ior: object.map(|o| o.ior().clone()),
        };

        ciborium::into_writer(&record, &mut self.buf)
            .map_err(|e| OrbError::Marshal(format!("Failed to write reference: {}", e)))
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

/// Read side of the reference codec
pub struct InputStream {
    cursor: Cursor<Vec<u8>>,
    transport: Arc<dyn Transport>,
}

impl InputStream {
    /// References read from `bytes` are bound to `transport`
    pub fn new(bytes: Vec<u8>, transport: Arc<dyn Transport>) -> Self {
        Self {
            cursor: Cursor::new(bytes),
            transport,
        }
    }

    /// Read the next reference with the interface it was written as
    pub fn read_object(&mut self) -> Result<(RepositoryId, Option<ObjectRef>)> {
        let record: ObjectRecord = ciborium::from_reader(&mut self.cursor)
            .map_err(|e| OrbError::Marshal(format!("Failed to read reference: {}", e)))?;

        let interface = RepositoryId::parse(record.interface.as_str())
            .map_err(|e| OrbError::Marshal(e.to_string()))?;

        let object = record
            .ior
            .map(|ior| ObjectRef::remote(Delegate::new(ior, self.transport.clone())));

        Ok((interface, object))
    }

    /// Whether every byte has been consumed
    pub fn is_exhausted(&self) -> bool {
        self.cursor.position() as usize >= self.cursor.get_ref().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::Reply;
    use async_trait::async_trait;
    use proven_protocol::ObjectKey;

    struct NoTransport;

    #[async_trait]
    impl Transport for NoTransport {
        async fn invoke(&self, ior: &Ior, _operation: &str, _body: Vec<u8>) -> Result<Reply> {
            Err(OrbError::Unreachable {
                endpoint: ior.endpoint.clone(),
                reason: "no transport".to_string(),
            })
        }
    }

    fn interface() -> RepositoryId {
        RepositoryId::from_static("IDL:test/Widget:1.0")
    }

    #[test]
    fn test_nil_reference() {
        let mut out = OutputStream::new();
        out.write_object(&interface(), None).unwrap();

        let mut input = InputStream::new(out.into_bytes(), Arc::new(NoTransport));
        let (id, object) = input.read_object().unwrap();

        assert_eq!(id, interface());
        assert!(object.is_none());
        assert!(input.is_exhausted());
    }

    #[test]
    fn test_reference_keeps_identity() {
        let transport: Arc<dyn Transport> = Arc::new(NoTransport);
        let ior = Ior::new(interface(), "adapter.a", ObjectKey::new());
        let written = ObjectRef::remote(Delegate::new(ior, transport.clone()));

        let mut out = OutputStream::new();
        out.write_object(&interface(), Some(&written)).unwrap();
        out.write_object(&interface(), None).unwrap();

        let mut input = InputStream::new(out.into_bytes(), transport);
        let (_, first) = input.read_object().unwrap();
        assert!(first.unwrap().is_equivalent(&written));
        assert!(!input.is_exhausted());

        let (_, second) = input.read_object().unwrap();
        assert!(second.is_none());
        assert!(input.is_exhausted());
    }

    #[test]
    fn test_garbage_rejected() {
        let mut input = InputStream::new(vec![0xff, 0x00, 0x13], Arc::new(NoTransport));
        assert!(matches!(input.read_object(), Err(OrbError::Marshal(_))));
    }

    #[test]
    fn test_invalid_interface_rejected() {
        let record = ObjectRecord {
            interface: RepositoryId::from_static("Widget"),
            ior: None,
        };
        let mut bytes = Vec::new();
        ciborium::into_writer(&record, &mut bytes).unwrap();

        let mut input = InputStream::new(bytes, Arc::new(NoTransport));
        assert!(matches!(input.read_object(), Err(OrbError::Marshal(_))));
    }
}
