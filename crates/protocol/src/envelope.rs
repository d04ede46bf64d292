//! Tagged any-value container
//!
//! An envelope holds one encoded value together with the descriptor of its
//! type. Receivers must check the tag before interpreting the payload; the
//! byte encoding writes the tag first so it can be read without touching the
//! payload.

use crate::TypeDescriptor;
use serde::{Deserialize, Serialize};

/// Any-value container tagged with the type of the value it holds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    tag: TypeDescriptor,
    payload: Vec<u8>,
}

impl Envelope {
    /// Build an envelope from a tag and an already encoded payload
    pub fn new(tag: TypeDescriptor, payload: Vec<u8>) -> Self {
        Self { tag, payload }
    }

    /// Envelope holding no value
    pub fn empty() -> Self {
        Self {
            tag: TypeDescriptor::null(),
            payload: Vec::new(),
        }
    }

    pub fn tag(&self) -> &TypeDescriptor {
        &self.tag
    }

    /// Raw payload, without any tag check
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Payload of an envelope expected to hold a value described by `expected`
    ///
    /// Both the kind and the repository id of the tag must match.
    pub fn expect_tag(&self, expected: &TypeDescriptor) -> Result<&[u8], EnvelopeError> {
        if self.tag.kind() != expected.kind() || self.tag.id() != expected.id() {
            return Err(EnvelopeError::TagMismatch {
                expected: describe(expected),
                found: describe(&self.tag),
            });
        }
        Ok(&self.payload)
    }

    /// Serialize for crossing a process boundary
    pub fn to_bytes(&self) -> Result<Vec<u8>, EnvelopeError> {
        let mut bytes = Vec::new();
        ciborium::ser::into_writer(self, &mut bytes)
            .map_err(|e| EnvelopeError::Encoding(e.to_string()))?;
        Ok(bytes)
    }

    /// Deserialize an envelope received from another process
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, EnvelopeError> {
        ciborium::de::from_reader(bytes).map_err(|e| EnvelopeError::Decoding(e.to_string()))
    }
}

fn describe(tag: &TypeDescriptor) -> String {
    format!("{:?} {}", tag.kind(), tag.id())
}

impl Default for Envelope {
    fn default() -> Self {
        Self::empty()
    }
}

/// Errors raised while reading or writing envelopes
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EnvelopeError {
    #[error("Envelope tagged {found}, expected {expected}")]
    TagMismatch { expected: String, found: String },

    #[error("Failed to encode envelope: {0}")]
    Encoding(String),

    #[error("Failed to decode envelope: {0}")]
    Decoding(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{RepositoryId, TypeKind};

    const RESOURCE: RepositoryId = RepositoryId::from_static("IDL:jtsxa/OTSResource:1.0");
    const OTHER: RepositoryId = RepositoryId::from_static("IDL:example/Ledger:1.0");

    fn resource() -> TypeDescriptor {
        TypeDescriptor::interface(RESOURCE, "OTSResource")
    }

    #[derive(Serialize)]
    struct RawTag {
        kind: TypeKind,
        id: RepositoryId,
        name: String,
    }

    #[derive(Serialize)]
    struct RawEnvelope {
        tag: RawTag,
        payload: Vec<u8>,
    }

    #[test]
    fn test_expect_tag() {
        let envelope = Envelope::new(resource(), vec![1, 2, 3]);

        assert_eq!(envelope.expect_tag(&resource()).unwrap(), &[1, 2, 3]);
        assert_eq!(
            envelope.expect_tag(&TypeDescriptor::interface(OTHER, "Ledger")),
            Err(EnvelopeError::TagMismatch {
                expected: format!("ObjectReference {}", OTHER),
                found: format!("ObjectReference {}", RESOURCE),
            })
        );
    }

    #[test]
    fn test_expect_tag_checks_kind() {
        let raw = RawEnvelope {
            tag: RawTag {
                kind: TypeKind::Null,
                id: RESOURCE,
                name: "OTSResource".to_string(),
            },
            payload: vec![1, 2, 3],
        };
        let mut bytes = Vec::new();
        ciborium::ser::into_writer(&raw, &mut bytes).unwrap();

        let envelope = Envelope::from_bytes(&bytes).unwrap();
        assert_eq!(envelope.tag().id(), &RESOURCE);
        assert_eq!(
            envelope.expect_tag(&resource()),
            Err(EnvelopeError::TagMismatch {
                expected: format!("ObjectReference {}", RESOURCE),
                found: format!("Null {}", RESOURCE),
            })
        );
    }

    #[test]
    fn test_empty_envelope_matches_nothing() {
        let envelope = Envelope::default();
        assert!(envelope.payload().is_empty());
        assert!(envelope.expect_tag(&resource()).is_err());
    }

    #[test]
    fn test_bytes_survive_boundary() {
        let envelope = Envelope::new(resource(), b"payload".to_vec());

        let bytes = envelope.to_bytes().unwrap();
        assert_eq!(Envelope::from_bytes(&bytes).unwrap(), envelope);
    }

    #[test]
    fn test_truncated_bytes_rejected() {
        let envelope = Envelope::new(resource(), b"payload".to_vec());
        let bytes = envelope.to_bytes().unwrap();

        let result = Envelope::from_bytes(&bytes[..bytes.len() - 3]);
        assert!(matches!(result, Err(EnvelopeError::Decoding(_))));
    }
}
