//! Identity, marshaling and narrowing for `OTSResource` references
//!
//! Everything that turns an opaque reference into a participant goes
//! through here. `extract` always decodes and then narrows, so a participant
//! that crossed a process boundary is re-validated before it is used.

use crate::error::{ResourceError, Result};
use crate::participant::Participant;
use crate::stub::ResourceStub;
use proven_orb::{InputStream, ObjectRef, OutputStream, Transport};
use proven_protocol::{DescriptorCell, Envelope, RepositoryId, TypeDescriptor};
use std::sync::Arc;

static REPOSITORY_ID: RepositoryId = RepositoryId::from_static("IDL:jtsxa/OTSResource:1.0");

static DESCRIPTOR: DescriptorCell = DescriptorCell::new();

/// Repository id of the participant capability
pub fn id() -> &'static RepositoryId {
    &REPOSITORY_ID
}

/// Type descriptor of the capability, built on first use
pub fn descriptor() -> &'static TypeDescriptor {
    DESCRIPTOR.get_or_init(|| {
        tracing::debug!("Building type descriptor for {}", REPOSITORY_ID);
        TypeDescriptor::interface(REPOSITORY_ID.clone(), "OTSResource")
    })
}

/// Write a participant reference, `None` writes a nil reference
pub fn write(out: &mut OutputStream, participant: Option<&Participant>) -> Result<()> {
    let object = participant.map(|p| p.clone().this());
    write_object(out, object.as_ref())
}

pub fn write_object(out: &mut OutputStream, object: Option<&ObjectRef>) -> Result<()> {
    out.write_object(id(), object)?;
    Ok(())
}

/// Read a reference written as an `OTSResource`
pub fn read(input: &mut InputStream) -> Result<Option<ObjectRef>> {
    let (interface, object) = input.read_object()?;
    if interface != *id() {
        return Err(ResourceError::Marshal(format!(
            "Expected {} reference, stream holds {}",
            id(),
            interface
        )));
    }
    Ok(object)
}

/// Wrap a reference into an envelope tagged with the capability
pub fn encode_any(object: Option<&ObjectRef>) -> Result<Envelope> {
    let mut out = OutputStream::new();
    write_object(&mut out, object)?;
    Ok(Envelope::new(descriptor().clone(), out.into_bytes()))
}

/// Unwrap a reference from an envelope
///
/// The tag is checked before the payload is touched. A payload that does
/// not hold exactly one `OTSResource` reference is malformed even when the
/// tag matches.
pub fn decode_any(
    envelope: &Envelope,
    transport: Arc<dyn Transport>,
) -> Result<Option<ObjectRef>> {
    let payload = envelope
        .expect_tag(descriptor())
        .map_err(|e| ResourceError::MalformedEnvelope(e.to_string()))?;

    let mut input = InputStream::new(payload.to_vec(), transport);
    let (interface, object) = input
        .read_object()
        .map_err(|e| ResourceError::MalformedEnvelope(e.to_string()))?;

    if interface != *id() {
        return Err(ResourceError::MalformedEnvelope(format!(
            "Envelope tagged {} holds a {} reference",
            id(),
            interface
        )));
    }
    if !input.is_exhausted() {
        return Err(ResourceError::MalformedEnvelope(
            "Trailing bytes after reference".to_string(),
        ));
    }

    Ok(object)
}

/// Turn a reference into a participant
///
/// Nil stays nil and an in-process participant is returned as is. Anything
/// else must answer the capability query affirmatively before a proxy is
/// bound to its delegate. The answer is never cached.
pub async fn narrow(object: Option<&ObjectRef>) -> Result<Option<Participant>> {
    let Some(object) = object else {
        return Ok(None);
    };

    if let Some(participant) = object.downcast_local::<Participant>() {
        return Ok(Some(participant));
    }

    let delegate = object.delegate();
    if !delegate.is_a(id()).await? {
        tracing::warn!("Rejected {}: does not implement {}", object.ior(), id());
        return Err(ResourceError::CapabilityMismatch {
            expected: id().to_string(),
            reference: object.ior().to_string(),
        });
    }

    tracing::debug!("Narrowed {} to {}", object.ior(), id().interface_name());
    Ok(Some(Arc::new(ResourceStub::new(delegate.clone()))))
}

/// Store a participant into an envelope
pub fn insert(envelope: &mut Envelope, participant: Option<&Participant>) -> Result<()> {
    let object = participant.map(|p| p.clone().this());
    *envelope = encode_any(object.as_ref())?;
    Ok(())
}

/// Decode and narrow the participant held by an envelope
pub async fn extract(
    envelope: &Envelope,
    transport: Arc<dyn Transport>,
) -> Result<Option<Participant>> {
    let object = decode_any(envelope, transport)?;
    narrow(object.as_ref()).await
}
