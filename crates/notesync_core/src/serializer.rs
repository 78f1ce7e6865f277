//! Event serialization for persistent logs.

use crate::error::{CoreError, CoreResult};
use crate::event::Event;

/// Converts events to and from their persisted form.
pub trait EventSerializer: Send + Sync {
    /// Serializes one event.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Codec`] if the event cannot be encoded.
    fn serialize(&self, event: &Event) -> CoreResult<Vec<u8>>;

    /// Deserializes one event.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Codec`] if the bytes are not a valid event.
    fn deserialize(&self, bytes: &[u8]) -> CoreResult<Event>;
}

/// CBOR encoding of events.
#[derive(Debug, Clone, Copy, Default)]
pub struct CborEventSerializer;

impl EventSerializer for CborEventSerializer {
    fn serialize(&self, event: &Event) -> CoreResult<Vec<u8>> {
        let mut bytes = Vec::new();
        ciborium::into_writer(event, &mut bytes).map_err(|e| CoreError::Codec(e.to_string()))?;
        Ok(bytes)
    }

    fn deserialize(&self, bytes: &[u8]) -> CoreResult<Event> {
        ciborium::from_reader(bytes).map_err(|e| CoreError::Codec(e.to_string()))
    }
}
