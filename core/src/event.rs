//! Event envelope and typed-event trait.
//!
//! Events are immutable facts. On the wire they travel as an envelope of
//! `{id, eventType, data, metadata}` where `data` is an opaque JSON payload
//! owned by the domain. The [`DomainEvent`] trait ties a concrete Rust type
//! to its stable event-type name so handlers can be registered against the
//! type instead of a bare string.
//!
//! # Example
//!
//! ```
//! use eventline_core::event::{DomainEvent, Event};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, Serialize, Deserialize)]
//! struct OrderPlaced {
//!     order_id: String,
//!     amount: i64,
//! }
//!
//! impl DomainEvent for OrderPlaced {
//!     const EVENT_TYPE: &'static str = "OrderPlaced";
//! }
//!
//! let event = Event::from_payload(&OrderPlaced {
//!     order_id: "order-123".to_string(),
//!     amount: 1234,
//! })?;
//! assert_eq!(event.event_type, "OrderPlaced");
//! # Ok::<(), eventline_core::event::EventError>(())
//! ```

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// Error types for event envelope construction and payload decoding.
#[derive(Error, Debug)]
pub enum EventError {
    /// Failed to serialize a typed payload into the JSON envelope.
    #[error("Failed to serialize event payload for '{event_type}': {message}")]
    Serialize {
        /// The event type whose payload failed to serialize.
        event_type: String,
        /// Serializer error description.
        message: String,
    },

    /// Failed to deserialize a stored payload into the registered type.
    #[error("Failed to deserialize event payload for '{event_type}': {message}")]
    Deserialize {
        /// The event type whose payload failed to deserialize.
        event_type: String,
        /// Deserializer error description.
        message: String,
    },
}

/// A domain event type with a stable, registration-time name.
///
/// The associated constant is the contract with the backend: it is the string
/// stored alongside the payload and the key handlers are registered under.
/// Version the name explicitly when the schema changes (`"OrderShipped.v2"`).
pub trait DomainEvent: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Stable event-type identifier for this type.
    const EVENT_TYPE: &'static str;
}

/// The wire envelope for a single event.
///
/// Immutable once created. `data` and `metadata` are opaque JSON values; the
/// library never interprets them except when a registered handler asks for a
/// typed view during a fold.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    /// Unique ID of this event.
    pub id: Uuid,
    /// Stable event-type name (e.g. `"OrderPlaced"`).
    pub event_type: String,
    /// Opaque domain payload.
    pub data: serde_json::Value,
    /// Optional opaque metadata (correlation IDs, actor, ...).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl Event {
    /// Create an event from a typed payload, with a fresh random ID.
    ///
    /// # Errors
    ///
    /// Returns [`EventError::Serialize`] if the payload cannot be represented
    /// as JSON.
    pub fn from_payload<E: DomainEvent>(payload: &E) -> Result<Self, EventError> {
        let data = serde_json::to_value(payload).map_err(|e| EventError::Serialize {
            event_type: E::EVENT_TYPE.to_string(),
            message: e.to_string(),
        })?;
        Ok(Self {
            id: Uuid::new_v4(),
            event_type: E::EVENT_TYPE.to_string(),
            data,
            metadata: None,
        })
    }

    /// Create an event with a raw event-type string and JSON payload.
    ///
    /// For producers that do not model events as Rust types. Typed consumers
    /// of such events must register a handler under the same name.
    #[must_use]
    pub fn raw(event_type: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            event_type: event_type.into(),
            data,
            metadata: None,
        }
    }

    /// Attach metadata to this event.
    #[must_use]
    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Decode the payload as the given domain event type.
    ///
    /// # Errors
    ///
    /// Returns [`EventError::Deserialize`] if the stored payload does not
    /// match the requested type.
    pub fn payload<E: DomainEvent>(&self) -> Result<E, EventError> {
        serde_json::from_value(self.data.clone()).map_err(|e| EventError::Deserialize {
            event_type: self.event_type.clone(),
            message: e.to_string(),
        })
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Event {{ type: {}, id: {} }}", self.event_type, self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct OrderPlaced {
        order_id: String,
        amount: i64,
    }

    impl DomainEvent for OrderPlaced {
        const EVENT_TYPE: &'static str = "OrderPlaced";
    }

    #[test]
    #[allow(clippy::expect_used)] // Panics: test will fail if serialization fails
    fn from_payload_sets_type_and_data() {
        let event = Event::from_payload(&OrderPlaced {
            order_id: "order-123".to_string(),
            amount: 1234,
        })
        .expect("payload should serialize");

        assert_eq!(event.event_type, "OrderPlaced");
        assert_eq!(event.data["order_id"], "order-123");
        assert!(event.metadata.is_none());
    }

    #[test]
    #[allow(clippy::expect_used)] // Panics: test will fail if decoding fails
    fn payload_roundtrip() {
        let original = OrderPlaced {
            order_id: "order-123".to_string(),
            amount: 1234,
        };
        let event = Event::from_payload(&original).expect("payload should serialize");
        let decoded: OrderPlaced = event.payload().expect("payload should decode");
        assert_eq!(decoded, original);
    }

    #[test]
    fn payload_type_mismatch_fails() {
        let event = Event::raw("OrderPlaced", serde_json::json!({"unexpected": true}));
        let result: Result<OrderPlaced, _> = event.payload();
        assert!(result.is_err());
    }

    #[test]
    fn raw_event_carries_metadata() {
        let event = Event::raw("order-placed", serde_json::json!({"orderId": "o-1"}))
            .with_metadata(serde_json::json!({"actor": "user-1"}));
        assert_eq!(event.event_type, "order-placed");
        assert!(event.metadata.is_some());
    }

    #[test]
    fn display_names_type_and_id() {
        let event = Event::raw("order-placed", serde_json::json!({}));
        let display = format!("{event}");
        assert!(display.contains("order-placed"));
    }

    #[test]
    #[allow(clippy::expect_used)] // Panics: test will fail if serialization fails
    fn envelope_serializes_camel_case() {
        let event = Event::raw("order-placed", serde_json::json!({}));
        let json = serde_json::to_value(&event).expect("envelope should serialize");
        assert!(json.get("eventType").is_some());
        assert!(json.get("metadata").is_none());
    }
}
