//! State reconstruction by folding an event stream.
//!
//! [`StateBuilder`] holds a registry mapping event-type names to typed apply
//! functions and reduces an ordered event sequence into a state value. The
//! fold is strictly sequential and left-associative: event order is the
//! source of truth, so handlers are not assumed to be commutative and the
//! reduction is never parallelized.
//!
//! Handlers are registered against a concrete [`DomainEvent`] type; the
//! type-name key and the payload decoder are both fixed at registration
//! time. An observed event type with no registered handler is a fatal
//! [`FoldError::UnknownEventType`] — it signals schema drift between client
//! and backend, not a recoverable condition.
//!
//! # Example
//!
//! ```
//! use eventline_core::event::{DomainEvent, Event};
//! use eventline_core::fold::StateBuilder;
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, Default)]
//! struct Balance(i64);
//!
//! #[derive(Debug, Serialize, Deserialize)]
//! struct Deposited {
//!     amount: i64,
//! }
//!
//! impl DomainEvent for Deposited {
//!     const EVENT_TYPE: &'static str = "Deposited";
//! }
//!
//! let builder = StateBuilder::<Balance>::new()
//!     .with_handler(|state: Balance, event: Deposited| Balance(state.0 + event.amount));
//!
//! let events = vec![
//!     Event::from_payload(&Deposited { amount: 5 })?,
//!     Event::from_payload(&Deposited { amount: 7 })?,
//! ];
//! let state = builder.build(&events)?;
//! assert_eq!(state.0, 12);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use crate::event::{DomainEvent, Event};
use std::collections::HashMap;
use thiserror::Error;

/// Errors that can occur while folding events into state.
#[derive(Error, Debug)]
pub enum FoldError {
    /// An event was observed whose type has no registered handler.
    ///
    /// Fatal: the client's handler registry no longer covers the event
    /// vocabulary the backend is storing.
    #[error("No registered handler for event type '{0}'")]
    UnknownEventType(String),

    /// A stored payload could not be decoded into the registered type.
    #[error("Failed to decode event '{event_type}' during fold: {message}")]
    Deserialize {
        /// The event type whose payload failed to decode.
        event_type: String,
        /// Deserializer error description.
        message: String,
    },
}

/// Type-erased apply function: decodes the payload and applies it.
type ApplyFn<S> = Box<dyn Fn(S, &Event) -> Result<S, FoldError> + Send + Sync>;

/// Registry of per-event-type handlers plus the fold that drives them.
///
/// Built once at client construction and immutable afterwards. The state
/// accumulator is passed through the fold by value: each handler consumes
/// the running state and returns the next one, so there is no shared
/// mutable indirection anywhere in the reduction.
pub struct StateBuilder<S> {
    handlers: HashMap<String, ApplyFn<S>>,
}

impl<S> Default for StateBuilder<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> StateBuilder<S> {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Register a typed handler for `E`, keyed by `E::EVENT_TYPE`.
    ///
    /// The payload decoder for `E` is captured here, so dispatch at fold
    /// time is a single map lookup. Registering a second handler for the
    /// same event type replaces the first.
    #[must_use]
    pub fn with_handler<E, F>(mut self, handler: F) -> Self
    where
        E: DomainEvent,
        F: Fn(S, E) -> S + Send + Sync + 'static,
    {
        self.handlers.insert(
            E::EVENT_TYPE.to_string(),
            Box::new(move |state, event| {
                let payload: E = event.payload().map_err(|e| FoldError::Deserialize {
                    event_type: event.event_type.clone(),
                    message: e.to_string(),
                })?;
                Ok(handler(state, payload))
            }),
        );
        self
    }

    /// Check whether a handler is registered for the given event type.
    #[must_use]
    pub fn handles(&self, event_type: &str) -> bool {
        self.handlers.contains_key(event_type)
    }

    /// Fold `events` over `initial`, in stream order.
    ///
    /// An empty sequence returns `initial` unchanged. The result is the
    /// pristine snapshot for subsequent business logic; handlers must return
    /// the next state rather than rely on interior mutation.
    ///
    /// # Errors
    ///
    /// - [`FoldError::UnknownEventType`] if an event has no registered handler
    /// - [`FoldError::Deserialize`] if a payload no longer matches its
    ///   registered type
    pub fn fold(&self, initial: S, events: &[Event]) -> Result<S, FoldError> {
        events.iter().try_fold(initial, |state, event| {
            let apply = self
                .handlers
                .get(&event.event_type)
                .ok_or_else(|| FoldError::UnknownEventType(event.event_type.clone()))?;
            apply(state, event)
        })
    }

    /// Fold `events` starting from the zero state.
    ///
    /// # Errors
    ///
    /// Same as [`StateBuilder::fold`].
    pub fn build(&self, events: &[Event]) -> Result<S, FoldError>
    where
        S: Default,
    {
        self.fold(S::default(), events)
    }
}
