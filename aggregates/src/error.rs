//! Error taxonomy for aggregate operations.

use eventline_core::ApiError;
use eventline_core::FoldError;
use eventline_core::Version;
use thiserror::Error;

/// Errors surfaced by aggregate operations.
///
/// The variants separate what callers react to differently: a missing
/// aggregate is recoverable (treat state as fresh, or create via `save`),
/// a concurrency conflict calls for reload-and-retry at the call site, and
/// fold failures are fatal schema drift.
#[derive(Error, Debug)]
pub enum AggregateError {
    /// The aggregate has no stored history.
    ///
    /// Recoverable by the caller: a fresh aggregate has zero-value state and
    /// version 0, and is created by appending its first events with `save`.
    #[error("Aggregate not found")]
    NotFound,

    /// The append was rejected because another writer committed first.
    ///
    /// Never retried automatically. Re-running the business function against
    /// a stale closure could be unsafe, so reload-and-retry is left to the
    /// caller.
    #[error("Concurrency conflict (expected version {expected:?}): {message}")]
    ConcurrencyConflict {
        /// The version the rejected batch was conditioned on.
        expected: Option<Version>,
        /// Backend-provided conflict description.
        message: String,
    },

    /// The stored history contains an event type with no registered handler.
    ///
    /// Fatal: the client's handler registry and the backend's event
    /// vocabulary have drifted apart.
    #[error("No registered handler for event type '{0}'")]
    UnknownEventType(String),

    /// A stored payload no longer decodes into its registered type.
    ///
    /// Same fatality as an unknown type: the schema the client compiled
    /// against does not match what the backend stored.
    #[error("Malformed payload for event type '{event_type}': {message}")]
    MalformedEvent {
        /// The event type whose payload failed to decode.
        event_type: String,
        /// Decoder error description.
        message: String,
    },

    /// A delete token was reused or never issued.
    #[error("Delete precondition failed: {message}")]
    PreconditionFailed {
        /// Backend-provided description.
        message: String,
    },

    /// Any other backend failure, propagated unchanged.
    #[error(transparent)]
    Backend(#[from] ApiError),
}

impl From<FoldError> for AggregateError {
    fn from(err: FoldError) -> Self {
        match err {
            FoldError::UnknownEventType(event_type) => Self::UnknownEventType(event_type),
            FoldError::Deserialize {
                event_type,
                message,
            } => Self::MalformedEvent {
                event_type,
                message,
            },
        }
    }
}
