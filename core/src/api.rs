//! Backend API contract and wire DTOs.
//!
//! The library does not own the transport. Everything it needs from the
//! backend is expressed by the [`EventStoreApi`] trait: loading an
//! aggregate's history, appending an event batch with an optional version
//! check, probing existence, the two-phase delete calls, and the paginated
//! feed of committed batches. An HTTP implementation lives with the
//! application; the `eventline-testing` crate ships a deterministic
//! in-memory one for tests.
//!
//! # Dyn Compatibility
//!
//! The trait uses explicit `Pin<Box<dyn Future>>` returns instead of
//! `async fn` so it can be used as a trait object (`Arc<dyn EventStoreApi>`)
//! shared by the aggregate and feed clients.

use crate::aggregate::{AggregateId, AggregateType, TenantId, Version};
use crate::event::Event;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Boxed future returned by [`EventStoreApi`] methods.
pub type ApiFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, ApiError>> + Send + 'a>>;

/// Transport-level failures, classified by the backend's signal.
///
/// The variants mirror the protocol's failure signals (404, 409, 412 at the
/// HTTP layer); everything else is an opaque [`ApiError::Transport`]. Layers
/// above this trait never inspect status codes.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// The aggregate or resource does not exist (404).
    #[error("Resource not found")]
    NotFound,

    /// The append was rejected because the expected version is stale (409).
    #[error("Version conflict: {message}")]
    Conflict {
        /// Backend-provided conflict description.
        message: String,
    },

    /// A precondition was violated, e.g. a delete token was reused (412).
    #[error("Precondition failed: {message}")]
    PreconditionFailed {
        /// Backend-provided description.
        message: String,
    },

    /// Any other transport or protocol failure, propagated unchanged.
    #[error("Backend request failed (status {status:?}): {message}")]
    Transport {
        /// HTTP status code, if the failure came from a response.
        status: Option<u16>,
        /// Failure description.
        message: String,
    },
}

/// An ordered batch of events appended atomically to one aggregate.
///
/// `expected_version: Some(v)` asks the backend to reject the append with a
/// conflict if the aggregate's current version is no longer `v`;
/// `None` appends unconditionally.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventBatch {
    /// Events in commit order.
    pub events: Vec<Event>,
    /// Optimistic-concurrency check, if requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_version: Option<Version>,
}

impl EventBatch {
    /// Create a batch with an expected-version check.
    #[must_use]
    pub const fn checked(events: Vec<Event>, expected_version: Version) -> Self {
        Self {
            events,
            expected_version: Some(expected_version),
        }
    }

    /// Create an unconditional batch.
    #[must_use]
    pub const fn unchecked(events: Vec<Event>) -> Self {
        Self {
            events,
            expected_version: None,
        }
    }

    /// Whether the batch carries no events.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

/// An aggregate's stored history as returned by the backend.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadedAggregate {
    /// ID of the loaded aggregate.
    pub aggregate_id: AggregateId,
    /// Type of the loaded aggregate.
    pub aggregate_type: AggregateType,
    /// Current version (count of events ever applied).
    pub aggregate_version: Version,
    /// Full event history in commit order.
    pub events: Vec<Event>,
}

/// What a delete operation targets.
///
/// Deleting a whole type removes every instance and all history, which is
/// why the protocol demands the two-phase token handshake.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DeleteScope {
    /// Every instance of the aggregate type.
    Type {
        /// The aggregate type to delete.
        aggregate_type: AggregateType,
    },
    /// A single aggregate instance.
    Instance {
        /// The instance's aggregate type.
        aggregate_type: AggregateType,
        /// The instance to delete.
        aggregate_id: AggregateId,
    },
}

impl fmt::Display for DeleteScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Type { aggregate_type } => write!(f, "{aggregate_type}/*"),
            Self::Instance {
                aggregate_type,
                aggregate_id,
            } => write!(f, "{aggregate_type}/{aggregate_id}"),
        }
    }
}

/// Opaque single-use token returned by a delete request.
///
/// Must be echoed on the confirm call; the backend invalidates it after the
/// first successful confirm.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeleteToken(String);

impl DeleteToken {
    /// Wrap a token string.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Get the token as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeleteToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Feed-local position of a committed event batch.
///
/// Strictly increasing within a feed, not necessarily contiguous. `0` is
/// "before the first entry": polling since 0 reads from the beginning.
#[derive(
    Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct SequenceNumber(u64);

impl SequenceNumber {
    /// The position before the first entry of any feed.
    pub const BEGINNING: Self = Self(0);

    /// Create a sequence number with the given value.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Get the numeric value.
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SequenceNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for SequenceNumber {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl From<SequenceNumber> for u64 {
    fn from(seq: SequenceNumber) -> Self {
        seq.0
    }
}

/// One atomically committed batch as it appears in a feed.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedEntry {
    /// Feed-local position of this entry.
    pub sequence_number: SequenceNumber,
    /// Commit time of the batch.
    pub timestamp: DateTime<Utc>,
    /// The batch's events in commit order.
    pub events: Vec<Event>,
}

/// One page of a feed poll.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedPage {
    /// Entries ordered by ascending sequence number.
    pub entries: Vec<FeedEntry>,
    /// Whether entries beyond this page exist (pagination, not end-of-stream).
    pub has_more: bool,
    /// Head sequence number of the feed at poll time.
    pub current_sequence_number: SequenceNumber,
}

/// Metadata describing one available feed.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Feed {
    /// Aggregate type this feed covers.
    pub aggregate_type: String,
    /// Number of distinct aggregates in the feed.
    pub aggregate_count: u64,
    /// Number of committed batches (feed entries).
    pub batch_count: u64,
    /// Total number of events across all batches.
    pub event_count: u64,
}

/// Pagination options for a feed page fetch.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FeedOptions {
    /// Maximum number of entries per page (backend default if `None`).
    pub limit: Option<u32>,
    /// Total number of partitions, when consuming a partitioned feed.
    pub partition_count: Option<u32>,
    /// Which partition to read (0-based), when consuming a partitioned feed.
    pub partition_number: Option<u32>,
}

/// Operations the backend must provide.
///
/// Implementations must be `Send + Sync`; the aggregate and feed clients
/// share one implementation behind an `Arc`. All methods take owned
/// parameters so implementations can move them into their futures.
pub trait EventStoreApi: Send + Sync {
    /// Load an aggregate's version and full event history.
    ///
    /// Fails with [`ApiError::NotFound`] if the aggregate has no history.
    fn load_aggregate(
        &self,
        aggregate_type: AggregateType,
        aggregate_id: AggregateId,
        tenant_id: Option<TenantId>,
    ) -> ApiFuture<'_, LoadedAggregate>;

    /// Append a batch of events to an aggregate.
    ///
    /// Fails with [`ApiError::Conflict`] if the batch carries an expected
    /// version that no longer matches the aggregate's current version.
    fn append_events(
        &self,
        aggregate_type: AggregateType,
        aggregate_id: AggregateId,
        batch: EventBatch,
        tenant_id: Option<TenantId>,
    ) -> ApiFuture<'_, ()>;

    /// Check whether an aggregate exists.
    ///
    /// Fails with [`ApiError::NotFound`] if it does not; callers translate
    /// that into `false`.
    fn aggregate_exists(
        &self,
        aggregate_type: AggregateType,
        aggregate_id: AggregateId,
        tenant_id: Option<TenantId>,
    ) -> ApiFuture<'_, ()>;

    /// Request deletion of the given scope, returning a single-use token.
    fn request_delete(
        &self,
        scope: DeleteScope,
        tenant_id: Option<TenantId>,
    ) -> ApiFuture<'_, DeleteToken>;

    /// Confirm a previously requested deletion.
    ///
    /// Fails with [`ApiError::PreconditionFailed`] if the token was already
    /// consumed or never issued.
    fn confirm_delete(
        &self,
        scope: DeleteScope,
        token: DeleteToken,
        tenant_id: Option<TenantId>,
    ) -> ApiFuture<'_, ()>;

    /// Fetch one feed page strictly after `since`.
    fn feed_page(
        &self,
        feed_name: String,
        since: SequenceNumber,
        options: FeedOptions,
        tenant_id: Option<TenantId>,
    ) -> ApiFuture<'_, FeedPage>;

    /// List available feeds with their counts.
    fn list_feeds(&self, tenant_id: Option<TenantId>) -> ApiFuture<'_, Vec<Feed>>;

    /// Get the head sequence number of a feed.
    fn feed_sequence_number(
        &self,
        feed_name: String,
        tenant_id: Option<TenantId>,
    ) -> ApiFuture<'_, SequenceNumber>;
}
