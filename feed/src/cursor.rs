//! Client-side feed position tracking.

use eventline_core::api::SequenceNumber;

/// The last-consumed position in a feed.
///
/// Owned by the consumer: the backend never tracks progress for a feed
/// reader. The cursor starts wherever the caller says (0 for the beginning)
/// and moves forward only when the consumer reports an entry as handled.
/// Persisting it across restarts is the caller's job.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct FeedCursor {
    position: SequenceNumber,
}

impl FeedCursor {
    /// Start a cursor at the given position.
    #[must_use]
    pub const fn new(since: SequenceNumber) -> Self {
        Self { position: since }
    }

    /// Start a cursor at the beginning of a feed.
    #[must_use]
    pub const fn beginning() -> Self {
        Self {
            position: SequenceNumber::BEGINNING,
        }
    }

    /// The current position.
    #[must_use]
    pub const fn position(&self) -> SequenceNumber {
        self.position
    }

    /// Advance to `sequence_number` if it is ahead of the current position.
    ///
    /// Monotonic by construction: a stale or repeated sequence number never
    /// moves the cursor backwards.
    pub fn advance_to(&mut self, sequence_number: SequenceNumber) {
        if sequence_number > self.position {
            self.position = sequence_number;
        }
    }
}

impl Default for FeedCursor {
    fn default() -> Self {
        Self::beginning()
    }
}
