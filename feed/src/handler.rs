//! Entry handler contract and its outcome state machine.
//!
//! The pump drives consumption by handing each [`FeedEntry`] to a handler
//! and pattern-matching on the returned [`EntryOutcome`]. The outcome enum
//! is closed: advancement, retry, and failure are all explicit values, so
//! there is no control flow hidden in error types and nothing for the pump
//! to swallow.

use eventline_core::api::FeedEntry;
use std::error::Error;

/// Boxed handler failure reason.
pub type HandlerError = Box<dyn Error + Send + Sync>;

/// What the pump should do after a handler saw an entry.
#[derive(Debug)]
pub enum EntryOutcome {
    /// The entry was handled; advance the cursor past it.
    Advance,
    /// Do not advance the cursor past this entry, but keep going.
    ///
    /// The entry is not re-delivered within the current pass; a later pass
    /// starting from the unadvanced cursor picks it up again.
    Retry,
    /// Abort the current pass with this error.
    Fail(HandlerError),
}

impl EntryOutcome {
    /// Shorthand for a failure outcome from any error type.
    #[must_use]
    pub fn fail(error: impl Into<HandlerError>) -> Self {
        Self::Fail(error.into())
    }
}

/// Consumer of feed entries.
///
/// Implemented for any `Fn(&FeedEntry) -> EntryOutcome`, so closures work
/// directly. Handlers are invoked sequentially, one entry at a time, from
/// the pump's execution context; they should return promptly and leave
/// long-running work to their own machinery.
pub trait FeedEntryHandler: Send + Sync {
    /// Handle one entry and report what to do with the cursor.
    fn handle(&self, entry: &FeedEntry) -> EntryOutcome;
}

impl<F> FeedEntryHandler for F
where
    F: Fn(&FeedEntry) -> EntryOutcome + Send + Sync,
{
    fn handle(&self, entry: &FeedEntry) -> EntryOutcome {
        self(entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use eventline_core::api::SequenceNumber;

    #[test]
    fn closures_are_handlers() {
        let handler = |entry: &FeedEntry| {
            if entry.sequence_number == SequenceNumber::new(7) {
                EntryOutcome::Retry
            } else {
                EntryOutcome::Advance
            }
        };

        let entry = FeedEntry {
            sequence_number: SequenceNumber::new(7),
            timestamp: chrono::Utc::now(),
            events: vec![],
        };

        assert!(matches!(handler.handle(&entry), EntryOutcome::Retry));
    }

    #[test]
    fn fail_wraps_any_error() {
        let outcome = EntryOutcome::fail("projection store unavailable");
        assert!(matches!(outcome, EntryOutcome::Fail(_)));
    }
}
