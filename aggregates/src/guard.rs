//! Classification of append failures.
//!
//! The backend signals a stale expected version distinctly (HTTP 409 at the
//! wire, [`ApiError::Conflict`] at the trait). This module is the single
//! place that translation happens, so callers can match on
//! [`AggregateError::ConcurrencyConflict`] without knowing anything about
//! the transport.

use crate::error::AggregateError;
use eventline_core::{ApiError, Version};

/// Classify a failed append into the aggregate error taxonomy.
///
/// A conflict becomes [`AggregateError::ConcurrencyConflict`] carrying the
/// expected version the batch was conditioned on; every other failure passes
/// through unchanged as [`AggregateError::Backend`].
pub(crate) fn classify_append_failure(
    err: ApiError,
    expected: Option<Version>,
) -> AggregateError {
    match err {
        ApiError::Conflict { message } => {
            metrics::counter!("aggregate.append.conflicts").increment(1);
            AggregateError::ConcurrencyConflict { expected, message }
        }
        other => AggregateError::Backend(other),
    }
}
