//! # Eventline Testing
//!
//! Testing utilities for the Eventline client crates.
//!
//! The centerpiece is [`InMemoryApi`]: a deterministic, in-memory
//! implementation of `EventStoreApi` with seeding helpers, call recording,
//! and failure injection. It enforces the same protocol rules a real
//! backend would — expected-version checks on append, single-use delete
//! tokens, strictly ordered feed pages — so protocol tests exercise real
//! classification paths instead of stubs that always succeed.
//!
//! ## Example
//!
//! ```
//! use eventline_core::event::Event;
//! use eventline_core::{AggregateId, AggregateType};
//! use eventline_testing::InMemoryApi;
//! use std::sync::Arc;
//!
//! let api = Arc::new(InMemoryApi::new());
//! api.seed_aggregate(
//!     AggregateType::new("order"),
//!     AggregateId::random(),
//!     vec![Event::raw("OrderPlaced", serde_json::json!({"orderId": "o-1"}))],
//! );
//! ```

pub mod mocks;

pub use mocks::{InMemoryApi, RecordedAppend};
