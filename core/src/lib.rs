//! # Eventline Core
//!
//! Core types for the Eventline event-sourcing client.
//!
//! This crate defines what the rest of the workspace builds on:
//!
//! - **Events**: the immutable wire envelope and the [`event::DomainEvent`]
//!   trait tying Rust types to stable event-type names
//! - **Aggregate identity**: [`aggregate::AggregateType`],
//!   [`aggregate::AggregateId`], [`aggregate::TenantId`] and the
//!   optimistic-concurrency [`aggregate::Version`]
//! - **State fold**: [`fold::StateBuilder`], the pure left-to-right
//!   reduction of an event history into a domain state value
//! - **Backend contract**: [`api::EventStoreApi`], the trait the transport
//!   implementation fulfills, with its DTOs and error taxonomy
//!
//! The aggregate update protocol lives in `eventline-aggregates`; feed
//! consumption lives in `eventline-feed`; a deterministic in-memory backend
//! for tests lives in `eventline-testing`.

pub mod aggregate;
pub mod api;
pub mod event;
pub mod fold;

pub use aggregate::{AggregateId, AggregateType, TenantId, Version};
pub use api::{ApiError, EventBatch, EventStoreApi, SequenceNumber};
pub use event::{DomainEvent, Event};
pub use fold::{FoldError, StateBuilder};
