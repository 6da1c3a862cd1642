//! # Eventline Aggregates
//!
//! The aggregate update protocol: load an aggregate's event history, fold it
//! into state, run a business function over the snapshot, and append the
//! resulting events with an optimistic concurrency check at the write
//! boundary.
//!
//! # Design
//!
//! The state snapshot is disposable: its only purpose is to compute the next
//! events. Staleness is therefore detected exactly once, atomically, at
//! commit time — there is no version check at the read boundary and no
//! client-side locking anywhere. When the backend rejects an append because
//! another writer got there first, the conflict surfaces as
//! [`AggregateError::ConcurrencyConflict`] and is never retried
//! automatically: re-running a business closure against captured state the
//! caller believes is current could be unsafe, so reload-and-retry belongs
//! to the caller.
//!
//! # Example
//!
//! ```ignore
//! use eventline_aggregates::AggregateClient;
//! use std::sync::Arc;
//!
//! let orders = AggregateClient::<OrderState>::builder("order", api)
//!     .with_handler(|state: OrderState, event: OrderPlaced| state.place(event))
//!     .with_handler(|state: OrderState, event: OrderCancelled| state.cancel(event))
//!     .build();
//!
//! orders
//!     .update(order_id, |state| {
//!         if state.is_open() {
//!             vec![Event::from_payload(&OrderCancelled {}).unwrap()]
//!         } else {
//!             vec![] // nothing to do, nothing is written
//!         }
//!     })
//!     .await?;
//! ```

pub mod delete;
pub mod error;
mod guard;

pub use delete::PendingDelete;
pub use error::AggregateError;

use eventline_core::api::{DeleteScope, EventBatch, EventStoreApi, LoadedAggregate};
use eventline_core::event::{DomainEvent, Event};
use eventline_core::fold::StateBuilder;
use eventline_core::{AggregateId, AggregateType, ApiError, TenantId, Version};
use std::sync::Arc;

/// A folded state snapshot together with the version it was built at.
#[derive(Clone, Debug, PartialEq)]
pub struct VersionedState<S> {
    /// The folded state.
    pub state: S,
    /// The aggregate version the snapshot reflects.
    pub version: Version,
}

/// A direct append request, for aggregate creation and event import.
///
/// Unlike [`AggregateClient::update`], a save performs no load and no fold:
/// the caller supplies the events outright. An explicit expected version can
/// still be attached for writers that track versions themselves.
#[derive(Clone, Debug)]
pub struct SaveRequest {
    aggregate_id: AggregateId,
    events: Vec<Event>,
    tenant_id: Option<TenantId>,
    expected_version: Option<Version>,
}

impl SaveRequest {
    /// Start a save request for the given aggregate.
    #[must_use]
    pub const fn new(aggregate_id: AggregateId) -> Self {
        Self {
            aggregate_id,
            events: Vec::new(),
            tenant_id: None,
            expected_version: None,
        }
    }

    /// Append one event to the request.
    #[must_use]
    pub fn with_event(mut self, event: Event) -> Self {
        self.events.push(event);
        self
    }

    /// Append events to the request.
    #[must_use]
    pub fn with_events(mut self, events: Vec<Event>) -> Self {
        self.events.extend(events);
        self
    }

    /// Scope the request to a tenant.
    #[must_use]
    pub const fn with_tenant(mut self, tenant_id: TenantId) -> Self {
        self.tenant_id = Some(tenant_id);
        self
    }

    /// Condition the append on an explicit expected version.
    #[must_use]
    pub const fn with_expected_version(mut self, version: Version) -> Self {
        self.expected_version = Some(version);
        self
    }
}

/// Client for one aggregate type.
///
/// Holds the shared backend handle, the immutable handler registry built at
/// construction time, and the optimistic-concurrency configuration flag
/// (default enabled). Cheap to share: all operations take `&self`, and
/// concurrent operations against different aggregate IDs share no mutable
/// state.
pub struct AggregateClient<S> {
    api: Arc<dyn EventStoreApi>,
    aggregate_type: AggregateType,
    state_builder: StateBuilder<S>,
    optimistic_concurrency: bool,
}

impl<S> AggregateClient<S> {
    /// Start building a client for `aggregate_type`.
    #[must_use]
    pub fn builder(
        aggregate_type: impl Into<AggregateType>,
        api: Arc<dyn EventStoreApi>,
    ) -> AggregateClientBuilder<S> {
        AggregateClientBuilder {
            api,
            aggregate_type: aggregate_type.into(),
            state_builder: StateBuilder::new(),
            optimistic_concurrency: true,
        }
    }

    /// The aggregate type this client operates on.
    #[must_use]
    pub const fn aggregate_type(&self) -> &AggregateType {
        &self.aggregate_type
    }

    /// Update an aggregate: load, fold, apply the business function, append.
    ///
    /// `business` receives the folded snapshot and returns the events to
    /// commit. An empty return short-circuits: the session ends with **no**
    /// write call. Otherwise the batch is appended, conditioned on the
    /// loaded version when optimistic concurrency is enabled.
    ///
    /// The business function must be pure with respect to the session — it
    /// must not perform I/O of its own; the events it returns are tentative
    /// until the append succeeds.
    ///
    /// # Errors
    ///
    /// - [`AggregateError::NotFound`] if the aggregate has no history
    ///   (create it with [`AggregateClient::save`])
    /// - [`AggregateError::ConcurrencyConflict`] if another writer committed
    ///   in between; no retry is attempted
    /// - [`AggregateError::UnknownEventType`] /
    ///   [`AggregateError::MalformedEvent`] on schema drift in the stored
    ///   history
    /// - [`AggregateError::Backend`] for any other backend failure
    pub async fn update<F>(&self, aggregate_id: AggregateId, business: F) -> Result<(), AggregateError>
    where
        S: Default,
        F: FnOnce(&S) -> Vec<Event>,
    {
        self.update_inner(aggregate_id, None, business).await
    }

    /// Tenant-scoped variant of [`AggregateClient::update`].
    ///
    /// # Errors
    ///
    /// Same as [`AggregateClient::update`].
    pub async fn update_for_tenant<F>(
        &self,
        aggregate_id: AggregateId,
        tenant_id: TenantId,
        business: F,
    ) -> Result<(), AggregateError>
    where
        S: Default,
        F: FnOnce(&S) -> Vec<Event>,
    {
        self.update_inner(aggregate_id, Some(tenant_id), business)
            .await
    }

    async fn update_inner<F>(
        &self,
        aggregate_id: AggregateId,
        tenant_id: Option<TenantId>,
        business: F,
    ) -> Result<(), AggregateError>
    where
        S: Default,
        F: FnOnce(&S) -> Vec<Event>,
    {
        let VersionedState { state, version } = self.load_inner(aggregate_id, tenant_id).await?;

        let events = business(&state);
        if events.is_empty() {
            tracing::debug!(
                aggregate = %self.aggregate_type,
                id = %aggregate_id,
                "Update produced no events, skipping append"
            );
            return Ok(());
        }

        let expected = self.optimistic_concurrency.then_some(version);
        let batch = EventBatch {
            events,
            expected_version: expected,
        };

        self.api
            .append_events(
                self.aggregate_type.clone(),
                aggregate_id,
                batch,
                tenant_id,
            )
            .await
            .map_err(|e| guard::classify_append_failure(e, expected))?;

        metrics::counter!("aggregate.updates.committed").increment(1);
        tracing::debug!(
            aggregate = %self.aggregate_type,
            id = %aggregate_id,
            expected = ?expected,
            "Update committed"
        );
        Ok(())
    }

    /// Append events directly, without load or fold.
    ///
    /// The creation path for new aggregates. A request with no events is a
    /// no-op, the same short-circuit as an update that produces nothing.
    ///
    /// # Errors
    ///
    /// - [`AggregateError::ConcurrencyConflict`] if the request carried an
    ///   expected version that is stale
    /// - [`AggregateError::Backend`] for any other backend failure
    pub async fn save(&self, request: SaveRequest) -> Result<(), AggregateError> {
        if request.events.is_empty() {
            return Ok(());
        }

        let expected = request.expected_version;
        let batch = EventBatch {
            events: request.events,
            expected_version: expected,
        };

        self.api
            .append_events(
                self.aggregate_type.clone(),
                request.aggregate_id,
                batch,
                request.tenant_id,
            )
            .await
            .map_err(|e| guard::classify_append_failure(e, expected))?;

        tracing::debug!(
            aggregate = %self.aggregate_type,
            id = %request.aggregate_id,
            "Events saved"
        );
        Ok(())
    }

    /// Load and fold an aggregate's history into a versioned snapshot.
    ///
    /// The snapshot is rebuilt from the full history on every call; nothing
    /// is cached client-side.
    ///
    /// # Errors
    ///
    /// Same load and fold failures as [`AggregateClient::update`].
    pub async fn load_state(
        &self,
        aggregate_id: AggregateId,
    ) -> Result<VersionedState<S>, AggregateError>
    where
        S: Default,
    {
        self.load_inner(aggregate_id, None).await
    }

    /// Tenant-scoped variant of [`AggregateClient::load_state`].
    ///
    /// # Errors
    ///
    /// Same as [`AggregateClient::load_state`].
    pub async fn load_state_for_tenant(
        &self,
        aggregate_id: AggregateId,
        tenant_id: TenantId,
    ) -> Result<VersionedState<S>, AggregateError>
    where
        S: Default,
    {
        self.load_inner(aggregate_id, Some(tenant_id)).await
    }

    async fn load_inner(
        &self,
        aggregate_id: AggregateId,
        tenant_id: Option<TenantId>,
    ) -> Result<VersionedState<S>, AggregateError>
    where
        S: Default,
    {
        let LoadedAggregate {
            aggregate_version,
            events,
            ..
        } = self
            .api
            .load_aggregate(self.aggregate_type.clone(), aggregate_id, tenant_id)
            .await
            .map_err(|e| match e {
                ApiError::NotFound => AggregateError::NotFound,
                other => AggregateError::Backend(other),
            })?;

        tracing::debug!(
            aggregate = %self.aggregate_type,
            id = %aggregate_id,
            version = %aggregate_version,
            events = events.len(),
            "Aggregate loaded"
        );

        let state = self.state_builder.build(&events)?;
        Ok(VersionedState {
            state,
            version: aggregate_version,
        })
    }

    /// Check whether an aggregate exists.
    ///
    /// A backend `NotFound` maps to `Ok(false)`; every other failure
    /// propagates.
    ///
    /// # Errors
    ///
    /// [`AggregateError::Backend`] for non-404 backend failures.
    pub async fn exists(&self, aggregate_id: AggregateId) -> Result<bool, AggregateError> {
        self.exists_inner(aggregate_id, None).await
    }

    /// Tenant-scoped variant of [`AggregateClient::exists`].
    ///
    /// # Errors
    ///
    /// Same as [`AggregateClient::exists`].
    pub async fn exists_for_tenant(
        &self,
        aggregate_id: AggregateId,
        tenant_id: TenantId,
    ) -> Result<bool, AggregateError> {
        self.exists_inner(aggregate_id, Some(tenant_id)).await
    }

    async fn exists_inner(
        &self,
        aggregate_id: AggregateId,
        tenant_id: Option<TenantId>,
    ) -> Result<bool, AggregateError> {
        match self
            .api
            .aggregate_exists(self.aggregate_type.clone(), aggregate_id, tenant_id)
            .await
        {
            Ok(()) => Ok(true),
            Err(ApiError::NotFound) => Ok(false),
            Err(other) => Err(AggregateError::Backend(other)),
        }
    }

    /// Request deletion of a single aggregate instance.
    ///
    /// Returns the [`PendingDelete`] handshake value; nothing is deleted
    /// until it is confirmed.
    ///
    /// # Errors
    ///
    /// [`AggregateError::NotFound`] if the aggregate does not exist;
    /// [`AggregateError::Backend`] for other backend failures.
    pub async fn delete_by_id(
        &self,
        aggregate_id: AggregateId,
    ) -> Result<PendingDelete, AggregateError> {
        self.request_delete(
            DeleteScope::Instance {
                aggregate_type: self.aggregate_type.clone(),
                aggregate_id,
            },
            None,
        )
        .await
    }

    /// Tenant-scoped variant of [`AggregateClient::delete_by_id`].
    ///
    /// # Errors
    ///
    /// Same as [`AggregateClient::delete_by_id`].
    pub async fn delete_by_id_for_tenant(
        &self,
        aggregate_id: AggregateId,
        tenant_id: TenantId,
    ) -> Result<PendingDelete, AggregateError> {
        self.request_delete(
            DeleteScope::Instance {
                aggregate_type: self.aggregate_type.clone(),
                aggregate_id,
            },
            Some(tenant_id),
        )
        .await
    }

    /// Request deletion of the entire aggregate type: all instances, all
    /// history.
    ///
    /// # Errors
    ///
    /// [`AggregateError::Backend`] on backend failure.
    pub async fn delete_by_type(&self) -> Result<PendingDelete, AggregateError> {
        self.request_delete(
            DeleteScope::Type {
                aggregate_type: self.aggregate_type.clone(),
            },
            None,
        )
        .await
    }

    /// Tenant-scoped variant of [`AggregateClient::delete_by_type`].
    ///
    /// # Errors
    ///
    /// Same as [`AggregateClient::delete_by_type`].
    pub async fn delete_by_type_for_tenant(
        &self,
        tenant_id: TenantId,
    ) -> Result<PendingDelete, AggregateError> {
        self.request_delete(
            DeleteScope::Type {
                aggregate_type: self.aggregate_type.clone(),
            },
            Some(tenant_id),
        )
        .await
    }

    async fn request_delete(
        &self,
        scope: DeleteScope,
        tenant_id: Option<TenantId>,
    ) -> Result<PendingDelete, AggregateError> {
        PendingDelete::request(Arc::clone(&self.api), scope, tenant_id).await
    }
}

/// Builder for [`AggregateClient`].
///
/// Handlers registered here form the immutable fold registry; optimistic
/// concurrency defaults to enabled.
pub struct AggregateClientBuilder<S> {
    api: Arc<dyn EventStoreApi>,
    aggregate_type: AggregateType,
    state_builder: StateBuilder<S>,
    optimistic_concurrency: bool,
}

impl<S> AggregateClientBuilder<S> {
    /// Register a typed fold handler for `E`.
    #[must_use]
    pub fn with_handler<E, F>(mut self, handler: F) -> Self
    where
        E: DomainEvent,
        F: Fn(S, E) -> S + Send + Sync + 'static,
    {
        self.state_builder = self.state_builder.with_handler(handler);
        self
    }

    /// Enable or disable the expected-version check on updates.
    ///
    /// Disabled means updates append unconditionally; lost updates between
    /// load and append go undetected. Default is enabled.
    #[must_use]
    pub const fn use_optimistic_concurrency(mut self, enabled: bool) -> Self {
        self.optimistic_concurrency = enabled;
        self
    }

    /// Finish the builder.
    #[must_use]
    pub fn build(self) -> AggregateClient<S> {
        AggregateClient {
            api: self.api,
            aggregate_type: self.aggregate_type,
            state_builder: self.state_builder,
            optimistic_concurrency: self.optimistic_concurrency,
        }
    }
}
