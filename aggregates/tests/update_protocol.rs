//! Integration tests for the aggregate update protocol.
//!
//! Drives `AggregateClient` against the in-memory backend: expected-version
//! submission, conflict surfacing, the empty-update short-circuit, and the
//! two-phase delete handshake.

use eventline_aggregates::{AggregateClient, AggregateError, SaveRequest};
use eventline_core::event::{DomainEvent, Event};
use eventline_core::{AggregateId, AggregateType, ApiError, TenantId, Version};
use eventline_testing::InMemoryApi;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Clone, Debug, Default, PartialEq)]
struct OrderState {
    placed: bool,
    cancelled: bool,
    amount: i64,
}

#[derive(Debug, Serialize, Deserialize)]
struct OrderPlaced {
    amount: i64,
}

impl DomainEvent for OrderPlaced {
    const EVENT_TYPE: &'static str = "OrderPlaced";
}

#[derive(Debug, Serialize, Deserialize)]
struct OrderCancelled {}

impl DomainEvent for OrderCancelled {
    const EVENT_TYPE: &'static str = "OrderCancelled";
}

fn order_client(api: Arc<InMemoryApi>) -> AggregateClient<OrderState> {
    AggregateClient::builder("order", api)
        .with_handler(|state: OrderState, event: OrderPlaced| OrderState {
            placed: true,
            amount: event.amount,
            ..state
        })
        .with_handler(|state: OrderState, _event: OrderCancelled| OrderState {
            cancelled: true,
            ..state
        })
        .build()
}

fn order_id() -> AggregateId {
    AggregateId::new(Uuid::parse_str("723ecfce-14e9-4889-98d5-a3d0ad54912f").unwrap())
}

fn placed_event() -> Event {
    Event::from_payload(&OrderPlaced { amount: 123 }).unwrap()
}

#[tokio::test]
async fn update_submits_expected_version() {
    let api = Arc::new(InMemoryApi::new());
    api.seed_aggregate(AggregateType::new("order"), order_id(), vec![placed_event()]);
    let client = order_client(Arc::clone(&api));

    client
        .update(order_id(), |state| {
            assert!(state.placed);
            vec![Event::from_payload(&OrderCancelled {}).unwrap()]
        })
        .await
        .unwrap();

    let appends = api.recorded_appends();
    assert_eq!(appends.len(), 1);
    assert_eq!(appends[0].batch.expected_version, Some(Version::new(1)));
    assert_eq!(appends[0].batch.events.len(), 1);
    assert_eq!(appends[0].batch.events[0].event_type, "OrderCancelled");
}

#[tokio::test]
async fn update_surfaces_conflict_without_retry() {
    let api = Arc::new(InMemoryApi::new());
    api.seed_aggregate(AggregateType::new("order"), order_id(), vec![placed_event()]);
    api.fail_next_append(ApiError::Conflict {
        message: "expected version 1, found 2".to_string(),
    });
    let client = order_client(Arc::clone(&api));

    let result = client
        .update(order_id(), |_state| {
            vec![Event::from_payload(&OrderCancelled {}).unwrap()]
        })
        .await;

    assert!(matches!(
        result,
        Err(AggregateError::ConcurrencyConflict {
            expected: Some(v),
            ..
        }) if v == Version::new(1)
    ));
    // Exactly one attempt: conflicts are never retried by the client.
    assert_eq!(api.recorded_appends().len(), 1);
}

#[tokio::test]
async fn update_with_no_events_performs_no_write() {
    let api = Arc::new(InMemoryApi::new());
    api.seed_aggregate(AggregateType::new("order"), order_id(), vec![placed_event()]);
    let client = order_client(Arc::clone(&api));

    client.update(order_id(), |_state| vec![]).await.unwrap();

    assert!(api.recorded_appends().is_empty());
}

#[tokio::test]
async fn update_without_optimistic_concurrency_omits_expected_version() {
    let api = Arc::new(InMemoryApi::new());
    api.seed_aggregate(AggregateType::new("order"), order_id(), vec![placed_event()]);
    let client = AggregateClient::<OrderState>::builder("order", Arc::<InMemoryApi>::clone(&api))
        .with_handler(|state: OrderState, event: OrderPlaced| OrderState {
            placed: true,
            amount: event.amount,
            ..state
        })
        .with_handler(|state: OrderState, _event: OrderCancelled| OrderState {
            cancelled: true,
            ..state
        })
        .use_optimistic_concurrency(false)
        .build();

    client
        .update(order_id(), |_state| {
            vec![Event::from_payload(&OrderCancelled {}).unwrap()]
        })
        .await
        .unwrap();

    let appends = api.recorded_appends();
    assert_eq!(appends.len(), 1);
    assert_eq!(appends[0].batch.expected_version, None);
}

#[tokio::test]
async fn update_on_missing_aggregate_is_not_found() {
    let api = Arc::new(InMemoryApi::new());
    let client = order_client(api);

    let result = client
        .update(AggregateId::random(), |_state| {
            vec![Event::from_payload(&OrderCancelled {}).unwrap()]
        })
        .await;

    assert!(matches!(result, Err(AggregateError::NotFound)));
}

#[tokio::test]
async fn unregistered_event_type_in_history_is_fatal() {
    let api = Arc::new(InMemoryApi::new());
    api.seed_aggregate(
        AggregateType::new("order"),
        order_id(),
        vec![
            placed_event(),
            Event::raw("OrderArchived", serde_json::json!({})),
        ],
    );
    let client = order_client(api);

    let result = client.update(order_id(), |_state| vec![]).await;

    assert!(matches!(
        result,
        Err(AggregateError::UnknownEventType(ref t)) if t == "OrderArchived"
    ));
}

#[tokio::test]
async fn save_creates_a_fresh_aggregate() {
    let api = Arc::new(InMemoryApi::new());
    let client = order_client(Arc::clone(&api));
    let id = AggregateId::random();

    client
        .save(SaveRequest::new(id).with_event(placed_event()))
        .await
        .unwrap();

    let loaded = client.load_state(id).await.unwrap();
    assert_eq!(loaded.version, Version::new(1));
    assert!(loaded.state.placed);
    assert_eq!(loaded.state.amount, 123);
}

#[tokio::test]
async fn save_with_no_events_is_a_noop() {
    let api = Arc::new(InMemoryApi::new());
    let client = order_client(Arc::clone(&api));

    client.save(SaveRequest::new(AggregateId::random())).await.unwrap();

    assert!(api.recorded_appends().is_empty());
}

#[tokio::test]
async fn load_state_rebuilds_from_full_history() {
    let api = Arc::new(InMemoryApi::new());
    api.seed_aggregate(
        AggregateType::new("order"),
        order_id(),
        vec![
            placed_event(),
            Event::from_payload(&OrderCancelled {}).unwrap(),
        ],
    );
    let client = order_client(api);

    let loaded = client.load_state(order_id()).await.unwrap();

    assert_eq!(loaded.version, Version::new(2));
    assert!(loaded.state.placed);
    assert!(loaded.state.cancelled);
}

#[tokio::test]
async fn exists_maps_not_found_to_false() {
    let api = Arc::new(InMemoryApi::new());
    api.seed_aggregate(AggregateType::new("order"), order_id(), vec![placed_event()]);
    let client = order_client(api);

    assert!(client.exists(order_id()).await.unwrap());
    assert!(!client.exists(AggregateId::random()).await.unwrap());
}

#[tokio::test]
async fn tenant_scoped_update_reaches_the_tenant_aggregate() {
    let api = Arc::new(InMemoryApi::new());
    let tenant = TenantId::new(Uuid::new_v4());
    api.seed_aggregate_for_tenant(
        AggregateType::new("order"),
        order_id(),
        tenant,
        vec![placed_event()],
    );
    let client = order_client(Arc::clone(&api));

    client
        .update_for_tenant(order_id(), tenant, |_state| {
            vec![Event::from_payload(&OrderCancelled {}).unwrap()]
        })
        .await
        .unwrap();

    let appends = api.recorded_appends();
    assert_eq!(appends.len(), 1);
    assert_eq!(appends[0].tenant_id, Some(tenant));
}

#[tokio::test]
async fn delete_confirm_consumes_the_token() {
    let api = Arc::new(InMemoryApi::new());
    api.seed_aggregate(AggregateType::new("order"), order_id(), vec![placed_event()]);
    let client = order_client(Arc::clone(&api));

    let pending = client.delete_by_id(order_id()).await.unwrap();
    pending.confirm().await.unwrap();

    let confirmed = api.confirmed_deletes();
    assert_eq!(confirmed.len(), 1);
}

#[tokio::test]
async fn reused_delete_token_fails_the_precondition() {
    use eventline_aggregates::PendingDelete;
    use eventline_core::api::DeleteScope;

    let api = Arc::new(InMemoryApi::new());
    api.seed_aggregate(AggregateType::new("order"), order_id(), vec![placed_event()]);
    let client = order_client(Arc::clone(&api));

    let pending = client.delete_by_id(order_id()).await.unwrap();
    let token = pending.token().clone();
    let scope = pending.scope().clone();
    pending.confirm().await.unwrap();

    // A token that crossed a restart is picked back up with resume; the
    // backend has already consumed this one.
    let resumed = PendingDelete::resume(api, scope, None, token);
    let second = resumed.confirm().await;

    assert!(matches!(
        second,
        Err(AggregateError::PreconditionFailed { .. })
    ));
}

#[tokio::test]
async fn delete_by_type_covers_the_whole_type() {
    let api = Arc::new(InMemoryApi::new());
    let client = order_client(Arc::clone(&api));

    let pending = client.delete_by_type().await.unwrap();
    pending.confirm().await.unwrap();

    let confirmed = api.confirmed_deletes();
    assert_eq!(confirmed.len(), 1);
    assert!(matches!(
        confirmed[0],
        eventline_core::api::DeleteScope::Type { ref aggregate_type }
            if aggregate_type.as_str() == "order"
    ));
}
