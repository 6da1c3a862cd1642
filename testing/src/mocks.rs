//! In-memory backend implementation for deterministic tests.

use chrono::{DateTime, Utc};
use eventline_core::api::{
    ApiError, ApiFuture, DeleteScope, DeleteToken, EventStoreApi, Feed, FeedEntry, FeedOptions,
    FeedPage, LoadedAggregate, SequenceNumber,
};
use eventline_core::event::Event;
use eventline_core::{AggregateId, AggregateType, EventBatch, TenantId, Version};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use uuid::Uuid;

/// Default page size when neither the request nor the test configures one.
const DEFAULT_PAGE_LIMIT: usize = 1000;

/// One append attempt observed by the backend, successful or not.
#[derive(Clone, Debug)]
pub struct RecordedAppend {
    /// Aggregate type targeted by the append.
    pub aggregate_type: AggregateType,
    /// Aggregate instance targeted by the append.
    pub aggregate_id: AggregateId,
    /// The submitted batch, including its expected version.
    pub batch: EventBatch,
    /// Tenant the append was scoped to, if any.
    pub tenant_id: Option<TenantId>,
}

type AggregateKey = (AggregateType, AggregateId, Option<TenantId>);

#[derive(Default)]
struct Inner {
    aggregates: HashMap<AggregateKey, Vec<Event>>,
    appends: Vec<RecordedAppend>,
    append_failure: Option<ApiError>,
    feeds: HashMap<String, Vec<FeedEntry>>,
    feed_failure: Option<ApiError>,
    issued_tokens: Vec<DeleteToken>,
    confirmed_deletes: Vec<DeleteScope>,
}

/// Deterministic in-memory `EventStoreApi`.
///
/// Behaves like a cooperative backend:
///
/// - `append_events` enforces the expected-version check against the stored
///   history (and applies at most one injected failure first)
/// - delete tokens are single-use; a second confirm fails the precondition
/// - feed pages are served strictly ascending with correct `has_more`
///
/// All mutation goes through one mutex; no method holds it across an await.
#[derive(Default)]
pub struct InMemoryApi {
    inner: Mutex<Inner>,
}

impl InMemoryApi {
    /// Create an empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Seed an aggregate's history; its version becomes the event count.
    pub fn seed_aggregate(
        &self,
        aggregate_type: AggregateType,
        aggregate_id: AggregateId,
        events: Vec<Event>,
    ) {
        self.lock()
            .aggregates
            .insert((aggregate_type, aggregate_id, None), events);
    }

    /// Seed a tenant-scoped aggregate's history.
    pub fn seed_aggregate_for_tenant(
        &self,
        aggregate_type: AggregateType,
        aggregate_id: AggregateId,
        tenant_id: TenantId,
        events: Vec<Event>,
    ) {
        self.lock()
            .aggregates
            .insert((aggregate_type, aggregate_id, Some(tenant_id)), events);
    }

    /// Seed a feed with entries. Entries are sorted by sequence number.
    pub fn seed_feed(&self, feed_name: impl Into<String>, mut entries: Vec<FeedEntry>) {
        entries.sort_by_key(|e| e.sequence_number);
        self.lock().feeds.insert(feed_name.into(), entries);
    }

    /// Fail the next append attempt with `error`, then resume normal
    /// behavior. The attempt is still recorded.
    pub fn fail_next_append(&self, error: ApiError) {
        self.lock().append_failure = Some(error);
    }

    /// Fail the next feed page fetch with `error`, then resume normal
    /// behavior.
    pub fn fail_next_feed_page(&self, error: ApiError) {
        self.lock().feed_failure = Some(error);
    }

    /// Every append attempt observed so far, in order.
    #[must_use]
    pub fn recorded_appends(&self) -> Vec<RecordedAppend> {
        self.lock().appends.clone()
    }

    /// Every delete scope confirmed so far, in order.
    #[must_use]
    pub fn confirmed_deletes(&self) -> Vec<DeleteScope> {
        self.lock().confirmed_deletes.clone()
    }

    /// Build a feed entry for seeding, at a fixed timestamp.
    #[must_use]
    pub fn feed_entry(sequence_number: u64, events: Vec<Event>) -> FeedEntry {
        FeedEntry {
            sequence_number: SequenceNumber::new(sequence_number),
            timestamp: fixed_timestamp(),
            events,
        }
    }
}

/// Fixed timestamp (2025-01-01 00:00:00 UTC) for reproducible entries.
#[must_use]
#[allow(clippy::expect_used)] // Panics: hardcoded timestamp always parses
pub fn fixed_timestamp() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
        .expect("hardcoded timestamp should always parse")
        .with_timezone(&Utc)
}

impl EventStoreApi for InMemoryApi {
    fn load_aggregate(
        &self,
        aggregate_type: AggregateType,
        aggregate_id: AggregateId,
        tenant_id: Option<TenantId>,
    ) -> ApiFuture<'_, LoadedAggregate> {
        let result = {
            let inner = self.lock();
            inner
                .aggregates
                .get(&(aggregate_type.clone(), aggregate_id, tenant_id))
                .map(|events| LoadedAggregate {
                    aggregate_id,
                    aggregate_type,
                    aggregate_version: Version::new(events.len() as u64),
                    events: events.clone(),
                })
                .ok_or(ApiError::NotFound)
        };
        Box::pin(async move { result })
    }

    fn append_events(
        &self,
        aggregate_type: AggregateType,
        aggregate_id: AggregateId,
        batch: EventBatch,
        tenant_id: Option<TenantId>,
    ) -> ApiFuture<'_, ()> {
        let result = {
            let mut inner = self.lock();
            inner.appends.push(RecordedAppend {
                aggregate_type: aggregate_type.clone(),
                aggregate_id,
                batch: batch.clone(),
                tenant_id,
            });

            if let Some(error) = inner.append_failure.take() {
                Err(error)
            } else {
                let key = (aggregate_type, aggregate_id, tenant_id);
                let current = inner.aggregates.get(&key).map_or(0, Vec::len) as u64;
                match batch.expected_version {
                    Some(expected) if expected.value() != current => Err(ApiError::Conflict {
                        message: format!(
                            "expected version {expected}, found {current}"
                        ),
                    }),
                    _ => {
                        inner.aggregates.entry(key).or_default().extend(batch.events);
                        Ok(())
                    }
                }
            }
        };
        Box::pin(async move { result })
    }

    fn aggregate_exists(
        &self,
        aggregate_type: AggregateType,
        aggregate_id: AggregateId,
        tenant_id: Option<TenantId>,
    ) -> ApiFuture<'_, ()> {
        let result = {
            let inner = self.lock();
            if inner
                .aggregates
                .contains_key(&(aggregate_type, aggregate_id, tenant_id))
            {
                Ok(())
            } else {
                Err(ApiError::NotFound)
            }
        };
        Box::pin(async move { result })
    }

    fn request_delete(
        &self,
        _scope: DeleteScope,
        _tenant_id: Option<TenantId>,
    ) -> ApiFuture<'_, DeleteToken> {
        let token = DeleteToken::new(Uuid::new_v4().to_string());
        self.lock().issued_tokens.push(token.clone());
        Box::pin(async move { Ok(token) })
    }

    fn confirm_delete(
        &self,
        scope: DeleteScope,
        token: DeleteToken,
        _tenant_id: Option<TenantId>,
    ) -> ApiFuture<'_, ()> {
        let result = {
            let mut inner = self.lock();
            if let Some(position) = inner.issued_tokens.iter().position(|t| *t == token) {
                inner.issued_tokens.remove(position);
                inner.confirmed_deletes.push(scope);
                Ok(())
            } else {
                Err(ApiError::PreconditionFailed {
                    message: format!("delete token '{token}' is not valid"),
                })
            }
        };
        Box::pin(async move { result })
    }

    fn feed_page(
        &self,
        feed_name: String,
        since: SequenceNumber,
        options: FeedOptions,
        _tenant_id: Option<TenantId>,
    ) -> ApiFuture<'_, FeedPage> {
        let result = {
            let mut inner = self.lock();
            if let Some(error) = inner.feed_failure.take() {
                Err(error)
            } else {
                let entries = inner.feeds.get(&feed_name).cloned().unwrap_or_default();
                let limit = options
                    .limit
                    .map_or(DEFAULT_PAGE_LIMIT, |l| l as usize);
                let head = entries
                    .last()
                    .map_or(SequenceNumber::BEGINNING, |e| e.sequence_number);

                let remaining: Vec<FeedEntry> = entries
                    .into_iter()
                    .filter(|e| e.sequence_number > since)
                    .collect();
                let has_more = remaining.len() > limit;
                let page: Vec<FeedEntry> = remaining.into_iter().take(limit).collect();

                Ok(FeedPage {
                    entries: page,
                    has_more,
                    current_sequence_number: head,
                })
            }
        };
        Box::pin(async move { result })
    }

    fn list_feeds(&self, _tenant_id: Option<TenantId>) -> ApiFuture<'_, Vec<Feed>> {
        let feeds = {
            let inner = self.lock();
            inner
                .feeds
                .iter()
                .map(|(name, entries)| Feed {
                    aggregate_type: name.clone(),
                    aggregate_count: inner
                        .aggregates
                        .keys()
                        .filter(|(t, _, _)| t.as_str() == name)
                        .count() as u64,
                    batch_count: entries.len() as u64,
                    event_count: entries.iter().map(|e| e.events.len() as u64).sum(),
                })
                .collect()
        };
        Box::pin(async move { Ok(feeds) })
    }

    fn feed_sequence_number(
        &self,
        feed_name: String,
        _tenant_id: Option<TenantId>,
    ) -> ApiFuture<'_, SequenceNumber> {
        let head = {
            let inner = self.lock();
            inner
                .feeds
                .get(&feed_name)
                .and_then(|entries| entries.last())
                .map_or(SequenceNumber::BEGINNING, |e| e.sequence_number)
        };
        Box::pin(async move { Ok(head) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order_event() -> Event {
        Event::raw("OrderPlaced", serde_json::json!({"orderId": "o-1"}))
    }

    #[tokio::test]
    async fn load_missing_aggregate_is_not_found() {
        let api = InMemoryApi::new();
        let result = api
            .load_aggregate(AggregateType::new("order"), AggregateId::random(), None)
            .await;
        assert!(matches!(result, Err(ApiError::NotFound)));
    }

    #[tokio::test]
    #[allow(clippy::expect_used)] // Panics: test will fail if load fails
    async fn version_counts_stored_events() {
        let api = InMemoryApi::new();
        let id = AggregateId::random();
        api.seed_aggregate(
            AggregateType::new("order"),
            id,
            vec![order_event(), order_event()],
        );

        let loaded = api
            .load_aggregate(AggregateType::new("order"), id, None)
            .await
            .expect("aggregate should load");
        assert_eq!(loaded.aggregate_version, Version::new(2));
    }

    #[tokio::test]
    async fn stale_expected_version_conflicts() {
        let api = InMemoryApi::new();
        let id = AggregateId::random();
        api.seed_aggregate(AggregateType::new("order"), id, vec![order_event()]);

        let batch = EventBatch::checked(vec![order_event()], Version::new(0));
        let result = api
            .append_events(AggregateType::new("order"), id, batch, None)
            .await;

        assert!(matches!(result, Err(ApiError::Conflict { .. })));
        assert_eq!(api.recorded_appends().len(), 1);
    }

    #[tokio::test]
    #[allow(clippy::expect_used)] // Panics: test will fail if calls fail
    async fn delete_tokens_are_single_use() {
        let api = InMemoryApi::new();
        let scope = DeleteScope::Type {
            aggregate_type: AggregateType::new("order"),
        };

        let token = api
            .request_delete(scope.clone(), None)
            .await
            .expect("token should be issued");

        api.confirm_delete(scope.clone(), token.clone(), None)
            .await
            .expect("first confirm should succeed");

        let second = api.confirm_delete(scope, token, None).await;
        assert!(matches!(second, Err(ApiError::PreconditionFailed { .. })));
    }

    #[tokio::test]
    #[allow(clippy::expect_used)] // Panics: test will fail if fetch fails
    async fn feed_pages_respect_since_and_limit() {
        let api = InMemoryApi::new();
        let entries = (1..=5)
            .map(|n| InMemoryApi::feed_entry(n, vec![order_event()]))
            .collect();
        api.seed_feed("orders", entries);

        let options = FeedOptions {
            limit: Some(2),
            ..FeedOptions::default()
        };
        let page = api
            .feed_page("orders".to_string(), SequenceNumber::new(1), options, None)
            .await
            .expect("page should load");

        assert_eq!(page.entries.len(), 2);
        assert_eq!(page.entries[0].sequence_number, SequenceNumber::new(2));
        assert!(page.has_more);
        assert_eq!(page.current_sequence_number, SequenceNumber::new(5));
    }
}
