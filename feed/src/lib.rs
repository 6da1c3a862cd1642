//! # Eventline Feed
//!
//! Consumption of the ordered, paginated feed of committed event batches.
//!
//! Two modes share one drain loop:
//!
//! - [`FeedClient::execute`] — eager drain: fetch pages and hand entries to
//!   a handler until the backend reports no more data, then return the final
//!   cursor. Blocks the calling task; no internal concurrency.
//! - [`FeedClient::subscribe`] — background polling: one dedicated task per
//!   subscription runs a full drain pass, sleeps a fixed delay measured from
//!   pass completion (passes never overlap), and repeats until the client is
//!   closed.
//!
//! Cursor advancement is a client-side decision made per entry from the
//! handler's [`EntryOutcome`]: `Advance` moves the cursor, `Retry` leaves it
//! behind while the pass continues forward, `Fail` aborts the pass. The
//! cursor value is returned to the caller, never persisted here; delivery
//! guarantees across restarts rest on the caller's cursor storage.
//!
//! # Example
//!
//! ```ignore
//! use eventline_feed::{EntryOutcome, FeedClient, GetFeedRequest};
//! use eventline_core::api::SequenceNumber;
//!
//! let feed = FeedClient::new(api);
//! let request = GetFeedRequest::new("orders").with_limit(100);
//!
//! let cursor = feed
//!     .execute(&request, SequenceNumber::new(checkpoint), &|entry| {
//!         match project(entry) {
//!             Ok(()) => EntryOutcome::Advance,
//!             Err(Transient) => EntryOutcome::Retry,
//!             Err(fatal) => EntryOutcome::fail(fatal),
//!         }
//!     })
//!     .await?;
//! checkpoint_store.save(cursor)?;
//! ```

pub mod cursor;
pub mod handler;
pub mod request;

pub use cursor::FeedCursor;
pub use handler::{EntryOutcome, FeedEntryHandler, HandlerError};
pub use request::GetFeedRequest;

use eventline_core::TenantId;
use eventline_core::api::{ApiError, EventStoreApi, Feed, FeedPage, SequenceNumber};
use futures::future::join_all;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Errors surfaced by feed operations.
#[derive(Error, Debug)]
pub enum FeedError {
    /// A backend failure, propagated unchanged.
    #[error(transparent)]
    Backend(#[from] ApiError),

    /// A handler reported a non-retryable failure for an entry.
    #[error("Handler failed at sequence number {sequence_number}")]
    Handler {
        /// The entry the handler failed on.
        sequence_number: SequenceNumber,
        /// The handler's reason.
        #[source]
        source: HandlerError,
    },

    /// The client was closed; no new subscriptions are accepted.
    #[error("Feed client is closed")]
    Closed,
}

/// One registered background subscription.
struct Subscription {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

/// Client for feed reads and subscriptions.
///
/// Owns the registry of background subscription tasks. Subscriptions share
/// no mutable state with each other or with any aggregate session — each
/// task owns its cursor. Closing the client is the only way to stop them;
/// there is no selective unsubscribe.
pub struct FeedClient {
    api: Arc<dyn EventStoreApi>,
    subscriptions: std::sync::Mutex<Vec<Subscription>>,
    closed: AtomicBool,
}

impl FeedClient {
    /// Create a feed client over the given backend.
    #[must_use]
    pub fn new(api: Arc<dyn EventStoreApi>) -> Self {
        Self {
            api,
            subscriptions: std::sync::Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        }
    }

    /// List available feeds with their aggregate, batch and event counts.
    ///
    /// # Errors
    ///
    /// [`FeedError::Backend`] on backend failure.
    pub async fn list_feeds(&self) -> Result<Vec<Feed>, FeedError> {
        Ok(self.api.list_feeds(None).await?)
    }

    /// Tenant-scoped variant of [`FeedClient::list_feeds`].
    ///
    /// # Errors
    ///
    /// [`FeedError::Backend`] on backend failure.
    pub async fn list_feeds_for_tenant(
        &self,
        tenant_id: TenantId,
    ) -> Result<Vec<Feed>, FeedError> {
        Ok(self.api.list_feeds(Some(tenant_id)).await?)
    }

    /// Get the head sequence number of the requested feed.
    ///
    /// Useful for starting a subscription at the tail: everything committed
    /// before this call is skipped.
    ///
    /// # Errors
    ///
    /// [`FeedError::Backend`] on backend failure.
    pub async fn current_sequence_number(
        &self,
        request: &GetFeedRequest,
    ) -> Result<SequenceNumber, FeedError> {
        Ok(self
            .api
            .feed_sequence_number(request.feed_name().to_string(), request.tenant_id())
            .await?)
    }

    /// Fetch a single feed page strictly after `since`.
    ///
    /// # Errors
    ///
    /// [`FeedError::Backend`] on backend failure.
    pub async fn poll(
        &self,
        request: &GetFeedRequest,
        since: SequenceNumber,
    ) -> Result<FeedPage, FeedError> {
        fetch_page(&self.api, request, since).await
    }

    /// Drain the feed from `since`, invoking `handler` per entry.
    ///
    /// Fetches pages until the backend reports no more data (or after one
    /// page, if eager fetching is disabled on the request). Returns the
    /// final cursor position: the highest sequence number the handler
    /// advanced past. Entries the handler asked to retry are skipped without
    /// advancement and will reappear in a later call that starts from the
    /// returned cursor, unless a later entry advanced past them.
    ///
    /// # Errors
    ///
    /// - [`FeedError::Backend`] if a page fetch fails
    /// - [`FeedError::Handler`] if the handler reports a failure; entries
    ///   already advanced past stay advanced (the returned error does not
    ///   roll the pass back, but the cursor value is lost — use a
    ///   subscription for resumable consumption)
    pub async fn execute<H>(
        &self,
        request: &GetFeedRequest,
        since: SequenceNumber,
        handler: &H,
    ) -> Result<SequenceNumber, FeedError>
    where
        H: FeedEntryHandler,
    {
        let mut cursor = FeedCursor::new(since);
        drain_pass(&self.api, request, &mut cursor, handler, None).await?;
        Ok(cursor.position())
    }

    /// Start a background subscription from `since`.
    ///
    /// Spawns one polling task owned by this client. Every tick runs a full
    /// drain pass from the task's cursor, then sleeps the request's poll
    /// delay. A pass that fails (page fetch or handler failure) is logged
    /// and abandoned; the next tick resumes from the last advanced cursor,
    /// so progress made before the failure is kept.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// [`FeedError::Closed`] if the client was already closed.
    pub fn subscribe<H>(
        &self,
        request: GetFeedRequest,
        since: SequenceNumber,
        handler: H,
    ) -> Result<(), FeedError>
    where
        H: FeedEntryHandler + 'static,
    {
        if self.closed.load(Ordering::Acquire) {
            return Err(FeedError::Closed);
        }

        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let api = Arc::clone(&self.api);

        tracing::info!(
            feed = request.feed_name(),
            since = since.value(),
            poll_delay_ms = request.poll_delay().as_millis() as u64,
            "Subscription started"
        );

        let task = tokio::spawn(async move {
            let mut cursor = FeedCursor::new(since);
            loop {
                if *shutdown_rx.borrow() {
                    break;
                }

                if let Err(error) =
                    drain_pass(&api, &request, &mut cursor, &handler, Some(&shutdown_rx)).await
                {
                    metrics::counter!("feed.passes.failed").increment(1);
                    tracing::warn!(
                        feed = request.feed_name(),
                        cursor = cursor.position().value(),
                        error = %error,
                        "Subscription pass failed; retrying next tick"
                    );
                }

                // Fixed delay from pass completion, so passes never overlap.
                tokio::select! {
                    _ = shutdown_rx.changed() => break,
                    () = tokio::time::sleep(request.poll_delay()) => {}
                }
            }
        });

        let mut subscriptions = lock_registry(&self.subscriptions);
        subscriptions.push(Subscription {
            shutdown: shutdown_tx,
            task,
        });
        Ok(())
    }

    /// Stop all subscriptions and wait for them to finish.
    ///
    /// Signals every subscription task, then joins them within `timeout`.
    /// Tasks still running at the bound are aborted and the abort is awaited,
    /// so no handler is invoked after this method returns. Subsequent
    /// `subscribe` calls fail with [`FeedError::Closed`].
    pub async fn close(&self, timeout: Duration) {
        self.closed.store(true, Ordering::Release);

        let subscriptions: Vec<Subscription> = {
            let mut registry = lock_registry(&self.subscriptions);
            registry.drain(..).collect()
        };
        if subscriptions.is_empty() {
            return;
        }

        let mut tasks = Vec::with_capacity(subscriptions.len());
        for subscription in subscriptions {
            let _ = subscription.shutdown.send(true);
            tasks.push(subscription.task);
        }

        if tokio::time::timeout(timeout, join_all(tasks.iter_mut()))
            .await
            .is_err()
        {
            tracing::warn!(
                stragglers = tasks.iter().filter(|t| !t.is_finished()).count(),
                "Subscriptions exceeded shutdown bound; aborting"
            );
            for task in &tasks {
                task.abort();
            }
            let _ = join_all(tasks).await;
        }

        metrics::counter!("feed.clients.closed").increment(1);
        tracing::info!("Feed client closed");
    }
}

impl Drop for FeedClient {
    fn drop(&mut self) {
        // A dropped client must not leak polling tasks.
        let registry = lock_registry(&self.subscriptions);
        for subscription in registry.iter() {
            subscription.task.abort();
        }
    }
}

fn lock_registry(
    registry: &std::sync::Mutex<Vec<Subscription>>,
) -> std::sync::MutexGuard<'_, Vec<Subscription>> {
    registry
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
}

async fn fetch_page(
    api: &Arc<dyn EventStoreApi>,
    request: &GetFeedRequest,
    since: SequenceNumber,
) -> Result<FeedPage, FeedError> {
    let page = api
        .feed_page(
            request.feed_name().to_string(),
            since,
            request.options(),
            request.tenant_id(),
        )
        .await?;
    tracing::debug!(
        feed = request.feed_name(),
        since = since.value(),
        entries = page.entries.len(),
        has_more = page.has_more,
        "Feed page fetched"
    );
    Ok(page)
}

/// One full drain pass: fetch pages and dispatch entries until drained.
///
/// `cursor` is the durable position, advanced only on
/// [`EntryOutcome::Advance`]; pagination within the pass moves past every seen entry so a
/// retried entry is not re-delivered until a later pass. Progress made
/// before a failure stays in `cursor`.
async fn drain_pass<H>(
    api: &Arc<dyn EventStoreApi>,
    request: &GetFeedRequest,
    cursor: &mut FeedCursor,
    handler: &H,
    shutdown: Option<&watch::Receiver<bool>>,
) -> Result<(), FeedError>
where
    H: FeedEntryHandler,
{
    let mut page_position = cursor.position();

    loop {
        let page = fetch_page(api, request, page_position).await?;

        for entry in &page.entries {
            if shutdown.is_some_and(|rx| *rx.borrow()) {
                return Ok(());
            }

            match handler.handle(entry) {
                EntryOutcome::Advance => {
                    cursor.advance_to(entry.sequence_number);
                }
                EntryOutcome::Retry => {
                    metrics::counter!("feed.entries.retried").increment(1);
                    tracing::debug!(
                        feed = request.feed_name(),
                        sequence_number = entry.sequence_number.value(),
                        "Handler requested retry; cursor not advanced"
                    );
                }
                EntryOutcome::Fail(source) => {
                    return Err(FeedError::Handler {
                        sequence_number: entry.sequence_number,
                        source,
                    });
                }
            }

            if entry.sequence_number > page_position {
                page_position = entry.sequence_number;
            }
        }

        if !(request.eager_fetching() && page.has_more) {
            return Ok(());
        }
    }
}
