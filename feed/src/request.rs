//! Feed request description.

use eventline_core::TenantId;
use eventline_core::api::FeedOptions;
use std::time::Duration;

/// Default page size requested from the backend.
const DEFAULT_LIMIT: u32 = 1000;

/// Default delay between subscription passes.
const DEFAULT_POLL_DELAY: Duration = Duration::from_secs(1);

/// Describes how to read one feed: which feed, page shape, tenancy, and the
/// consumption knobs for drain and subscription modes.
#[derive(Clone, Debug)]
pub struct GetFeedRequest {
    feed_name: String,
    options: FeedOptions,
    tenant_id: Option<TenantId>,
    eager_fetching: bool,
    poll_delay: Duration,
}

impl GetFeedRequest {
    /// Describe a read of the named feed with default settings: page limit
    /// 1000, eager fetching on, 1 second poll delay.
    #[must_use]
    pub fn new(feed_name: impl Into<String>) -> Self {
        Self {
            feed_name: feed_name.into(),
            options: FeedOptions {
                limit: Some(DEFAULT_LIMIT),
                ..FeedOptions::default()
            },
            tenant_id: None,
            eager_fetching: true,
            poll_delay: DEFAULT_POLL_DELAY,
        }
    }

    /// Override the page limit.
    #[must_use]
    pub const fn with_limit(mut self, limit: u32) -> Self {
        self.options.limit = Some(limit);
        self
    }

    /// Read one partition of a partitioned feed.
    #[must_use]
    pub const fn with_partition(mut self, partition_count: u32, partition_number: u32) -> Self {
        self.options.partition_count = Some(partition_count);
        self.options.partition_number = Some(partition_number);
        self
    }

    /// Scope the read to a tenant.
    #[must_use]
    pub const fn with_tenant(mut self, tenant_id: TenantId) -> Self {
        self.tenant_id = Some(tenant_id);
        self
    }

    /// Enable or disable fetching subsequent pages within one pass.
    ///
    /// Disabled means a drain pass stops after a single page even when the
    /// backend reports more. Default is enabled.
    #[must_use]
    pub const fn with_eager_fetching(mut self, eager: bool) -> Self {
        self.eager_fetching = eager;
        self
    }

    /// Set the fixed delay between subscription passes.
    ///
    /// The delay is measured from the completion of one pass to the start of
    /// the next, so passes never overlap.
    #[must_use]
    pub const fn with_poll_delay(mut self, delay: Duration) -> Self {
        self.poll_delay = delay;
        self
    }

    /// The feed this request reads.
    #[must_use]
    pub fn feed_name(&self) -> &str {
        &self.feed_name
    }

    /// Pagination options passed to the backend.
    #[must_use]
    pub const fn options(&self) -> FeedOptions {
        self.options
    }

    /// Tenant scope, if any.
    #[must_use]
    pub const fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }

    /// Whether a pass follows `has_more` pagination.
    #[must_use]
    pub const fn eager_fetching(&self) -> bool {
        self.eager_fetching
    }

    /// Delay between subscription passes.
    #[must_use]
    pub const fn poll_delay(&self) -> Duration {
        self.poll_delay
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_protocol_conventions() {
        let request = GetFeedRequest::new("orders");

        assert_eq!(request.feed_name(), "orders");
        assert_eq!(request.options().limit, Some(1000));
        assert!(request.eager_fetching());
        assert_eq!(request.poll_delay(), Duration::from_secs(1));
        assert!(request.tenant_id().is_none());
    }

    #[test]
    fn builder_overrides_apply() {
        let request = GetFeedRequest::new("orders")
            .with_limit(10)
            .with_partition(4, 1)
            .with_eager_fetching(false)
            .with_poll_delay(Duration::from_secs(5));

        assert_eq!(request.options().limit, Some(10));
        assert_eq!(request.options().partition_count, Some(4));
        assert_eq!(request.options().partition_number, Some(1));
        assert!(!request.eager_fetching());
        assert_eq!(request.poll_delay(), Duration::from_secs(5));
    }
}
