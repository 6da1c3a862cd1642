//! Two-phase aggregate deletion.
//!
//! Deleting an aggregate type is destructive and irreversible: every
//! instance and all history goes with it. The protocol therefore splits the
//! operation in two — request a token, then confirm with that token — so a
//! single malformed call can never be catastrophic.
//!
//! [`PendingDelete`] is the in-between value. `confirm` consumes it, which
//! makes client-side reuse unrepresentable: once confirmed, the value is
//! gone. A token that crossed a process restart can be picked back up with
//! [`PendingDelete::resume`]; confirming a token the backend has already
//! consumed surfaces [`AggregateError::PreconditionFailed`].
//!
//! # Example
//!
//! ```ignore
//! let pending = client.delete_by_id(order_id).await?;
//! audit_log.record(pending.token());
//! pending.confirm().await?;
//! ```

use crate::error::AggregateError;
use eventline_core::api::{DeleteScope, DeleteToken, EventStoreApi};
use eventline_core::{ApiError, TenantId};
use std::sync::Arc;

/// A requested-but-unconfirmed deletion.
///
/// Holds the single-use token the backend issued for the scope. Dropping
/// the value abandons the request; the backend's token simply expires
/// unused.
pub struct PendingDelete {
    api: Arc<dyn EventStoreApi>,
    scope: DeleteScope,
    tenant_id: Option<TenantId>,
    token: DeleteToken,
}

impl PendingDelete {
    /// Ask the backend for a delete token covering `scope`.
    pub(crate) async fn request(
        api: Arc<dyn EventStoreApi>,
        scope: DeleteScope,
        tenant_id: Option<TenantId>,
    ) -> Result<Self, AggregateError> {
        let token = api
            .request_delete(scope.clone(), tenant_id)
            .await
            .map_err(|e| match e {
                ApiError::NotFound => AggregateError::NotFound,
                other => AggregateError::Backend(other),
            })?;
        tracing::debug!(scope = %scope, "Delete requested");
        Ok(Self {
            api,
            scope,
            tenant_id,
            token,
        })
    }

    /// Rebuild a pending delete from a previously issued token.
    ///
    /// For confirms that must survive a process restart: persist
    /// [`PendingDelete::token`] and the scope, then resume here. The backend
    /// still enforces single use.
    #[must_use]
    pub fn resume(
        api: Arc<dyn EventStoreApi>,
        scope: DeleteScope,
        tenant_id: Option<TenantId>,
        token: DeleteToken,
    ) -> Self {
        Self {
            api,
            scope,
            tenant_id,
            token,
        }
    }

    /// The token the backend issued for this deletion.
    #[must_use]
    pub const fn token(&self) -> &DeleteToken {
        &self.token
    }

    /// The scope this deletion covers.
    #[must_use]
    pub const fn scope(&self) -> &DeleteScope {
        &self.scope
    }

    /// Confirm the deletion, consuming this value.
    ///
    /// # Errors
    ///
    /// - [`AggregateError::PreconditionFailed`] if the token was already
    ///   consumed or never issued
    /// - [`AggregateError::Backend`] for any other backend failure
    pub async fn confirm(self) -> Result<(), AggregateError> {
        let scope = self.scope.clone();
        self.api
            .confirm_delete(self.scope, self.token, self.tenant_id)
            .await
            .map_err(|e| match e {
                ApiError::PreconditionFailed { message } => {
                    AggregateError::PreconditionFailed { message }
                }
                other => AggregateError::Backend(other),
            })?;
        metrics::counter!("aggregate.deletes.confirmed").increment(1);
        tracing::info!(scope = %scope, "Delete confirmed");
        Ok(())
    }
}
