use serde::Serialize;
use uuid::Uuid;

use crate::infra::gateway::GatewayError;

/// Failures surfaced by the sync engine. None of them are fatal: the worst
/// outcome is a stale view until the next successful load.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// Bulk fetch failed; the previous view is retained.
    #[error("failed to load notifications for {user_id}: {source}")]
    LoadFailure {
        user_id: Uuid,
        #[source]
        source: GatewayError,
    },
    /// A remote mark/delete failed after the local change was applied.
    #[error("remote {operation} failed: {source}")]
    MutationFailure {
        operation: &'static str,
        #[source]
        source: GatewayError,
    },
    /// A record belonging to another user reached this session.
    #[error("notification {notification_id} belongs to {record_user}, not {session_user}")]
    IdentityMismatch {
        notification_id: Uuid,
        record_user: Uuid,
        session_user: Uuid,
    },
    #[error("no authenticated session")]
    NoSession,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    Applied { records: usize, unread: usize },
    /// A newer load or an identity change overtook this one; its result was discarded.
    Superseded,
    /// Signed out; the store was reset and nothing was fetched.
    SignedOut,
}

/// Result of the remote half of an optimistic mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationOutcome {
    Confirmed,
    /// The remote row was already gone; nothing left to reconcile.
    NotFound,
    /// Remote call failed; the local change stands until the next load.
    Deferred,
    NoSession,
}
