//! Bidirectional reconciliation between the local and remote stores.
//!
//! One run mirrors every registered record type in dependency order from a
//! source store into a destination store. The two directions are symmetric
//! invocations with the handles swapped; local→remote additionally restricts
//! the source to pending rows and writes the assigned remote keys back.

pub mod cache;
pub mod matcher;
pub mod orchestrate;
pub mod project;
pub mod reconcile;

pub use cache::IdentityCache;
pub use orchestrate::{
    count_pending, run_direction, sync_local_to_remote, sync_remote_to_local, sync_stats,
    verify_natural_key_parity, ParityReport, RunReport, RunStatus, SyncStats,
};
pub use reconcile::{reconcile_type, TypeSummary};

use thiserror::Error;

use crate::registry::{LOCAL_REF_FIELD, REMOTE_REF_FIELD};
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("store unavailable before run start: {0}")]
    StoreUnavailable(#[source] StoreError),
    #[error("storage error: {0}")]
    Store(#[source] StoreError),
    #[error("record type {0} declares no natural key")]
    NoNaturalKey(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    RemoteToLocal,
    LocalToRemote,
}

impl Direction {
    pub fn label(self) -> &'static str {
        match self {
            Direction::RemoteToLocal => "remote → local",
            Direction::LocalToRemote => "local → remote",
        }
    }

    /// Field on a source row that points at its destination counterpart.
    pub fn source_ref_field(self) -> &'static str {
        match self {
            // Source rows live on the remote store; their pointer at the
            // local store is id_local.
            Direction::RemoteToLocal => LOCAL_REF_FIELD,
            Direction::LocalToRemote => REMOTE_REF_FIELD,
        }
    }

    /// Field stamped on a destination row to point back at the source.
    pub fn dest_ref_field(self) -> &'static str {
        match self {
            Direction::RemoteToLocal => REMOTE_REF_FIELD,
            Direction::LocalToRemote => LOCAL_REF_FIELD,
        }
    }

    /// Only the local→remote pass restricts the source to pending rows.
    pub fn filters_pending(self) -> bool {
        matches!(self, Direction::LocalToRemote)
    }

    /// Only the local→remote pass records the assigned destination key back
    /// on the source row.
    pub fn writes_back(self) -> bool {
        matches!(self, Direction::LocalToRemote)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressLevel {
    Info,
    Warning,
    Error,
}

/// Where run progress goes. The UI passes something that feeds its status
/// pane; headless callers can use [`LogProgress`].
pub trait ProgressSink {
    fn emit(&self, level: ProgressLevel, message: &str);
}

/// Progress sink backed by the tracing subscriber.
pub struct LogProgress;

impl ProgressSink for LogProgress {
    fn emit(&self, level: ProgressLevel, message: &str) {
        match level {
            ProgressLevel::Info => {
                tracing::info!(target: "sacristia", event = "sync_progress", "{message}")
            }
            ProgressLevel::Warning => {
                tracing::warn!(target: "sacristia", event = "sync_progress", "{message}")
            }
            ProgressLevel::Error => {
                tracing::error!(target: "sacristia", event = "sync_progress", "{message}")
            }
        }
    }
}
