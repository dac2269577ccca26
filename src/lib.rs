//! Backend for the parish administration app: the record-type registry, the
//! storage handles, and the bidirectional reconciliation between the local
//! and remote datastores. The form/tab UI sits on top of this crate and only
//! calls the entry points re-exported below.

pub mod config;
pub mod db;
pub mod logging;
pub mod migrate;
pub mod registry;
pub mod store;
pub mod sync;
pub mod time;
pub mod validation;

pub use config::{AppConfig, StoreConfig, SyncSettings};
pub use registry::{record_type, sync_order, RecordType};
pub use store::{StoreError, SyncStore};
pub use sync::{
    count_pending, sync_local_to_remote, sync_remote_to_local, sync_stats, Direction, LogProgress,
    ProgressLevel, ProgressSink, RunReport, RunStatus, SyncError, TypeSummary,
};
