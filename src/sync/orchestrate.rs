use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::config::SyncSettings;
use crate::registry::{sync_order, RecordType, SYNC_FLAG_FIELD, SYNC_STAMP_FIELD};
use crate::store::{StoreError, SyncStore};
use crate::sync::{
    matcher, reconcile_type, Direction, IdentityCache, ProgressLevel, ProgressSink, SyncError,
    TypeSummary,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RunStatus {
    Completed,
    CompletedWithErrors,
}

/// Aggregate of one directional run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub created: u64,
    pub updated: u64,
    pub errors: u64,
    pub per_type: BTreeMap<String, TypeSummary>,
}

impl RunReport {
    pub fn success(&self) -> bool {
        self.errors == 0
    }

    pub fn status(&self) -> RunStatus {
        if self.errors == 0 {
            RunStatus::Completed
        } else {
            RunStatus::CompletedWithErrors
        }
    }

    fn absorb(&mut self, name: &str, summary: TypeSummary) {
        self.created += summary.created;
        self.updated += summary.updated;
        self.errors += summary.errors;
        self.per_type.insert(name.to_string(), summary);
    }
}

/// Run one direction over every record type in registry order.
///
/// A fresh identity cache is built per run; there is no resume state — the
/// matcher makes re-running from scratch cheap and safe. Per-type failures
/// are absorbed into the report and the loop continues; the only hard
/// failure is a store that is unreachable before the loop begins.
pub async fn run_direction(
    direction: Direction,
    source: &SyncStore,
    dest: &SyncStore,
    progress: &dyn ProgressSink,
    settings: &SyncSettings,
) -> Result<RunReport, SyncError> {
    source.probe().await.map_err(SyncError::StoreUnavailable)?;
    dest.probe().await.map_err(SyncError::StoreUnavailable)?;

    progress.emit(
        ProgressLevel::Info,
        &format!("reconciliation started ({})", direction.label()),
    );

    let mut cache = IdentityCache::new();
    let order = sync_order();
    let total = order.len();
    let mut report = RunReport::default();

    for (index, rt) in order.iter().enumerate() {
        if direction.filters_pending() && !rt.has_sync_fields {
            continue;
        }
        progress.emit(
            ProgressLevel::Info,
            &format!("[{}/{}] {}", index + 1, total, rt.name),
        );

        let summary =
            reconcile_type(rt, source, dest, direction, &mut cache, settings, progress).await;

        if summary.created > 0 || summary.updated > 0 {
            progress.emit(
                ProgressLevel::Info,
                &format!("  {} created, {} updated", summary.created, summary.updated),
            );
        }
        if summary.errors > 0 {
            progress.emit(ProgressLevel::Warning, &format!("  {} errors", summary.errors));
        }
        report.absorb(rt.name, summary);

        if !settings.throttle.is_zero() {
            tokio::time::sleep(settings.throttle).await;
        }
    }

    progress.emit(
        ProgressLevel::Info,
        &format!(
            "created: {}, updated: {}, errors: {}",
            report.created, report.updated, report.errors
        ),
    );
    match report.status() {
        RunStatus::Completed => progress.emit(ProgressLevel::Info, "reconciliation completed"),
        RunStatus::CompletedWithErrors => progress.emit(
            ProgressLevel::Warning,
            "reconciliation completed with errors",
        ),
    }

    Ok(report)
}

/// Mirror the remote store into the local one.
pub async fn sync_remote_to_local(
    local: &SyncStore,
    remote: &SyncStore,
    progress: &dyn ProgressSink,
    settings: &SyncSettings,
) -> Result<RunReport, SyncError> {
    run_direction(Direction::RemoteToLocal, remote, local, progress, settings).await
}

/// Send pending local rows to the remote store.
pub async fn sync_local_to_remote(
    local: &SyncStore,
    remote: &SyncStore,
    progress: &dyn ProgressSink,
    settings: &SyncSettings,
) -> Result<RunReport, SyncError> {
    run_direction(Direction::LocalToRemote, local, remote, progress, settings).await
}

/// Total rows not yet confirmed mirrored, across all tracked types. Feeds
/// the pending badge in the UI; read-only. A type whose table is missing is
/// skipped, not an error.
pub async fn count_pending(store: &SyncStore) -> Result<u64, SyncError> {
    store.probe().await.map_err(SyncError::StoreUnavailable)?;
    let mut total = 0;
    for rt in sync_order() {
        if !rt.has_sync_fields {
            continue;
        }
        match store.count_pending_for(rt).await {
            Ok(count) => total += count,
            Err(err) => {
                tracing::warn!(
                    target = "sacristia",
                    event = "pending_count_skipped",
                    table = rt.name,
                    error = %err
                );
            }
        }
    }
    Ok(total)
}

/// Mirror-state overview of one store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncStats {
    pub total_records: u64,
    pub mirrored: u64,
    pub last_sync_ms: Option<i64>,
}

/// Count rows and mirrored rows across every registered type and find the
/// most recent sync stamp. Missing tables are skipped.
pub async fn sync_stats(store: &SyncStore) -> Result<SyncStats, SyncError> {
    store.probe().await.map_err(SyncError::StoreUnavailable)?;
    let mut stats = SyncStats::default();
    for rt in sync_order() {
        let count_sql = format!("SELECT COUNT(*) FROM {}", rt.name);
        let total: i64 = match sqlx::query_scalar(&count_sql).fetch_one(store.pool()).await {
            Ok(total) => total,
            Err(err) => {
                tracing::warn!(
                    target = "sacristia",
                    event = "stats_table_skipped",
                    table = rt.name,
                    error = %err
                );
                continue;
            }
        };
        stats.total_records += total.max(0) as u64;

        if rt.has_sync_fields {
            let mirrored_sql = format!(
                "SELECT COUNT(*) FROM {} WHERE {} = 1",
                rt.name, SYNC_FLAG_FIELD
            );
            if let Ok(mirrored) = sqlx::query_scalar::<_, i64>(&mirrored_sql)
                .fetch_one(store.pool())
                .await
            {
                stats.mirrored += mirrored.max(0) as u64;
            }
            let stamp_sql = format!("SELECT MAX({}) FROM {}", SYNC_STAMP_FIELD, rt.name);
            if let Ok(Some(stamp)) = sqlx::query_scalar::<_, Option<i64>>(&stamp_sql)
                .fetch_one(store.pool())
                .await
            {
                if stats.last_sync_ms.map_or(true, |current| stamp > current) {
                    stats.last_sync_ms = Some(stamp);
                }
            }
        }
    }
    Ok(stats)
}

/// Natural-key values present on only one side of the mirror.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ParityReport {
    pub only_local: Vec<String>,
    pub only_remote: Vec<String>,
}

impl ParityReport {
    pub fn in_parity(&self) -> bool {
        self.only_local.is_empty() && self.only_remote.is_empty()
    }
}

/// Compare the normalized values of a type's first natural key across both
/// stores. Both sets equal means the type is fully mirrored; anything else
/// lists the values each side is missing.
pub async fn verify_natural_key_parity(
    rt: &'static RecordType,
    local: &SyncStore,
    remote: &SyncStore,
) -> Result<ParityReport, SyncError> {
    let key = rt
        .natural_keys
        .first()
        .ok_or(SyncError::NoNaturalKey(rt.name))?;

    let local_keys = natural_key_set(local, rt, key).await?;
    let remote_keys = natural_key_set(remote, rt, key).await?;

    Ok(ParityReport {
        only_local: local_keys.difference(&remote_keys).cloned().collect(),
        only_remote: remote_keys.difference(&local_keys).cloned().collect(),
    })
}

async fn natural_key_set(
    store: &SyncStore,
    rt: &RecordType,
    key: &str,
) -> Result<BTreeSet<String>, SyncError> {
    let sql = format!(
        "SELECT {key} FROM {} WHERE {key} IS NOT NULL",
        rt.name
    );
    let values: Vec<String> = sqlx::query_scalar(&sql)
        .fetch_all(store.pool())
        .await
        .map_err(|err| SyncError::Store(StoreError::Database(err)))?;
    Ok(values
        .iter()
        .filter_map(|v| match matcher::normalize_key(&serde_json::Value::String(v.clone())) {
            Some(serde_json::Value::String(s)) => Some(s),
            _ => None,
        })
        .collect())
}
