use serde::Serialize;
use serde_json::{Map, Value};
use sqlx::SqliteConnection;

use crate::config::SyncSettings;
use crate::registry::{RecordType, REMOTE_REF_FIELD, SYNC_FLAG_FIELD, SYNC_STAMP_FIELD};
use crate::store::{self, record_pk, StoreError, SyncStore};
use crate::sync::{matcher, project, Direction, IdentityCache, ProgressLevel, ProgressSink};
use crate::time::now_ms;

/// Created/updated/errored counts for one record type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TypeSummary {
    pub created: u64,
    pub updated: u64,
    pub errors: u64,
}

impl TypeSummary {
    pub fn is_clean(&self) -> bool {
        self.errors == 0
    }
}

enum RecordOutcome {
    Created { dest_pk: i64 },
    Updated { dest_pk: i64 },
    Unchanged { dest_pk: i64 },
}

/// Mirror every source-side record of `rt` into the destination store.
///
/// Source rows are read in one bulk query (pending-only for local→remote),
/// then processed in fixed-size batches, each inside one destination
/// transaction. A record that fails to project, insert or update is counted
/// and skipped; each record is a single statement, so a failure discards
/// only its own work and the batch continues. A commit failure loses that
/// batch, is reported, and is not double-counted. Never returns an error:
/// a type-level failure (unreadable source, unreachable destination) is one
/// error in the summary and the orchestrator moves on.
pub async fn reconcile_type(
    rt: &'static RecordType,
    source: &SyncStore,
    dest: &SyncStore,
    direction: Direction,
    cache: &mut IdentityCache,
    settings: &SyncSettings,
    progress: &dyn ProgressSink,
) -> TypeSummary {
    let mut summary = TypeSummary::default();

    if direction.filters_pending() && !rt.has_sync_fields {
        return summary;
    }

    let records = if direction.filters_pending() {
        source.fetch_pending(rt).await
    } else {
        source.fetch_all(rt).await
    };
    let records = match records {
        Ok(records) => records,
        Err(err) => {
            summary.errors += 1;
            progress.emit(
                ProgressLevel::Error,
                &format!("{}: reading {} failed: {err}", rt.name, source.label()),
            );
            return summary;
        }
    };
    if records.is_empty() {
        return summary;
    }

    let dest_columns = match dest.table_columns(rt).await {
        Ok(columns) => columns,
        Err(err) => {
            summary.errors += 1;
            progress.emit(
                ProgressLevel::Error,
                &format!("{}: inspecting {} failed: {err}", rt.name, dest.label()),
            );
            return summary;
        }
    };

    let batch_size = settings.batch_size.max(1);
    for batch in records.chunks(batch_size) {
        let mut tx = match dest.begin().await {
            Ok(tx) => tx,
            Err(err) => {
                summary.errors += 1;
                progress.emit(
                    ProgressLevel::Error,
                    &format!("{}: opening {} transaction failed: {err}", rt.name, dest.label()),
                );
                break;
            }
        };

        let mut assigned: Vec<(i64, i64)> = Vec::new();
        for record in batch {
            match reconcile_record(tx.as_mut(), rt, record, direction, cache, &dest_columns).await
            {
                Ok((RecordOutcome::Created { dest_pk }, source_pk)) => {
                    summary.created += 1;
                    cache.remember(rt.name, source_pk, dest_pk);
                    remember_natural_keys(cache, rt, record, dest_pk);
                    assigned.push((source_pk, dest_pk));
                }
                Ok((RecordOutcome::Updated { dest_pk }, source_pk)) => {
                    summary.updated += 1;
                    assigned.push((source_pk, dest_pk));
                }
                Ok((RecordOutcome::Unchanged { dest_pk }, source_pk)) => {
                    // Nothing to count, but a pending source row still needs
                    // its write-back (a prior run's stamp may have failed).
                    assigned.push((source_pk, dest_pk));
                }
                Err(err) => {
                    summary.errors += 1;
                    tracing::warn!(
                        target = "sacristia",
                        event = "record_skipped",
                        table = rt.name,
                        error = %err
                    );
                }
            }
        }

        if let Err(err) = tx.commit().await {
            // Record-level failures in this batch are already counted.
            progress.emit(
                ProgressLevel::Warning,
                &format!("{}: batch commit failed: {err}", rt.name),
            );
            continue;
        }

        if direction.writes_back() && !assigned.is_empty() {
            if let Err(err) = stamp_source_batch(source, rt, &assigned).await {
                progress.emit(
                    ProgressLevel::Warning,
                    &format!("{}: write-back failed, rows stay pending: {err}", rt.name),
                );
            }
        }

        if !settings.throttle.is_zero() {
            tokio::time::sleep(settings.throttle).await;
        }
    }

    summary
}

/// Process one source record inside the batch transaction. Returns the
/// outcome plus the source primary key.
async fn reconcile_record(
    conn: &mut SqliteConnection,
    rt: &'static RecordType,
    record: &Map<String, Value>,
    direction: Direction,
    cache: &IdentityCache,
    dest_columns: &[String],
) -> Result<(RecordOutcome, i64), StoreError> {
    let source_pk = record_pk(rt, record)?;
    let existing = matcher::find_existing(conn, rt, record, direction, cache).await;
    let projected = project::project_fields(record, rt, dest_columns);

    if let Some(existing) = existing {
        let dest_pk = record_pk(rt, &existing)?;
        let crossref_current = !rt.has_sync_fields
            || existing
                .get(direction.dest_ref_field())
                .and_then(Value::as_i64)
                == Some(source_pk);
        if crossref_current && fields_unchanged(&projected, &existing) {
            return Ok((RecordOutcome::Unchanged { dest_pk }, source_pk));
        }
        let fields = stamped(projected, rt, direction, source_pk);
        store::update_record(conn, rt, dest_pk, &fields).await?;
        Ok((RecordOutcome::Updated { dest_pk }, source_pk))
    } else {
        let fields = stamped(projected, rt, direction, source_pk);
        let dest_pk = store::insert_record(conn, rt, &fields).await?;
        Ok((RecordOutcome::Created { dest_pk }, source_pk))
    }
}

/// Attach the destination-side tracking fields to a projected field map.
fn stamped(
    mut fields: Map<String, Value>,
    rt: &RecordType,
    direction: Direction,
    source_pk: i64,
) -> Map<String, Value> {
    if rt.has_sync_fields {
        fields.insert(direction.dest_ref_field().into(), Value::from(source_pk));
        fields.insert(SYNC_FLAG_FIELD.into(), Value::Bool(true));
        fields.insert(SYNC_STAMP_FIELD.into(), Value::from(now_ms()));
    }
    fields
}

fn remember_natural_keys(
    cache: &mut IdentityCache,
    rt: &'static RecordType,
    record: &Map<String, Value>,
    dest_pk: i64,
) {
    for field in rt.natural_keys {
        if let Some(Value::String(key)) = record.get(*field).and_then(|v| matcher::normalize_key(v))
        {
            cache.remember_natural_key(rt.name, &key, dest_pk);
        }
    }
}

/// Mark local rows as mirrored after their batch landed at the remote:
/// remote key, sync flag, stamp. One source-side transaction per batch.
async fn stamp_source_batch(
    source: &SyncStore,
    rt: &RecordType,
    assigned: &[(i64, i64)],
) -> Result<(), StoreError> {
    let mut tx = source.begin().await?;
    let sql = format!(
        "UPDATE {} SET {} = ?1, {} = 1, {} = ?2 WHERE {} = ?3",
        rt.name, REMOTE_REF_FIELD, SYNC_FLAG_FIELD, SYNC_STAMP_FIELD, rt.pk_field
    );
    let now = now_ms();
    for (source_pk, dest_pk) in assigned {
        sqlx::query(&sql)
            .bind(*dest_pk)
            .bind(now)
            .bind(*source_pk)
            .execute(tx.as_mut())
            .await?;
    }
    tx.commit().await?;
    Ok(())
}

/// True when every projected field already holds the same value at the
/// destination, so the run can skip a no-op update and stay idempotent.
fn fields_unchanged(projected: &Map<String, Value>, existing: &Map<String, Value>) -> bool {
    projected
        .iter()
        .all(|(field, value)| existing.get(field).is_some_and(|have| value_eq(value, have)))
}

fn value_eq(a: &Value, b: &Value) -> bool {
    fn as_num(v: &Value) -> Option<f64> {
        match v {
            Value::Bool(b) => Some(i64::from(*b) as f64),
            Value::Number(n) => n.as_f64(),
            _ => None,
        }
    }
    match (as_num(a), as_num(b)) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn as_map(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn unchanged_detection_tolerates_bool_int_drift() {
        let projected = as_map(json!({"activo": true, "nombres": "Juan"}));
        let existing = as_map(json!({"activo": 1, "nombres": "Juan", "id_feligres": 3}));
        assert!(fields_unchanged(&projected, &existing));

        let differing = as_map(json!({"activo": 0, "nombres": "Juan", "id_feligres": 3}));
        assert!(!fields_unchanged(&projected, &differing));
    }

    #[test]
    fn missing_destination_field_counts_as_changed() {
        let projected = as_map(json!({"nombres": "Juan"}));
        let existing = as_map(json!({"id_feligres": 3}));
        assert!(!fields_unchanged(&projected, &existing));
    }
}
