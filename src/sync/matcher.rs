use serde_json::{Map, Value};
use sqlx::SqliteConnection;

use crate::registry::RecordType;
use crate::store::{self, record_pk};
use crate::sync::{Direction, IdentityCache};

/// Find the destination record equivalent to `source`, if any. Runs inside
/// the batch's destination transaction.
///
/// Precedence, first hit wins:
/// 1. the source row's cross-reference id, loaded by destination pk;
/// 2. the identity cache's (type, source pk) mapping from earlier in this run;
/// 3. each declared natural-key field in order, normalized, via the cache's
///    secondary index and then a destination equality lookup.
///
/// Pure read. A storage error during any lookup degrades to "not found":
/// the reconciler then inserts rather than aborting the batch, accepting
/// the duplicate risk on a flaky destination.
pub async fn find_existing(
    conn: &mut SqliteConnection,
    rt: &'static RecordType,
    source: &Map<String, Value>,
    direction: Direction,
    cache: &IdentityCache,
) -> Option<Map<String, Value>> {
    if let Some(ref_id) = source
        .get(direction.source_ref_field())
        .and_then(Value::as_i64)
    {
        if let Some(found) = lookup_by_pk(conn, rt, ref_id).await {
            return Some(found);
        }
    }

    if let Ok(source_pk) = record_pk(rt, source) {
        if let Some(dest_pk) = cache.resolve(rt.name, source_pk) {
            if let Some(found) = lookup_by_pk(conn, rt, dest_pk).await {
                return Some(found);
            }
        }
    }

    for field in rt.natural_keys {
        let Some(value) = source.get(*field).and_then(normalize_key) else {
            continue;
        };
        if let Value::String(s) = &value {
            if let Some(dest_pk) = cache.resolve_natural_key(rt.name, s) {
                if let Some(found) = lookup_by_pk(conn, rt, dest_pk).await {
                    return Some(found);
                }
            }
        }
        match store::find_by_field(conn, rt, field, &value).await {
            Ok(Some(found)) => return Some(found),
            Ok(None) => {}
            Err(err) => {
                tracing::warn!(
                    target = "sacristia",
                    event = "match_lookup_failed",
                    table = rt.name,
                    field = *field,
                    error = %err
                );
            }
        }
    }

    None
}

async fn lookup_by_pk(
    conn: &mut SqliteConnection,
    rt: &RecordType,
    pk: i64,
) -> Option<Map<String, Value>> {
    match store::get_by_pk(conn, rt, pk).await {
        Ok(found) => found,
        Err(err) => {
            tracing::warn!(
                target = "sacristia",
                event = "match_lookup_failed",
                table = rt.name,
                pk,
                error = %err
            );
            None
        }
    }
}

/// Normalize a natural-key value for comparison: text is trimmed and
/// uppercased, empty text counts as absent, non-text values pass through.
pub fn normalize_key(value: &Value) -> Option<Value> {
    match value {
        Value::Null => None,
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(Value::String(trimmed.to_uppercase()))
            }
        }
        other => Some(other.clone()),
    }
}
