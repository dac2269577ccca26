use serde_json::{Map, Value};
use sqlx::sqlite::SqliteRow;
use sqlx::{Column, Row, Sqlite, SqliteConnection, SqlitePool, Transaction, TypeInfo, ValueRef};
use thiserror::Error;

use crate::registry::{RecordType, REMOTE_REF_FIELD, SYNC_FLAG_FIELD};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record of type {0} carries no usable primary key")]
    MissingPrimaryKey(&'static str),
    #[error("record of type {0} has no fields to write")]
    EmptyRecord(&'static str),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// One side of a reconciliation run. Local and remote are both `SyncStore`s;
/// they differ only in the pool they wrap and the label they log under.
#[derive(Clone)]
pub struct SyncStore {
    pool: SqlitePool,
    label: String,
}

impl SyncStore {
    pub fn new(pool: SqlitePool, label: impl Into<String>) -> Self {
        Self {
            pool,
            label: label.into(),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Cheap connectivity check, used once before a run starts.
    pub async fn probe(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    pub async fn begin(&self) -> Result<Transaction<'static, Sqlite>, StoreError> {
        Ok(self.pool.begin().await?)
    }

    /// Bulk read of every record of `rt`, decoded to field maps.
    pub async fn fetch_all(&self, rt: &RecordType) -> Result<Vec<Map<String, Value>>, StoreError> {
        let sql = format!("SELECT * FROM {}", rt.name);
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(row_to_record).collect())
    }

    /// Records not yet confirmed mirrored: sync flag unset or no
    /// cross-reference id. Only meaningful for tracked types.
    pub async fn fetch_pending(
        &self,
        rt: &RecordType,
    ) -> Result<Vec<Map<String, Value>>, StoreError> {
        let sql = format!(
            "SELECT * FROM {} WHERE {} = 0 OR {} IS NULL",
            rt.name, SYNC_FLAG_FIELD, REMOTE_REF_FIELD
        );
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(row_to_record).collect())
    }

    pub async fn count_pending_for(&self, rt: &RecordType) -> Result<u64, StoreError> {
        let sql = format!(
            "SELECT COUNT(*) FROM {} WHERE {} = 0 OR {} IS NULL",
            rt.name, SYNC_FLAG_FIELD, REMOTE_REF_FIELD
        );
        let count: i64 = sqlx::query_scalar(&sql).fetch_one(&self.pool).await?;
        Ok(count.max(0) as u64)
    }

    /// Column names of the backing table, the destination schema the field
    /// projector copies against.
    pub async fn table_columns(&self, rt: &RecordType) -> Result<Vec<String>, StoreError> {
        let sql = format!("SELECT name FROM pragma_table_info('{}')", rt.name);
        let names: Vec<String> = sqlx::query_scalar(&sql).fetch_all(&self.pool).await?;
        Ok(names)
    }
}

/// Point lookup by primary key, inside the caller's transaction.
pub async fn get_by_pk(
    conn: &mut SqliteConnection,
    rt: &RecordType,
    pk: i64,
) -> Result<Option<Map<String, Value>>, StoreError> {
    let sql = format!("SELECT * FROM {} WHERE {} = ?1", rt.name, rt.pk_field);
    let row = sqlx::query(&sql).bind(pk).fetch_optional(&mut *conn).await?;
    Ok(row.map(row_to_record))
}

/// First record whose `field` equals `value`, inside the caller's
/// transaction. The caller normalizes `value` beforehand.
pub async fn find_by_field(
    conn: &mut SqliteConnection,
    rt: &RecordType,
    field: &str,
    value: &Value,
) -> Result<Option<Map<String, Value>>, StoreError> {
    let sql = format!("SELECT * FROM {} WHERE {} = ?1 LIMIT 1", rt.name, field);
    let row = bind_value(sqlx::query(&sql), value)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(row.map(row_to_record))
}

/// Insert a new record from a field map and return the generated key.
pub async fn insert_record(
    conn: &mut SqliteConnection,
    rt: &RecordType,
    fields: &Map<String, Value>,
) -> Result<i64, StoreError> {
    if fields.is_empty() {
        return Err(StoreError::EmptyRecord(rt.name));
    }
    let cols: Vec<&str> = fields.keys().map(String::as_str).collect();
    let placeholders: Vec<String> = cols.iter().map(|_| "?".into()).collect();
    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        rt.name,
        cols.join(","),
        placeholders.join(",")
    );
    let mut query = sqlx::query(&sql);
    for col in &cols {
        query = bind_value(query, &fields[*col]);
    }
    let result = query.execute(&mut *conn).await?;
    Ok(result.last_insert_rowid())
}

/// Overwrite the given fields of an existing record.
pub async fn update_record(
    conn: &mut SqliteConnection,
    rt: &RecordType,
    pk: i64,
    fields: &Map<String, Value>,
) -> Result<(), StoreError> {
    if fields.is_empty() {
        return Err(StoreError::EmptyRecord(rt.name));
    }
    let set_clause: Vec<String> = fields.keys().map(|c| format!("{c} = ?")).collect();
    let sql = format!(
        "UPDATE {} SET {} WHERE {} = ?",
        rt.name,
        set_clause.join(","),
        rt.pk_field
    );
    let mut query = sqlx::query(&sql);
    for value in fields.values() {
        query = bind_value(query, value);
    }
    query.bind(pk).execute(&mut *conn).await?;
    Ok(())
}

/// Extract a record's own primary key from its field map.
pub fn record_pk(rt: &RecordType, record: &Map<String, Value>) -> Result<i64, StoreError> {
    record
        .get(rt.pk_field)
        .and_then(Value::as_i64)
        .ok_or(StoreError::MissingPrimaryKey(rt.name))
}

fn row_to_record(row: SqliteRow) -> Map<String, Value> {
    let mut map = Map::new();
    for col in row.columns() {
        let idx = col.ordinal();
        let v = row.try_get_raw(idx).ok();
        let val = match v {
            Some(raw) => {
                if raw.is_null() {
                    Value::Null
                } else {
                    match raw.type_info().name() {
                        "INTEGER" => row
                            .try_get::<i64, _>(idx)
                            .map(Value::from)
                            .unwrap_or(Value::Null),
                        "REAL" => row
                            .try_get::<f64, _>(idx)
                            .map(Value::from)
                            .unwrap_or(Value::Null),
                        _ => row
                            .try_get::<String, _>(idx)
                            .map(Value::from)
                            .unwrap_or(Value::Null),
                    }
                }
            }
            None => Value::Null,
        };
        map.insert(col.name().to_string(), val);
    }
    map
}

fn bind_value<'q>(
    q: sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>>,
    v: &Value,
) -> sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>> {
    match v {
        Value::Null => q.bind(Option::<i64>::None),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                q.bind(i)
            } else if let Some(f) = n.as_f64() {
                q.bind(f)
            } else {
                q.bind(Option::<i64>::None)
            }
        }
        Value::Bool(b) => q.bind(*b as i64),
        Value::String(s) => q.bind(s.clone()),
        _ => q.bind(v.to_string()),
    }
}
