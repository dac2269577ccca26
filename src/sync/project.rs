use serde_json::{Map, Value};

use crate::registry::{
    RecordType, LOCAL_REF_FIELD, REMOTE_REF_FIELD, SYNC_FLAG_FIELD, SYNC_STAMP_FIELD,
};

/// Bookkeeping columns that never travel between stores.
pub const TRACKING_FIELDS: &[&str] = &[
    LOCAL_REF_FIELD,
    REMOTE_REF_FIELD,
    SYNC_FLAG_FIELD,
    SYNC_STAMP_FIELD,
];

/// Copy the business-data fields of `source` against the destination
/// schema: every destination column except the primary key and the sync
/// tracking fields, shallow and type-preserving. Columns the source does
/// not carry are omitted, not errors.
pub fn project_fields(
    source: &Map<String, Value>,
    rt: &RecordType,
    dest_columns: &[String],
) -> Map<String, Value> {
    let mut out = Map::new();
    for column in dest_columns {
        if column == rt.pk_field || TRACKING_FIELDS.contains(&column.as_str()) {
            continue;
        }
        if let Some(value) = source.get(column) {
            out.insert(column.clone(), value.clone());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::record_type;
    use serde_json::json;

    fn as_map(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn excludes_pk_and_tracking_fields() {
        let rt = record_type("feligres").unwrap();
        let source = as_map(json!({
            "id_feligres": 9,
            "nombres": "María",
            "curp": "GOMC900513MOCLRS08",
            "sincronizado": 1,
            "id_remoto": 44,
            "id_local": null,
            "fecha_sync": 1700000000000_i64,
        }));
        let dest_columns: Vec<String> = [
            "id_feligres",
            "nombres",
            "curp",
            "sincronizado",
            "id_remoto",
            "id_local",
            "fecha_sync",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        let projected = project_fields(&source, rt, &dest_columns);
        assert_eq!(
            projected,
            as_map(json!({"nombres": "María", "curp": "GOMC900513MOCLRS08"}))
        );
    }

    #[test]
    fn destination_only_columns_are_omitted() {
        let rt = record_type("rol").unwrap();
        let source = as_map(json!({"id_rol": 1, "nombre_rol": "Catequista"}));
        let dest_columns: Vec<String> = ["id_rol", "nombre_rol", "descripcion"]
            .iter()
            .map(|s| s.to_string())
            .collect();

        let projected = project_fields(&source, rt, &dest_columns);
        assert_eq!(projected, as_map(json!({"nombre_rol": "Catequista"})));
    }
}
