use once_cell::sync::Lazy;

/// Column holding the "has this row been mirrored at least once" flag.
pub const SYNC_FLAG_FIELD: &str = "sincronizado";
/// Column on a local row pointing at its remote counterpart's primary key.
pub const REMOTE_REF_FIELD: &str = "id_remoto";
/// Column on a remote row pointing at its local counterpart's primary key.
pub const LOCAL_REF_FIELD: &str = "id_local";
/// Column holding the last successful mirror time (epoch milliseconds).
pub const SYNC_STAMP_FIELD: &str = "fecha_sync";

/// Static description of one mirrored record type.
///
/// `natural_keys` are the business-unique columns usable for duplicate
/// detection when no cross-reference id exists yet, checked in declared
/// order. `references` lists the record types this one has foreign keys to
/// (self-references omitted); `sync_order` verifies that every referenced
/// type sorts earlier.
#[derive(Debug, PartialEq, Eq)]
pub struct RecordType {
    pub name: &'static str,
    pub pk_field: &'static str,
    pub natural_keys: &'static [&'static str],
    pub has_sync_fields: bool,
    pub references: &'static [&'static str],
}

macro_rules! rt {
    ($name:literal, $pk:literal, nk: [$($nk:literal),*], sync: $sync:literal, refs: [$($dep:literal),*]) => {
        RecordType {
            name: $name,
            pk_field: $pk,
            natural_keys: &[$($nk),*],
            has_sync_fields: $sync,
            references: &[$($dep),*],
        }
    };
}

/// Every mirrored record type, declared in foreign-key dependency order.
/// `sync_order()` re-derives the order from `references` and asserts the
/// declaration matches, so an edit that breaks the ordering fails at startup
/// instead of as a cascade of foreign-key errors mid-run.
pub static REGISTRY: &[RecordType] = &[
    // Geografía eclesiástica. pais/provincia are reference catalogs seeded
    // on both sides and carry no tracking columns.
    rt!("pais", "id_pais", nk: ["nombre_pais"], sync: false, refs: []),
    rt!("provincia", "id_provincia", nk: ["nombre_provincia"], sync: false, refs: ["pais"]),
    rt!("arquidiocesis", "id_arquidiocesis", nk: ["nombre_arquidiocesis"], sync: true, refs: ["provincia"]),
    rt!("decanato", "id_decanato", nk: ["nombre_decanato"], sync: true, refs: ["arquidiocesis"]),
    rt!("parroquia", "id_parroquia", nk: ["nombre_parroquia"], sync: true, refs: ["decanato", "arquidiocesis"]),
    rt!("comunidad", "id_comunidad", nk: ["clave_comunidad"], sync: true, refs: ["parroquia"]),
    rt!("capilla", "id_capilla", nk: ["nombre_capilla"], sync: true, refs: ["comunidad"]),
    // Feligreses y contacto.
    rt!("feligres", "id_feligres", nk: ["curp"], sync: true, refs: ["comunidad"]),
    rt!("telefono", "id_telefono", nk: [], sync: true, refs: ["feligres"]),
    rt!("direccion", "id_direccion", nk: [], sync: true, refs: ["feligres"]),
    // Clero.
    rt!("presbitero", "id_presbitero", nk: [], sync: true, refs: ["feligres"]),
    // Sacramentos.
    rt!("sacramento_bautizo", "id_bautizo", nk: [], sync: true, refs: ["feligres"]),
    rt!("sacramento_confirmacion", "id_confirmacion", nk: [], sync: true, refs: ["feligres"]),
    rt!("sacramento_matrimonio", "id_matrimonio", nk: [], sync: true, refs: ["feligres"]),
    // Grupos parroquiales.
    rt!("grupo_parroquial", "id_grupo", nk: ["nombre_grupo"], sync: true, refs: []),
    rt!("rol", "id_rol", nk: ["nombre_rol"], sync: true, refs: []),
    rt!("membresia_grupo", "id_membresia", nk: [], sync: true, refs: ["grupo_parroquial", "rol", "feligres"]),
    // Sistema.
    rt!("perfil_usuario", "id_perfil", nk: ["nombre_perfil"], sync: true, refs: []),
    rt!("usuario", "id_usuario", nk: ["username"], sync: true, refs: ["feligres"]),
    rt!("usuario_perfil", "id_usuario_perfil", nk: [], sync: true, refs: ["usuario", "perfil_usuario"]),
    // Finanzas.
    rt!("categoria_financiera", "id_categoria_financiera", nk: [], sync: true, refs: []),
    rt!("donador", "id_donador", nk: [], sync: true, refs: ["feligres"]),
    rt!("transaccion_financiera", "id_transaccion", nk: [], sync: true, refs: ["categoria_financiera", "donador"]),
    // Inventario.
    rt!("bodega", "id_bodega", nk: ["codigo_bodega"], sync: true, refs: []),
    rt!("area_parroquial", "id_area", nk: ["nombre_area"], sync: true, refs: []),
    rt!("categoria_inventario", "id_categoria_inventario", nk: [], sync: true, refs: []),
    rt!("bien_inventario", "id_bien", nk: ["codigo_bien"], sync: true, refs: ["bodega", "area_parroquial", "categoria_inventario"]),
    rt!("movimiento_bien", "id_movimiento", nk: [], sync: true, refs: ["bien_inventario", "usuario"]),
    // Actas.
    rt!("tipo_reunion", "id_tipo_reunion", nk: ["nombre_tipo"], sync: true, refs: []),
    rt!("acta_reunion", "id_acta", nk: [], sync: true, refs: ["tipo_reunion", "feligres"]),
    rt!("asistente_acta", "id_asistente", nk: [], sync: true, refs: ["acta_reunion", "feligres"]),
    // Constancias.
    rt!("constancia_emitida", "id_constancia", nk: ["folio"], sync: true, refs: ["feligres"]),
];

static SYNC_ORDER: Lazy<Vec<&'static RecordType>> = Lazy::new(|| {
    topo_sort(REGISTRY).unwrap_or_else(|err| panic!("record type registry is invalid: {err}"))
});

/// Record types in verified dependency order: for every type, every type it
/// references appears earlier. Panics on first use if the registry declares
/// an unknown reference or a cycle.
pub fn sync_order() -> &'static [&'static RecordType] {
    &SYNC_ORDER
}

/// Look up a descriptor by table name.
pub fn record_type(name: &str) -> Option<&'static RecordType> {
    REGISTRY.iter().find(|rt| rt.name == name)
}

/// Stable Kahn topological sort: among ready types, declaration order wins,
/// so the result is the declared list whenever that list is already valid.
fn topo_sort(types: &'static [RecordType]) -> Result<Vec<&'static RecordType>, String> {
    let index_of = |name: &str| types.iter().position(|rt| rt.name == name);

    let mut indegree = vec![0usize; types.len()];
    for (i, rt) in types.iter().enumerate() {
        for dep in rt.references {
            if *dep == rt.name {
                continue;
            }
            match index_of(dep) {
                Some(_) => indegree[i] += 1,
                None => {
                    return Err(format!(
                        "type {} references undeclared type {}",
                        rt.name, dep
                    ))
                }
            }
        }
    }

    let mut done = vec![false; types.len()];
    let mut order = Vec::with_capacity(types.len());
    while order.len() < types.len() {
        let next = types
            .iter()
            .enumerate()
            .position(|(i, _)| !done[i] && indegree[i] == 0);
        let Some(next) = next else {
            let stuck: Vec<&str> = types
                .iter()
                .enumerate()
                .filter(|(i, _)| !done[*i])
                .map(|(_, rt)| rt.name)
                .collect();
            return Err(format!("reference cycle among {}", stuck.join(", ")));
        };
        done[next] = true;
        order.push(&types[next]);
        let name = types[next].name;
        for (i, rt) in types.iter().enumerate() {
            if !done[i] && rt.references.contains(&name) && rt.name != name {
                indegree[i] -= 1;
            }
        }
    }
    Ok(order)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn declared_order_is_already_topological() {
        let sorted: Vec<&str> = sync_order().iter().map(|rt| rt.name).collect();
        let declared: Vec<&str> = REGISTRY.iter().map(|rt| rt.name).collect();
        assert_eq!(sorted, declared);
    }

    #[test]
    fn lookup_by_name() {
        let feligres = record_type("feligres").expect("feligres registered");
        assert_eq!(feligres.pk_field, "id_feligres");
        assert_eq!(feligres.natural_keys, &["curp"]);
        assert!(record_type("no_such_table").is_none());
    }

    #[test]
    fn reference_catalogs_carry_no_tracking() {
        for name in ["pais", "provincia"] {
            assert!(!record_type(name).unwrap().has_sync_fields, "{name}");
        }
        assert!(record_type("feligres").unwrap().has_sync_fields);
    }

    #[test]
    fn cycle_is_rejected() {
        static CYCLIC: &[RecordType] = &[
            rt!("a", "id_a", nk: [], sync: true, refs: ["b"]),
            rt!("b", "id_b", nk: [], sync: true, refs: ["a"]),
        ];
        let err = topo_sort(CYCLIC).unwrap_err();
        assert!(err.contains("cycle"), "{err}");
    }

    #[test]
    fn unknown_reference_is_rejected() {
        static DANGLING: &[RecordType] =
            &[rt!("a", "id_a", nk: [], sync: true, refs: ["ghost"])];
        let err = topo_sort(DANGLING).unwrap_err();
        assert!(err.contains("undeclared"), "{err}");
    }
}
