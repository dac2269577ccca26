use sacristia::{record_type, sync_order};

#[test]
fn every_reference_appears_before_its_dependent() {
    let order = sync_order();
    for (index, rt) in order.iter().enumerate() {
        for dep in rt.references {
            if *dep == rt.name {
                continue;
            }
            let pos = order
                .iter()
                .position(|other| other.name == *dep)
                .unwrap_or_else(|| panic!("{} references unregistered {}", rt.name, dep));
            assert!(
                pos < index,
                "{} must be ordered before {} (its foreign-key target)",
                dep,
                rt.name
            );
        }
    }
}

#[test]
fn registry_covers_the_parish_schema() {
    let order = sync_order();
    assert!(order.len() >= 30, "expected the full entity set, got {}", order.len());
    assert_eq!(order[0].name, "pais");
    for name in ["feligres", "sacramento_bautizo", "transaccion_financiera", "constancia_emitida"] {
        assert!(record_type(name).is_some(), "{name} missing from registry");
    }
}

#[test]
fn descriptors_are_wellformed() {
    for rt in sync_order() {
        assert!(!rt.pk_field.is_empty(), "{} lacks a pk field", rt.name);
        for nk in rt.natural_keys {
            assert!(!nk.is_empty(), "{} declares an empty natural key", rt.name);
            assert_ne!(*nk, rt.pk_field, "{} natural key duplicates its pk", rt.name);
        }
    }
}

#[test]
fn dependents_of_feligres_follow_it() {
    let order = sync_order();
    let feligres = order.iter().position(|rt| rt.name == "feligres").unwrap();
    for name in ["telefono", "direccion", "presbitero", "usuario", "asistente_acta"] {
        let pos = order.iter().position(|rt| rt.name == name).unwrap();
        assert!(feligres < pos, "{name} depends on feligres");
    }
}
