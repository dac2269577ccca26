use std::collections::HashMap;

/// Per-run identity mapping between the two independently-keyed stores.
///
/// Rebuilt fresh for every orchestration run, never persisted. The primary
/// map answers "where did this source row land at the destination"; the
/// secondary map indexes destination keys by normalized natural-key value so
/// duplicates created earlier in the same run resolve without a storage
/// round-trip. Single sequential run, so no interior locking.
#[derive(Debug, Default)]
pub struct IdentityCache {
    mappings: HashMap<&'static str, HashMap<i64, i64>>,
    natural_keys: HashMap<&'static str, HashMap<String, i64>>,
}

impl IdentityCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record source pk → destination pk. Re-recording the same key is a
    /// no-op overwrite.
    pub fn remember(&mut self, type_name: &'static str, source_pk: i64, dest_pk: i64) {
        self.mappings
            .entry(type_name)
            .or_default()
            .insert(source_pk, dest_pk);
    }

    pub fn resolve(&self, type_name: &str, source_pk: i64) -> Option<i64> {
        self.mappings.get(type_name)?.get(&source_pk).copied()
    }

    pub fn remember_natural_key(&mut self, type_name: &'static str, value: &str, dest_pk: i64) {
        self.natural_keys
            .entry(type_name)
            .or_default()
            .insert(value.to_string(), dest_pk);
    }

    pub fn resolve_natural_key(&self, type_name: &str, value: &str) -> Option<i64> {
        self.natural_keys.get(type_name)?.get(value).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_misses_then_hits() {
        let mut cache = IdentityCache::new();
        assert_eq!(cache.resolve("feligres", 1), None);
        cache.remember("feligres", 1, 40);
        assert_eq!(cache.resolve("feligres", 1), Some(40));
        assert_eq!(cache.resolve("telefono", 1), None);
    }

    #[test]
    fn overwrite_is_idempotent() {
        let mut cache = IdentityCache::new();
        cache.remember("feligres", 1, 40);
        cache.remember("feligres", 1, 40);
        assert_eq!(cache.resolve("feligres", 1), Some(40));
    }

    #[test]
    fn natural_key_index_is_per_type() {
        let mut cache = IdentityCache::new();
        cache.remember_natural_key("usuario", "PADRE.MIGUEL", 7);
        assert_eq!(cache.resolve_natural_key("usuario", "PADRE.MIGUEL"), Some(7));
        assert_eq!(cache.resolve_natural_key("rol", "PADRE.MIGUEL"), None);
    }
}
