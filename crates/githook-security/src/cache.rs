use std::collections::HashMap;
use std::sync::RwLock;

use githook_core::normalize_tenant;

/// A concurrent map from tenant id to value `T` (spec §4.1).
///
/// Reads take a shared lock; mutations take an exclusive lock. `range`
/// snapshots the map under the shared lock before handing ownership to the
/// caller, so it stays safe against concurrent mutation without holding the
/// lock across caller code.
pub struct TenantCache<T> {
    inner: RwLock<HashMap<String, T>>,
}

impl<T> Default for TenantCache<T> {
    fn default() -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
        }
    }
}

impl<T: Clone> TenantCache<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, tenant_id: &str) -> Option<T> {
        let key = normalize_tenant(tenant_id);
        self.inner.read().expect("tenant cache poisoned").get(&key).cloned()
    }

    pub fn set(&self, tenant_id: &str, value: T) {
        let key = normalize_tenant(tenant_id);
        self.inner
            .write()
            .expect("tenant cache poisoned")
            .insert(key, value);
    }

    pub fn delete(&self, tenant_id: &str) {
        let key = normalize_tenant(tenant_id);
        self.inner.write().expect("tenant cache poisoned").remove(&key);
    }

    /// A point-in-time snapshot of every (tenant, value) pair.
    pub fn range(&self) -> Vec<(String, T)> {
        self.inner
            .read()
            .expect("tenant cache poisoned")
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    pub fn keys(&self) -> Vec<String> {
        self.inner
            .read()
            .expect("tenant cache poisoned")
            .keys()
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.read().expect("tenant cache poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn blank_tenant_collapses_to_global_bucket() {
        let cache: TenantCache<i32> = TenantCache::new();
        cache.set("", 1);
        cache.set("   ", 2);
        assert_eq!(cache.get("global"), Some(2));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn get_set_delete_round_trip() {
        let cache: TenantCache<&str> = TenantCache::new();
        cache.set("acme", "mux-a");
        assert_eq!(cache.get("acme"), Some("mux-a"));
        cache.delete("acme");
        assert_eq!(cache.get("acme"), None);
    }

    #[test]
    fn range_is_safe_under_concurrent_mutation() {
        let cache = Arc::new(TenantCache::<i32>::new());
        for i in 0..50 {
            cache.set(&format!("tenant-{i}"), i);
        }
        let writer = {
            let cache = cache.clone();
            thread::spawn(move || {
                for i in 50..100 {
                    cache.set(&format!("tenant-{i}"), i);
                }
            })
        };
        let snapshot = cache.range();
        writer.join().unwrap();
        assert!(snapshot.len() <= 100);
        assert!(cache.len() >= 50);
    }
}
