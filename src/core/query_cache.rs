//! Short-lived query result cache
//!
//! Reads are cached under a key made of the table name and a filter string.
//! Entries go stale after a fixed window and are dropped whenever a table
//! the query depends on is mutated. A fetch that fails with a transient
//! backend error is retried exactly once.

use std::any::Any;
use std::sync::Arc;
use std::time::Duration;

use moka::sync::Cache;

/// Upper bound on cached query results
const MAX_ENTRIES: u64 = 2_048;

/// Errors that can tell whether repeating the call may succeed
pub trait Transient {
    fn is_transient(&self) -> bool;
}

/// Identity of a cached query
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey {
    table: &'static str,
    filter: String,
    depends: Vec<&'static str>,
}

impl QueryKey {
    pub fn new(table: &'static str, filter: impl Into<String>) -> Self {
        Self {
            table,
            filter: filter.into(),
            depends: Vec::new(),
        }
    }

    /// Additional tables whose mutation invalidates this query
    pub fn depends_on(mut self, tables: &[&'static str]) -> Self {
        self.depends.extend_from_slice(tables);
        self
    }

    pub fn table(&self) -> &'static str {
        self.table
    }

    /// Whether a mutation of `table` makes this entry stale
    pub fn touches(&self, table: &str) -> bool {
        self.table == table || self.depends.iter().any(|t| *t == table)
    }
}

/// Thread-safe cache of query results with time-based expiry
#[derive(Clone)]
pub struct QueryCache {
    inner: Cache<QueryKey, Arc<dyn Any + Send + Sync>>,
    enabled: bool,
}

impl QueryCache {
    /// Cache whose entries go stale after `stale_after`
    pub fn new(stale_after: Duration) -> Self {
        let mut builder = Cache::builder()
            .max_capacity(MAX_ENTRIES)
            .support_invalidation_closures();
        if !stale_after.is_zero() {
            builder = builder.time_to_live(stale_after);
        }
        Self {
            inner: builder.build(),
            enabled: !stale_after.is_zero(),
        }
    }

    /// Cache that never stores anything
    pub fn disabled() -> Self {
        Self::new(Duration::ZERO)
    }

    pub fn get<T>(&self, key: &QueryKey) -> Option<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        if !self.enabled {
            return None;
        }
        self.inner
            .get(key)
            .and_then(|value| value.downcast_ref::<T>().cloned())
    }

    pub fn insert<T>(&self, key: QueryKey, value: T)
    where
        T: Clone + Send + Sync + 'static,
    {
        if self.enabled {
            self.inner.insert(key, Arc::new(value));
        }
    }

    /// Return the cached value or run the query, retrying once on a transient error
    pub fn fetch<T, E, F>(&self, key: QueryKey, mut query: F) -> Result<T, E>
    where
        T: Clone + Send + Sync + 'static,
        E: Transient + std::fmt::Display,
        F: FnMut() -> Result<T, E>,
    {
        if let Some(hit) = self.get::<T>(&key) {
            tracing::trace!(table = key.table, filter = %key.filter, "query cache hit");
            return Ok(hit);
        }

        let value = match query() {
            Ok(v) => v,
            Err(e) if e.is_transient() => {
                tracing::debug!(table = key.table, error = %e, "transient failure, retrying once");
                query()?
            }
            Err(e) => return Err(e),
        };

        self.insert(key, value.clone());
        Ok(value)
    }

    /// Drop every entry that depends on `table`
    pub fn invalidate_table(&self, table: &'static str) {
        if !self.enabled {
            return;
        }
        if let Err(e) = self
            .inner
            .invalidate_entries_if(move |key, _| key.touches(table))
        {
            tracing::warn!(table, error = %e, "predicate invalidation failed, clearing cache");
            self.inner.invalidate_all();
        }
    }

    pub fn invalidate_all(&self) {
        self.inner.invalidate_all();
    }

    /// Approximate number of live entries
    pub fn entry_count(&self) -> u64 {
        self.inner.run_pending_tasks();
        self.inner.entry_count()
    }
}

impl std::fmt::Debug for QueryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryCache")
            .field("enabled", &self.enabled)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[derive(Debug)]
    struct FakeError {
        transient: bool,
    }

    impl std::fmt::Display for FakeError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "fake (transient={})", self.transient)
        }
    }

    impl Transient for FakeError {
        fn is_transient(&self) -> bool {
            self.transient
        }
    }

    fn cache() -> QueryCache {
        QueryCache::new(Duration::from_secs(60))
    }

    #[test]
    fn test_fetch_hits_cache_second_time() {
        let cache = cache();
        let calls = Cell::new(0);
        let key = QueryKey::new("customers", "shop=1");

        for _ in 0..2 {
            let v: Result<Vec<i32>, FakeError> = cache.fetch(key.clone(), || {
                calls.set(calls.get() + 1);
                Ok(vec![1, 2, 3])
            });
            assert_eq!(v.unwrap(), vec![1, 2, 3]);
        }
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_invalidate_table_drops_dependents() {
        let cache = cache();
        let orders = QueryKey::new("service_orders", "all").depends_on(&["customers"]);
        let parts = QueryKey::new("parts", "all");
        cache.insert(orders.clone(), 1u32);
        cache.insert(parts.clone(), 2u32);

        cache.invalidate_table("customers");

        assert_eq!(cache.get::<u32>(&orders), None);
        assert_eq!(cache.get::<u32>(&parts), Some(2));
    }

    #[test]
    fn test_transient_error_retried_once() {
        let cache = cache();
        let calls = Cell::new(0);
        let v: Result<u8, FakeError> = cache.fetch(QueryKey::new("parts", "x"), || {
            calls.set(calls.get() + 1);
            if calls.get() == 1 {
                Err(FakeError { transient: true })
            } else {
                Ok(7)
            }
        });
        assert_eq!(v.unwrap(), 7);
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn test_permanent_error_not_retried() {
        let cache = cache();
        let calls = Cell::new(0);
        let v: Result<u8, FakeError> = cache.fetch(QueryKey::new("parts", "y"), || {
            calls.set(calls.get() + 1);
            Err(FakeError { transient: false })
        });
        assert!(v.is_err());
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_disabled_cache_always_queries() {
        let cache = QueryCache::disabled();
        let key = QueryKey::new("shops", "");
        cache.insert(key.clone(), 5u8);
        assert_eq!(cache.get::<u8>(&key), None);
    }

    #[test]
    fn test_type_mismatch_is_a_miss() {
        let cache = cache();
        let key = QueryKey::new("shops", "");
        cache.insert(key.clone(), 5u8);
        assert_eq!(cache.get::<String>(&key), None);
    }
}
