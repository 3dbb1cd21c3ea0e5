//! Counter registry: one [`ShardedCounter`] per logical name.
//!
//! Counters are created lazily, the first time a name is asked for, and
//! live as long as the registry. Concurrent first requests for the same
//! name converge on a single instance, so two callers can never end up
//! writing to divergent shard sets.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt::{self, Debug};
use std::sync::Arc;

use crate::counter::{RandomSelector, ShardSelector, ShardedCounter, DEFAULT_SHARDS};
use crate::error::{Error, Result};
use crate::store::ShardStore;

/// Maps counter names to shared [`ShardedCounter`] instances.
///
/// # Examples
///
/// ```rust
/// use scrutinio::registry::CounterRegistry;
/// use scrutinio::store::MemoryStore;
/// use std::sync::Arc;
///
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// let registry = CounterRegistry::new(Arc::new(MemoryStore::new()));
///
/// let a = registry.counter_for("cats");
/// let b = registry.counter_for("cats");
/// a.increment().await.unwrap();
/// assert_eq!(b.total().await.unwrap(), 1);
/// # });
/// ```
pub struct CounterRegistry {
    store: Arc<dyn ShardStore>,
    selector: Arc<dyn ShardSelector>,
    default_shards: usize,
    counters: RwLock<HashMap<String, Arc<ShardedCounter>>>,
}

impl CounterRegistry {
    /// Creates an empty registry over `store` with [`DEFAULT_SHARDS`] shards
    /// per counter.
    pub fn new(store: Arc<dyn ShardStore>) -> Self {
        Self {
            store,
            selector: Arc::new(RandomSelector),
            default_shards: DEFAULT_SHARDS,
            counters: RwLock::new(HashMap::new()),
        }
    }

    /// Sets the shard count for counters created without an explicit one.
    ///
    /// Fails with [`Error::InvalidShardCount`] if `shards` is zero.
    pub fn with_default_shards(self, shards: usize) -> Result<Self> {
        if shards == 0 {
            return Err(Error::InvalidShardCount);
        }
        Ok(Self {
            default_shards: shards,
            ..self
        })
    }

    /// Sets the shard selector handed to every counter created afterwards.
    pub fn with_selector(self, selector: Arc<dyn ShardSelector>) -> Self {
        Self { selector, ..self }
    }

    /// Shard count used for counters created by [`counter_for`](Self::counter_for).
    pub fn default_shards(&self) -> usize {
        self.default_shards
    }

    /// Returns the counter named `name`, creating it on first use.
    ///
    /// Repeated calls return the same instance.
    pub fn counter_for(&self, name: &str) -> Arc<ShardedCounter> {
        if let Some(counter) = self.counters.read().get(name) {
            return Arc::clone(counter);
        }
        let mut counters = self.counters.write();
        Arc::clone(
            counters
                .entry(name.to_string())
                .or_insert_with(|| self.create(name, self.default_shards)),
        )
    }

    /// Returns the counter named `name`, creating it with `shards` shards on
    /// first use.
    ///
    /// Fails with [`Error::ShardCountMismatch`] if the counter already exists
    /// with a different shard count: resharding an existing counter would
    /// need a migration of its cells.
    pub fn counter_with_shards(&self, name: &str, shards: usize) -> Result<Arc<ShardedCounter>> {
        if shards == 0 {
            return Err(Error::InvalidShardCount);
        }
        let counter = {
            let existing = self.counters.read().get(name).cloned();
            match existing {
                Some(counter) => counter,
                None => Arc::clone(
                    self.counters
                        .write()
                        .entry(name.to_string())
                        .or_insert_with(|| self.create(name, shards)),
                ),
            }
        };
        if counter.shard_count() != shards {
            return Err(Error::ShardCountMismatch {
                counter: name.to_string(),
                existing: counter.shard_count(),
                requested: shards,
            });
        }
        Ok(counter)
    }

    /// Returns the names of all counters created so far, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.counters.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of counters created so far.
    pub fn len(&self) -> usize {
        self.counters.read().len()
    }

    /// Returns `true` if no counter was created yet.
    pub fn is_empty(&self) -> bool {
        self.counters.read().is_empty()
    }

    fn create(&self, name: &str, shards: usize) -> Arc<ShardedCounter> {
        tracing::debug!(counter = name, shards, "creating counter");
        Arc::new(ShardedCounter::build(
            name.into(),
            shards,
            Arc::clone(&self.store),
            Arc::clone(&self.selector),
        ))
    }
}

impl Debug for CounterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CounterRegistry")
            .field("default_shards", &self.default_shards)
            .field("counters", &self.names())
            .field("store", &self.store)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn registry() -> CounterRegistry {
        CounterRegistry::new(Arc::new(MemoryStore::new()))
    }

    #[test]
    fn test_lazy_creation() {
        let registry = registry();
        assert!(registry.is_empty());
        let counter = registry.counter_for("cats");
        assert_eq!(counter.shard_count(), DEFAULT_SHARDS);
        assert_eq!(registry.names(), vec!["cats".to_string()]);
    }

    #[test]
    fn test_same_instance() {
        let registry = registry();
        let a = registry.counter_for("cats");
        let b = registry.counter_for("cats");
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn test_increment_visible_through_other_reference() {
        let registry = registry();
        let a = registry.counter_for("cats");
        let b = registry.counter_for("cats");
        a.increment().await.unwrap();
        a.increment().await.unwrap();
        assert_eq!(b.total().await.unwrap(), 2);
    }

    #[test]
    fn test_default_shards() {
        let registry = registry().with_default_shards(3).unwrap();
        assert_eq!(registry.counter_for("dogs").shard_count(), 3);
        assert!(matches!(
            CounterRegistry::new(Arc::new(MemoryStore::new())).with_default_shards(0),
            Err(Error::InvalidShardCount)
        ));
    }

    #[test]
    fn test_explicit_shards() {
        let registry = registry();
        let counter = registry.counter_with_shards("goldfish", 16).unwrap();
        assert_eq!(counter.shard_count(), 16);

        // Same count: same counter.
        let again = registry.counter_with_shards("goldfish", 16).unwrap();
        assert!(Arc::ptr_eq(&counter, &again));

        // Lazy lookup keeps the original shard count.
        assert_eq!(registry.counter_for("goldfish").shard_count(), 16);
    }

    #[test]
    fn test_shard_count_is_immutable() {
        let registry = registry();
        registry.counter_for("cats");
        match registry.counter_with_shards("cats", 4) {
            Err(Error::ShardCountMismatch {
                counter,
                existing,
                requested,
            }) => {
                assert_eq!(counter, "cats");
                assert_eq!(existing, DEFAULT_SHARDS);
                assert_eq!(requested, 4);
            }
            other => panic!("expected ShardCountMismatch, got {other:?}"),
        }
        assert!(matches!(
            registry.counter_with_shards("cats", 0),
            Err(Error::InvalidShardCount)
        ));
    }

    #[test]
    fn test_concurrent_first_use_converges() {
        use std::thread;

        let registry = Arc::new(registry());
        let mut handles = vec![];

        for _ in 0..8 {
            let registry = Arc::clone(&registry);
            handles.push(thread::spawn(move || registry.counter_for("cats")));
        }

        let counters: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        for counter in &counters[1..] {
            assert!(Arc::ptr_eq(&counters[0], counter));
        }
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_names_sorted() {
        let registry = registry();
        registry.counter_for("goldfish");
        registry.counter_for("cats");
        registry.counter_for("dogs");
        assert_eq!(registry.names(), vec!["cats", "dogs", "goldfish"]);
    }
}
