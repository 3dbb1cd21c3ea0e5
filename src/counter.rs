//! Sharded counters: one logical total spread over independent shard cells.
//!
//! A single hot counter serializes every writer on one storage cell. A
//! [`ShardedCounter`] instead owns `shard_count` cells in a
//! [`ShardStore`] and sends each increment to one of them, picked
//! uniformly at random. Reads pay for this by fanning out to every shard
//! and summing the results.
//!
//! ```text
//!                    increment()
//!                        │ uniform pick
//!         ┌──────────────┼──────────────┐
//!         ▼              ▼              ▼
//!     cats[0]        cats[1]   ...   cats[7]      (ShardStore cells)
//!         │              │              │
//!         └──────────────┼──────────────┘
//!                        ▼
//!                 total() = Σ shards
//! ```
//!
//! # Consistency
//!
//! `total()` reads shards concurrently and sums them. Increments racing with
//! the read may or may not be included, but every acknowledged increment
//! lives in exactly one shard and is counted by every later `total()`.
//! If any shard read fails, the whole read fails with
//! [`Error::PartialRead`]; a partial sum would be a silent undercount.

mod selector;

pub use selector::{RandomSelector, SeededSelector, ShardSelector};

use futures::future::join_all;
use std::fmt::{self, Debug};
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::store::{ShardKey, ShardStore};

/// Number of shards used when none is configured.
pub const DEFAULT_SHARDS: usize = 8;

/// A logical counter backed by a fixed set of shard cells.
///
/// # Examples
///
/// ```rust
/// use scrutinio::counter::ShardedCounter;
/// use scrutinio::store::MemoryStore;
/// use std::sync::Arc;
///
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// let counter = ShardedCounter::new("cats", 8, Arc::new(MemoryStore::new())).unwrap();
/// counter.increment().await.unwrap();
/// counter.add(4).await.unwrap();
/// assert_eq!(counter.total().await.unwrap(), 5);
/// # });
/// ```
pub struct ShardedCounter {
    name: Arc<str>,
    keys: Box<[ShardKey]>,
    store: Arc<dyn ShardStore>,
    selector: Arc<dyn ShardSelector>,
}

impl ShardedCounter {
    /// Creates a counter named `name` with `shard_count` shards in `store`.
    ///
    /// Shards are selected with [`RandomSelector`]. Fails with
    /// [`Error::InvalidShardCount`] if `shard_count` is zero.
    pub fn new(
        name: impl Into<Arc<str>>,
        shard_count: usize,
        store: Arc<dyn ShardStore>,
    ) -> Result<Self> {
        if shard_count == 0 {
            return Err(Error::InvalidShardCount);
        }
        Ok(Self::build(
            name.into(),
            shard_count,
            store,
            Arc::new(RandomSelector),
        ))
    }

    /// Assembles a counter; `shard_count` must be non-zero.
    pub(crate) fn build(
        name: Arc<str>,
        shard_count: usize,
        store: Arc<dyn ShardStore>,
        selector: Arc<dyn ShardSelector>,
    ) -> Self {
        debug_assert!(shard_count > 0);
        let keys = (0..shard_count)
            .map(|index| ShardKey::new(Arc::clone(&name), index))
            .collect();
        Self {
            name,
            keys,
            store,
            selector,
        }
    }

    /// Replaces the shard selector, returning `self` for method chaining.
    pub fn with_selector(self, selector: Arc<dyn ShardSelector>) -> Self {
        Self { selector, ..self }
    }

    /// Returns the name of this counter.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the number of shards backing this counter.
    #[inline]
    pub fn shard_count(&self) -> usize {
        self.keys.len()
    }

    /// Adds one to the counter.
    #[inline]
    pub async fn increment(&self) -> Result<()> {
        self.add(1).await
    }

    /// Adds `delta` to one randomly selected shard.
    ///
    /// Returns once the store acknowledges the write. A zero delta touches
    /// no shard. On error the increment may or may not have been applied.
    pub async fn add(&self, delta: u64) -> Result<()> {
        if delta == 0 {
            return Ok(());
        }
        let index = self.selector.select(self.keys.len());
        let key = &self.keys[index];
        let value = self.store.incr(key, delta).await?;
        tracing::trace!(counter = %self.name, shard = index, value, "increment acknowledged");
        Ok(())
    }

    /// Reads every shard concurrently, in shard index order.
    ///
    /// Fails with [`Error::PartialRead`] if any shard read fails.
    pub async fn shard_values(&self) -> Result<Vec<u64>> {
        let reads = join_all(self.keys.iter().map(|key| self.store.get(key))).await;

        let mut values = Vec::with_capacity(reads.len());
        let mut failed = 0;
        for (key, read) in self.keys.iter().zip(reads) {
            match read {
                Ok(value) => values.push(value),
                Err(err) => {
                    tracing::warn!(%key, error = %err, "shard read failed");
                    failed += 1;
                }
            }
        }

        if failed > 0 {
            return Err(Error::PartialRead {
                counter: self.name.to_string(),
                failed,
                shards: self.keys.len(),
            });
        }
        Ok(values)
    }

    /// Returns the sum of all shards.
    ///
    /// Fails with [`Error::Overflow`] if the sum does not fit in a `u64`.
    pub async fn total(&self) -> Result<u64> {
        self.shard_values()
            .await?
            .into_iter()
            .try_fold(0u64, u64::checked_add)
            .ok_or_else(|| Error::Overflow {
                counter: self.name.to_string(),
            })
    }
}

impl Debug for ShardedCounter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShardedCounter")
            .field("name", &self.name)
            .field("shards", &self.keys.len())
            .field("selector", &self.selector)
            .finish()
    }
}
