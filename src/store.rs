//! Shard storage: durable integer cells addressed by counter name and index.
//!
//! A [`ShardStore`] only knows two operations: atomically add a delta to one
//! cell, and read one cell. Everything above it (routing, summing,
//! validation) lives in [`crate::counter`] and [`crate::service`].
//!
//! ```text
//!   ShardKey("cats", 0) ──► [cell] 12
//!   ShardKey("cats", 1) ──► [cell]  9
//!          ...
//!   ShardKey("cats", 7) ──► [cell] 14
//! ```
//!
//! Cells that were never incremented read as zero.
//!
//! # Implementations
//!
//! | Store | Description |
//! |-------|-------------|
//! | [`MemoryStore`] | Cache-padded atomics, one per cell |
//! | [`FaultyStore`] | Wraps another store and fails on demand |

mod faulty;
mod memory;

pub use faulty::FaultyStore;
pub use memory::MemoryStore;

use async_trait::async_trait;
use std::fmt::{self, Debug, Display};
use std::sync::Arc;

use crate::error::Result;

/// Address of a single shard cell.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShardKey {
    counter: Arc<str>,
    index: usize,
}

impl ShardKey {
    /// Creates the key for shard `index` of `counter`.
    pub fn new(counter: impl Into<Arc<str>>, index: usize) -> Self {
        Self {
            counter: counter.into(),
            index,
        }
    }

    /// Name of the logical counter owning this shard.
    pub fn counter(&self) -> &str {
        &self.counter
    }

    /// Index of the shard within its counter.
    pub fn index(&self) -> usize {
        self.index
    }
}

impl Display for ShardKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.counter, self.index)
    }
}

/// Storage beneath the sharded counters.
///
/// # Contract
///
/// - `incr` is atomic with respect to concurrent `incr` and `get` on the
///   same cell; it returns the cell value after the increment.
/// - `get` of a cell that was never incremented returns `0`.
/// - Both fail with [`Error::Unavailable`](crate::Error::Unavailable) when
///   the medium cannot complete the operation. A failed `incr` may or may
///   not have been applied.
#[async_trait]
pub trait ShardStore: Send + Sync + Debug {
    /// Adds `delta` to the cell at `key` and returns the new cell value.
    async fn incr(&self, key: &ShardKey, delta: u64) -> Result<u64>;

    /// Reads the cell at `key`.
    async fn get(&self, key: &ShardKey) -> Result<u64>;
}

#[async_trait]
impl<S: ShardStore + ?Sized> ShardStore for Arc<S> {
    async fn incr(&self, key: &ShardKey, delta: u64) -> Result<u64> {
        (**self).incr(key, delta).await
    }

    async fn get(&self, key: &ShardKey) -> Result<u64> {
        (**self).get(key).await
    }
}
