//! In-memory shard store built from cache-padded atomics.
//!
//! Every cell is an `AtomicU64` wrapped in [`crossbeam_utils::CachePadded`],
//! so increments on neighbouring shards never share a cache line. The map
//! from keys to cells is only write-locked the first time a cell is touched;
//! after that, increments take a read lock and a single `fetch_update`.

use async_trait::async_trait;
use crossbeam_utils::CachePadded;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt::{self, Debug};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::store::{ShardKey, ShardStore};

type Cell = Arc<CachePadded<AtomicU64>>;

/// A shard store keeping every cell in process memory.
///
/// # Examples
///
/// ```rust
/// use scrutinio::store::{MemoryStore, ShardKey, ShardStore};
///
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// let store = MemoryStore::new();
/// let key = ShardKey::new("cats", 0);
///
/// assert_eq!(store.get(&key).await.unwrap(), 0);
/// assert_eq!(store.incr(&key, 1).await.unwrap(), 1);
/// assert_eq!(store.incr(&key, 4).await.unwrap(), 5);
/// # });
/// ```
#[derive(Default)]
pub struct MemoryStore {
    cells: RwLock<HashMap<ShardKey, Cell>>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cells that have been touched by an increment.
    pub fn len(&self) -> usize {
        self.cells.read().len()
    }

    /// Returns `true` if no cell was ever incremented.
    pub fn is_empty(&self) -> bool {
        self.cells.read().is_empty()
    }

    #[inline]
    fn lookup(&self, key: &ShardKey) -> Option<Cell> {
        self.cells.read().get(key).cloned()
    }

    /// Returns the cell for `key`, creating it zeroed on first use.
    fn cell(&self, key: &ShardKey) -> Cell {
        if let Some(cell) = self.lookup(key) {
            return cell;
        }
        self.cells
            .write()
            .entry(key.clone())
            .or_insert_with(|| Arc::new(CachePadded::new(AtomicU64::new(0))))
            .clone()
    }
}

#[async_trait]
impl ShardStore for MemoryStore {
    async fn incr(&self, key: &ShardKey, delta: u64) -> Result<u64> {
        let cell = self.cell(key);
        let prev = cell
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |v| v.checked_add(delta))
            .map_err(|v| Error::Unavailable {
                key: key.clone(),
                reason: format!("adding {delta} to {v} overflows"),
            })?;
        Ok(prev + delta)
    }

    async fn get(&self, key: &ShardKey) -> Result<u64> {
        Ok(self
            .lookup(key)
            .map(|cell| cell.load(Ordering::Acquire))
            .unwrap_or(0))
    }
}

impl Debug for MemoryStore {
    /// Formats the store showing non-zero cells in key order.
    ///
    /// Output format: `MemoryStore{ cats[0]:3 dogs[5]:1 ... }`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cells = self.cells.read();
        let mut keys: Vec<_> = cells.keys().collect();
        keys.sort();
        write!(f, "MemoryStore{{")?;
        for key in keys {
            let val = cells[key].load(Ordering::Relaxed);
            if val != 0 {
                write!(f, " {key}:{val}")?;
            }
        }
        write!(f, " }}")
    }
}
