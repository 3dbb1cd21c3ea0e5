//! Shard selection strategies.
//!
//! Increments must spread uniformly over all shards, independently of who
//! is calling, so that a single busy voter does not turn one shard into a
//! hot spot. [`RandomSelector`] is the production choice; [`SeededSelector`]
//! gives reproducible sequences for tests.

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fmt::Debug;

/// Picks the shard that receives the next increment.
pub trait ShardSelector: Send + Sync + Debug {
    /// Returns an index in `[0, shard_count)`.
    ///
    /// `shard_count` is always at least 1.
    fn select(&self, shard_count: usize) -> usize;
}

/// Uniform selection backed by the thread-local RNG.
///
/// There is no shared state between callers, so selection itself never
/// contends.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomSelector;

impl ShardSelector for RandomSelector {
    #[inline]
    fn select(&self, shard_count: usize) -> usize {
        if shard_count <= 1 {
            return 0;
        }
        rand::thread_rng().gen_range(0..shard_count)
    }
}

/// Uniform selection from a seeded RNG.
///
/// Every caller shares one generator behind a mutex, so the sequence is
/// deterministic for a given seed and a given order of calls.
///
/// # Examples
///
/// ```rust
/// use scrutinio::counter::{SeededSelector, ShardSelector};
///
/// let a = SeededSelector::new(42);
/// let b = SeededSelector::new(42);
/// let xs: Vec<_> = (0..16).map(|_| a.select(8)).collect();
/// let ys: Vec<_> = (0..16).map(|_| b.select(8)).collect();
/// assert_eq!(xs, ys);
/// ```
#[derive(Debug)]
pub struct SeededSelector {
    rng: Mutex<StdRng>,
}

impl SeededSelector {
    /// Creates a selector whose sequence is fully determined by `seed`.
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl ShardSelector for SeededSelector {
    fn select(&self, shard_count: usize) -> usize {
        if shard_count <= 1 {
            return 0;
        }
        self.rng.lock().gen_range(0..shard_count)
    }
}
