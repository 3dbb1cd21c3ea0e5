//! Fault-injecting shard store wrapper.
//!
//! [`FaultyStore`] forwards to an inner store until a fault is armed. Read
//! and write faults are independent, and each can fire forever or for the
//! next `n` operations only. A third mode applies writes but drops their
//! acknowledgement, which is what an at-least-once caller sees when the
//! medium commits and the reply is lost.

use async_trait::async_trait;
use std::fmt::{self, Debug};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};

use crate::error::{Error, Result};
use crate::store::{ShardKey, ShardStore};

const ALWAYS: i64 = -1;

/// Remaining failures for one kind of operation.
///
/// `0` means healthy, a negative value fails forever, a positive value
/// fails that many more operations.
#[derive(Default)]
struct Fault(AtomicI64);

impl Fault {
    fn arm(&self, remaining: i64) {
        self.0.store(remaining, Ordering::Release);
    }

    /// Consumes one failure if armed and reports whether this operation fails.
    fn trip(&self) -> bool {
        self.0
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| match n {
                0 => None,
                n if n < 0 => Some(n),
                n => Some(n - 1),
            })
            .is_ok()
    }

    fn remaining(&self) -> i64 {
        self.0.load(Ordering::Acquire)
    }
}

/// A shard store that fails on demand.
///
/// # Examples
///
/// ```rust
/// use scrutinio::store::{FaultyStore, MemoryStore, ShardKey, ShardStore};
///
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// let store = FaultyStore::new(MemoryStore::new());
/// let key = ShardKey::new("cats", 0);
///
/// store.fail_next_writes(1);
/// assert!(store.incr(&key, 1).await.is_err());
/// assert_eq!(store.incr(&key, 1).await.unwrap(), 1);
/// # });
/// ```
pub struct FaultyStore<S> {
    inner: S,
    writes: Fault,
    reads: Fault,
    lose_acks: AtomicBool,
}

impl<S> FaultyStore<S> {
    /// Wraps `inner` with no fault armed.
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            writes: Fault::default(),
            reads: Fault::default(),
            lose_acks: AtomicBool::new(false),
        }
    }

    /// Returns the wrapped store.
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Fails every increment until [`heal`](Self::heal) is called.
    pub fn fail_writes(&self) {
        self.writes.arm(ALWAYS);
    }

    /// Fails the next `n` increments.
    pub fn fail_next_writes(&self, n: u32) {
        self.writes.arm(i64::from(n));
    }

    /// Fails every read until [`heal`](Self::heal) is called.
    pub fn fail_reads(&self) {
        self.reads.arm(ALWAYS);
    }

    /// Fails the next `n` reads.
    pub fn fail_next_reads(&self, n: u32) {
        self.reads.arm(i64::from(n));
    }

    /// Applies increments but reports them as failed.
    pub fn lose_write_acks(&self, lose: bool) {
        self.lose_acks.store(lose, Ordering::Release);
    }

    /// Disarms every fault.
    pub fn heal(&self) {
        self.writes.arm(0);
        self.reads.arm(0);
        self.lose_acks.store(false, Ordering::Release);
    }
}

#[async_trait]
impl<S: ShardStore> ShardStore for FaultyStore<S> {
    async fn incr(&self, key: &ShardKey, delta: u64) -> Result<u64> {
        if self.writes.trip() {
            tracing::debug!(%key, "injected write fault");
            return Err(Error::Unavailable {
                key: key.clone(),
                reason: "injected write fault".into(),
            });
        }
        let value = self.inner.incr(key, delta).await?;
        if self.lose_acks.load(Ordering::Acquire) {
            tracing::debug!(%key, value, "dropping write acknowledgement");
            return Err(Error::Unavailable {
                key: key.clone(),
                reason: "acknowledgement lost".into(),
            });
        }
        Ok(value)
    }

    async fn get(&self, key: &ShardKey) -> Result<u64> {
        if self.reads.trip() {
            tracing::debug!(%key, "injected read fault");
            return Err(Error::Unavailable {
                key: key.clone(),
                reason: "injected read fault".into(),
            });
        }
        self.inner.get(key).await
    }
}

impl<S: Debug> Debug for FaultyStore<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FaultyStore")
            .field("inner", &self.inner)
            .field("write_faults", &self.writes.remaining())
            .field("read_faults", &self.reads.remaining())
            .field("lose_acks", &self.lose_acks.load(Ordering::Relaxed))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[tokio::test]
    async fn test_healthy_by_default() {
        let store = FaultyStore::new(MemoryStore::new());
        let key = ShardKey::new("cats", 0);
        assert_eq!(store.incr(&key, 2).await.unwrap(), 2);
        assert_eq!(store.get(&key).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_fail_writes_until_healed() {
        let store = FaultyStore::new(MemoryStore::new());
        let key = ShardKey::new("cats", 0);

        store.fail_writes();
        for _ in 0..3 {
            assert!(matches!(
                store.incr(&key, 1).await,
                Err(Error::Unavailable { .. })
            ));
        }
        assert_eq!(store.inner().get(&key).await.unwrap(), 0);

        store.heal();
        assert_eq!(store.incr(&key, 1).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_fail_next_reads_counts_down() {
        let store = FaultyStore::new(MemoryStore::new());
        let key = ShardKey::new("dogs", 1);
        store.incr(&key, 5).await.unwrap();

        store.fail_next_reads(2);
        assert!(store.get(&key).await.is_err());
        assert!(store.get(&key).await.is_err());
        assert_eq!(store.get(&key).await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_reads_and_writes_are_independent() {
        let store = FaultyStore::new(MemoryStore::new());
        let key = ShardKey::new("cats", 0);

        store.fail_reads();
        assert_eq!(store.incr(&key, 1).await.unwrap(), 1);
        assert!(store.get(&key).await.is_err());
    }

    #[tokio::test]
    async fn test_lost_ack_still_applies_write() {
        let store = FaultyStore::new(MemoryStore::new());
        let key = ShardKey::new("goldfish", 0);

        store.lose_write_acks(true);
        assert!(store.incr(&key, 1).await.is_err());
        assert_eq!(store.get(&key).await.unwrap(), 1);
    }
}
