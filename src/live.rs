//! Live vote totals pushed to subscribers.
//!
//! [`LiveTotals`] keeps the latest [`VoteCounts`] in a
//! [`tokio::sync::watch`] channel and recomputes it in a background task
//! whenever a vote may have changed a shard.
//!
//! ```text
//!   vote ──► invalidate() ──► Notify (marks coalesce)
//!                                  │
//!                       refresher task wakes
//!                                  │ tally()
//!                                  ▼
//!                 watch::Sender<VoteCounts>  (per-choice max merge)
//!                     │         │         │
//!                     ▼         ▼         ▼
//!               Subscription Subscription ...
//! ```
//!
//! # Delivery
//!
//! - A burst of votes may produce fewer pushes than votes. Each push carries
//!   the latest totals and the last one always reflects the final state.
//! - A subscriber never sees a tally go down. Recomputations can finish out
//!   of order, so publishing merges with the current value per choice.
//! - A failed recomputation keeps the last good snapshot published and is
//!   retried after a delay.

use std::fmt::{self, Debug};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;

use crate::error::Result;
use crate::registry::CounterRegistry;
use crate::service::tally;
use crate::snapshot::VoteCounts;

struct Shared {
    registry: Arc<CounterRegistry>,
    tx: watch::Sender<VoteCounts>,
    dirty: Notify,
}

impl Shared {
    /// Recomputes the totals and publishes them, returning what subscribers
    /// now see.
    async fn refresh(&self) -> Result<VoteCounts> {
        let counts = tally(&self.registry).await?;
        let mut published = counts;
        self.tx.send_if_modified(|current| {
            let merged = current.max(counts);
            published = merged;
            if merged != *current {
                *current = merged;
                true
            } else {
                false
            }
        });
        Ok(published)
    }
}

async fn refresh_loop(shared: Arc<Shared>, retry: Duration) {
    loop {
        shared.dirty.notified().await;
        match shared.refresh().await {
            Ok(counts) => tracing::trace!(%counts, "live totals published"),
            Err(err) => {
                tracing::warn!(error = %err, "live refresh failed, keeping last snapshot");
                tokio::time::sleep(retry).await;
                shared.dirty.notify_one();
            }
        }
    }
}

/// Publisher side of the live totals channel.
///
/// Dropping it stops the refresher; open subscriptions then end after
/// their last value.
pub struct LiveTotals {
    shared: Arc<Shared>,
    task: JoinHandle<()>,
}

impl LiveTotals {
    /// Starts the refresher for `registry`.
    ///
    /// The first snapshot is computed right away. Must be called from within
    /// a Tokio runtime.
    pub fn spawn(registry: Arc<CounterRegistry>, retry: Duration) -> Self {
        let (tx, _) = watch::channel(VoteCounts::default());
        let shared = Arc::new(Shared {
            registry,
            tx,
            dirty: Notify::new(),
        });
        shared.dirty.notify_one();
        let task = tokio::spawn(refresh_loop(Arc::clone(&shared), retry));
        Self { shared, task }
    }

    /// Marks the totals as possibly changed.
    ///
    /// Never blocks; any number of calls before the refresher wakes up
    /// collapse into one recomputation.
    pub fn invalidate(&self) {
        self.shared.dirty.notify_one();
    }

    /// Recomputes and publishes the totals now.
    pub async fn refresh(&self) -> Result<VoteCounts> {
        self.shared.refresh().await
    }

    /// The most recently published totals.
    pub fn current(&self) -> VoteCounts {
        *self.shared.tx.borrow()
    }

    /// Opens a new subscription positioned at the current totals.
    pub fn subscribe(&self) -> Subscription {
        Subscription {
            rx: self.shared.tx.subscribe(),
        }
    }

    /// Number of open subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.shared.tx.receiver_count()
    }
}

impl Drop for LiveTotals {
    fn drop(&mut self) {
        self.task.abort();
    }
}

impl Debug for LiveTotals {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LiveTotals")
            .field("current", &self.current())
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

/// A stream of live totals.
///
/// # Examples
///
/// ```rust
/// use scrutinio::VoteService;
///
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// let service = VoteService::in_memory();
/// let mut sub = service.subscribe();
///
/// service.cast_vote("dog").await.unwrap();
/// let counts = sub.next().await.unwrap();
/// assert_eq!(counts.dog, 1);
/// # });
/// ```
#[derive(Debug, Clone)]
pub struct Subscription {
    rx: watch::Receiver<VoteCounts>,
}

impl Subscription {
    /// The latest totals, marking them as seen.
    pub fn current(&mut self) -> VoteCounts {
        *self.rx.borrow_and_update()
    }

    /// Waits for totals newer than the last ones seen.
    ///
    /// Returns `None` once the publisher is gone.
    pub async fn next(&mut self) -> Option<VoteCounts> {
        self.rx.changed().await.ok()?;
        Some(*self.rx.borrow_and_update())
    }
}
