//! Client-side view of the totals with optimistic updates.
//!
//! A voter should see their vote counted the moment they cast it, not one
//! round trip later. [`OptimisticCache`] shows the last authoritative
//! snapshot plus every prediction still in flight, and drops predictions
//! as soon as a newer authoritative snapshot arrives: the server's numbers
//! already include the vote (or tell us something better than our guess).
//!
//! ```text
//!   displayed = authoritative + Σ deltas of Predicted calls
//! ```
//!
//! [`VoteClient`] drives the cache: it predicts synchronously, sends the
//! mutation in the background, rolls the prediction back if the call
//! fails, and feeds pushed snapshots into [`OptimisticCache::reconcile`].
//!
//! # Example
//!
//! ```rust
//! use scrutinio::client::OptimisticCache;
//! use scrutinio::{Choice, VoteCounts};
//!
//! let mut cache = OptimisticCache::with_initial(VoteCounts::new(3, 5, 0));
//! cache.predict(Choice::Dog);
//! assert_eq!(cache.displayed(), Some(VoteCounts::new(3, 6, 0)));
//!
//! // Someone else voted goldfish meanwhile.
//! cache.reconcile(VoteCounts::new(3, 6, 1));
//! assert_eq!(cache.displayed(), Some(VoteCounts::new(3, 6, 1)));
//! ```

mod pending;

pub use pending::{MutationId, PendingState};

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::task::JoinHandle;

use crate::choice::Choice;
use crate::error::Result;
use crate::live::Subscription;
use crate::service::VoteApi;
use crate::snapshot::VoteCounts;
use pending::Pending;

/// Outcome of [`OptimisticCache::reconcile`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciled {
    /// The snapshot replaced the cached totals; `settled` predictions were
    /// dropped from the display.
    Applied { settled: usize },
    /// The snapshot is older than what the cache already holds and was
    /// ignored.
    Stale,
}

/// Latest known totals plus in-flight predictions.
#[derive(Debug, Default)]
pub struct OptimisticCache {
    authoritative: Option<VoteCounts>,
    pending: BTreeMap<MutationId, Pending>,
    next_id: u64,
    stale: bool,
}

impl OptimisticCache {
    /// Creates a cache that has not seen any totals yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a cache seeded with preloaded totals.
    pub fn with_initial(counts: VoteCounts) -> Self {
        Self {
            authoritative: Some(counts),
            ..Self::default()
        }
    }

    /// Records a `+1` prediction for `choice` and returns its identity.
    ///
    /// Predictions compose: voting twice before any snapshot arrives shows
    /// both votes.
    pub fn predict(&mut self, choice: Choice) -> MutationId {
        let id = MutationId(self.next_id);
        self.next_id += 1;
        self.pending.insert(id, Pending::predicted(choice, 1));
        tracing::trace!(%id, %choice, "predicted vote");
        id
    }

    /// Replaces the cached totals with an authoritative snapshot.
    ///
    /// Every key is replaced, not only the ones voted on, so totals changed
    /// by other clients show up too. All predicted calls move to
    /// [`PendingState::Settled`] whatever their numbers were, and calls
    /// already confirmed are forgotten. A snapshot strictly older than the
    /// cached one is ignored.
    pub fn reconcile(&mut self, snapshot: VoteCounts) -> Reconciled {
        if let Some(current) = &self.authoritative {
            if snapshot.is_older_than(current) {
                tracing::debug!(%snapshot, %current, "ignoring stale snapshot");
                return Reconciled::Stale;
            }
        }
        self.authoritative = Some(snapshot);
        self.stale = false;
        let mut settled = 0;
        self.pending.retain(|_, pending| {
            if pending.settle() {
                settled += 1;
            }
            !pending.is_confirmed()
        });
        Reconciled::Applied { settled }
    }

    /// Forgets a call that completed successfully.
    ///
    /// If no snapshot arrived since the prediction, its delta stays visible
    /// and the call is forgotten by the next [`reconcile`](Self::reconcile).
    /// Returns the state the call was in, or `None` if unknown.
    pub fn confirm(&mut self, id: MutationId) -> Option<PendingState> {
        let pending = self.pending.get_mut(&id)?;
        let state = pending.state();
        match state {
            PendingState::Predicted => pending.confirm(),
            PendingState::Settled => {
                self.pending.remove(&id);
            }
        }
        Some(state)
    }

    /// Withdraws a call that failed.
    ///
    /// A still-predicted delta is removed from the display; a settled call
    /// already shows the last authoritative snapshot. Returns the state the
    /// call was in, or `None` if unknown.
    pub fn rollback(&mut self, id: MutationId) -> Option<PendingState> {
        let state = self.pending.remove(&id).map(|p| p.state());
        if state.is_some() {
            tracing::debug!(%id, ?state, "rolled back prediction");
        }
        state
    }

    /// Marks the cached totals as out of date after a failed read.
    ///
    /// The last good snapshot stays displayed; the flag clears on the next
    /// reconcile.
    pub fn mark_stale(&mut self) {
        self.stale = true;
    }

    /// Returns `true` if the last read failed.
    pub fn is_stale(&self) -> bool {
        self.stale
    }

    /// The last authoritative (or preloaded) totals.
    pub fn authoritative(&self) -> Option<VoteCounts> {
        self.authoritative
    }

    /// Totals to render: authoritative plus predicted deltas.
    ///
    /// `None` until the cache has seen any totals.
    pub fn displayed(&self) -> Option<VoteCounts> {
        let mut counts = self.authoritative?;
        for (choice, delta) in self.pending.values().filter_map(Pending::contribution) {
            let tally = counts.get_mut(choice);
            *tally = tally.saturating_add(delta);
        }
        Some(counts)
    }

    /// Sum of the displayed tallies, optionally leaving out the goldfish.
    pub fn total_votes(&self, include_goldfish: bool) -> Option<u64> {
        self.displayed().map(|c| c.total(include_goldfish))
    }

    /// State of a pending call, or `None` if it is not pending.
    pub fn state(&self, id: MutationId) -> Option<PendingState> {
        self.pending.get(&id).map(Pending::state)
    }

    /// Number of calls the cache still tracks.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Number of calls whose delta is currently displayed.
    pub fn predicted_len(&self) -> usize {
        self.pending
            .values()
            .filter(|p| p.state() == PendingState::Predicted)
            .count()
    }
}

/// A source of pushed snapshots.
#[async_trait]
pub trait SnapshotStream: Send {
    /// Waits for the next snapshot; `None` when the stream has ended.
    async fn next_snapshot(&mut self) -> Option<VoteCounts>;
}

#[async_trait]
impl SnapshotStream for Subscription {
    async fn next_snapshot(&mut self) -> Option<VoteCounts> {
        self.next().await
    }
}

/// Drives an [`OptimisticCache`] against a [`VoteApi`].
///
/// # Examples
///
/// ```rust
/// use scrutinio::client::VoteClient;
/// use scrutinio::{Choice, VoteCounts, VoteService};
/// use std::sync::Arc;
///
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// let service = Arc::new(VoteService::in_memory());
/// let client = VoteClient::with_initial(Arc::clone(&service), VoteCounts::default());
///
/// let call = client.vote(Choice::Cat);
/// assert_eq!(client.displayed(), Some(VoteCounts::new(1, 0, 0)));
/// call.await.unwrap().unwrap();
/// # });
/// ```
pub struct VoteClient<A> {
    api: Arc<A>,
    cache: Arc<Mutex<OptimisticCache>>,
}

impl<A> Clone for VoteClient<A> {
    fn clone(&self) -> Self {
        Self {
            api: Arc::clone(&self.api),
            cache: Arc::clone(&self.cache),
        }
    }
}

impl<A: VoteApi + 'static> VoteClient<A> {
    /// Creates a client with an empty cache.
    pub fn new(api: Arc<A>) -> Self {
        Self {
            api,
            cache: Arc::new(Mutex::new(OptimisticCache::new())),
        }
    }

    /// Creates a client whose cache starts from preloaded totals.
    pub fn with_initial(api: Arc<A>, counts: VoteCounts) -> Self {
        Self {
            api,
            cache: Arc::new(Mutex::new(OptimisticCache::with_initial(counts))),
        }
    }

    /// Casts a vote without waiting for the server.
    ///
    /// The prediction is visible as soon as this returns. The returned
    /// handle resolves when the call completes; dropping it does not cancel
    /// the call. On failure the prediction is rolled back.
    pub fn vote(&self, choice: Choice) -> JoinHandle<Result<()>> {
        let id = self.cache.lock().predict(choice);
        let api = Arc::clone(&self.api);
        let cache = Arc::clone(&self.cache);
        tokio::spawn(async move {
            let result = api.cast_vote(choice).await;
            let mut cache = cache.lock();
            match &result {
                Ok(()) => {
                    cache.confirm(id);
                }
                Err(err) => {
                    tracing::warn!(%id, %choice, error = %err, "vote failed");
                    cache.rollback(id);
                }
            }
            result
        })
    }

    /// Pulls the totals and reconciles; marks the cache stale on failure.
    pub async fn refresh(&self) -> Result<VoteCounts> {
        match self.api.vote_counts().await {
            Ok(counts) => {
                self.cache.lock().reconcile(counts);
                Ok(counts)
            }
            Err(err) => {
                tracing::warn!(error = %err, "refresh failed, showing last snapshot");
                self.cache.lock().mark_stale();
                Err(err)
            }
        }
    }

    /// Feeds every snapshot from `stream` into the cache until it ends.
    ///
    /// An ended stream means no more updates: the cache keeps the last
    /// snapshot and is marked stale.
    pub fn follow<S>(&self, mut stream: S) -> JoinHandle<()>
    where
        S: SnapshotStream + 'static,
    {
        let cache = Arc::clone(&self.cache);
        tokio::spawn(async move {
            while let Some(snapshot) = stream.next_snapshot().await {
                cache.lock().reconcile(snapshot);
            }
            tracing::warn!("snapshot stream ended, showing last snapshot");
            cache.lock().mark_stale();
        })
    }

    /// Totals to render right now.
    pub fn displayed(&self) -> Option<VoteCounts> {
        self.cache.lock().displayed()
    }

    /// Sum of the displayed tallies, optionally leaving out the goldfish.
    pub fn total_votes(&self, include_goldfish: bool) -> Option<u64> {
        self.cache.lock().total_votes(include_goldfish)
    }

    /// Returns `true` if the last refresh failed.
    pub fn is_stale(&self) -> bool {
        self.cache.lock().is_stale()
    }

    /// Runs `f` with the cache locked.
    pub fn with_cache<R>(&self, f: impl FnOnce(&mut OptimisticCache) -> R) -> R {
        f(&mut self.cache.lock())
    }
}
