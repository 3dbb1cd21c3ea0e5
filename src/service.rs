//! The vote mutation and query service.
//!
//! [`VoteService`] is the single owning context for a tally deployment: it
//! holds the counter registry and the live totals channel, and is handed
//! explicitly to whatever serves requests (the TCP front-end, tests, an
//! embedding application). There is no process-wide global; two services
//! built over two stores are fully isolated.
//!
//! # Example
//!
//! ```rust
//! use scrutinio::{Choice, VoteCounts, VoteService};
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let service = VoteService::in_memory();
//! service.cast_vote("cat").await.unwrap();
//! assert!(service.cast_vote("parrot").await.is_err());
//! assert_eq!(service.vote_counts().await.unwrap(), VoteCounts::new(1, 0, 0));
//! # });
//! ```

use async_trait::async_trait;
use futures::future::try_join_all;
use std::sync::Arc;

use crate::choice::Choice;
use crate::config::ServiceConfig;
use crate::counter::ShardSelector;
use crate::error::Result;
use crate::live::{LiveTotals, Subscription};
use crate::registry::CounterRegistry;
use crate::snapshot::VoteCounts;
use crate::store::{MemoryStore, ShardStore};

/// The two operations a voting front-end needs.
///
/// Implemented in-process by [`VoteService`] and over TCP by
/// [`RemoteVoteApi`](crate::net::RemoteVoteApi).
#[async_trait]
pub trait VoteApi: Send + Sync {
    /// Records one vote for `choice`.
    async fn cast_vote(&self, choice: Choice) -> Result<()>;

    /// Returns the current totals for every choice.
    async fn vote_counts(&self) -> Result<VoteCounts>;
}

/// Sums every choice's counter concurrently.
///
/// Fails if any counter read fails; never returns a partial snapshot.
pub(crate) async fn tally(registry: &CounterRegistry) -> Result<VoteCounts> {
    let totals = try_join_all(Choice::ALL.into_iter().map(|choice| async move {
        let total = registry.counter_for(choice.counter_name()).total().await?;
        Ok::<_, crate::Error>((choice, total))
    }))
    .await?;
    Ok(totals.into_iter().collect())
}

/// Vote casting and counting over a sharded store.
#[derive(Debug)]
pub struct VoteService {
    registry: Arc<CounterRegistry>,
    live: LiveTotals,
}

impl VoteService {
    /// Builds a service over `store`.
    ///
    /// Counters for every choice are created up front with the shard
    /// counts from `config`. Must be called from within a Tokio runtime:
    /// the live totals refresher is spawned here.
    pub fn new(config: &ServiceConfig, store: Arc<dyn ShardStore>) -> Result<Self> {
        Self::build(config, CounterRegistry::new(store))
    }

    /// Like [`new`](Self::new), with an explicit shard selector.
    pub fn with_selector(
        config: &ServiceConfig,
        store: Arc<dyn ShardStore>,
        selector: Arc<dyn ShardSelector>,
    ) -> Result<Self> {
        Self::build(config, CounterRegistry::new(store).with_selector(selector))
    }

    /// A service over a fresh [`MemoryStore`] with default configuration.
    pub fn in_memory() -> Self {
        let registry = CounterRegistry::new(Arc::new(MemoryStore::new()));
        for choice in Choice::ALL {
            registry.counter_for(choice.counter_name());
        }
        let registry = Arc::new(registry);
        let live = LiveTotals::spawn(
            Arc::clone(&registry),
            ServiceConfig::default().refresh_retry(),
        );
        Self { registry, live }
    }

    fn build(config: &ServiceConfig, registry: CounterRegistry) -> Result<Self> {
        config.validate()?;
        let registry = registry.with_default_shards(config.default_shards)?;
        for choice in Choice::ALL {
            let name = choice.counter_name();
            registry.counter_with_shards(name, config.shards_for(name))?;
        }
        let registry = Arc::new(registry);
        let live = LiveTotals::spawn(Arc::clone(&registry), config.refresh_retry());
        tracing::info!(
            default_shards = config.default_shards,
            counters = ?registry.names(),
            "vote service ready"
        );
        Ok(Self { registry, live })
    }

    /// Validates `choice` and records one vote for it.
    ///
    /// Unknown choices fail with [`Error::Validation`](crate::Error::Validation)
    /// before any shard is touched.
    pub async fn cast_vote(&self, choice: &str) -> Result<()> {
        let choice = choice.parse::<Choice>().map_err(|err| {
            tracing::debug!(error = %err, "rejected vote");
            err
        })?;
        self.vote(choice).await
    }

    /// Records one vote for `choice`.
    ///
    /// On [`Error::Unavailable`](crate::Error::Unavailable) the vote may or
    /// may not have been recorded; subscribers are refreshed either way.
    pub async fn vote(&self, choice: Choice) -> Result<()> {
        let result = self
            .registry
            .counter_for(choice.counter_name())
            .increment()
            .await;
        self.live.invalidate();
        match &result {
            Ok(()) => tracing::debug!(%choice, "vote recorded"),
            Err(err) => tracing::warn!(%choice, error = %err, "vote not acknowledged"),
        }
        result
    }

    /// Returns the totals for every choice, zero for choices never voted for.
    pub async fn vote_counts(&self) -> Result<VoteCounts> {
        tally(&self.registry).await
    }

    /// Subscribes to live totals.
    pub fn subscribe(&self) -> Subscription {
        self.live.subscribe()
    }

    /// The live totals channel backing [`subscribe`](Self::subscribe).
    pub fn live(&self) -> &LiveTotals {
        &self.live
    }

    /// The counter registry.
    pub fn registry(&self) -> &Arc<CounterRegistry> {
        &self.registry
    }
}

#[async_trait]
impl VoteApi for VoteService {
    async fn cast_vote(&self, choice: Choice) -> Result<()> {
        self.vote(choice).await
    }

    async fn vote_counts(&self) -> Result<VoteCounts> {
        VoteService::vote_counts(self).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::counter::SeededSelector;
    use crate::error::Error;
    use crate::store::FaultyStore;

    #[tokio::test]
    async fn test_counts_start_at_zero() {
        let service = VoteService::in_memory();
        assert_eq!(service.vote_counts().await.unwrap(), VoteCounts::default());
        assert_eq!(service.registry().len(), 3);
    }

    #[tokio::test]
    async fn test_cast_vote() {
        let service = VoteService::in_memory();
        service.cast_vote("cat").await.unwrap();
        service.cast_vote("dog").await.unwrap();
        service.cast_vote("dog").await.unwrap();
        assert_eq!(service.vote_counts().await.unwrap(), VoteCounts::new(1, 2, 0));
    }

    #[tokio::test]
    async fn test_unknown_choice_rejected_without_side_effect() {
        let store = Arc::new(MemoryStore::new());
        let service = VoteService::new(&ServiceConfig::default(), store.clone()).unwrap();
        service.cast_vote("cat").await.unwrap();
        let before = service.vote_counts().await.unwrap();
        let cells = store.len();

        match service.cast_vote("parrot").await {
            Err(Error::Validation { choice }) => assert_eq!(choice, "parrot"),
            other => panic!("expected Validation, got {other:?}"),
        }

        assert_eq!(service.vote_counts().await.unwrap(), before);
        assert_eq!(store.len(), cells);
        assert_eq!(service.registry().len(), 3);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_hundred_concurrent_cat_votes() {
        let service = Arc::new(VoteService::in_memory());
        let mut handles = vec![];

        for _ in 0..100 {
            let service = Arc::clone(&service);
            handles.push(tokio::spawn(async move {
                service.cast_vote("cat").await.unwrap();
            }));
        }

        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(
            service.vote_counts().await.unwrap(),
            VoteCounts::new(100, 0, 0)
        );
        let cats = service.registry().counter_for("cats");
        assert_eq!(cats.shard_count(), 8);
        assert_eq!(cats.shard_values().await.unwrap().iter().sum::<u64>(), 100);
    }

    #[tokio::test]
    async fn test_configured_shards() {
        let mut config = ServiceConfig {
            default_shards: 2,
            ..Default::default()
        };
        config.shards.insert("goldfish".into(), 1);
        let service = VoteService::with_selector(
            &config,
            Arc::new(MemoryStore::new()),
            Arc::new(SeededSelector::new(5)),
        )
        .unwrap();

        assert_eq!(service.registry().counter_for("cats").shard_count(), 2);
        assert_eq!(service.registry().counter_for("goldfish").shard_count(), 1);
    }

    #[tokio::test]
    async fn test_invalid_config_rejected() {
        let config = ServiceConfig {
            default_shards: 0,
            ..Default::default()
        };
        assert!(VoteService::new(&config, Arc::new(MemoryStore::new())).is_err());
    }

    #[tokio::test]
    async fn test_unavailable_store_surfaces() {
        let store = Arc::new(FaultyStore::new(MemoryStore::new()));
        let service = VoteService::new(&ServiceConfig::default(), store.clone()).unwrap();

        store.fail_writes();
        let err = service.cast_vote("dog").await.unwrap_err();
        assert!(matches!(err, Error::Unavailable { .. }));
        assert!(err.is_transient());

        store.heal();
        assert_eq!(service.vote_counts().await.unwrap(), VoteCounts::default());
    }

    #[tokio::test]
    async fn test_partial_read_fails_counts() {
        let store = Arc::new(FaultyStore::new(MemoryStore::new()));
        let service = VoteService::new(&ServiceConfig::default(), store.clone()).unwrap();
        service.cast_vote("cat").await.unwrap();

        store.fail_reads();
        assert!(matches!(
            service.vote_counts().await,
            Err(Error::PartialRead { .. })
        ));

        store.heal();
        assert_eq!(service.vote_counts().await.unwrap(), VoteCounts::new(1, 0, 0));
    }

    #[tokio::test]
    async fn test_vote_api_trait_object() {
        let service = VoteService::in_memory();
        let api: &dyn VoteApi = &service;
        api.cast_vote(Choice::Goldfish).await.unwrap();
        assert_eq!(api.vote_counts().await.unwrap(), VoteCounts::new(0, 0, 1));
    }

    #[tokio::test]
    async fn test_services_are_isolated() {
        let a = VoteService::in_memory();
        let b = VoteService::in_memory();
        a.cast_vote("cat").await.unwrap();
        assert_eq!(b.vote_counts().await.unwrap(), VoteCounts::default());
    }
}
