//! # Scrutinio - Sharded Vote Tallies with Optimistic Clients
//!
//! A Rust library for counting votes under heavy write contention while
//! giving each voter instant feedback. Votes for a choice are spread over
//! several shards so concurrent writers rarely touch the same cell; readers
//! sum the shards; subscribers get near-real-time totals pushed to them; and
//! clients show their own votes before the server has acknowledged them.
//!
//! ## The Problem
//!
//! A popular poll turns every vote into an increment of the same integer.
//! With one cell per choice every write contends on that cell, and in a
//! backing store with per-key write limits the hottest choice caps the
//! whole service's throughput.
//!
//! On the client side, waiting one round trip before the count moves feels
//! broken. But showing a locally incremented number forever is wrong too:
//! other voters keep voting, and the server's number is the truth.
//!
//! ## The Solution
//!
//! ### Sharded counters
//!
//! Each logical counter owns `N` shards. An increment picks one shard
//! uniformly at random and adds to it; a read fetches every shard
//! concurrently and sums them.
//!
//! ```text
//!          increment()                         total()
//!              │                                  │
//!       pick uniformly                     read all shards
//!              ▼                                  ▼
//!   ┌──────┬──────┬──────┬──────┐   ┌──────┬──────┬──────┬──────┐
//!   │ s[0] │ s[1] │ s[2] │ s[3] │   │  12  │  9   │  14  │  11  │ ──► 46
//!   └──────┴──────┴──────┴──────┘   └──────┴──────┴──────┴──────┘
//! ```
//!
//! If any shard read fails the whole read fails with
//! [`Error::PartialRead`]: a missing shard would silently undercount.
//!
//! ### Live totals
//!
//! Every vote marks the totals dirty. A background task recomputes them and
//! publishes to every subscriber. Bursts coalesce: subscribers may see fewer
//! snapshots than votes, but always the latest one, and never a tally going
//! down.
//!
//! ### Optimistic clients
//!
//! The client shows `last authoritative snapshot + in-flight predictions`.
//! When a newer snapshot arrives it replaces the whole mapping and drops
//! every prediction, so votes cast by other clients show up and no vote is
//! counted twice. A failed vote is rolled back.
//!
//! ## Quick Start
//!
//! ```rust
//! use scrutinio::client::VoteClient;
//! use scrutinio::{Choice, VoteCounts, VoteService};
//! use std::sync::Arc;
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! // One service per deployment, passed around explicitly.
//! let service = Arc::new(VoteService::in_memory());
//!
//! // Server side: cast and count.
//! service.cast_vote("cat").await.unwrap();
//! assert!(service.cast_vote("parrot").await.is_err());
//!
//! // Client side: the vote is visible before the server answers.
//! let client = VoteClient::new(Arc::clone(&service));
//! client.refresh().await.unwrap();
//! let call = client.vote(Choice::Dog);
//! assert_eq!(client.displayed(), Some(VoteCounts::new(1, 1, 0)));
//! call.await.unwrap().unwrap();
//! # });
//! ```
//!
//! ## Consistency
//!
//! Totals are eventually consistent. A read concurrent with writes may miss
//! the most recent increments; it never double-counts one. Two reads may
//! disagree if writes land in between.
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`store`] | Shard storage trait, in-memory store, fault injection |
//! | [`counter`] | [`ShardedCounter`](counter::ShardedCounter) and shard selection |
//! | [`registry`] | Name to counter mapping, one counter per name |
//! | [`service`] | [`VoteService`] and the [`VoteApi`] trait |
//! | [`live`] | [`LiveTotals`] and [`Subscription`] |
//! | [`client`] | [`OptimisticCache`] and [`VoteClient`] |
//! | [`net`] | Newline-delimited JSON over TCP |
//! | `table` | Table rendering (`server` feature) |
//!
//! ## Features
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `server` (default) | The `scrutinio` binary, TOML configuration and table output |

pub mod choice;
pub mod client;
pub mod config;
pub mod counter;
pub mod error;
pub mod live;
pub mod net;
pub mod registry;
pub mod service;
pub mod snapshot;
pub mod store;

#[cfg(feature = "server")]
pub mod table;

pub use choice::Choice;
pub use client::{OptimisticCache, VoteClient};
pub use config::ServiceConfig;
pub use error::{Error, ErrorKind, Result};
pub use live::{LiveTotals, Subscription};
pub use service::{VoteApi, VoteService};
pub use snapshot::VoteCounts;
