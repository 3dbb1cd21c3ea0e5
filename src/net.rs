//! TCP surface for a [`VoteService`](crate::VoteService).
//!
//! The protocol is newline-delimited JSON (see [`protocol`]). A connection
//! carries request/response pairs until the client sends `subscribe`,
//! after which it only carries pushed totals.
//!
//! # Example
//!
//! ```rust
//! use scrutinio::net::{RemoteVoteApi, Server};
//! use scrutinio::{Choice, VoteApi, VoteCounts, VoteService};
//! use std::sync::Arc;
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let service = Arc::new(VoteService::in_memory());
//! let server = Server::bind("127.0.0.1:0", service).await.unwrap();
//! let addr = server.local_addr().unwrap();
//! tokio::spawn(server.run());
//!
//! let api = RemoteVoteApi::new(addr);
//! api.cast_vote(Choice::Goldfish).await.unwrap();
//! assert_eq!(api.vote_counts().await.unwrap(), VoteCounts::new(0, 0, 1));
//! # });
//! ```

mod client;
pub mod protocol;
mod server;

pub use client::{RemoteSubscription, RemoteVoteApi};
pub use server::Server;
