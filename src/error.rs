//! Unified error type for every tally operation.
//!
//! Store, counter, registry, service and transport failures all surface as
//! a single [`Error`], so callers can match on the taxonomy without caring
//! which layer produced it.
//!
//! # Example
//!
//! ```rust
//! use scrutinio::{Error, ErrorKind};
//!
//! let err = Error::Validation { choice: "parrot".into() };
//! assert_eq!(err.kind(), ErrorKind::Validation);
//! assert!(!err.is_transient());
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::store::ShardKey;

/// Unified error type for all tally operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The requested choice is not one of the enumerated counters.
    ///
    /// Raised before any shard is touched.
    #[error("unknown choice `{choice}`")]
    Validation { choice: String },

    /// The shard store could not complete a read or an increment.
    ///
    /// For increments the write may or may not have been applied.
    #[error("shard {key} unavailable: {reason}")]
    Unavailable { key: ShardKey, reason: String },

    /// One or more shard reads failed while summing a counter.
    #[error("counter `{counter}`: {failed} of {shards} shard reads failed")]
    PartialRead {
        counter: String,
        failed: usize,
        shards: usize,
    },

    /// A counter was requested with a shard count different from the one
    /// it was created with.
    #[error("counter `{counter}` has {existing} shards, {requested} requested")]
    ShardCountMismatch {
        counter: String,
        existing: usize,
        requested: usize,
    },

    /// The shards of a counter sum past `u64::MAX`.
    #[error("counter `{counter}` overflows u64")]
    Overflow { counter: String },

    /// A counter cannot have zero shards.
    #[error("shard count must be at least 1")]
    InvalidShardCount,

    /// Transport I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed frame on the wire.
    #[error("protocol error: {0}")]
    Protocol(#[from] serde_json::Error),

    /// Error reported by a remote peer.
    #[error("remote {kind} error: {message}")]
    Remote { kind: ErrorKind, message: String },

    /// Invalid or unreadable configuration.
    #[error("config error: {0}")]
    Config(String),
}

/// Result type for tally operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Coarse error classification, shared with the wire protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Unavailable,
    PartialRead,
    BadRequest,
    Internal,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorKind::Validation => "validation",
            ErrorKind::Unavailable => "unavailable",
            ErrorKind::PartialRead => "partial_read",
            ErrorKind::BadRequest => "bad_request",
            ErrorKind::Internal => "internal",
        };
        f.write_str(s)
    }
}

impl Error {
    /// Returns the classification of this error.
    ///
    /// Remote errors keep the kind the peer reported.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Validation { .. } => ErrorKind::Validation,
            Error::Unavailable { .. } | Error::Io(_) => ErrorKind::Unavailable,
            Error::PartialRead { .. } => ErrorKind::PartialRead,
            Error::Protocol(_) => ErrorKind::BadRequest,
            Error::Remote { kind, .. } => *kind,
            Error::ShardCountMismatch { .. }
            | Error::Overflow { .. }
            | Error::InvalidShardCount
            | Error::Config(_) => ErrorKind::Internal,
        }
    }

    /// Returns `true` if retrying the same call may succeed.
    ///
    /// Caller input errors are never transient.
    pub fn is_transient(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Unavailable | ErrorKind::PartialRead
        )
    }
}
