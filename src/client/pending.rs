//! Per-call prediction state.
//!
//! ```text
//!            predict()
//!               │
//!               ▼
//!          ┌─────────┐  reconcile(snapshot)  ┌─────────┐
//!          │Predicted│──────────────────────►│ Settled │
//!          └─────────┘                       └─────────┘
//!            │     │                           │     │
//!   confirm()│     │rollback()        confirm()│     │rollback()
//!            ▼     ▼                           ▼     ▼
//!   (gone at next  (gone, delta removed)     (gone) (gone)
//!    reconcile)
//! ```
//!
//! Only `Predicted` calls contribute their delta to the displayed totals. A
//! call confirmed while still `Predicted` keeps showing its delta until the
//! next authoritative snapshot, which already includes it.

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};

use crate::choice::Choice;

/// Identity of one optimistic mutation call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MutationId(pub(crate) u64);

impl Display for MutationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Where a pending call stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingState {
    /// The delta is shown on top of the last authoritative snapshot.
    Predicted,
    /// An authoritative snapshot arrived after the prediction; the delta is
    /// no longer shown. Waiting for the call to complete.
    Settled,
}

/// One in-flight mutation.
#[derive(Debug, Clone)]
pub(crate) struct Pending {
    choice: Choice,
    delta: u64,
    state: PendingState,
    confirmed: bool,
}

impl Pending {
    pub(crate) fn predicted(choice: Choice, delta: u64) -> Self {
        Self {
            choice,
            delta,
            state: PendingState::Predicted,
            confirmed: false,
        }
    }

    pub(crate) fn state(&self) -> PendingState {
        self.state
    }

    /// Moves a predicted call to `Settled`; returns `false` if it already was.
    pub(crate) fn settle(&mut self) -> bool {
        match self.state {
            PendingState::Predicted => {
                self.state = PendingState::Settled;
                true
            }
            PendingState::Settled => false,
        }
    }

    /// Records that the server acknowledged this call.
    pub(crate) fn confirm(&mut self) {
        self.confirmed = true;
    }

    pub(crate) fn is_confirmed(&self) -> bool {
        self.confirmed
    }

    /// The delta this call adds to the displayed totals, if any.
    pub(crate) fn contribution(&self) -> Option<(Choice, u64)> {
        match self.state {
            PendingState::Predicted => Some((self.choice, self.delta)),
            PendingState::Settled => None,
        }
    }
}
