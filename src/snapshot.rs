//! Aggregate vote snapshots.
//!
//! A [`VoteCounts`] is a point-in-time view of every tally. It is derived
//! from the shards on each read and never stored. All three keys are
//! always present: a choice nobody voted for reports `0`.
//!
//! ```rust
//! use scrutinio::{Choice, VoteCounts};
//!
//! let counts = VoteCounts::new(3, 5, 0);
//! assert_eq!(counts.get(Choice::Dog), 5);
//! assert_eq!(counts.total(true), 8);
//!
//! let json = serde_json::to_string(&counts).unwrap();
//! assert_eq!(json, r#"{"cat":3,"dog":5,"goldfish":0}"#);
//! ```

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt::{self, Display};

use crate::choice::Choice;

/// Totals for every choice.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VoteCounts {
    #[serde(default)]
    pub cat: u64,
    #[serde(default)]
    pub dog: u64,
    #[serde(default)]
    pub goldfish: u64,
}

impl VoteCounts {
    /// Creates a snapshot from explicit totals.
    pub const fn new(cat: u64, dog: u64, goldfish: u64) -> Self {
        Self { cat, dog, goldfish }
    }

    /// Returns the total for `choice`.
    #[inline]
    pub fn get(&self, choice: Choice) -> u64 {
        match choice {
            Choice::Cat => self.cat,
            Choice::Dog => self.dog,
            Choice::Goldfish => self.goldfish,
        }
    }

    /// Returns a mutable reference to the total for `choice`.
    #[inline]
    pub fn get_mut(&mut self, choice: Choice) -> &mut u64 {
        match choice {
            Choice::Cat => &mut self.cat,
            Choice::Dog => &mut self.dog,
            Choice::Goldfish => &mut self.goldfish,
        }
    }

    /// Returns a copy with `choice` changed to `total`.
    pub fn with(mut self, choice: Choice, total: u64) -> Self {
        *self.get_mut(choice) = total;
        self
    }

    /// Iterates over `(choice, total)` pairs in display order.
    pub fn iter(&self) -> impl Iterator<Item = (Choice, u64)> + '_ {
        Choice::ALL.into_iter().map(move |choice| (choice, self.get(choice)))
    }

    /// Sum of all tallies, optionally leaving out the goldfish.
    ///
    /// Saturates at `u64::MAX`.
    pub fn total(&self, include_goldfish: bool) -> u64 {
        let goldfish = if include_goldfish { self.goldfish } else { 0 };
        self.cat.saturating_add(self.dog).saturating_add(goldfish)
    }

    /// Per-choice maximum of `self` and `other`.
    pub fn max(self, other: Self) -> Self {
        Self {
            cat: self.cat.max(other.cat),
            dog: self.dog.max(other.dog),
            goldfish: self.goldfish.max(other.goldfish),
        }
    }

    /// Compares two snapshots choice by choice.
    ///
    /// Tallies only ever grow, so a snapshot that is `Less` than another
    /// was taken before it. Snapshots where some tallies are higher and
    /// others lower are incomparable and return `None`.
    pub fn causal_cmp(&self, other: &Self) -> Option<Ordering> {
        let mut ord = Ordering::Equal;
        for choice in Choice::ALL {
            match (ord, self.get(choice).cmp(&other.get(choice))) {
                (_, Ordering::Equal) => {}
                (Ordering::Equal, o) => ord = o,
                (a, b) if a == b => {}
                _ => return None,
            }
        }
        Some(ord)
    }

    /// Returns `true` if `self` is strictly older than `other`.
    pub fn is_older_than(&self, other: &Self) -> bool {
        self.causal_cmp(other) == Some(Ordering::Less)
    }
}

impl Display for VoteCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "cat:{} dog:{} goldfish:{}",
            self.cat, self.dog, self.goldfish
        )
    }
}

impl FromIterator<(Choice, u64)> for VoteCounts {
    fn from_iter<I: IntoIterator<Item = (Choice, u64)>>(iter: I) -> Self {
        let mut counts = VoteCounts::default();
        for (choice, total) in iter {
            *counts.get_mut(choice) = total;
        }
        counts
    }
}
