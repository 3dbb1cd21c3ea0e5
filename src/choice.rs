//! The closed set of things one can vote for.

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};
use std::str::FromStr;

use crate::error::Error;

/// A vote choice.
///
/// The wire name (`"cat"`) and the name of the backing counter (`"cats"`)
/// differ, as they do in the counters created by older deployments.
///
/// # Examples
///
/// ```rust
/// use scrutinio::Choice;
///
/// let choice: Choice = "dog".parse().unwrap();
/// assert_eq!(choice, Choice::Dog);
/// assert_eq!(choice.counter_name(), "dogs");
/// assert!("parrot".parse::<Choice>().is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Choice {
    Cat,
    Dog,
    Goldfish,
}

impl Choice {
    /// Every choice, in display order.
    pub const ALL: [Choice; 3] = [Choice::Cat, Choice::Dog, Choice::Goldfish];

    /// Name used on the wire.
    pub const fn as_str(self) -> &'static str {
        match self {
            Choice::Cat => "cat",
            Choice::Dog => "dog",
            Choice::Goldfish => "goldfish",
        }
    }

    /// Name of the logical counter holding this choice's votes.
    pub const fn counter_name(self) -> &'static str {
        match self {
            Choice::Cat => "cats",
            Choice::Dog => "dogs",
            Choice::Goldfish => "goldfish",
        }
    }
}

impl Display for Choice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Choice {
    type Err = Error;

    /// Parses a wire name; anything else is a validation error.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Choice::ALL
            .into_iter()
            .find(|choice| choice.as_str() == s)
            .ok_or_else(|| Error::Validation {
                choice: s.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_known() {
        for choice in Choice::ALL {
            assert_eq!(choice.as_str().parse::<Choice>().unwrap(), choice);
        }
    }

    #[test]
    fn test_parse_unknown() {
        for input in ["parrot", "", "Cat", "cats", " dog"] {
            match input.parse::<Choice>() {
                Err(Error::Validation { choice }) => assert_eq!(choice, input),
                other => panic!("expected Validation for {input:?}, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_counter_names() {
        assert_eq!(Choice::Cat.counter_name(), "cats");
        assert_eq!(Choice::Dog.counter_name(), "dogs");
        assert_eq!(Choice::Goldfish.counter_name(), "goldfish");
    }

    #[test]
    fn test_serde_lowercase() {
        assert_eq!(serde_json::to_string(&Choice::Goldfish).unwrap(), r#""goldfish""#);
        let choice: Choice = serde_json::from_str(r#""cat""#).unwrap();
        assert_eq!(choice, Choice::Cat);
        assert!(serde_json::from_str::<Choice>(r#""parrot""#).is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(Choice::Dog.to_string(), "dog");
    }
}
