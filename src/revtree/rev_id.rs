//! Revision identifiers.
//!
//! A revision ID is a generation number plus a content digest, written
//! `"<generation>-<digest>"` (e.g. `"3-deadbeef"`). The generation counts
//! steps from the root; the digest disambiguates siblings.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use super::errors::TreeError;

/// Identifier for one revision of a document.
///
/// `Ord` encodes the conflict-resolution rule: generations compare
/// numerically, ties break on the digest's byte order, and the *greater*
/// value is the higher-priority revision. The rule depends on nothing but
/// the IDs themselves, so independent, unsynchronized writers always agree
/// on which of two conflicting revisions wins.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct RevId {
    generation: u64,
    digest: String,
}

impl RevId {
    /// Creates a revision ID. `generation` must be positive.
    pub fn new(generation: u64, digest: impl Into<String>) -> Self {
        debug_assert!(generation > 0, "generation numbers start at 1");
        Self {
            generation,
            digest: digest.into(),
        }
    }

    /// The 1-based generation number.
    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// The digest suffix.
    #[inline]
    pub fn digest(&self) -> &str {
        &self.digest
    }
}

impl Ord for RevId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.generation
            .cmp(&other.generation)
            .then_with(|| self.digest.as_bytes().cmp(other.digest.as_bytes()))
    }
}

impl PartialOrd for RevId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for RevId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.generation, self.digest)
    }
}

impl FromStr for RevId {
    type Err = TreeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (generation, digest) = s
            .split_once('-')
            .ok_or_else(|| TreeError::InvalidRevisionId(s.to_string()))?;
        let generation: u64 = generation
            .parse()
            .map_err(|_| TreeError::InvalidRevisionId(s.to_string()))?;
        if generation == 0 || digest.is_empty() {
            return Err(TreeError::InvalidRevisionId(s.to_string()));
        }
        Ok(Self::new(generation, digest))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display_round_trip() {
        let rev: RevId = "3-deadbeef".parse().unwrap();
        assert_eq!(rev.generation(), 3);
        assert_eq!(rev.digest(), "deadbeef");
        assert_eq!(rev.to_string(), "3-deadbeef");
    }

    #[test]
    fn test_parse_rejects_malformed_ids() {
        assert!("".parse::<RevId>().is_err());
        assert!("nodash".parse::<RevId>().is_err());
        assert!("0-abc".parse::<RevId>().is_err());
        assert!("3-".parse::<RevId>().is_err());
        assert!("x-abc".parse::<RevId>().is_err());
    }

    #[test]
    fn test_digest_may_contain_dashes() {
        let rev: RevId = "2-ab-cd".parse().unwrap();
        assert_eq!(rev.generation(), 2);
        assert_eq!(rev.digest(), "ab-cd");
    }

    #[test]
    fn test_higher_generation_wins() {
        let older: RevId = "2-zzz".parse().unwrap();
        let newer: RevId = "3-aaa".parse().unwrap();
        assert!(newer > older, "generation dominates the digest");
    }

    #[test]
    fn test_generation_compares_numerically() {
        let two: RevId = "2-a".parse().unwrap();
        let ten: RevId = "10-a".parse().unwrap();
        assert!(ten > two, "10 > 2 numerically, though \"10\" < \"2\" as text");
    }

    #[test]
    fn test_equal_generation_breaks_tie_on_digest() {
        let low: RevId = "2-bbb".parse().unwrap();
        let high: RevId = "2-ddd".parse().unwrap();
        assert!(high > low);
    }
}
