//! Squeak locators.
//!
//! A locator is the query a node sends with `getsqueaks`: a list of
//! interests, each naming an author and optionally narrowing by block
//! height range and reply target. A squeak matches the locator when it
//! matches any one interest.
//!
//! "No constraint" travels on the wire as a sentinel: [`UNBOUNDED_HEIGHT`]
//! (-1) for heights and [`NULL_HASH`] for the reply target.

use serde::{Deserialize, Serialize};

use crate::crypto::Address;
use crate::squeak::{Squeak, SqueakHash, NULL_HASH};

/// Height sentinel meaning "no bound".
pub const UNBOUNDED_HEIGHT: i32 = -1;

/// One author-scoped interest within a locator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interest {
    /// Author address the interest is about.
    pub address: Address,
    /// Lowest block height wanted, or [`UNBOUNDED_HEIGHT`].
    pub min_block_height: i32,
    /// Highest block height wanted, or [`UNBOUNDED_HEIGHT`].
    pub max_block_height: i32,
    /// Only replies to this squeak, or [`NULL_HASH`] for any.
    pub reply_to: SqueakHash,
}

impl Interest {
    /// Interest in everything written by `address`.
    pub fn for_address(address: Address) -> Self {
        Self {
            address,
            min_block_height: UNBOUNDED_HEIGHT,
            max_block_height: UNBOUNDED_HEIGHT,
            reply_to: NULL_HASH,
        }
    }

    /// Restrict to the inclusive height range.
    pub fn with_height_range(mut self, min: i32, max: i32) -> Self {
        self.min_block_height = min;
        self.max_block_height = max;
        self
    }

    /// Restrict to replies of `reply_to`.
    pub fn with_reply_to(mut self, reply_to: SqueakHash) -> Self {
        self.reply_to = reply_to;
        self
    }

    /// Whether `squeak` satisfies every constraint of this interest.
    pub fn matches(&self, squeak: &Squeak) -> bool {
        let height = i64::from(squeak.block_height);
        if squeak.address() != self.address {
            return false;
        }
        if self.min_block_height != UNBOUNDED_HEIGHT && height < i64::from(self.min_block_height) {
            return false;
        }
        if self.max_block_height != UNBOUNDED_HEIGHT && height > i64::from(self.max_block_height) {
            return false;
        }
        self.reply_to == NULL_HASH || squeak.reply_to == self.reply_to
    }
}

/// A set of interests.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Locator {
    /// Interests, any of which may match.
    pub interests: Vec<Interest>,
}

impl Locator {
    /// Locator with the given interests.
    pub fn new(interests: Vec<Interest>) -> Self {
        Self { interests }
    }

    /// One unconstrained interest per followed address.
    pub fn from_follows(follows: &[Address]) -> Self {
        Self::new(follows.iter().copied().map(Interest::for_address).collect())
    }

    /// Whether `squeak` matches any interest.
    pub fn matches(&self, squeak: &Squeak) -> bool {
        self.interests.iter().any(|interest| interest.matches(squeak))
    }

    /// True when the locator has no interests and so matches nothing.
    pub fn is_empty(&self) -> bool {
        self.interests.is_empty()
    }
}
