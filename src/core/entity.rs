//! Entity identifiers and the random source threaded through a run.

use derive_more::{Display, From, Into};
use serde::{Deserialize, Serialize};

/// Pseudorandom generator owned by a single run.
///
/// Every run seeds its own generator, so replicate runs share no random state and can be replayed
/// from their seed.
pub type SimRng = rand::rngs::StdRng;

/// Identifier of an entity in the simulated population.
///
/// Identifiers are dense indices `0..n` into the population.
#[derive(
    Clone,
    Copy,
    Debug,
    Display,
    From,
    Into,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
)]
#[display("{_0}")]
pub struct EntityId(pub usize);

impl EntityId {
    #[inline]
    pub fn index(&self) -> usize {
        self.0
    }
}
