//! RNG module - seeded gem generation
//!
//! Every room owns one [`GemRng`]. Seeding it makes whole cascades
//! reproducible (tests, replays), while the server seeds from entropy.
//! A queue of recorded gems can be dealt ahead of the random stream to replay
//! known refills exactly.

use std::collections::VecDeque;

use arrayvec::ArrayVec;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::types::Gem;

/// Seeded gem source backed by ChaCha8
#[derive(Debug, Clone)]
pub struct GemRng {
    inner: ChaCha8Rng,
    seed: u64,
    replay: VecDeque<Gem>,
}

impl GemRng {
    /// Create a new RNG with the given seed
    pub fn new(seed: u64) -> Self {
        Self {
            inner: ChaCha8Rng::seed_from_u64(seed),
            seed,
            replay: VecDeque::new(),
        }
    }

    /// Create an RNG that deals `gems` in order before switching to the seeded stream
    pub fn with_replay(seed: u64, gems: impl IntoIterator<Item = Gem>) -> Self {
        let mut rng = Self::new(seed);
        rng.replay.extend(gems);
        rng
    }

    /// Recorded gems not yet dealt
    pub fn pending_replay(&self) -> usize {
        self.replay.len()
    }

    /// Create an RNG seeded from the thread-local entropy source
    pub fn from_entropy() -> Self {
        Self::new(rand::random())
    }

    /// Seed this RNG was created with
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Derive an independent RNG (one per room from a server-wide source)
    pub fn fork(&mut self) -> Self {
        Self::new(self.inner.gen())
    }

    /// Uniformly random gem from the full palette
    pub fn next_gem(&mut self) -> Gem {
        if let Some(gem) = self.replay.pop_front() {
            return gem;
        }
        Gem::ALL[self.inner.gen_range(0..Gem::ALL.len())]
    }

    /// Uniformly random gem that is not in `banned`
    ///
    /// Falls back to the full palette if every gem is banned.
    pub fn gem_excluding(&mut self, banned: &[Gem]) -> Gem {
        let choices: ArrayVec<Gem, 7> = Gem::ALL
            .iter()
            .copied()
            .filter(|g| !banned.contains(g))
            .collect();
        if choices.is_empty() {
            return self.next_gem();
        }
        choices[self.inner.gen_range(0..choices.len())]
    }
}

impl Default for GemRng {
    fn default() -> Self {
        Self::new(1)
    }
}
