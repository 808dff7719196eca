//! Source of randomness for the allocator's fallback choice.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Chooses one asset among those still affordable.
pub trait IndexPicker {
    /// Returns one element of `eligible`, which is never empty.
    fn pick(&mut self, eligible: &[usize]) -> usize;
}

/// Picks uniformly at random.
#[derive(Debug, Clone)]
pub struct RandomPicker<R: Rng = StdRng> {
    rng: R,
}

impl RandomPicker<StdRng> {
    /// Reproducible picker; the same seed yields the same choices.
    pub fn seeded(seed: u64) -> Self {
        Self::new(StdRng::seed_from_u64(seed))
    }

    pub fn from_entropy() -> Self {
        Self::new(StdRng::from_entropy())
    }
}

impl<R: Rng> RandomPicker<R> {
    pub fn new(rng: R) -> Self {
        RandomPicker { rng }
    }
}

impl<R: Rng> IndexPicker for RandomPicker<R> {
    fn pick(&mut self, eligible: &[usize]) -> usize {
        eligible[self.rng.gen_range(0..eligible.len())]
    }
}
