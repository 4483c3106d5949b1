use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::ChannelSpec;

/// Synthesizes a reading inside a channel's fallback range when OCR misses it.
pub struct FallbackGenerator<R: Rng = StdRng> {
    rng: R,
}

impl FallbackGenerator<StdRng> {
    pub fn from_entropy() -> Self {
        Self::new(StdRng::from_entropy())
    }

    pub fn seeded(seed: u64) -> Self {
        Self::new(StdRng::seed_from_u64(seed))
    }

    pub fn from_seed_option(seed: Option<u64>) -> Self {
        match seed {
            Some(seed) => Self::seeded(seed),
            None => Self::from_entropy(),
        }
    }
}

impl<R: Rng> FallbackGenerator<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }

    pub fn generate(&mut self, channel: &ChannelSpec) -> f64 {
        let range = channel.fallback_range;
        if range.min >= range.max {
            return range.min;
        }
        self.rng.gen_range(range.min..=range.max)
    }
}
