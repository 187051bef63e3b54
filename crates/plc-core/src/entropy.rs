//! Randomness sources for the thermal model.
//!
//! Every unit owns its own source. Production units use a ChaCha stream
//! keyed by the fleet seed and the unit index, so two units never share a
//! sequence while any single unit replays identically for a given seed.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

pub trait Entropy: Send {
    /// Uniform integer in the half-open range `[low, high)`.
    fn roll(&mut self, low: i32, high: i32) -> i32;
}

#[derive(Debug, Clone)]
pub struct SeededEntropy {
    rng: ChaCha8Rng,
}

impl SeededEntropy {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Independent stream `stream` under a shared seed.
    pub fn for_unit(seed: u64, stream: u64) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        rng.set_stream(stream);
        Self { rng }
    }
}

impl Entropy for SeededEntropy {
    fn roll(&mut self, low: i32, high: i32) -> i32 {
        self.rng.gen_range(low..high)
    }
}

/// Replays a fixed script of values, cycling when exhausted. Each value is
/// pinned into the requested range, so `constant(i32::MAX)` always draws the
/// top of the range and `constant(i32::MIN)` the bottom.
#[derive(Debug, Clone)]
pub struct ScriptedEntropy {
    script: Vec<i32>,
    cursor: usize,
    draws: u64,
}

impl ScriptedEntropy {
    pub fn new(script: Vec<i32>) -> Self {
        assert!(!script.is_empty(), "entropy script must not be empty");
        Self {
            script,
            cursor: 0,
            draws: 0,
        }
    }

    pub fn constant(value: i32) -> Self {
        Self::new(vec![value])
    }

    /// Number of values drawn so far.
    pub fn draws(&self) -> u64 {
        self.draws
    }
}

impl Entropy for ScriptedEntropy {
    fn roll(&mut self, low: i32, high: i32) -> i32 {
        let value = self.script[self.cursor];
        self.cursor = (self.cursor + 1) % self.script.len();
        self.draws += 1;
        value.clamp(low, high - 1)
    }
}
