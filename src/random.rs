//! Deterministic, seedable randomness for reproducible fuzz runs.
//!
//! A [`Random`] is a ChaCha8 stream. Its full state is the 32-byte key and
//! the current word position, which serialize to a short JSON string. A run
//! that fails prints that string; passing it back to [`Random::from_seed_str`]
//! replays the exact same draws.

use rand::{Rng, RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Serializable state of a [`Random`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RandomState {
    /// The ChaCha key.
    pub seed: [u8; 32],
    /// Position in the keystream, in 32-bit words.
    pub word_pos: u128,
}

/// A seedable pseudo random generator threaded explicitly through every call
/// that needs randomness.
#[derive(Clone, Debug)]
pub struct Random {
    rng: ChaCha8Rng,
}

impl Random {
    /// Create a generator seeded from OS entropy.
    pub fn new() -> Random {
        return Random {
            rng: ChaCha8Rng::from_entropy(),
        };
    }

    /// Create a generator from a 64-bit seed.
    pub fn from_u64(seed: u64) -> Random {
        return Random {
            rng: ChaCha8Rng::seed_from_u64(seed),
        };
    }

    /// Restore a generator from a state.
    pub fn from_state(state: &RandomState) -> Random {
        let mut rng = ChaCha8Rng::from_seed(state.seed);
        rng.set_word_pos(state.word_pos);
        return Random { rng };
    }

    /// Restore a generator from a seed string produced by [`Random::seed`].
    pub fn from_seed_str(seed: &str) -> Result<Random> {
        let state: RandomState =
            serde_json::from_str(seed).map_err(|e| Error::InvalidSeed(e.to_string()))?;
        return Ok(Random::from_state(&state));
    }

    /// The current state.
    pub fn state(&self) -> RandomState {
        return RandomState {
            seed: self.rng.get_seed(),
            word_pos: self.rng.get_word_pos(),
        };
    }

    /// The current state as a JSON string.
    pub fn seed(&self) -> String {
        // Serializing two plain fields cannot fail.
        return serde_json::to_string(&self.state()).unwrap_or_default();
    }

    /// A uniformly distributed `i32`.
    pub fn int32(&mut self) -> i32 {
        return self.rng.next_u32() as i32;
    }

    /// A uniformly distributed float in `[0, 1)`.
    pub fn double(&mut self) -> f64 {
        return self.rng.gen_range(0.0..1.0);
    }

    /// A uniformly distributed integer in `[0, limit)`. Returns 0 when
    /// `limit` is 0.
    pub fn integer(&mut self, limit: usize) -> usize {
        if limit == 0 {
            return 0;
        }
        return self.rng.gen_range(0..limit);
    }
}

impl Default for Random {
    fn default() -> Self {
        return Random::new();
    }
}
