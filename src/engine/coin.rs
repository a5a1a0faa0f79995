//! Random draws for coin flips.
//!
//! Bias is a single threshold on a uniform draw, so every source only has
//! to produce values in `[0, 1)`.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::VecDeque;

#[cfg_attr(test, mockall::automock)]
pub trait CoinSource: Send {
    /// A uniform value in `[0, 1)`.
    fn draw(&mut self) -> f64;
}

/// Production source backed by `StdRng`.
pub struct RandomCoin {
    rng: StdRng,
}

impl RandomCoin {
    /// Seeded for reproducible sessions, or from OS entropy when `None`.
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self { rng }
    }
}

impl CoinSource for RandomCoin {
    fn draw(&mut self) -> f64 {
        self.rng.gen::<f64>()
    }
}

/// Replays a fixed list of draws, then repeats `fallback` forever.
#[derive(Debug, Clone)]
pub struct ScriptedCoin {
    draws: VecDeque<f64>,
    fallback: f64,
}

impl ScriptedCoin {
    pub fn new(draws: impl IntoIterator<Item = f64>, fallback: f64) -> Self {
        Self {
            draws: draws.into_iter().collect(),
            fallback,
        }
    }

    /// Always lands heads (for any positive heads chance).
    pub fn heads() -> Self {
        Self::new([], 0.0)
    }

    /// Always lands tails (for any heads chance below 1).
    pub fn tails() -> Self {
        Self::new([], 0.999)
    }
}

impl CoinSource for ScriptedCoin {
    fn draw(&mut self) -> f64 {
        self.draws.pop_front().unwrap_or(self.fallback)
    }
}
