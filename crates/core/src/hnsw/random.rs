//! Injected randomness for layer assignment.
//!
//! Insertion only needs one uniform draw per item, so the source is a single-method
//! trait. Tests can supply a fixed sequence to pin exact graph shapes.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// A source of uniform floats in `[0, 1)`.
pub trait RandomSource {
    fn next_uniform(&mut self) -> f64;
}

/// [`RandomSource`] backed by `rand`'s `StdRng`.
#[derive(Debug, Clone)]
pub struct SeededRandom {
    rng: StdRng,
}

impl SeededRandom {
    /// Reproducible stream for a given seed.
    pub fn from_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }
}

impl RandomSource for SeededRandom {
    fn next_uniform(&mut self) -> f64 {
        self.rng.gen::<f64>()
    }
}

/// Draws a layer: `floor(-ln(1 - u) · mL)` with `mL = 1 / ln(m)`, clamped to `max_layers - 1`.
///
/// `u` is in `[0, 1)`, so `1 - u` is in `(0, 1]` and the logarithm is finite.
pub fn random_level(source: &mut dyn RandomSource, m: usize, max_layers: usize) -> usize {
    let ml = 1.0 / (m as f64).ln();
    let u = source.next_uniform().clamp(0.0, 1.0);
    let level = (-(1.0 - u).ln() * ml).floor();
    let cap = max_layers.saturating_sub(1);
    if level.is_finite() && level >= 0.0 {
        (level as usize).min(cap)
    } else {
        cap
    }
}
