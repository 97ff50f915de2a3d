//! Exponential time decay ("fading") of cluster weights and term frequencies.
//!
//! A weight observed `elapsed` time units ago retains `2^(-λ·elapsed)` of its
//! mass. The decay floor ω is the weight a single observation keeps after one
//! full cleanup interval; anything at or below it is evicted.

use serde::{Deserialize, Serialize};

/// Decay `weight` over `elapsed` time at `decay_rate`.
/// Negative elapsed time is clamped to zero so fading never grows a weight.
pub fn fade(weight: f64, elapsed: f64, decay_rate: f64) -> f64 {
    weight * decay_factor(elapsed, decay_rate)
}

/// Multiplier `2^(-λ·elapsed)`, in (0, 1].
pub fn decay_factor(elapsed: f64, decay_rate: f64) -> f64 {
    2f64.powf(-decay_rate * elapsed.max(0.0))
}

/// Decay floor ω = 2^(-λ·cleanup_interval).
pub fn decay_floor(decay_rate: f64, cleanup_interval: f64) -> f64 {
    decay_factor(cleanup_interval, decay_rate)
}

/// Fading parameters shared by every cluster operation.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Fading {
    pub decay_rate: f64,
    /// Eviction floor for cluster weights and (with term fading) term frequencies.
    pub omega: f64,
    pub term_fading: bool,
}

impl Fading {
    pub fn new(decay_rate: f64, cleanup_interval: f64, term_fading: bool) -> Self {
        Self {
            decay_rate,
            omega: decay_floor(decay_rate, cleanup_interval),
            term_fading,
        }
    }

    /// Multiplier for fading something last updated at `from` to time `to`.
    pub fn factor(&self, from: f64, to: f64) -> f64 {
        decay_factor(to - from, self.decay_rate)
    }
}
