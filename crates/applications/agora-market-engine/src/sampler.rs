//! Duration sampling for allocated units
//!
//! Each unit's duration is drawn at allocation time from its shape's range.
//! The draw sits behind a trait so clearing cycles are reproducible under a
//! fixed seed, and tests can pin durations outright.

use agora_core::WorkloadShape;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Source of per-unit durations
pub trait DurationSampler: Send {
    /// Draw a duration in periods for one unit of the given shape
    fn sample_duration(&mut self, shape: &WorkloadShape) -> u64;
}

/// Uniform draw over the shape's inclusive duration range
pub struct UniformDurationSampler {
    rng: StdRng,
}

impl UniformDurationSampler {
    pub fn from_seed(seed: u64) -> Self {
        UniformDurationSampler {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl DurationSampler for UniformDurationSampler {
    fn sample_duration(&mut self, shape: &WorkloadShape) -> u64 {
        self.rng
            .gen_range(shape.min_duration_periods..=shape.max_duration_periods)
    }
}
