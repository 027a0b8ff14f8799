use super::{Accumulator, clamp_variance};
use serde::{Deserialize, Serialize};

/// Cumulative first and second raw moments.
///
/// Keeps `count`, `sum` and `sum_sq` for every sample ever pushed; nothing
/// decays or resets. Variance uses the single-pass population formula
/// `sum_sq / n - mean^2`, clamped at zero because cancellation can push it
/// a hair below.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunningMoments {
    count: u64,
    sum: f64,
    sum_sq: f64,
}

impl RunningMoments {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sum(&self) -> f64 {
        self.sum
    }

    pub fn sum_of_squares(&self) -> f64 {
        self.sum_sq
    }
}

impl Accumulator for RunningMoments {
    fn push(&mut self, sample: f64) {
        self.count += 1;
        self.sum += sample;
        self.sum_sq += sample * sample;
    }

    fn count(&self) -> u64 {
        self.count
    }

    fn mean(&self) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        self.sum / self.count as f64
    }

    fn variance(&self) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        let mean = self.mean();
        clamp_variance(self.sum_sq / self.count as f64 - mean * mean)
    }
}
