use super::{Accumulator, clamp_variance};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Ewma {
    half_life: f64,
    alpha: f64,
    mean: f64,
    variance: f64,
    count: u64,
}

impl Ewma {
    pub fn new(half_life: f64) -> Self {
        let alpha = 1.0 - (-std::f64::consts::LN_2 / half_life).exp();
        Self {
            half_life,
            alpha,
            mean: 0.0,
            variance: 0.0,
            count: 0,
        }
    }

    pub fn half_life(&self) -> f64 {
        self.half_life
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }
}

impl Accumulator for Ewma {
    fn push(&mut self, sample: f64) {
        if self.count == 0 {
            self.mean = sample;
            self.variance = 0.0;
        } else {
            let diff = sample - self.mean;
            self.mean += self.alpha * diff;
            // EWMVar
            self.variance = (1.0 - self.alpha) * (self.variance + self.alpha * diff * diff);
        }
        self.count += 1;
    }

    fn count(&self) -> u64 {
        self.count
    }

    fn mean(&self) -> f64 {
        self.mean
    }

    fn variance(&self) -> f64 {
        clamp_variance(self.variance)
    }
}
