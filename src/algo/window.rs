use super::{Accumulator, clamp_variance};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Raw moments over the most recent `size` samples.
///
/// Running sums are adjusted on every eviction and rebuilt from the retained
/// window once per `size` evictions, so subtraction error cannot pile up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowedMoments {
    size: usize,
    window: VecDeque<f64>,
    sum: f64,
    sum_sq: f64,
    evictions: usize,
}

impl WindowedMoments {
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        Self {
            size,
            window: VecDeque::with_capacity(size),
            sum: 0.0,
            sum_sq: 0.0,
            evictions: 0,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    fn rebuild(&mut self) {
        self.sum = self.window.iter().sum();
        self.sum_sq = self.window.iter().map(|x| x * x).sum();
        self.evictions = 0;
    }
}

impl Accumulator for WindowedMoments {
    fn push(&mut self, sample: f64) {
        if self.window.len() == self.size {
            if let Some(old) = self.window.pop_front() {
                self.sum -= old;
                self.sum_sq -= old * old;
                self.evictions += 1;
            }
        }
        self.window.push_back(sample);
        self.sum += sample;
        self.sum_sq += sample * sample;

        if self.evictions >= self.size {
            self.rebuild();
        }
    }

    fn count(&self) -> u64 {
        self.window.len() as u64
    }

    fn mean(&self) -> f64 {
        if self.window.is_empty() {
            return 0.0;
        }
        self.sum / self.window.len() as f64
    }

    fn variance(&self) -> f64 {
        if self.window.is_empty() {
            return 0.0;
        }
        let mean = self.mean();
        clamp_variance(self.sum_sq / self.window.len() as f64 - mean * mean)
    }
}
