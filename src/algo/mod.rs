pub mod ewma;
pub mod moments;
pub mod window;

use serde::{Deserialize, Serialize};

pub use ewma::Ewma;
pub use moments::RunningMoments;
pub use window::WindowedMoments;

/// Point-in-time view of an accumulator
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Moments {
    pub count: u64,
    pub mean: f64,
    pub std_dev: f64,
}

/// Incremental mean/variance over a stream of finite samples.
///
/// Implementations never report a negative variance.
pub trait Accumulator {
    fn push(&mut self, sample: f64);
    fn count(&self) -> u64;
    fn mean(&self) -> f64;
    fn variance(&self) -> f64;

    fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    fn moments(&self) -> Moments {
        Moments {
            count: self.count(),
            mean: self.mean(),
            std_dev: self.std_dev(),
        }
    }
}

/// Clamp a population variance estimate to `[0, inf]`.
///
/// `f64::max` returns the non-NaN operand, so overflow-induced NaN maps to 0.
#[inline]
pub(crate) fn clamp_variance(raw: f64) -> f64 {
    raw.max(0.0)
}

/// The accumulator a detector owns, selected by `AccumulationMode`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Statistics {
    Cumulative(RunningMoments),
    Window(WindowedMoments),
    Exponential(Ewma),
}

impl Statistics {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Cumulative(_) => "cumulative",
            Self::Window(_) => "window",
            Self::Exponential(_) => "exponential",
        }
    }

    fn inner(&self) -> &dyn Accumulator {
        match self {
            Self::Cumulative(m) => m,
            Self::Window(w) => w,
            Self::Exponential(e) => e,
        }
    }
}

impl Accumulator for Statistics {
    fn push(&mut self, sample: f64) {
        match self {
            Self::Cumulative(m) => m.push(sample),
            Self::Window(w) => w.push(sample),
            Self::Exponential(e) => e.push(sample),
        }
    }

    fn count(&self) -> u64 {
        self.inner().count()
    }

    fn mean(&self) -> f64 {
        self.inner().mean()
    }

    fn variance(&self) -> f64 {
        self.inner().variance()
    }
}
