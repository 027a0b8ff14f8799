//! Online Anomaly Detector
//!
//! Consumes one sample at a time, folds it into running statistics and
//! classifies it with a fixed deviation rule:
//!
//! ```text
//! anomalous  <=>  |sample - mean| > k * std_dev
//! ```
//!
//! With the default `Baseline::Inclusive` the sample is folded in *before* it
//! is judged, so an outlier is compared against a mean and standard deviation
//! it already pulled toward itself. A zero standard deviation makes any
//! sample that differs from the mean anomalous regardless of `k`.

use crate::algo::{Accumulator, Ewma, Moments, RunningMoments, Statistics, WindowedMoments};
use crate::error::{CheckpointError, ConfigError, DetectError};
use serde::{Deserialize, Serialize};

pub const DEFAULT_THRESHOLD: f64 = 2.0;

/// Largest accepted `|sample|`. Its square stays near 1e300, so sums of
/// squares only overflow after ~1.8e8 samples at this magnitude.
pub const MAX_SAMPLE_MAGNITUDE: f64 = 1e150;

/// How the running statistics weigh history
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum AccumulationMode {
    /// Every sample ever seen, equally weighted
    #[default]
    Cumulative,
    /// Only the last `size` samples
    Window { size: usize },
    /// Exponentially weighted with the given half-life (in samples)
    Exponential { half_life: f64 },
}

impl AccumulationMode {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Cumulative => "cumulative",
            Self::Window { .. } => "window",
            Self::Exponential { .. } => "exponential",
        }
    }

    /// Mode an existing accumulator was built for, parameters included
    pub fn of(stats: &Statistics) -> Self {
        match stats {
            Statistics::Cumulative(_) => Self::Cumulative,
            Statistics::Window(w) => Self::Window { size: w.size() },
            Statistics::Exponential(e) => Self::Exponential {
                half_life: e.half_life(),
            },
        }
    }

    fn statistics(&self) -> Statistics {
        match *self {
            Self::Cumulative => Statistics::Cumulative(RunningMoments::new()),
            Self::Window { size } => Statistics::Window(WindowedMoments::new(size)),
            Self::Exponential { half_life } => Statistics::Exponential(Ewma::new(half_life)),
        }
    }
}

/// Which statistics a sample is judged against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Baseline {
    /// Fold the sample in first, then judge it against the updated state
    #[default]
    Inclusive,
    /// Judge against the state before the sample; the first sample is normal
    Prior,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DetectionConfig {
    /// Anomaly coefficient `k`
    pub threshold: f64,
    pub mode: AccumulationMode,
    pub baseline: Baseline,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            mode: AccumulationMode::Cumulative,
            baseline: Baseline::Inclusive,
        }
    }
}

impl DetectionConfig {
    pub fn with_threshold(threshold: f64) -> Self {
        Self {
            threshold,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.threshold.is_finite() || self.threshold < 0.0 {
            return Err(ConfigError::InvalidThreshold(self.threshold));
        }
        match self.mode {
            AccumulationMode::Window { size } if size == 0 => {
                Err(ConfigError::InvalidWindow(size))
            }
            AccumulationMode::Exponential { half_life }
                if !half_life.is_finite() || half_life <= 0.0 =>
            {
                Err(ConfigError::InvalidHalfLife(half_life))
            }
            _ => Ok(()),
        }
    }
}

/// Classification of one sample plus the evidence behind it
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub sample: f64,
    /// Samples folded into the statistics, this one included
    pub count: u64,
    /// Mean after folding the sample in
    pub mean: f64,
    /// Standard deviation after folding the sample in
    pub std_dev: f64,
    /// Mean the sample was judged against
    pub baseline_mean: f64,
    /// Standard deviation the sample was judged against
    pub baseline_std_dev: f64,
    pub is_anomaly: bool,
}

impl Verdict {
    /// Absolute distance from the baseline mean
    pub fn deviation(&self) -> f64 {
        (self.sample - self.baseline_mean).abs()
    }

    /// Deviation in baseline standard deviations; infinite on a zero-variance
    /// baseline the sample differs from, zero when it matches.
    pub fn z_score(&self) -> f64 {
        let deviation = self.deviation();
        if self.baseline_std_dev > 0.0 {
            deviation / self.baseline_std_dev
        } else if deviation > 0.0 {
            f64::INFINITY
        } else {
            0.0
        }
    }
}

#[derive(Debug, Clone)]
pub struct AnomalyDetector {
    config: DetectionConfig,
    stats: Statistics,
}

impl AnomalyDetector {
    pub fn new(config: DetectionConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            stats: config.mode.statistics(),
            config,
        })
    }

    /// Resume from previously accumulated statistics.
    pub fn with_statistics(
        config: DetectionConfig,
        stats: Statistics,
    ) -> Result<Self, CheckpointError> {
        let mut detector = Self::new(config).map_err(|e| {
            CheckpointError::DeserializationFailed(format!("invalid detector config: {e}"))
        })?;
        let found = AccumulationMode::of(&stats);
        if found != config.mode {
            return Err(CheckpointError::ModeMismatch {
                expected: config.mode,
                found,
            });
        }
        detector.stats = stats;
        Ok(detector)
    }

    pub fn config(&self) -> &DetectionConfig {
        &self.config
    }

    pub fn statistics(&self) -> &Statistics {
        &self.stats
    }

    pub fn moments(&self) -> Moments {
        self.stats.moments()
    }

    pub fn count(&self) -> u64 {
        self.stats.count()
    }

    /// Fold `sample` into the statistics and classify it.
    ///
    /// Non-finite samples and samples beyond `MAX_SAMPLE_MAGNITUDE` are
    /// rejected without touching the statistics.
    pub fn observe(&mut self, sample: f64) -> Result<Verdict, DetectError> {
        if !sample.is_finite() {
            return Err(DetectError::NonFiniteSample(sample));
        }
        if sample.abs() > MAX_SAMPLE_MAGNITUDE {
            return Err(DetectError::OutOfRange(sample));
        }

        let prior = self.stats.moments();
        self.stats.push(sample);
        let current = self.stats.moments();

        let baseline = match self.config.baseline {
            Baseline::Inclusive => current,
            Baseline::Prior => prior,
        };
        let is_anomaly =
            baseline.count > 0 && exceeds(sample, baseline.mean, baseline.std_dev, self.config.threshold);

        Ok(Verdict {
            sample,
            count: current.count,
            mean: current.mean,
            std_dev: current.std_dev,
            baseline_mean: baseline.mean,
            baseline_std_dev: baseline.std_dev,
            is_anomaly,
        })
    }
}

#[inline]
fn exceeds(sample: f64, mean: f64, std_dev: f64, k: f64) -> bool {
    (sample - mean).abs() > k * std_dev
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detector(k: f64) -> AnomalyDetector {
        AnomalyDetector::new(DetectionConfig::with_threshold(k)).unwrap()
    }

    fn prior(k: f64) -> AnomalyDetector {
        AnomalyDetector::new(DetectionConfig {
            threshold: k,
            baseline: Baseline::Prior,
            ..DetectionConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn test_first_sample_is_normal() {
        let mut d = detector(2.0);
        let v = d.observe(7.5).unwrap();
        assert!(!v.is_anomaly);
        assert_eq!(v.count, 1);
        assert_eq!(v.mean, 7.5);
        assert_eq!(v.std_dev, 0.0);
    }

    #[test]
    fn test_constant_stream() {
        let mut d = detector(2.0);
        for _ in 0..20 {
            let v = d.observe(10.0).unwrap();
            assert!(!v.is_anomaly);
            assert_eq!(v.mean, 10.0);
            assert_eq!(v.std_dev, 0.0);
        }
    }

    #[test]
    fn test_spike_on_exclusive_boundary() {
        // mean 28, std 36: |100 - 28| == 2 * 36 exactly, and the rule is strict
        let mut d = detector(2.0);
        for _ in 0..4 {
            assert!(!d.observe(10.0).unwrap().is_anomaly);
        }
        let v = d.observe(100.0).unwrap();
        assert_eq!(v.mean, 28.0);
        assert_eq!(v.std_dev, 36.0);
        assert_eq!(v.deviation(), 72.0);
        assert!(!v.is_anomaly);
    }

    #[test]
    fn test_spike_just_inside_boundary() {
        let mut d = detector(1.99);
        for _ in 0..4 {
            d.observe(10.0).unwrap();
        }
        assert!(d.observe(100.0).unwrap().is_anomaly);
    }

    #[test]
    fn test_inclusive_self_absorption() {
        // n = 4 caps the self-inclusive z-score at sqrt(3) < 2
        let mut d = detector(2.0);
        for _ in 0..3 {
            d.observe(5.0).unwrap();
        }
        let v = d.observe(50.0).unwrap();
        assert_eq!(v.mean, 16.25);
        assert!((v.std_dev - 19.4856).abs() < 1e-3);
        assert!(!v.is_anomaly);
    }

    #[test]
    fn test_prior_baseline_flags_zero_variance_break() {
        let mut d = prior(2.0);
        for _ in 0..3 {
            let v = d.observe(5.0).unwrap();
            assert!(!v.is_anomaly);
        }
        let v = d.observe(50.0).unwrap();
        assert!(v.is_anomaly);
        assert_eq!(v.baseline_mean, 5.0);
        assert_eq!(v.baseline_std_dev, 0.0);
        assert_eq!(v.mean, 16.25);
        assert!((v.std_dev - 19.49).abs() < 0.01);
        assert_eq!(v.z_score(), f64::INFINITY);
    }

    #[test]
    fn test_prior_baseline_spike() {
        let mut d = prior(2.0);
        for _ in 0..4 {
            assert!(!d.observe(10.0).unwrap().is_anomaly);
        }
        let v = d.observe(100.0).unwrap();
        assert!(v.is_anomaly);
        assert_eq!(v.mean, 28.0);
        assert_eq!(v.std_dev, 36.0);
    }

    #[test]
    fn test_prior_any_k_on_zero_variance() {
        for k in [0.0, 1.0, 1e6] {
            let mut d = prior(k);
            d.observe(3.0).unwrap();
            d.observe(3.0).unwrap();
            assert!(d.observe(3.000001).unwrap().is_anomaly, "k = {k}");
        }
    }

    #[test]
    fn test_zero_threshold_flags_any_deviation() {
        let mut d = detector(0.0);
        d.observe(1.0).unwrap();
        assert!(d.observe(2.0).unwrap().is_anomaly);
    }

    #[test]
    fn test_non_finite_rejected_without_state_change() {
        let mut d = detector(2.0);
        d.observe(1.0).unwrap();
        d.observe(3.0).unwrap();
        let before = d.moments();
        for bad in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            assert!(matches!(
                d.observe(bad),
                Err(DetectError::NonFiniteSample(_))
            ));
        }
        assert_eq!(d.moments(), before);
    }

    #[test]
    fn test_huge_samples_rejected_without_state_change() {
        let mut d = detector(0.0);
        d.observe(1.0).unwrap();
        d.observe(3.0).unwrap();
        let before = d.moments();
        for bad in [1e200, -1e200, 1.7e308, f64::MAX] {
            assert_eq!(d.observe(bad), Err(DetectError::OutOfRange(bad)));
        }
        assert_eq!(d.moments(), before);
    }

    #[test]
    fn test_largest_accepted_magnitude_stays_finite() {
        let mut d = detector(0.0);
        d.observe(MAX_SAMPLE_MAGNITUDE).unwrap();
        let v = d.observe(-MAX_SAMPLE_MAGNITUDE).unwrap();
        assert!(v.mean.is_finite());
        assert!(v.std_dev.is_finite());
        assert!(v.is_anomaly);
    }

    #[test]
    fn test_validate() {
        assert!(AnomalyDetector::new(DetectionConfig::with_threshold(-1.0)).is_err());
        assert!(AnomalyDetector::new(DetectionConfig::with_threshold(f64::NAN)).is_err());
        let window = DetectionConfig {
            mode: AccumulationMode::Window { size: 0 },
            ..DetectionConfig::default()
        };
        assert_eq!(window.validate(), Err(ConfigError::InvalidWindow(0)));
        let ewma = DetectionConfig {
            mode: AccumulationMode::Exponential { half_life: 0.0 },
            ..DetectionConfig::default()
        };
        assert_eq!(ewma.validate(), Err(ConfigError::InvalidHalfLife(0.0)));
    }

    #[test]
    fn test_mode_mismatch_on_resume() {
        let config = DetectionConfig {
            mode: AccumulationMode::Window { size: 10 },
            ..DetectionConfig::default()
        };
        let stats = Statistics::Cumulative(RunningMoments::new());
        assert!(matches!(
            AnomalyDetector::with_statistics(config, stats),
            Err(CheckpointError::ModeMismatch { .. })
        ));
    }

    #[test]
    fn test_resume_rejects_other_window_size() {
        let config = DetectionConfig {
            mode: AccumulationMode::Window { size: 100 },
            ..DetectionConfig::default()
        };
        let mut saved = WindowedMoments::new(4);
        for x in [1.0, 2.0, 3.0, 4.0, 5.0] {
            saved.push(x);
        }
        match AnomalyDetector::with_statistics(config, Statistics::Window(saved)) {
            Err(CheckpointError::ModeMismatch { expected, found }) => {
                assert_eq!(expected, AccumulationMode::Window { size: 100 });
                assert_eq!(found, AccumulationMode::Window { size: 4 });
            }
            other => panic!("unexpected restore: {other:?}"),
        }
    }

    #[test]
    fn test_resume_rejects_other_half_life() {
        let config = DetectionConfig {
            mode: AccumulationMode::Exponential { half_life: 50.0 },
            ..DetectionConfig::default()
        };
        let stats = Statistics::Exponential(Ewma::new(10.0));
        match AnomalyDetector::with_statistics(config, stats) {
            Err(CheckpointError::ModeMismatch { found, .. }) => {
                assert_eq!(found, AccumulationMode::Exponential { half_life: 10.0 });
            }
            other => panic!("unexpected restore: {other:?}"),
        }
    }

    #[test]
    fn test_resume_with_matching_parameters() {
        let mode = AccumulationMode::Window { size: 3 };
        let config = DetectionConfig {
            mode,
            ..DetectionConfig::default()
        };
        let mut saved = WindowedMoments::new(3);
        saved.push(7.0);
        let d = AnomalyDetector::with_statistics(config, Statistics::Window(saved)).unwrap();
        assert_eq!(AccumulationMode::of(d.statistics()), mode);
        assert_eq!(d.count(), 1);
    }

    #[test]
    fn test_window_mode_forgets_spike() {
        let mut d = AnomalyDetector::new(DetectionConfig {
            threshold: 2.0,
            mode: AccumulationMode::Window { size: 5 },
            baseline: Baseline::Prior,
        })
        .unwrap();
        d.observe(500.0).unwrap();
        for _ in 0..5 {
            d.observe(1.0).unwrap();
        }
        let m = d.moments();
        assert_eq!(m.count, 5);
        assert_eq!(m.mean, 1.0);
        assert_eq!(m.std_dev, 0.0);
    }
}
