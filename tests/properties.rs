use freqwatch::{
    AccumulationMode, AnomalyDetector, Baseline, DetectionConfig,
    detector::MAX_SAMPLE_MAGNITUDE, error::DetectError,
};
use proptest::prelude::*;

fn finite_samples() -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(-1.0e6f64..1.0e6, 1..200)
}

/// Everyday magnitudes mixed with values up to the accepted limit
fn wide_samples() -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(
        prop_oneof![
            -1.0e6f64..1.0e6,
            -MAX_SAMPLE_MAGNITUDE..MAX_SAMPLE_MAGNITUDE,
        ],
        1..200,
    )
}

fn mode() -> impl Strategy<Value = AccumulationMode> {
    prop_oneof![
        Just(AccumulationMode::Cumulative),
        (1usize..32).prop_map(|size| AccumulationMode::Window { size }),
        (1.0f64..100.0).prop_map(|half_life| AccumulationMode::Exponential { half_life }),
    ]
}

proptest! {
    #[test]
    fn std_dev_never_negative(samples in wide_samples(), mode in mode()) {
        let mut d = AnomalyDetector::new(DetectionConfig { mode, ..DetectionConfig::default() }).unwrap();
        for x in samples {
            let v = d.observe(x).unwrap();
            prop_assert!(v.std_dev >= 0.0);
            prop_assert!(v.std_dev.is_finite());
            prop_assert!(v.mean.is_finite());
        }
    }

    #[test]
    fn oversized_samples_rejected(
        samples in finite_samples(),
        scale in 1.0001f64..1.0e150,
        negative in any::<bool>(),
    ) {
        let mut d = AnomalyDetector::new(DetectionConfig::default()).unwrap();
        for x in samples {
            d.observe(x).unwrap();
        }
        let before = d.moments();
        let huge = if negative { -MAX_SAMPLE_MAGNITUDE * scale } else { MAX_SAMPLE_MAGNITUDE * scale };
        prop_assert_eq!(d.observe(huge), Err(DetectError::OutOfRange(huge)));
        prop_assert_eq!(d.moments(), before);
    }

    #[test]
    fn fresh_detectors_agree(samples in finite_samples(), k in 0.0f64..5.0) {
        let config = DetectionConfig::with_threshold(k);
        let mut a = AnomalyDetector::new(config).unwrap();
        let mut b = AnomalyDetector::new(config).unwrap();
        for x in samples {
            prop_assert_eq!(a.observe(x).unwrap(), b.observe(x).unwrap());
        }
    }

    #[test]
    fn constant_run_then_outlier(
        v in (-1000i32..1000).prop_map(f64::from),
        n in 2usize..50,
        delta in (1i32..100).prop_map(f64::from),
        k in 0.0f64..10.0,
    ) {
        let mut d = AnomalyDetector::new(DetectionConfig {
            threshold: k,
            baseline: Baseline::Prior,
            ..DetectionConfig::default()
        })
        .unwrap();

        for _ in 0..n {
            let verdict = d.observe(v).unwrap();
            prop_assert!(!verdict.is_anomaly);
            prop_assert_eq!(verdict.std_dev, 0.0);
        }
        prop_assert!(d.observe(v + delta).unwrap().is_anomaly);
    }

    #[test]
    fn rejected_samples_leave_no_trace(samples in finite_samples(), at in 0usize..200) {
        let mut clean = AnomalyDetector::new(DetectionConfig::default()).unwrap();
        let mut dirty = AnomalyDetector::new(DetectionConfig::default()).unwrap();
        for (i, x) in samples.iter().copied().enumerate() {
            if i == at {
                prop_assert!(dirty.observe(f64::NAN).is_err());
            }
            prop_assert_eq!(clean.observe(x).unwrap(), dirty.observe(x).unwrap());
        }
        prop_assert_eq!(clean.count(), samples.len() as u64);
    }
}
