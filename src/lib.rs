//! freqwatch: online anomaly detection over a live frequency stream
//!
//! A `SampleSource` delivers frequencies one at a time, the
//! `AnomalyDetector` folds each into running statistics and classifies it,
//! and anomalous verdicts become `AnomalyRecord`s handed to an
//! `AnomalyStore`.

pub mod algo;
pub mod checkpoint;
pub mod config;
pub mod detector;
pub mod error;
pub mod generator;
pub mod metrics;
pub mod pipeline;
pub mod record;
pub mod server;
pub mod source;
pub mod store;
pub mod supervisor;
pub mod telemetry;

pub use detector::{AccumulationMode, AnomalyDetector, Baseline, DetectionConfig, Verdict};
pub use pipeline::{Pipeline, PipelineStats};
pub use record::AnomalyRecord;
pub use source::{FrequencyMessage, SampleSource};
pub use store::AnomalyStore;
