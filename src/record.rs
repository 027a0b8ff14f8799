use crate::detector::Verdict;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Evidence for one anomalous verdict, handed to an `AnomalyStore`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyRecord {
    pub frequency: f64,
    pub mean: f64,
    pub std_dev: f64,
    pub detected_at: DateTime<Utc>,
}

impl AnomalyRecord {
    /// Snapshot a verdict at the given wall-clock time.
    pub fn from_verdict(verdict: &Verdict, detected_at: DateTime<Utc>) -> Self {
        Self {
            frequency: verdict.sample,
            mean: verdict.mean,
            std_dev: verdict.std_dev,
            detected_at,
        }
    }

    pub fn now(verdict: &Verdict) -> Self {
        Self::from_verdict(verdict, Utc::now())
    }
}
