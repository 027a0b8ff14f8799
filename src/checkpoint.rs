//! Detector Checkpoint and Resume
//!
//! The detector is a plain state object: its accumulated statistics are
//! serialized with bincode, written next to the target path and renamed into
//! place, and loaded back into a fresh detector on restart.

use crate::algo::{Accumulator, Statistics};
use crate::detector::{AnomalyDetector, DetectionConfig};
use crate::error::CheckpointError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Version for checkpoint format migrations
pub const CHECKPOINT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectorCheckpoint {
    /// Format version
    pub version: u32,
    /// Wall-clock time of the snapshot (Unix milliseconds)
    pub saved_at_ms: i64,
    pub statistics: Statistics,
}

impl DetectorCheckpoint {
    pub fn capture(detector: &AnomalyDetector) -> Self {
        Self {
            version: CHECKPOINT_VERSION,
            saved_at_ms: chrono::Utc::now().timestamp_millis(),
            statistics: detector.statistics().clone(),
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, CheckpointError> {
        bincode::serialize(self).map_err(|e| CheckpointError::SerializationFailed(e.to_string()))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CheckpointError> {
        let checkpoint: DetectorCheckpoint = bincode::deserialize(bytes)
            .map_err(|e| CheckpointError::DeserializationFailed(e.to_string()))?;

        if checkpoint.version > CHECKPOINT_VERSION {
            return Err(CheckpointError::UnsupportedVersion {
                found: checkpoint.version,
                max_supported: CHECKPOINT_VERSION,
            });
        }

        Ok(checkpoint)
    }

    /// Rebuild a detector with `config` on top of the saved statistics.
    pub fn restore(self, config: DetectionConfig) -> Result<AnomalyDetector, CheckpointError> {
        AnomalyDetector::with_statistics(config, self.statistics)
    }

    pub fn save(&self, path: &Path) -> Result<(), CheckpointError> {
        let bytes = self.to_bytes()?;
        let tmp = tmp_path(path);
        std::fs::write(&tmp, &bytes)?;
        std::fs::rename(&tmp, path)?;
        debug!(
            path = %path.display(),
            bytes = bytes.len(),
            count = self.statistics.count(),
            "Checkpoint written"
        );
        Ok(())
    }

    /// `Ok(None)` when nothing has been saved at `path` yet
    pub fn load(path: &Path) -> Result<Option<Self>, CheckpointError> {
        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let checkpoint = Self::from_bytes(&bytes)?;
        info!(
            path = %path.display(),
            count = checkpoint.statistics.count(),
            mode = checkpoint.statistics.kind(),
            "Checkpoint loaded"
        );
        Ok(Some(checkpoint))
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Where and how often the pipeline snapshots the detector
#[derive(Debug, Clone)]
pub struct CheckpointPolicy {
    pub path: PathBuf,
    /// Samples between snapshots; 0 only snapshots when consumption stops
    pub every: u64,
}

impl CheckpointPolicy {
    pub fn due(&self, processed: u64) -> bool {
        self.every > 0 && processed > 0 && processed % self.every == 0
    }
}
