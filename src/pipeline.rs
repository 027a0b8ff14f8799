//! Stream Consumption Pipeline
//!
//! One sample at a time: classify, log, persist anomalies, maybe checkpoint.
//! Nothing here is concurrent; the next message is only pulled once the
//! previous one has been fully handled.
//!
//! A shutdown request is only honoured while waiting for the next message,
//! so a sample that has been folded into the detector always finishes its
//! persist before consumption stops.

use crate::checkpoint::{CheckpointPolicy, DetectorCheckpoint};
use crate::detector::{AnomalyDetector, Verdict};
use crate::error::{CheckpointError, SourceError};
use crate::metrics;
use crate::record::AnomalyRecord;
use crate::source::{FrequencyMessage, SampleSource};
use crate::store::AnomalyStore;
use serde::Serialize;
use tokio::sync::watch;
use tracing::{error, info, warn};

/// Running totals for one pipeline
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PipelineStats {
    /// Messages pulled from the source
    pub received: u64,
    /// Samples folded into the detector
    pub classified: u64,
    pub anomalies: u64,
    pub persisted: u64,
    pub persist_failures: u64,
    /// Non-finite or out-of-range samples turned away
    pub rejected: u64,
}

pub struct Pipeline<S: AnomalyStore> {
    detector: AnomalyDetector,
    store: S,
    checkpoint: Option<CheckpointPolicy>,
    shutdown: Option<watch::Receiver<bool>>,
    interrupted: bool,
    stats: PipelineStats,
}

impl<S: AnomalyStore> Pipeline<S> {
    pub fn new(detector: AnomalyDetector, store: S) -> Self {
        Self {
            detector,
            store,
            checkpoint: None,
            shutdown: None,
            interrupted: false,
            stats: PipelineStats::default(),
        }
    }

    pub fn with_checkpoint(mut self, policy: CheckpointPolicy) -> Self {
        self.checkpoint = Some(policy);
        self
    }

    /// Stop consuming once `true` is sent on the paired sender.
    pub fn with_shutdown(mut self, shutdown: watch::Receiver<bool>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Resolves once shutdown has been requested; never without a receiver
    /// or after its sender is dropped.
    pub async fn shutdown_requested(&self) {
        let Some(rx) = self.shutdown.as_ref() else {
            return std::future::pending().await;
        };
        let mut rx = rx.clone();
        if rx.wait_for(|stop| *stop).await.is_err() {
            std::future::pending::<()>().await;
        }
    }

    /// Whether consumption stopped on a shutdown request
    pub fn interrupted(&self) -> bool {
        self.interrupted
    }

    pub fn detector(&self) -> &AnomalyDetector {
        &self.detector
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn stats(&self) -> PipelineStats {
        self.stats
    }

    /// Handle one message. Returns the verdict, or `None` for a rejected sample.
    ///
    /// A store failure is logged and the record dropped; the detector has
    /// already advanced and is not touched again.
    pub async fn handle(&mut self, msg: FrequencyMessage) -> Option<Verdict> {
        self.stats.received += 1;

        let verdict = match self.detector.observe(msg.frequency) {
            Ok(v) => v,
            Err(e) => {
                self.stats.rejected += 1;
                metrics::REJECTED_TOTAL.inc();
                warn!(session = %msg.session_id, error = %e, "Sample rejected");
                return None;
            }
        };
        self.stats.classified += 1;
        metrics::SAMPLES_TOTAL.inc();

        info!(
            frequency = verdict.sample,
            mean = verdict.mean,
            std_dev = verdict.std_dev,
            "Received frequency"
        );

        if verdict.is_anomaly {
            self.stats.anomalies += 1;
            metrics::ANOMALIES_TOTAL.inc();
            warn!(
                frequency = verdict.sample,
                mean = verdict.mean,
                std_dev = verdict.std_dev,
                z = verdict.z_score(),
                "Anomaly detected"
            );

            match self.store.persist(AnomalyRecord::now(&verdict)).await {
                Ok(()) => {
                    self.stats.persisted += 1;
                    metrics::PERSISTED_TOTAL.inc();
                }
                Err(e) => {
                    self.stats.persist_failures += 1;
                    metrics::PERSIST_FAILURES_TOTAL.inc();
                    error!(store = self.store.name(), error = %e, "Failed to record anomaly");
                }
            }
        }

        if self
            .checkpoint
            .as_ref()
            .is_some_and(|p| p.due(self.stats.classified))
        {
            if let Err(e) = self.save_checkpoint() {
                error!(error = %e, "Periodic checkpoint failed");
            }
        }

        Some(verdict)
    }

    /// Drain `source` until it ends or shutdown is requested. Transport
    /// errors are returned as-is; the detector keeps everything consumed so far.
    pub async fn consume<Src>(&mut self, source: &mut Src) -> Result<(), SourceError>
    where
        Src: SampleSource + ?Sized,
    {
        loop {
            let next = tokio::select! {
                biased;
                _ = self.shutdown_requested() => None,
                msg = source.next_message() => Some(msg),
            };
            let Some(msg) = next else {
                self.interrupted = true;
                info!(received = self.stats.received, "Shutdown requested, stopping");
                return Ok(());
            };
            match msg? {
                Some(msg) => {
                    self.handle(msg).await;
                }
                None => break,
            }
        }
        info!(
            received = self.stats.received,
            anomalies = self.stats.anomalies,
            "Stream ended"
        );
        Ok(())
    }

    /// Snapshot the detector if a checkpoint path is configured.
    pub fn save_checkpoint(&self) -> Result<(), CheckpointError> {
        match &self.checkpoint {
            Some(policy) => DetectorCheckpoint::capture(&self.detector).save(&policy.path),
            None => Ok(()),
        }
    }
}
