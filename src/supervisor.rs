//! Reconnect Supervision
//!
//! Wraps a pipeline with a reconnect-with-backoff loop. The detector state
//! lives in the pipeline, so a reconnected stream carries on from the
//! statistics accumulated before the break. With `max_attempts == 0` the
//! first connect or stream error is returned unchanged.

use crate::error::PipelineError;
use crate::metrics;
use crate::pipeline::{Pipeline, PipelineStats};
use crate::source::Connector;
use crate::store::AnomalyStore;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 0,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl ReconnectPolicy {
    /// `base * 2^attempt`, capped at `max_delay`
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u32 << attempt.min(20);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// `delay_for` plus up to 25% jitter
    pub fn backoff(&self, attempt: u32) -> Duration {
        let delay = self.delay_for(attempt);
        let spread = (delay.as_millis() / 4) as u64;
        delay + Duration::from_millis(fastrand::u64(0..=spread))
    }
}

pub struct Supervisor<C> {
    connector: C,
    policy: ReconnectPolicy,
}

impl<C: Connector> Supervisor<C> {
    pub fn new(connector: C, policy: ReconnectPolicy) -> Self {
        Self { connector, policy }
    }

    pub fn policy(&self) -> &ReconnectPolicy {
        &self.policy
    }

    /// Consume until a clean end-of-stream, a shutdown request, or until
    /// reconnecting is no longer allowed. The attempt budget refills whenever
    /// a stream yields a sample.
    pub async fn run<S: AnomalyStore>(
        &self,
        pipeline: &mut Pipeline<S>,
    ) -> Result<PipelineStats, PipelineError> {
        let mut attempt: u32 = 0;

        loop {
            let connected = tokio::select! {
                biased;
                _ = pipeline.shutdown_requested() => return Ok(pipeline.stats()),
                result = self.connector.connect() => result,
            };
            let err = match connected {
                Ok(mut source) => {
                    let before = pipeline.stats().received;
                    match pipeline.consume(&mut *source).await {
                        Ok(()) => return Ok(pipeline.stats()),
                        Err(e) => {
                            if pipeline.stats().received > before {
                                attempt = 0;
                            }
                            e
                        }
                    }
                }
                Err(e) => e,
            };

            if attempt >= self.policy.max_attempts {
                if self.policy.max_attempts == 0 {
                    return Err(PipelineError::Source(err));
                }
                return Err(PipelineError::ReconnectExhausted {
                    attempts: attempt,
                    last: err,
                });
            }

            let delay = self.policy.backoff(attempt);
            attempt += 1;
            metrics::RECONNECTS_TOTAL.inc();
            warn!(
                attempt,
                max_attempts = self.policy.max_attempts,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "Stream lost, reconnecting"
            );
            tokio::select! {
                biased;
                _ = pipeline.shutdown_requested() => return Ok(pipeline.stats()),
                _ = tokio::time::sleep(delay) => {}
            }
            info!(attempt, "Reconnecting to frequency stream");
        }
    }
}
