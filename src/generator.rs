//! Frequency session generator
//!
//! Each session draws its own mean from U[-10, 10] and standard deviation
//! from U[0.3, 1.5], then emits normally distributed frequencies.

use crate::error::GeneratorError;
use crate::source::FrequencyMessage;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use serde::Serialize;
use uuid::Uuid;

pub const MEAN_RANGE: (f64, f64) = (-10.0, 10.0);
pub const STD_DEV_RANGE: (f64, f64) = (0.3, 1.5);

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SessionParams {
    pub session_id: Uuid,
    pub mean: f64,
    pub std_dev: f64,
}

pub struct FrequencyGenerator {
    params: SessionParams,
    session: String,
    normal: Normal<f64>,
    rng: StdRng,
}

impl FrequencyGenerator {
    /// Open a session; a seed makes the whole session reproducible.
    pub fn new(seed: Option<u64>) -> Result<Self, GeneratorError> {
        let mut rng = match seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_os_rng(),
        };

        let session_id = uuid::Builder::from_random_bytes(rng.random()).into_uuid();
        let mean = rng.random_range(MEAN_RANGE.0..=MEAN_RANGE.1);
        let std_dev = rng.random_range(STD_DEV_RANGE.0..=STD_DEV_RANGE.1);
        let normal =
            Normal::new(mean, std_dev).map_err(|e| GeneratorError(e.to_string()))?;

        Ok(Self {
            params: SessionParams {
                session_id,
                mean,
                std_dev,
            },
            session: session_id.to_string(),
            normal,
            rng,
        })
    }

    pub fn params(&self) -> &SessionParams {
        &self.params
    }

    pub fn next_frequency(&mut self) -> f64 {
        self.normal.sample(&mut self.rng)
    }

    pub fn next_message(&mut self) -> FrequencyMessage {
        FrequencyMessage {
            session_id: self.session.clone(),
            frequency: self.next_frequency(),
            timestamp: chrono::Utc::now().timestamp(),
        }
    }
}
