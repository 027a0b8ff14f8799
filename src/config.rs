//! Command-line and environment configuration

use crate::checkpoint::CheckpointPolicy;
use crate::detector::{AccumulationMode, Baseline, DEFAULT_THRESHOLD, DetectionConfig};
use crate::error::ConfigError;
use crate::server::{DEFAULT_LISTEN, ServerConfig};
use crate::store::DEFAULT_DATABASE_URL;
use crate::supervisor::ReconnectPolicy;
use crate::telemetry::LogFormat;
use clap::{Parser, ValueEnum};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_ADDRESS: &str = "localhost:50051";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ModeArg {
    #[default]
    Cumulative,
    Window,
    Exponential,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum BaselineArg {
    #[default]
    Inclusive,
    Prior,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum StoreKind {
    #[default]
    Postgres,
    Jsonl,
    Memory,
}

#[derive(Debug, Clone, Parser)]
#[command(name = "freq_detector")]
#[command(about = "Flag statistical outliers on a live frequency stream")]
pub struct DetectorArgs {
    /// Stream producer address (host:port or base URL)
    #[arg(long, env = "FREQWATCH_ADDRESS", default_value = DEFAULT_ADDRESS)]
    pub address: String,

    /// Anomaly coefficient k: flag |x - mean| > k * std_dev
    #[arg(short = 'k', long = "threshold", env = "FREQWATCH_K", default_value_t = DEFAULT_THRESHOLD)]
    pub threshold: f64,

    /// How history is weighed
    #[arg(long, value_enum, env = "FREQWATCH_MODE", default_value_t = ModeArg::Cumulative)]
    pub mode: ModeArg,

    /// Samples kept in window mode
    #[arg(long, default_value_t = 100)]
    pub window_size: usize,

    /// Half-life in samples for exponential mode
    #[arg(long, default_value_t = 50.0)]
    pub half_life: f64,

    /// Judge each sample with itself folded in, or against prior history only
    #[arg(long, value_enum, env = "FREQWATCH_BASELINE", default_value_t = BaselineArg::Inclusive)]
    pub baseline: BaselineArg,

    #[arg(long, value_enum, env = "FREQWATCH_STORE", default_value_t = StoreKind::Postgres)]
    pub store: StoreKind,

    #[arg(long, env = "DATABASE_URL", default_value = DEFAULT_DATABASE_URL)]
    pub database_url: String,

    #[arg(long, default_value_t = 4)]
    pub db_max_connections: u32,

    /// Directory for the jsonl store
    #[arg(long, env = "FREQWATCH_JSONL_DIR", default_value = "anomalies")]
    pub jsonl_dir: PathBuf,

    /// Detector checkpoint file; loaded at startup when present
    #[arg(long, env = "FREQWATCH_CHECKPOINT")]
    pub checkpoint: Option<PathBuf>,

    /// Samples between checkpoints (0 = only on exit)
    #[arg(long, default_value_t = 0)]
    pub checkpoint_every: u64,

    /// Reconnect attempts after a stream failure (0 = exit on first failure)
    #[arg(long, env = "FREQWATCH_RECONNECT_ATTEMPTS", default_value_t = 0)]
    pub reconnect_attempts: u32,

    #[arg(long, default_value_t = 500)]
    pub reconnect_base_ms: u64,

    #[arg(long, default_value_t = 30_000)]
    pub reconnect_max_ms: u64,

    #[arg(long, default_value_t = 10)]
    pub connect_timeout_secs: u64,

    /// Serve /metrics and /health on this address
    #[arg(long, env = "FREQWATCH_METRICS_ADDR")]
    pub metrics_addr: Option<SocketAddr>,

    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

impl DetectorArgs {
    pub fn detection(&self) -> Result<DetectionConfig, ConfigError> {
        let mode = match self.mode {
            ModeArg::Cumulative => AccumulationMode::Cumulative,
            ModeArg::Window => AccumulationMode::Window {
                size: self.window_size,
            },
            ModeArg::Exponential => AccumulationMode::Exponential {
                half_life: self.half_life,
            },
        };
        let baseline = match self.baseline {
            BaselineArg::Inclusive => Baseline::Inclusive,
            BaselineArg::Prior => Baseline::Prior,
        };
        let config = DetectionConfig {
            threshold: self.threshold,
            mode,
            baseline,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn checkpoint_policy(&self) -> Result<Option<CheckpointPolicy>, ConfigError> {
        match (&self.checkpoint, self.checkpoint_every) {
            (Some(path), every) => Ok(Some(CheckpointPolicy {
                path: path.clone(),
                every,
            })),
            (None, 0) => Ok(None),
            (None, _) => Err(ConfigError::Missing("--checkpoint")),
        }
    }

    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        ReconnectPolicy {
            max_attempts: self.reconnect_attempts,
            base_delay: Duration::from_millis(self.reconnect_base_ms),
            max_delay: Duration::from_millis(self.reconnect_max_ms.max(self.reconnect_base_ms)),
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

#[derive(Debug, Clone, Parser)]
#[command(name = "freq_server")]
#[command(about = "Stream normally distributed frequencies as NDJSON")]
pub struct ServerArgs {
    #[arg(long, env = "FREQWATCH_LISTEN", default_value = DEFAULT_LISTEN)]
    pub listen: SocketAddr,

    /// Milliseconds between samples
    #[arg(long, default_value_t = 100)]
    pub interval_ms: u64,

    /// Close each session after this many samples
    #[arg(long)]
    pub limit: Option<u64>,

    /// Seed for reproducible sessions
    #[arg(long)]
    pub seed: Option<u64>,

    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

impl ServerArgs {
    pub fn server_config(&self) -> ServerConfig {
        ServerConfig {
            interval: Duration::from_millis(self.interval_ms),
            limit: self.limit,
            seed: self.seed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_reference_client() {
        let args = DetectorArgs::try_parse_from(["freq_detector"]).unwrap();
        assert_eq!(args.address, DEFAULT_ADDRESS);
        assert_eq!(args.threshold, 2.0);
        assert_eq!(args.store, StoreKind::Postgres);
        assert_eq!(args.reconnect_attempts, 0);

        let config = args.detection().unwrap();
        assert_eq!(config, DetectionConfig::default());
        assert!(args.checkpoint_policy().unwrap().is_none());
    }

    #[test]
    fn test_flags() {
        let args = DetectorArgs::try_parse_from([
            "freq_detector",
            "--address",
            "10.0.0.5:9000",
            "-k",
            "3.5",
            "--mode",
            "window",
            "--window-size",
            "20",
            "--baseline",
            "prior",
            "--store",
            "jsonl",
        ])
        .unwrap();

        let config = args.detection().unwrap();
        assert_eq!(config.threshold, 3.5);
        assert_eq!(config.mode, AccumulationMode::Window { size: 20 });
        assert_eq!(config.baseline, Baseline::Prior);
        assert_eq!(args.store, StoreKind::Jsonl);
    }

    #[test]
    fn test_invalid_threshold() {
        let args = DetectorArgs::try_parse_from(["freq_detector", "--threshold=-1"]).unwrap();
        assert_eq!(
            args.detection(),
            Err(ConfigError::InvalidThreshold(-1.0))
        );
    }

    #[test]
    fn test_checkpoint_every_needs_path() {
        let args =
            DetectorArgs::try_parse_from(["freq_detector", "--checkpoint-every", "10"]).unwrap();
        assert_eq!(
            args.checkpoint_policy().unwrap_err(),
            ConfigError::Missing("--checkpoint")
        );
    }

    #[test]
    fn test_server_args() {
        let args =
            ServerArgs::try_parse_from(["freq_server", "--limit", "5", "--seed", "9"]).unwrap();
        let config = args.server_config();
        assert_eq!(config.limit, Some(5));
        assert_eq!(config.seed, Some(9));
        assert_eq!(config.interval, Duration::from_millis(100));
    }
}
