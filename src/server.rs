//! Frequency stream server
//!
//! `GET /frequencies` opens a new generator session and streams one JSON
//! object per line until the client hangs up or the configured limit is hit.

use crate::generator::FrequencyGenerator;
use crate::source::STREAM_PATH;
use axum::{
    Router,
    body::{Body, Bytes},
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use std::convert::Infallible;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::{Interval, MissedTickBehavior};
use tracing::{info, warn};

pub const DEFAULT_LISTEN: &str = "0.0.0.0:50051";

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Pause between samples within one session
    pub interval: Duration,
    /// Samples per session before the stream is closed
    pub limit: Option<u64>,
    /// Base seed; session `n` uses `seed + n`
    pub seed: Option<u64>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(100),
            limit: None,
            seed: None,
        }
    }
}

#[derive(Clone)]
struct AppState {
    config: Arc<ServerConfig>,
    sessions: Arc<AtomicU64>,
}

pub fn router(config: ServerConfig) -> Router {
    let state = AppState {
        config: Arc::new(config),
        sessions: Arc::new(AtomicU64::new(0)),
    };

    Router::new()
        .route(STREAM_PATH, get(stream_frequencies))
        .route("/health", get(health_handler))
        .with_state(state)
}

async fn health_handler() -> &'static str {
    "OK"
}

struct SessionStream {
    generator: FrequencyGenerator,
    ticker: Interval,
    sent: u64,
    limit: Option<u64>,
}

async fn stream_frequencies(State(state): State<AppState>) -> Response {
    let index = state.sessions.fetch_add(1, Ordering::Relaxed);
    let seed = state.config.seed.map(|s| s.wrapping_add(index));

    let generator = match FrequencyGenerator::new(seed) {
        Ok(g) => g,
        Err(e) => {
            warn!(error = %e, "Could not open session");
            return (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response();
        }
    };

    let params = *generator.params();
    info!(
        session = %params.session_id,
        mean = params.mean,
        std_dev = params.std_dev,
        "New session"
    );

    let mut ticker = tokio::time::interval(state.config.interval.max(Duration::from_millis(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let session = SessionStream {
        generator,
        ticker,
        sent: 0,
        limit: state.config.limit,
    };

    let body = futures::stream::unfold(session, |mut s| async move {
        if s.limit.is_some_and(|limit| s.sent >= limit) {
            info!(session = %s.generator.params().session_id, sent = s.sent, "Session complete");
            return None;
        }
        s.ticker.tick().await;

        let msg = s.generator.next_message();
        let mut line = match serde_json::to_vec(&msg) {
            Ok(line) => line,
            Err(e) => {
                warn!(error = %e, "Could not encode frequency");
                return None;
            }
        };
        line.push(b'\n');
        s.sent += 1;
        Some((Ok::<_, Infallible>(Bytes::from(line)), s))
    });

    (
        [(header::CONTENT_TYPE, "application/x-ndjson")],
        Body::from_stream(body),
    )
        .into_response()
}
