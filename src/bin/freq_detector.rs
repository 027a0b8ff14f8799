//! freq_detector: consume a frequency stream and persist anomalies
//!
//! Connection and schema errors at startup are fatal. A broken stream is
//! fatal too unless `--reconnect-attempts` allows the supervisor to retry.
//! Persistence failures are logged and the stream keeps flowing.

use anyhow::Context;
use axum::{Router, routing::get};
use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{error, info, warn};

use freqwatch::{
    AnomalyDetector, AnomalyStore, Pipeline,
    checkpoint::DetectorCheckpoint,
    config::{DetectorArgs, StoreKind},
    metrics,
    source::HttpConnector,
    store::{JsonlStore, MemoryStore, PostgresStore},
    supervisor::Supervisor,
    telemetry,
};

async fn open_store(args: &DetectorArgs) -> anyhow::Result<Box<dyn AnomalyStore>> {
    let store: Box<dyn AnomalyStore> = match args.store {
        StoreKind::Postgres => Box::new(
            PostgresStore::connect(
                &args.database_url,
                args.db_max_connections,
                args.connect_timeout(),
            )
            .await
            .context("Failed to connect to database")?,
        ),
        StoreKind::Jsonl => Box::new(
            JsonlStore::open(&args.jsonl_dir)
                .await
                .context("Failed to open JSONL store")?,
        ),
        StoreKind::Memory => Box::new(MemoryStore::new()),
    };
    Ok(store)
}

fn spawn_metrics_server(addr: std::net::SocketAddr) {
    tokio::spawn(async move {
        let app = Router::new()
            .route("/metrics", get(|| async { metrics::render() }))
            .route("/health", get(|| async { "OK" }));
        match TcpListener::bind(addr).await {
            Ok(listener) => {
                info!(%addr, "Metrics endpoint listening");
                if let Err(e) = axum::serve(listener, app).await {
                    error!(error = %e, "Metrics server stopped");
                }
            }
            Err(e) => error!(%addr, error = %e, "Failed to bind metrics endpoint"),
        }
    });
}

async fn run(args: DetectorArgs) -> anyhow::Result<()> {
    let detection = args.detection()?;
    let checkpoint_policy = args.checkpoint_policy()?;
    metrics::init();

    info!(
        address = %args.address,
        k = detection.threshold,
        mode = detection.mode.name(),
        baseline = ?detection.baseline,
        store = ?args.store,
        "Starting frequency anomaly detector"
    );

    if let Some(addr) = args.metrics_addr {
        spawn_metrics_server(addr);
    }

    let store = open_store(&args).await?;

    let detector = match checkpoint_policy.as_ref() {
        Some(policy) => match DetectorCheckpoint::load(&policy.path)? {
            Some(checkpoint) => checkpoint.restore(detection)?,
            None => AnomalyDetector::new(detection)?,
        },
        None => AnomalyDetector::new(detection)?,
    };
    if detector.count() > 0 {
        info!(count = detector.count(), "Resuming from checkpoint");
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Interrupt received, finishing current sample");
                let _ = shutdown_tx.send(true);
            }
            Err(e) => error!(error = %e, "Failed to install CTRL+C handler"),
        }
    });

    let mut pipeline = Pipeline::new(detector, store).with_shutdown(shutdown_rx.clone());
    if let Some(policy) = checkpoint_policy {
        pipeline = pipeline.with_checkpoint(policy);
    }

    let supervisor = Supervisor::new(
        HttpConnector::new(args.address.clone(), args.connect_timeout()),
        args.reconnect_policy(),
    );

    let outcome = supervisor.run(&mut pipeline).await;

    if let Err(e) = pipeline.save_checkpoint() {
        warn!(error = %e, "Final checkpoint failed");
    }

    let stats = pipeline.stats();
    match outcome {
        Ok(_) if *shutdown_rx.borrow() => {
            info!(?stats, "Interrupted, shutting down");
            Ok(())
        }
        Ok(_) => {
            info!(?stats, "Stream finished");
            Ok(())
        }
        Err(e) => Err(e).context("Stream error"),
    }
}

#[tokio::main]
async fn main() {
    let args = DetectorArgs::parse();
    telemetry::init(args.log_format, "info");

    if let Err(e) = run(args).await {
        error!("{:#}", e);
        std::process::exit(1);
    }
}
