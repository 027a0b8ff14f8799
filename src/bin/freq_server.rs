//! freq_server: NDJSON frequency stream producer
//!
//! Every connection to `GET /frequencies` gets its own session with a random
//! mean and standard deviation.

use clap::Parser;
use tokio::net::TcpListener;
use tracing::{error, info};

use freqwatch::{config::ServerArgs, server, telemetry};

#[tokio::main]
async fn main() {
    let args = ServerArgs::parse();
    telemetry::init(args.log_format, "info");

    let listener = match TcpListener::bind(args.listen).await {
        Ok(l) => l,
        Err(e) => {
            error!(addr = %args.listen, error = %e, "Failed to bind");
            std::process::exit(1);
        }
    };

    info!(
        addr = %args.listen,
        interval_ms = args.interval_ms,
        limit = ?args.limit,
        "Frequency server listening"
    );

    let app = server::router(args.server_config());
    let served = axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "Failed to install CTRL+C handler");
                std::future::pending::<()>().await;
            }
            info!("Shutting down...");
        })
        .await;

    if let Err(e) = served {
        error!(error = %e, "Server crash");
        std::process::exit(1);
    }
}
