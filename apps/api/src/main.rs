use std::net::SocketAddr;

use anyhow::Context;
use dotenv::dotenv;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::{self, TraceLayer};
use tracing::{info, Level};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod router;
mod state;

use appointment_cell::ExpirySweeper;
use shared_config::AppConfig;
use state::AppServices;
use video_conferencing_cell::SessionSweeper;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Loading Env Vars
    dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting clinic scheduling API server");

    let config = AppConfig::from_env();
    let port = config.port;
    let sweep_interval = config.scheduling.sweep_interval_seconds;
    let no_show_grace = config.scheduling.no_show_grace_minutes;

    let services = AppServices::build(config);

    // Background sweeps stop when this flips to true.
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let hold_sweep = ExpirySweeper::new(services.ledger.clone(), sweep_interval).spawn(shutdown_rx.clone());
    let session_sweep = SessionSweeper::new(services.sessions.clone(), sweep_interval, no_show_grace)
        .spawn(shutdown_rx);
    info!(
        "Sweeps every {}s (no-show cancellation: {})",
        sweep_interval,
        no_show_grace.map_or("off".to_string(), |m| format!("after {} min", m))
    );

    // Set up CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = router::create_router(&services)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(trace::DefaultMakeSpan::new().level(Level::INFO))
                .on_response(trace::DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Listening on {}", addr);

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received");
        })
        .await
        .context("server error")?;

    shutdown_tx.send(true).ok();
    let _ = tokio::join!(hold_sweep, session_sweep);
    info!("Stopped");
    Ok(())
}
