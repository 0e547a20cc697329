//! Survey triage service entry point

use anyhow::Result;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use triage_service::{load_predictor, routes, ServiceConfig, SharedState};

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    info!("Starting survey triage service v{}", env!("CARGO_PKG_VERSION"));

    let config = ServiceConfig::from_env();
    info!(
        artifact_dir = %config.artifact_dir.display(),
        port = config.port,
        api_key = config.api_key.is_some(),
        "configuration loaded"
    );

    let state = SharedState::new();
    state.begin_loading();

    // Load artifacts off the runtime; requests arriving meanwhile are
    // rejected as retryable instead of queueing.
    let load_state = state.clone();
    let load_config = config.clone();
    tokio::task::spawn_blocking(move || match load_predictor(&load_config) {
        Ok(predictor) => load_state.set_ready(predictor),
        Err(err) => {
            error!(error = %err, "artifact load failed; serving degraded");
            load_state.set_degraded(err.to_string());
        }
    });

    let routes = routes(state, config.api_key.clone(), config.allowed_origins.clone());
    let addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), config.port);

    info!("Listening on {addr}");
    let (_, server) = warp::serve(routes).bind_with_graceful_shutdown(addr, async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received shutdown signal"),
            Err(err) => error!("Unable to listen for shutdown signal: {err}"),
        }
    });

    server.await;
    info!("Service stopped gracefully");
    Ok(())
}

fn init_logging() {
    let env = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(env)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
