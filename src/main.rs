use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use motion_gateway::config::Args;
use motion_gateway::{AppState, build_router};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // parse cli arguments (after .env so env fallbacks see it)
    let args = Args::parse();

    let state = Arc::new(AppState::from_args(&args)?);

    #[cfg(unix)]
    tokio::spawn(reset_on_hangup(Arc::clone(&state)));
    tokio::spawn(sweep_expired_windows(
        Arc::clone(&state),
        args.sweep_interval(),
    ));

    let app = build_router(Arc::clone(&state));

    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!("Gateway running on http://{}", addr);
    info!("Forwarding to {}", state.upstream.base_url());
    info!(
        "Proxy rate limit: {} requests per {} seconds (global)",
        args.proxy_rate_limit, args.proxy_rate_window
    );
    info!(
        "General rate limit: {} requests per {} seconds (per IP)",
        args.general_rate_limit, args.general_rate_window
    );

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Gateway stopped");
    Ok(())
}

/// Clear all rate limit windows on SIGHUP.
#[cfg(unix)]
async fn reset_on_hangup(state: Arc<AppState>) {
    let mut hangup = match signal::unix::signal(signal::unix::SignalKind::hangup()) {
        Ok(hangup) => hangup,
        Err(e) => {
            error!("Failed to install SIGHUP handler: {}", e);
            return;
        }
    };

    while hangup.recv().await.is_some() {
        info!("Received SIGHUP, resetting rate limits");
        if let Err(e) = state.reset_rate_limits() {
            error!("Failed to reset rate limits: {}", e);
        }
    }
}

/// Periodically drop expired windows so per-IP keys do not pile up.
async fn sweep_expired_windows(state: Arc<AppState>, every: Duration) {
    let mut ticker = tokio::time::interval(every);
    loop {
        ticker.tick().await;
        if let Err(e) = state.purge_expired_windows() {
            error!("Failed to purge expired rate limit windows: {}", e);
        }
    }
}

/// Wait for a shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
