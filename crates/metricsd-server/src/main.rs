//! metricsd server
//!
//! - Push endpoints: /update/, /update/:type/:name/:value, /updates/
//! - Query endpoints: /value/, /value/:type/:name, /, /j, /ping
//! - Snapshot restore on start, interval dumps, final dump on SIGINT/SIGTERM

use std::process::ExitCode;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use metricsd_core::error::{MetricsError, Result};
use metricsd_server::{app_state::AppState, config, router};

#[tokio::main]
async fn main() -> ExitCode {
    let args = config::Args::parse();
    let cfg = match config::from_env(&args) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("metricsd-server: {e}");
            return ExitCode::FAILURE;
        }
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| cfg.server.log_level.as_str().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    match run(cfg).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "metricsd-server failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(cfg: config::ServerConfig) -> Result<()> {
    let (state, worker) = AppState::build(cfg).await?;

    let cancel = CancellationToken::new();
    let terminated = match worker {
        Some(w) => Some(w.start(cancel.clone()).await),
        None => None,
    };

    let addr = state.cfg().server.address.clone();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| MetricsError::Config(format!("bind {addr}: {e}")))?;
    tracing::info!(%addr, "metricsd-server listening");

    let served = axum::serve(listener, router::build_router(state))
        .with_graceful_shutdown(shutdown_signal(cancel.clone()))
        .await
        .map_err(|e| MetricsError::Internal(format!("server: {e}")));

    cancel.cancel();
    if let Some(t) = terminated {
        match t.wait().await {
            Ok(n) => tracing::info!(count = n, "shutdown complete"),
            Err(e) => tracing::error!(error = %e, "final snapshot failed"),
        }
    }
    served
}

async fn shutdown_signal(cancel: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
        _ = cancel.cancelled() => {},
    }
    tracing::info!("signal received, starting graceful shutdown");
    cancel.cancel();
}
