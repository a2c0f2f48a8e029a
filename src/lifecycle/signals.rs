//! OS signal handling.
//!
//! # Responsibilities
//! - Wait for Ctrl+C (SIGINT) or an internal shutdown trigger
//! - Hand the server a future that resolves when it should drain
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - A failed signal handler install is logged; the internal trigger still
//!   works

use tokio::sync::broadcast;

/// Resolves on Ctrl+C or when `shutdown` fires.
pub async fn shutdown_signal(mut shutdown: broadcast::Receiver<()>) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    tokio::select! {
        _ = ctrl_c => tracing::info!("Shutdown signal received"),
        _ = shutdown.recv() => tracing::info!("Shutdown triggered"),
    }
}
