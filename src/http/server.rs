//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum Router that hands every request to the kernel
//! - Wire up tower layers (tracing, request timeout)
//! - Buffer request bodies up to the configured limit
//! - Run terminate hooks after the response has been produced
//! - Bind to a listener and drain on shutdown

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Request as AxumRequest, State},
    http::StatusCode,
    response::{IntoResponse, Response as AxumResponse},
    Router,
};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::KernelConfig;
use crate::http::{Kernel, Request};
use crate::lifecycle::{shutdown_signal, Shutdown};

/// Application state injected into the handler.
#[derive(Clone)]
pub struct AppState {
    pub kernel: Arc<Kernel>,
    pub max_body_size: usize,
}

/// HTTP front end for a [`Kernel`].
pub struct HttpServer {
    router: Router,
    config: KernelConfig,
}

impl HttpServer {
    pub fn new(config: KernelConfig, kernel: Arc<Kernel>) -> Self {
        let state = AppState {
            kernel,
            max_body_size: config.limits.max_body_size,
        };
        let router = Self::build_router(&config, state);
        Self { router, config }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &KernelConfig, state: AppState) -> Router {
        Router::new()
            .fallback(kernel_handler)
            .with_state(state)
            .layer(
                ServiceBuilder::new()
                    .layer(TraceLayer::new_for_http())
                    .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs))),
            )
    }

    /// The axum router, for in-process requests.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn config(&self) -> &KernelConfig {
        &self.config
    }

    /// Serve until Ctrl+C or `shutdown` fires, then drain.
    pub async fn run(self, listener: TcpListener, shutdown: &Shutdown) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown_signal(shutdown.subscribe()))
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

async fn kernel_handler(State(state): State<AppState>, request: AxumRequest) -> AxumResponse {
    let (parts, body) = request.into_parts();
    let body = match axum::body::to_bytes(body, state.max_body_size).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(error = %e, limit = state.max_body_size, "request body rejected");
            return (StatusCode::PAYLOAD_TOO_LARGE, "Payload Too Large").into_response();
        }
    };

    let request = Request::from_parts(parts, body);
    let response = state.kernel.handle(request.clone()).await;

    let kernel = state.kernel.clone();
    let sent = response.clone();
    tokio::spawn(async move {
        kernel.terminate(&request, &sent).await;
    });

    response.into_response()
}
