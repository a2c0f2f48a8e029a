//! Switchyard (v1)
//!
//! An HTTP kernel and router built with Tokio and Axum.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ http::server (axum fallback, tower layers)
//!                         │
//!                         ▼
//!                     http::kernel ── bootstrap (once) ── global middleware
//!                         │
//!                         ▼
//!                     routing::router ── match ── route middleware ── action
//!                         │
//!     Client Response     ▼
//!     ◀────────────── http::reply (normalize) ── kernel terminate (after send)
//!
//!     console ── route:list, list ── same Router, same events
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde_json::json;
use tokio::net::TcpListener;

use switchyard::config::{load_config, KernelConfig};
use switchyard::console::{Application as Console, ConsoleOutput, ListCommand, RouteListCommand, StartingBootstrapper};
use switchyard::http::{HttpServer, Kernel, Request};
use switchyard::lifecycle::{Application, DefaultApplication, Shutdown};
use switchyard::observability::{init_logging, init_metrics};
use switchyard::routing::{handler, ActionController, Router};

#[derive(Parser)]
#[command(name = "switchyard", version, about = "HTTP kernel and router", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve HTTP until Ctrl+C (default)
    Serve,
    /// Run a console command (`list`, `route:list`, ...)
    Console {
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => KernelConfig::default(),
    };

    if let Err(e) = init_logging(&config.observability) {
        eprintln!("logging not initialized: {e}");
    }

    let app = Arc::new(DefaultApplication::default());
    tracing::info!(application = app.name(), version = app.version(), "starting");

    let router = Arc::new(build_router(&config)?);

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(config, app, router).await,
        Commands::Console { args } => {
            let commands = router.clone();
            let register: StartingBootstrapper = Box::new(move |console: &mut Console| {
                console
                    .add(Arc::new(ListCommand))
                    .add(Arc::new(RouteListCommand::new(commands.clone())));
            });
            let console = Console::with_bootstrappers(app, router.events().clone(), &[register]);
            let code = console.run(args.as_slice(), &mut ConsoleOutput).await;
            std::process::exit(code);
        }
    }
}

/// Router from configuration, with the built-in `Home` controller and
/// default routes when no route file is configured.
fn build_router(config: &KernelConfig) -> switchyard::Result<Router> {
    let mut router = Router::new();
    router.configure(config)?;

    router.register_controller(
        "Home",
        Arc::new(
            ActionController::new()
                .action("index", handler(|_req: Request| async {
                    Ok(json!({ "name": env!("CARGO_PKG_NAME"), "version": env!("CARGO_PKG_VERSION") }))
                }))
                .action("health", handler(|_req: Request| async { Ok("OK") })),
        ),
    );

    if config.routing.route_files.is_empty() {
        router.get("/", "Home@index").name("home");
        router.get("health", "Home@health").name("health");
    }
    Ok(router)
}

async fn serve(
    config: KernelConfig,
    app: Arc<DefaultApplication>,
    router: Arc<Router>,
) -> Result<(), Box<dyn std::error::Error>> {
    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => {
                if let Err(e) = init_metrics(addr) {
                    tracing::error!(error = %e, "Failed to install metrics exporter");
                }
            }
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let kernel = Kernel::new(app, router)
        .with_middleware(config.middleware.global.iter().map(String::as_str))
        .skip_middleware(config.middleware.disabled);
    kernel.bootstrap()?;

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(
        address = %listener.local_addr()?,
        request_timeout_secs = config.timeouts.request_secs,
        "Listening for connections"
    );

    let shutdown = Shutdown::new();
    HttpServer::new(config, Arc::new(kernel)).run(listener, &shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
