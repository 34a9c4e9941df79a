use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

use salsa_server::auth::JwtVerifier;
use salsa_server::config::{generate_config_template, Cli, Config};
use salsa_server::{routes, state, ws};

/// How long shutdown waits for connection actors to send their close frames
/// and unregister. Covers the per-connection close grace.
const SHUTDOWN_DRAIN: Duration = Duration::from_secs(2);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Handle --generate-config: print template and exit
    if cli.generate_config {
        print!("{}", generate_config_template());
        return Ok(());
    }

    // Load config with layered precedence: defaults < TOML < env < CLI
    let config = Config::load(&cli)?;

    // Initialize tracing/logging
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("salsa_server=info,tower_http=info"));
    if config.json_logs {
        tracing_subscriber::fmt().json().with_env_filter(env_filter).init();
    } else {
        tracing_subscriber::fmt().pretty().with_env_filter(env_filter).init();
    }

    tracing::info!("Salsa server v{} starting", env!("CARGO_PKG_VERSION"));

    if config.uses_default_secret() {
        tracing::warn!("Using the built-in JWT secret; set SALSA_JWT_SECRET outside local development");
    }

    // Build application state
    let mut app_state = state::AppState::new(Arc::new(JwtVerifier::new(config.jwt_secret.as_bytes())));
    app_state.outbound_queue_capacity = config.outbound_queue_capacity;
    app_state.max_message_bytes = config.max_message_bytes;
    let connections = app_state.connections.clone();
    let closing = connections.clone();

    // Build router
    let app = routes::build_router(app_state);

    // Bind and serve
    let addr = format!("{}:{}", config.bind_address, config.port);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Salsa server running at ws://{}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        shutdown_signal().await;
        // Upgraded sockets are not tracked by the HTTP server; close them here
        ws::close_all(&closing);
    })
    .await?;

    // serve() returns without waiting for upgraded sockets
    let remaining = ws::drain(&connections, SHUTDOWN_DRAIN).await;
    if remaining > 0 {
        tracing::warn!(remaining, "Shutdown drain timed out, dropping connections");
    }

    tracing::info!("Salsa server stopped");
    Ok(())
}

/// Resolves on Ctrl-C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
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
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
