//! Workdesk CLI and REST API entry point.
//!
//! Binary name: `wdesk`
//!
//! Parses CLI arguments, initializes database and services, then dispatches
//! to the appropriate command handler or starts the REST API server.

mod cli;
mod http;
mod state;

use std::time::Duration;

use clap::Parser;
use tokio_util::sync::CancellationToken;

use workdesk_core::session::store::SessionStore;
use workdesk_observe::{TracingOptions, init_tracing, shutdown_tracing};

use cli::{Cli, Commands, TokenAction};
use state::AppState;

/// How often expired chat sessions are swept from memory.
const PURGE_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_tracing(&TracingOptions {
        default_filter: cli.log_filter().to_string(),
        json: cli.log_json,
        enable_otel: std::env::var_os("WORKDESK_OTEL").is_some(),
    })
    .map_err(|e| anyhow::anyhow!("failed to initialize tracing: {e}"))?;

    // Initialize application state (DB, blob store, services)
    let state = AppState::init().await?;

    let result = match cli.command {
        Commands::Serve { port, host } => serve(state.clone(), host, port, cli.quiet).await,
        Commands::Token { action } => match action {
            TokenAction::Issue {
                user_id,
                role,
                label,
            } => cli::token::issue_token(&state, user_id, role, label.as_deref(), cli.json).await,
            TokenAction::Revoke { id } => cli::token::revoke_token(&state, id, cli.json).await,
        },
    };

    state.db_pool.close().await;
    shutdown_tracing();
    result
}

async fn serve(
    state: AppState,
    host: Option<String>,
    port: Option<u16>,
    quiet: bool,
) -> anyhow::Result<()> {
    let host = host.unwrap_or_else(|| state.config.server.host.clone());
    let port = port.unwrap_or(state.config.server.port);
    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    if !quiet {
        println!(
            "  {} Workdesk API listening on {}",
            console::style("⚡").bold(),
            console::style(format!("http://{addr}")).cyan()
        );
        println!("  {}", console::style("Press Ctrl+C to stop").dim());
    }
    tracing::info!(
        %addr,
        environment = %state.config.environment,
        data_dir = %state.data_dir.display(),
        "server started"
    );

    let shutdown = CancellationToken::new();
    let sweeper = tokio::spawn(purge_expired_sessions(state.clone(), shutdown.clone()));

    let router = http::router::build_router(state);
    let served = axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    shutdown.cancel();
    if let Err(e) = sweeper.await {
        tracing::warn!(error = %e, "session sweeper did not stop cleanly");
    }

    served?;
    if !quiet {
        println!("\n  Server stopped.");
    }
    Ok(())
}

/// Periodically drop expired sessions until `shutdown` fires.
async fn purge_expired_sessions(state: AppState, shutdown: CancellationToken) {
    let mut ticker = tokio::time::interval(PURGE_INTERVAL);
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => {
                match state.sessions.purge_expired().await {
                    Ok(0) => {}
                    Ok(removed) => tracing::debug!(removed, "purged expired chat sessions"),
                    Err(e) => tracing::warn!(error = %e, "session purge failed"),
                }
            }
        }
    }
}

/// Wait for Ctrl+C or SIGTERM for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
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
    }
}
