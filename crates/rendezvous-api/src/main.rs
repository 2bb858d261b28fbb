//! Rendezvous server entry point.
//!
//! Binary name: `rendezvous`
//!
//! Parses CLI arguments, loads configuration, opens the database, wires the
//! services and serves the HTTP and WebSocket API until a shutdown signal.

mod cli;
mod http;
mod state;

use clap::Parser;

use cli::{Cli, Commands};
use rendezvous_infra::config::{database_url, load_config, resolve_data_dir};
use rendezvous_infra::sqlite::pool::DatabasePool;
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    rendezvous_observe::tracing_setup::init_tracing(cli.otel, cli.log_directive())
        .map_err(|e| anyhow::anyhow!("failed to initialize tracing: {e}"))?;

    let result = run(cli).await;

    rendezvous_observe::tracing_setup::shutdown_tracing();
    result
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let data_dir = resolve_data_dir();
    tokio::fs::create_dir_all(&data_dir).await?;

    let mut config = load_config(&data_dir).await;

    match cli.command {
        Commands::Serve { port, host } => {
            if let Some(port) = port {
                config.server.port = port;
            }
            if let Some(host) = host {
                config.server.host = host;
            }

            let db_url = database_url(&config, &data_dir);
            let db_pool = DatabasePool::new(&db_url).await?;
            tracing::info!(database = %db_url, "database ready");

            let addr = format!("{}:{}", config.server.host, config.server.port);
            let state = AppState::new(config, db_pool)?;
            let sessions = state.sessions.clone();

            let listener = tokio::net::TcpListener::bind(&addr).await?;
            tracing::info!(%addr, "Rendezvous listening");

            let router = http::router::build_router(state);

            axum::serve(listener, router)
                .with_graceful_shutdown(async move {
                    shutdown_signal().await;
                    let closed = sessions.shutdown();
                    tracing::info!(connections = closed, "shutdown signal received");
                })
                .await?;

            tracing::info!("server stopped");
        }
    }

    Ok(())
}

/// Wait for Ctrl+C, SIGTERM or SIGQUIT.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
        let mut sigquit = signal(SignalKind::quit()).expect("failed to install SIGQUIT handler");
        tokio::select! {
            _ = sigterm.recv() => {},
            _ = sigquit.recv() => {},
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
