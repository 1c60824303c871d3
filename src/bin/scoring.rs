use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use tokio::signal;
use tracing::info;

use fraudgate::api::{scoring_router, ScoringState};
use fraudgate::config::ScoringConfig;
use fraudgate::fraud::FraudEngine;
use fraudgate::kv::MemoryKv;
use fraudgate::observability::init_tracing;
use fraudgate::storage::{PostgresStorage, ScoringStorage};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ScoringConfig::parse();

    init_tracing("fraudgate-scoring", &config.log_level);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        budget_ms = config.rule_budget_ms,
        "Starting fraudgate scoring service"
    );

    let postgres = Arc::new(
        PostgresStorage::connect(
            &config.database_url,
            config.db_min_connections,
            config.db_max_connections,
        )
        .await?,
    );
    postgres.run_migrations().await?;

    let storage: Arc<dyn ScoringStorage> = postgres;
    let kv = Arc::new(MemoryKv::new());

    let engine = Arc::new(FraudEngine::new(kv, storage, config.rule_budget()));

    let state = Arc::new(ScoringState {
        engine,
        api_key: config.api_key.clone(),
    });
    let app = scoring_router(state);

    let addr: SocketAddr = config.listen_addr.parse()?;
    info!(addr = %addr, "Starting HTTP server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Received shutdown signal");
}
