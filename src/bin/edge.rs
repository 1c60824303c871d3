use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use tokio::signal;
use tracing::info;

use fraudgate::api::{edge_router, EdgeState, ScoringClient};
use fraudgate::audit::AuditLog;
use fraudgate::auth::password::hash_password;
use fraudgate::auth::{AuthService, JwtCodec, TokenService};
use fraudgate::config::EdgeConfig;
use fraudgate::domain::NewUser;
use fraudgate::kv::MemoryKv;
use fraudgate::observability::init_tracing;
use fraudgate::storage::{EdgeStorage, PostgresStorage};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = EdgeConfig::parse();

    init_tracing("fraudgate-edge", &config.log_level);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "Starting fraudgate edge service"
    );

    let codec = JwtCodec::new(config.jwt_secret.as_bytes())
        .map_err(|e| anyhow::anyhow!("refusing to start: {e}"))?;

    // The initial connection doubles as the datastore reachability probe.
    let postgres = Arc::new(
        PostgresStorage::connect(
            &config.database_url,
            config.db_min_connections,
            config.db_max_connections,
        )
        .await?,
    );
    postgres.run_migrations().await?;

    let storage: Arc<dyn EdgeStorage> = postgres;
    let kv = Arc::new(MemoryKv::new());

    let tokens = Arc::new(TokenService::new(
        codec,
        kv,
        storage.clone(),
        config.access_ttl(),
        config.refresh_ttl(),
    ));
    let audit = AuditLog::new(storage.clone(), config.audit_queue_capacity);
    let auth = AuthService::new(tokens, storage.clone(), audit.clone());

    seed_default_user(&config, storage.as_ref()).await?;

    let scoring = ScoringClient::new(
        &config.scoring_url,
        &config.api_key,
        config.connect_timeout(),
        config.read_timeout(),
    )?;

    let state = Arc::new(EdgeState {
        auth,
        scoring,
        audit,
    });
    let app = edge_router(state);

    let addr: SocketAddr = config.listen_addr.parse()?;
    info!(addr = %addr, "Starting HTTP server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Shutdown complete");
    Ok(())
}

/// Create the configured seed user when it does not exist yet.
async fn seed_default_user(config: &EdgeConfig, storage: &dyn EdgeStorage) -> anyhow::Result<()> {
    let (Some(username), Some(password)) = (&config.seed_username, &config.seed_password) else {
        return Ok(());
    };

    if storage.find_user_by_username(username).await?.is_some() {
        info!(user = %username, "Seed user already present");
        return Ok(());
    }

    let email = config
        .seed_email
        .clone()
        .unwrap_or_else(|| format!("{username}@localhost"));

    storage
        .create_user(&NewUser {
            username: username.clone(),
            email,
            password_hash: hash_password(password)?,
            full_name: username.clone(),
        })
        .await?;

    info!(user = %username, "Seed user created");
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
