use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Tracing setup shared by the edge and scoring binaries.
///
/// `RUST_LOG` wins outright when set. Otherwise the configured level
/// applies crate-wide while the chattier dependencies of this stack
/// (sqlx, hyper, reqwest) are capped at warn so request logs stay
/// readable under load.
pub fn init_tracing(service: &'static str, default_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "{default_level},sqlx=warn,hyper=warn,reqwest=warn"
        ))
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true))
        .init();

    info!(service, "Tracing initialized");
}
