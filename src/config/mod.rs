use std::time::Duration;

use clap::Parser;

/// Edge service configuration.
#[derive(Debug, Clone, Parser)]
#[command(name = "fraudgate-edge")]
#[command(about = "Authentication edge for the invoice fraud scoring engine")]
pub struct EdgeConfig {
    /// HTTP server listen address
    #[arg(long, default_value = "0.0.0.0:8080", env = "EDGE_LISTEN_ADDR")]
    pub listen_addr: String,

    /// PostgreSQL connection string
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: String,

    /// JWT signing secret (>= 32 bytes)
    #[arg(long, env = "JWT_SECRET", hide_env_values = true)]
    pub jwt_secret: String,

    /// Access token lifetime in milliseconds
    #[arg(long, default_value = "900000", env = "JWT_ACCESS_EXPIRATION")]
    pub jwt_access_expiration_ms: u64,

    /// Refresh token lifetime in milliseconds
    #[arg(long, default_value = "604800000", env = "JWT_REFRESH_EXPIRATION")]
    pub jwt_refresh_expiration_ms: u64,

    /// Base URL of the scoring service
    #[arg(long, default_value = "http://127.0.0.1:8081", env = "SCORING_URL")]
    pub scoring_url: String,

    /// Pre-shared key for the internal scoring call
    #[arg(long, env = "API_KEY", hide_env_values = true)]
    pub api_key: String,

    /// Connect timeout for the internal scoring call, seconds
    #[arg(long, default_value = "5", env = "SCORING_CONNECT_TIMEOUT_SECS")]
    pub connect_timeout_secs: u64,

    /// Read timeout for the internal scoring call, seconds
    #[arg(long, default_value = "10", env = "SCORING_READ_TIMEOUT_SECS")]
    pub read_timeout_secs: u64,

    /// Minimum database connections
    #[arg(long, default_value = "1", env = "DB_MIN_CONNECTIONS")]
    pub db_min_connections: u32,

    /// Maximum database connections
    #[arg(long, default_value = "30", env = "DB_MAX_CONNECTIONS")]
    pub db_max_connections: u32,

    /// Bounded audit queue capacity
    #[arg(long, default_value = "1024", env = "AUDIT_QUEUE_CAPACITY")]
    pub audit_queue_capacity: usize,

    /// Seed user created at startup when absent (optional)
    #[arg(long, env = "EDGE_SEED_USERNAME")]
    pub seed_username: Option<String>,

    /// Password for the seed user
    #[arg(long, env = "EDGE_SEED_PASSWORD", hide_env_values = true)]
    pub seed_password: Option<String>,

    /// Email for the seed user
    #[arg(long, env = "EDGE_SEED_EMAIL")]
    pub seed_email: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "RUST_LOG")]
    pub log_level: String,
}

impl EdgeConfig {
    pub fn access_ttl(&self) -> Duration {
        Duration::from_millis(self.jwt_access_expiration_ms)
    }

    pub fn refresh_ttl(&self) -> Duration {
        Duration::from_millis(self.jwt_refresh_expiration_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }
}

/// Scoring service configuration.
#[derive(Debug, Clone, Parser)]
#[command(name = "fraudgate-scoring")]
#[command(about = "Parallel multi-rule invoice fraud scoring service")]
pub struct ScoringConfig {
    /// HTTP server listen address
    #[arg(long, default_value = "0.0.0.0:8081", env = "SCORING_LISTEN_ADDR")]
    pub listen_addr: String,

    /// PostgreSQL connection string
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: String,

    /// Pre-shared key expected on inbound requests
    #[arg(long, env = "API_KEY", hide_env_values = true)]
    pub api_key: String,

    /// Wall-clock budget for the rule fan-out join, milliseconds
    #[arg(long, default_value = "150", env = "FRAUD_RULE_BUDGET_MS")]
    pub rule_budget_ms: u64,

    /// Minimum database connections
    #[arg(long, default_value = "1", env = "DB_MIN_CONNECTIONS")]
    pub db_min_connections: u32,

    /// Maximum database connections
    #[arg(long, default_value = "30", env = "DB_MAX_CONNECTIONS")]
    pub db_max_connections: u32,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "RUST_LOG")]
    pub log_level: String,
}

impl ScoringConfig {
    pub fn rule_budget(&self) -> Duration {
        Duration::from_millis(self.rule_budget_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edge_defaults() {
        let config = EdgeConfig::parse_from([
            "fraudgate-edge",
            "--database-url",
            "postgres://localhost/fraudgate",
            "--jwt-secret",
            "0123456789abcdef0123456789abcdef",
            "--api-key",
            "k",
        ]);

        assert_eq!(config.listen_addr, "0.0.0.0:8080");
        assert_eq!(config.access_ttl(), Duration::from_secs(900));
        assert_eq!(config.refresh_ttl(), Duration::from_secs(7 * 24 * 60 * 60));
        assert_eq!(config.connect_timeout(), Duration::from_secs(5));
        assert_eq!(config.read_timeout(), Duration::from_secs(10));
        assert_eq!(config.db_max_connections, 30);
    }

    #[test]
    fn test_scoring_defaults() {
        let config = ScoringConfig::parse_from([
            "fraudgate-scoring",
            "--database-url",
            "postgres://localhost/fraudgate",
            "--api-key",
            "k",
        ]);

        assert_eq!(config.listen_addr, "0.0.0.0:8081");
        assert_eq!(config.rule_budget(), Duration::from_millis(150));
    }

    #[test]
    fn test_missing_required_options_fail_parse() {
        assert!(EdgeConfig::try_parse_from(["fraudgate-edge"]).is_err());
        assert!(ScoringConfig::try_parse_from(["fraudgate-scoring"]).is_err());
    }
}
