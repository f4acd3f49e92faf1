/// PostgreSQL connection pool
///
/// The pool is built once at startup and handed to [`super::PgStore`]. A
/// `SELECT 1` round trip runs before the pool is returned so a bad
/// `DATABASE_URL` fails the boot instead of the first request.
///
/// # Example
///
/// ```no_run
/// use twocare_shared::db::pool::{create_pool, DatabaseConfig};
///
/// # async fn example() -> Result<(), sqlx::Error> {
/// let pool = create_pool(DatabaseConfig::from_url("postgresql://localhost/twocare")).await?;
/// # Ok(())
/// # }
/// ```

use std::time::Duration;

use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::{debug, info};

/// Pool settings
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,

    pub max_connections: u32,

    /// Connections kept open while idle
    pub min_connections: u32,

    /// How long a request waits for a free connection
    pub acquire_timeout: Duration,

    /// Idle connections above `min_connections` are closed after this
    pub idle_timeout: Option<Duration>,

    /// Connections are recycled after this
    pub max_lifetime: Option<Duration>,
}

impl DatabaseConfig {
    pub fn from_url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_connections: 10,
            min_connections: 1,
            acquire_timeout: Duration::from_secs(10),
            idle_timeout: Some(Duration::from_secs(300)),
            max_lifetime: Some(Duration::from_secs(1800)),
        }
    }
}

/// Opens the pool and checks it answers
pub async fn create_pool(config: DatabaseConfig) -> Result<PgPool, sqlx::Error> {
    info!(
        max_connections = config.max_connections,
        min_connections = config.min_connections,
        "Connecting to PostgreSQL"
    );

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(config.acquire_timeout)
        .idle_timeout(config.idle_timeout)
        .max_lifetime(config.max_lifetime)
        .connect(&config.url)
        .await?;

    ping(&pool).await?;

    info!("PostgreSQL pool ready");
    Ok(pool)
}

/// One `SELECT 1` round trip
pub async fn ping(pool: &PgPool) -> Result<(), sqlx::Error> {
    debug!("Pinging database");
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_url_keeps_defaults() {
        let config = DatabaseConfig::from_url("postgresql://localhost/twocare");
        assert_eq!(config.url, "postgresql://localhost/twocare");
        assert_eq!(config.max_connections, 10);
        assert_eq!(config.acquire_timeout, Duration::from_secs(10));
        assert!(config.idle_timeout.is_some());
    }
}
