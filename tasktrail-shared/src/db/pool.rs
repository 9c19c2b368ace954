/// Database connection pool management
///
/// The pool is the only shared mutable resource in the persistence layer. Each
/// statement checks out one connection and returns it when the statement (or, for
/// transactions, the whole transaction) completes.
///
/// # Example
///
/// ```no_run
/// use tasktrail_shared::db::pool::{create_pool, DatabaseConfig, Dsn};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = DatabaseConfig {
///         dsn: Dsn::Url(std::env::var("DATABASE_URL")?),
///         max_open_connections: 10,
///         ..Default::default()
///     };
///
///     let pool = create_pool(config).await?;
///
///     let row: (i64,) = sqlx::query_as("SELECT $1")
///         .bind(42i64)
///         .fetch_one(&pool)
///         .await?;
///
///     Ok(())
/// }
/// ```

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::Serialize;
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions, PgSslMode};
use tracing::{debug, info, warn};

/// Connection parameters for a single Postgres database
#[derive(Clone, PartialEq, Eq)]
pub struct DsnParts {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
    /// One of `disable`, `allow`, `prefer`, `require`, `verify-ca`, `verify-full`
    pub ssl_mode: String,
}

impl fmt::Debug for DsnParts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DsnParts")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"***")
            .field("database", &self.database)
            .field("ssl_mode", &self.ssl_mode)
            .finish()
    }
}

/// Where to connect
#[derive(Clone, PartialEq, Eq)]
pub enum Dsn {
    /// A full `postgres://` connection URL
    Url(String),
    /// Individual connection parameters
    Parts(DsnParts),
}

impl fmt::Debug for Dsn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dsn::Url(_) => f.write_str("Dsn::Url(***)"),
            Dsn::Parts(parts) => f.debug_tuple("Dsn::Parts").field(parts).finish(),
        }
    }
}

impl Dsn {
    /// Builds sqlx connect options
    ///
    /// Parts are passed to sqlx field by field, so credentials never need URL escaping.
    pub fn connect_options(&self) -> Result<PgConnectOptions, sqlx::Error> {
        match self {
            Dsn::Url(url) => PgConnectOptions::from_str(url),
            Dsn::Parts(parts) => {
                let ssl_mode = PgSslMode::from_str(&parts.ssl_mode)?;
                Ok(PgConnectOptions::new()
                    .host(&parts.host)
                    .port(parts.port)
                    .username(&parts.user)
                    .password(&parts.password)
                    .database(&parts.database)
                    .ssl_mode(ssl_mode))
            }
        }
    }
}

/// Configuration for the database connection pool
///
/// All timeouts are specified in seconds for ease of configuration from environment variables.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub dsn: Dsn,

    /// Upper bound on open connections
    ///
    /// Default: 25
    pub max_open_connections: u32,

    /// Connections kept open while idle
    ///
    /// Default: 25. Idle connections above this count are closed after
    /// `idle_timeout_seconds`. Clamped to `max_open_connections`.
    pub max_idle_connections: u32,

    /// Timeout for acquiring a connection from the pool (seconds)
    ///
    /// Default: 30 seconds
    pub acquire_timeout_seconds: u64,

    /// How long a connection above the idle floor may stay idle (seconds)
    ///
    /// Default: Some(600)
    pub idle_timeout_seconds: Option<u64>,

    /// Maximum lifetime of a connection before forced recycling (seconds)
    ///
    /// Default: Some(300)
    pub max_lifetime_seconds: Option<u64>,

    /// Whether to ping connections before handing them out
    ///
    /// Default: true
    pub test_before_acquire: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            dsn: Dsn::Url(String::new()),
            max_open_connections: 25,
            max_idle_connections: 25,
            acquire_timeout_seconds: 30,
            idle_timeout_seconds: Some(600),
            max_lifetime_seconds: Some(300),
            test_before_acquire: true,
        }
    }
}

impl DatabaseConfig {
    /// Pool options derived from this configuration
    pub fn pool_options(&self) -> PgPoolOptions {
        let mut pool_options = PgPoolOptions::new()
            .max_connections(self.max_open_connections)
            .min_connections(self.max_idle_connections.min(self.max_open_connections))
            .acquire_timeout(Duration::from_secs(self.acquire_timeout_seconds))
            .test_before_acquire(self.test_before_acquire);

        if let Some(idle_timeout) = self.idle_timeout_seconds {
            pool_options = pool_options.idle_timeout(Duration::from_secs(idle_timeout));
            debug!(idle_timeout_seconds = idle_timeout, "Set idle timeout");
        }

        if let Some(max_lifetime) = self.max_lifetime_seconds {
            pool_options = pool_options.max_lifetime(Duration::from_secs(max_lifetime));
            debug!(max_lifetime_seconds = max_lifetime, "Set max lifetime");
        }

        pool_options
    }
}

/// Creates the pool and verifies connectivity
///
/// # Errors
///
/// Returns an error if the DSN is invalid, the database is unreachable,
/// or the health check fails.
pub async fn create_pool(config: DatabaseConfig) -> Result<PgPool, sqlx::Error> {
    info!(
        max_open_connections = config.max_open_connections,
        max_idle_connections = config.max_idle_connections,
        acquire_timeout_seconds = config.acquire_timeout_seconds,
        "Creating database connection pool"
    );

    let options = config.dsn.connect_options()?;
    let pool = config.pool_options().connect_with(options).await?;

    health_check(&pool).await?;

    info!("Database connection pool created successfully");
    Ok(pool)
}

/// Executes `SELECT 1` to verify the database is reachable
pub async fn health_check(pool: &PgPool) -> Result<(), sqlx::Error> {
    debug!("Performing database health check");

    let result: (i32,) = sqlx::query_as("SELECT 1").fetch_one(pool).await?;

    if result.0 == 1 {
        debug!("Database health check passed");
        Ok(())
    } else {
        warn!("Database health check returned unexpected value: {}", result.0);
        Err(sqlx::Error::Protocol(
            "Health check returned unexpected value".into(),
        ))
    }
}

/// Snapshot of pool usage, reported by the health endpoint
#[derive(Debug, Clone, Serialize)]
pub struct PoolStats {
    /// Number of connections currently in use
    pub active_connections: usize,

    /// Number of idle connections available
    pub idle_connections: usize,

    /// Total connections in the pool
    pub total_connections: usize,
}

pub fn get_pool_stats(pool: &PgPool) -> PoolStats {
    let size = pool.size();
    let idle = pool.num_idle();

    PoolStats {
        active_connections: (size as usize).saturating_sub(idle),
        idle_connections: idle,
        total_connections: size as usize,
    }
}

/// Gracefully closes the connection pool
pub async fn close_pool(pool: PgPool) {
    info!("Closing database connection pool");
    pool.close().await;
    info!("Database connection pool closed");
}
