/// Database layer for TaskTrail
///
/// # Modules
///
/// - `pool`: PostgreSQL connection pool management with health checks
/// - `migrations`: embedded schema migrations
/// - `context`: the [`ExecutionContext`](context::ExecutionContext) abstraction over
///   a pooled connection or an open transaction
/// - `database`: the [`Database`] handle and the [`TxCoordinator`]
///
/// # Example
///
/// ```no_run
/// use tasktrail_shared::db::pool::{create_pool, DatabaseConfig, Dsn};
/// use tasktrail_shared::db::Database;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = DatabaseConfig {
///         dsn: Dsn::Url(std::env::var("DATABASE_URL")?),
///         ..Default::default()
///     };
///
///     let db = Database::new(create_pool(config).await?);
///     db.ping().await?;
///     Ok(())
/// }
/// ```

pub mod context;
pub mod database;
pub mod migrations;
pub mod pool;

pub use context::{ExecScope, ExecutionContext, PoolContext, TxContext};
pub use database::{Database, TxCoordinator};
