/// Execution contexts: one query surface over a pool or an open transaction
///
/// Repository code is written once against [`ExecutionContext`] and works in
/// both modes. The variant is chosen when the repository is constructed:
///
/// - [`PoolContext`] checks a connection out of the pool for each statement
/// - [`TxContext`] runs every statement on the connection owned by one transaction
///
/// Every context carries an [`ExecScope`]. Each call races the storage future
/// against the scope's cancellation token and deadline, so a cancelled request
/// or an expired timeout aborts the in-flight statement.
///
/// # Example
///
/// ```no_run
/// use std::time::Duration;
/// use tasktrail_shared::db::context::{ExecScope, ExecutionContext, PoolContext};
///
/// # async fn example(pool: sqlx::PgPool) -> Result<(), Box<dyn std::error::Error>> {
/// let ctx = PoolContext::new(pool, ExecScope::with_timeout(Duration::from_secs(5)));
/// let row = ctx.query_one(sqlx::query("SELECT 1")).await?;
/// assert!(row.is_some());
/// # Ok(())
/// # }
/// ```

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::{PgArguments, PgPool, PgRow};
use sqlx::{Postgres, Transaction};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::ExecError;

/// A bound Postgres statement ready to run on a context
pub type PgQuery<'q> = sqlx::query::Query<'q, Postgres, PgArguments>;

/// Cancellation and deadline bound to a unit of work
#[derive(Debug, Clone)]
pub struct ExecScope {
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl Default for ExecScope {
    fn default() -> Self {
        Self {
            cancel: CancellationToken::new(),
            deadline: None,
        }
    }
}

impl ExecScope {
    /// Scope that is never cancelled and has no deadline
    pub fn new() -> Self {
        Self::default()
    }

    /// Scope whose deadline is `timeout` from now
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::default().deadline_at(Instant::now() + timeout)
    }

    pub fn deadline_at(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn cancelled_by(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Token that cancels every statement running under this scope
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Drives `fut` to completion unless the scope is cancelled or expires first
    pub(crate) async fn run<T, F>(&self, fut: F) -> Result<T, ExecError>
    where
        F: Future<Output = Result<T, sqlx::Error>> + Send,
    {
        if self.cancel.is_cancelled() {
            return Err(ExecError::Cancelled);
        }

        let bounded = async {
            match self.deadline {
                Some(deadline) => match tokio::time::timeout_at(deadline, fut).await {
                    Ok(result) => result.map_err(ExecError::from),
                    Err(_) => Err(ExecError::DeadlineExceeded),
                },
                None => fut.await.map_err(ExecError::from),
            }
        };

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                debug!("statement cancelled by execution scope");
                Err(ExecError::Cancelled)
            }
            result = bounded => result,
        }
    }
}

/// Uniform statement execution over a pooled connection or an open transaction
#[async_trait]
pub trait ExecutionContext: Clone + Send + Sync + 'static {
    /// Runs a statement and returns the number of affected rows
    async fn execute(&self, query: PgQuery<'_>) -> Result<u64, ExecError>;

    /// Runs a query and returns its first row, if any
    async fn query_one(&self, query: PgQuery<'_>) -> Result<Option<PgRow>, ExecError>;

    /// Runs a query and returns every row
    async fn query_many(&self, query: PgQuery<'_>) -> Result<Vec<PgRow>, ExecError>;

    /// Scope the context runs under
    fn scope(&self) -> &ExecScope;
}

/// Context that executes each statement on a connection checked out of the pool
#[derive(Debug, Clone)]
pub struct PoolContext {
    pool: PgPool,
    scope: ExecScope,
}

impl PoolContext {
    pub fn new(pool: PgPool, scope: ExecScope) -> Self {
        Self { pool, scope }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl ExecutionContext for PoolContext {
    async fn execute(&self, query: PgQuery<'_>) -> Result<u64, ExecError> {
        let done = self.scope.run(query.execute(&self.pool)).await?;
        Ok(done.rows_affected())
    }

    async fn query_one(&self, query: PgQuery<'_>) -> Result<Option<PgRow>, ExecError> {
        self.scope.run(query.fetch_optional(&self.pool)).await
    }

    async fn query_many(&self, query: PgQuery<'_>) -> Result<Vec<PgRow>, ExecError> {
        self.scope.run(query.fetch_all(&self.pool)).await
    }

    fn scope(&self) -> &ExecScope {
        &self.scope
    }
}

/// Context bound to one open transaction
///
/// Clones share the same transaction. Once the owning coordinator commits or
/// rolls back, every clone fails with [`ExecError::TransactionClosed`].
#[derive(Clone)]
pub struct TxContext {
    tx: Arc<Mutex<Option<Transaction<'static, Postgres>>>>,
    scope: ExecScope,
}

impl TxContext {
    pub(crate) fn new(tx: Transaction<'static, Postgres>, scope: ExecScope) -> Self {
        Self {
            tx: Arc::new(Mutex::new(Some(tx))),
            scope,
        }
    }

    /// Takes the transaction out, leaving every clone closed
    pub(crate) async fn take(&self) -> Option<Transaction<'static, Postgres>> {
        self.tx.lock().await.take()
    }

    /// Whether the transaction is still open
    ///
    /// Reports open while another task holds the lock mid-statement.
    pub fn is_open(&self) -> bool {
        match self.tx.try_lock() {
            Ok(guard) => guard.is_some(),
            Err(_) => true,
        }
    }
}

impl std::fmt::Debug for TxContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TxContext")
            .field("open", &self.is_open())
            .field("scope", &self.scope)
            .finish()
    }
}

#[async_trait]
impl ExecutionContext for TxContext {
    async fn execute(&self, query: PgQuery<'_>) -> Result<u64, ExecError> {
        let mut guard = self.tx.lock().await;
        let tx = guard.as_mut().ok_or(ExecError::TransactionClosed)?;
        let done = self.scope.run(query.execute(&mut **tx)).await?;
        Ok(done.rows_affected())
    }

    async fn query_one(&self, query: PgQuery<'_>) -> Result<Option<PgRow>, ExecError> {
        let mut guard = self.tx.lock().await;
        let tx = guard.as_mut().ok_or(ExecError::TransactionClosed)?;
        self.scope.run(query.fetch_optional(&mut **tx)).await
    }

    async fn query_many(&self, query: PgQuery<'_>) -> Result<Vec<PgRow>, ExecError> {
        let mut guard = self.tx.lock().await;
        let tx = guard.as_mut().ok_or(ExecError::TransactionClosed)?;
        self.scope.run(query.fetch_all(&mut **tx)).await
    }

    fn scope(&self) -> &ExecScope {
        &self.scope
    }
}
