/// Database handle and transaction coordinator
///
/// [`Database`] hands out repositories that run directly on the pool.
/// [`Database::begin`] opens a transaction and returns a [`TxCoordinator`] whose
/// repositories all run on that transaction, so a write and its audit entry
/// commit or roll back together.
///
/// # Example
///
/// ```no_run
/// use tasktrail_shared::db::Database;
/// use tasktrail_shared::models::{AuditAction, CreateProject, RequestMeta};
/// use tasktrail_shared::repository::Repositories;
/// use tasktrail_shared::error::Entity;
///
/// # async fn example(db: Database) -> Result<(), Box<dyn std::error::Error>> {
/// let meta = RequestMeta::for_actor(1);
///
/// let tx = db.begin().await?;
/// let project = tx
///     .projects()
///     .create(CreateProject {
///         name: "Alpha".into(),
///         description: "x".into(),
///         owner_id: 1,
///     })
///     .await?;
/// tx.audit()
///     .log_action(&meta, AuditAction::Create, Entity::Project, project.id, &project)
///     .await?;
/// tx.commit().await?;
/// # Ok(())
/// # }
/// ```

use std::future::Future;

use sqlx::PgPool;
use tracing::{debug, warn};

use super::context::{ExecScope, ExecutionContext, PoolContext, TxContext};
use crate::error::{ExecError, Operation, RepoError};
use crate::repository::Repositories;

/// Pool-backed entry point to the persistence layer
#[derive(Debug, Clone)]
pub struct Database {
    pool: PgPool,
    scope: ExecScope,
}

impl Database {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            scope: ExecScope::default(),
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn scope(&self) -> &ExecScope {
        &self.scope
    }

    /// Same pool, different execution scope
    pub fn with_scope(&self, scope: ExecScope) -> Self {
        Self {
            pool: self.pool.clone(),
            scope,
        }
    }

    /// Context that runs statements directly on the pool
    pub fn pool_context(&self) -> PoolContext {
        PoolContext::new(self.pool.clone(), self.scope.clone())
    }

    /// Opens a transaction under this database's scope
    pub async fn begin(&self) -> Result<TxCoordinator, RepoError> {
        let tx = self
            .scope
            .run(self.pool.begin())
            .await
            .map_err(|source| RepoError::Transaction {
                op: Operation::Begin,
                source,
            })?;

        debug!("Transaction started");
        Ok(TxCoordinator {
            ctx: TxContext::new(tx, self.scope.clone()),
        })
    }

    /// Runs `work` inside a transaction
    ///
    /// Commits when `work` returns `Ok` and rolls back when it returns `Err`.
    /// `work` may fail with any error that a [`RepoError`] converts into.
    pub async fn transaction<T, E, F, Fut>(&self, work: F) -> Result<T, E>
    where
        F: FnOnce(TxContext) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<RepoError>,
    {
        let tx = self.begin().await?;

        match work(tx.context()).await {
            Ok(value) => {
                tx.commit().await?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = tx.rollback().await {
                    warn!(error = %rollback_err, "Rollback after failed unit of work also failed");
                }
                Err(err)
            }
        }
    }

    /// Verifies the database answers under the current scope
    pub async fn ping(&self) -> Result<(), ExecError> {
        self.scope
            .run(sqlx::query("SELECT 1").execute(&self.pool))
            .await
            .map(|_| ())
    }
}

/// An open transaction and the repositories bound to it
///
/// Consumed by [`commit`](Self::commit) or [`rollback`](Self::rollback). Dropping it
/// without either rolls the transaction back and returns the connection to the
/// pool, and logs a warning.
pub struct TxCoordinator {
    ctx: TxContext,
}

impl TxCoordinator {
    pub async fn commit(self) -> Result<(), RepoError> {
        self.finish(Operation::Commit).await
    }

    pub async fn rollback(self) -> Result<(), RepoError> {
        self.finish(Operation::Rollback).await
    }

    async fn finish(&self, op: Operation) -> Result<(), RepoError> {
        let tx = self.ctx.take().await.ok_or(RepoError::Transaction {
            op,
            source: ExecError::TransactionClosed,
        })?;

        let result = match op {
            Operation::Commit => self.ctx.scope().run(tx.commit()).await,
            _ => self.ctx.scope().run(tx.rollback()).await,
        };

        result.map_err(|source| RepoError::Transaction { op, source })?;
        debug!(operation = %op, "Transaction finished");
        Ok(())
    }
}

impl Repositories for Database {
    type Context = PoolContext;

    fn context(&self) -> PoolContext {
        self.pool_context()
    }
}

impl Repositories for TxCoordinator {
    type Context = TxContext;

    fn context(&self) -> TxContext {
        self.ctx.clone()
    }
}

impl Drop for TxCoordinator {
    fn drop(&mut self) {
        if self.ctx.is_open() {
            warn!("Transaction dropped without commit or rollback; rolling back");
        }
    }
}

impl std::fmt::Debug for TxCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TxCoordinator").field("ctx", &self.ctx).finish()
    }
}
