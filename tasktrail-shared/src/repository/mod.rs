/// Repositories over an execution context
///
/// Every repository is generic over [`ExecutionContext`], so the same code runs
/// against the pool or inside a transaction. [`Repositories`] hands out the full
/// set from a [`Database`](crate::db::Database), a
/// [`TxCoordinator`](crate::db::TxCoordinator) or a bare context.
///
/// # Example
///
/// ```no_run
/// use tasktrail_shared::db::Database;
/// use tasktrail_shared::repository::Repositories;
///
/// # async fn example(db: Database) -> Result<(), Box<dyn std::error::Error>> {
/// // Straight on the pool
/// let (projects, total) = db.projects().list(20, 0).await?;
///
/// // Inside a transaction
/// let tx = db.begin().await?;
/// tx.tasks().update_status(7, "completed".parse()?).await?;
/// tx.commit().await?;
/// # Ok(())
/// # }
/// ```

pub mod audit;
pub mod project;
pub mod recycle_bin;
pub mod table;
pub mod task;
pub mod user;

pub use audit::AuditRepository;
pub use project::ProjectRepository;
pub use recycle_bin::RecycleBin;
pub use table::{Filter, Record, SoftDeletable, Table};
pub use task::TaskRepository;
pub use user::UserRepository;

use crate::db::context::{ExecutionContext, PoolContext, TxContext};

/// Source of repositories bound to one execution context
pub trait Repositories {
    type Context: ExecutionContext;

    fn context(&self) -> Self::Context;

    fn users(&self) -> UserRepository<Self::Context> {
        UserRepository::new(self.context())
    }

    fn projects(&self) -> ProjectRepository<Self::Context> {
        ProjectRepository::new(self.context())
    }

    fn tasks(&self) -> TaskRepository<Self::Context> {
        TaskRepository::new(self.context())
    }

    fn recycle_bin(&self) -> RecycleBin<Self::Context> {
        RecycleBin::new(self.context())
    }

    fn audit(&self) -> AuditRepository<Self::Context> {
        AuditRepository::new(self.context())
    }
}

impl Repositories for PoolContext {
    type Context = PoolContext;

    fn context(&self) -> PoolContext {
        self.clone()
    }
}

impl Repositories for TxContext {
    type Context = TxContext;

    fn context(&self) -> TxContext {
        self.clone()
    }
}
