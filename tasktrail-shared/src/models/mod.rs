/// Domain models for TaskTrail
///
/// Types only; SQL lives in [`crate::repository`].
///
/// # Models
///
/// - `user`: user accounts and roles
/// - `project`: soft-deletable projects
/// - `task`: soft-deletable tasks with JSON-typed columns
/// - `recycled`: read-only projections over the recycle bin
/// - `audit_log`: append-only audit entries
/// - `pagination`: page requests and the pagination envelope
/// - `json`: the encode/decode step for JSON-typed columns

pub mod audit_log;
pub mod json;
pub mod pagination;
pub mod project;
pub mod recycled;
pub mod task;
pub mod user;

pub use audit_log::{AuditAction, AuditLog, NewAuditLog, RequestMeta};
pub use json::JsonMap;
pub use pagination::{Page, PageRequest, Pagination};
pub use project::{CreateProject, Project, ProjectDeletion, ProjectRestore};
pub use recycled::{RecycledProject, RecycledTask};
pub use task::{CreateTask, Task, TaskStatus};
pub use user::{CreateUser, User, UserRole};
