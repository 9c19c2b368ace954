//! # TaskTrail Shared Library
//!
//! Persistence and lifecycle layer for the TaskTrail projects/tasks backend.
//!
//! ## Module Organization
//!
//! - `db`: connection pool, migrations, execution contexts and the transaction coordinator
//! - `repository`: user, project, task, recycle-bin and audit repositories
//! - `models`: domain types, pagination and the JSON column codec
//! - `import`: all-or-nothing bulk task import
//! - `auth`: password hashing and JWT helpers
//! - `error`: execution and repository error types

pub mod auth;
pub mod db;
pub mod error;
pub mod import;
pub mod models;
pub mod repository;

pub use error::{Entity, ErrorKind, ExecError, RepoError};

/// Current version of the TaskTrail shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
