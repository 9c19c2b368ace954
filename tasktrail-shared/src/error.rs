//! Error types for the persistence layer
//!
//! Two layers of errors live here:
//!
//! - [`ExecError`] is what an [`ExecutionContext`](crate::db::context::ExecutionContext)
//!   returns. It separates transport failures (the storage is unreachable) from
//!   statement failures, which are passed through untouched.
//! - [`RepoError`] is what repositories return. Every storage failure is wrapped
//!   with the entity and operation it happened in, and callers branch on
//!   [`RepoError::kind`] rather than on rendered text.

use std::borrow::Cow;
use std::fmt;

use sqlx::error::{DatabaseError, ErrorKind as DbErrorKind};
use sqlx::postgres::PgDatabaseError;
use thiserror::Error;

/// Failure of a single statement issued through an execution context
#[derive(Error, Debug)]
pub enum ExecError {
    /// Storage could not be reached (I/O, TLS, protocol, pool exhaustion)
    #[error("storage unreachable: {0}")]
    Connectivity(#[source] sqlx::Error),

    /// The statement reached the server and failed there, or its result could not be decoded
    #[error(transparent)]
    Sql(sqlx::Error),

    /// The caller cancelled the execution scope before the statement finished
    #[error("statement cancelled")]
    Cancelled,

    /// The execution scope deadline passed before the statement finished
    #[error("statement deadline exceeded")]
    DeadlineExceeded,

    /// The transaction behind the context was already committed or rolled back
    #[error("transaction already finished")]
    TransactionClosed,
}

impl From<sqlx::Error> for ExecError {
    fn from(err: sqlx::Error) -> Self {
        let transport = matches!(
            err,
            sqlx::Error::Io(_)
                | sqlx::Error::Tls(_)
                | sqlx::Error::Protocol(_)
                | sqlx::Error::PoolTimedOut
                | sqlx::Error::PoolClosed
                | sqlx::Error::WorkerCrashed
        );

        if transport {
            ExecError::Connectivity(err)
        } else {
            ExecError::Sql(err)
        }
    }
}

impl ExecError {
    /// Returns the database error behind this failure, if the server produced one
    pub fn as_database_error(&self) -> Option<&(dyn sqlx::error::DatabaseError + 'static)> {
        match self {
            ExecError::Sql(sqlx::Error::Database(db)) => Some(&**db),
            _ => None,
        }
    }
}

/// Name reported to clients for a column-level violation
///
/// Prefers the column Postgres names, then the column a check constraint was
/// declared on, then the entity itself.
fn violated_field(entity: Entity, db: &(dyn DatabaseError + 'static)) -> Cow<'static, str> {
    let pg = db.try_downcast_ref::<PgDatabaseError>();
    let column = pg.and_then(PgDatabaseError::column);
    let table = pg.and_then(PgDatabaseError::table);

    match (column, db.constraint()) {
        (Some(column), _) => Cow::Owned(column.to_string()),
        (None, Some(constraint)) => Cow::Owned(constraint_column(table, constraint).to_string()),
        (None, None) => Cow::Borrowed(entity.as_str()),
    }
}

/// Column part of a default constraint name such as `tasks_status_check`
fn constraint_column<'a>(table: Option<&str>, constraint: &'a str) -> &'a str {
    let name = table
        .and_then(|table| constraint.strip_prefix(table))
        .and_then(|rest| rest.strip_prefix('_'))
        .unwrap_or(constraint);
    name.strip_suffix("_check").unwrap_or(name)
}

/// Entity a repository operation was acting on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Entity {
    User,
    Project,
    Task,
    AuditLog,
}

impl Entity {
    /// Name stored in `system_audit_log.entity_type`
    pub fn as_str(&self) -> &'static str {
        match self {
            Entity::User => "user",
            Entity::Project => "project",
            Entity::Task => "task",
            Entity::AuditLog => "audit_log",
        }
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Repository operation, used to give storage failures context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Create,
    Get,
    Update,
    UpdateStatus,
    Delete,
    List,
    Restore,
    HardDelete,
    Append,
    Begin,
    Commit,
    Rollback,
}

impl Operation {
    fn is_removal(&self) -> bool {
        matches!(self, Operation::Delete | Operation::HardDelete)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::Create => "create",
            Operation::Get => "get",
            Operation::Update => "update",
            Operation::UpdateStatus => "update status of",
            Operation::Delete => "delete",
            Operation::List => "list",
            Operation::Restore => "restore",
            Operation::HardDelete => "permanently delete",
            Operation::Append => "append",
            Operation::Begin => "begin",
            Operation::Commit => "commit",
            Operation::Rollback => "roll back",
        };
        f.write_str(name)
    }
}

/// Coarse classification callers branch on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    NotFoundInRecycleBin,
    Conflict,
    Validation,
    Connectivity,
}

/// Errors returned by repositories and the transaction coordinator
#[derive(Error, Debug)]
pub enum RepoError {
    /// Row is absent or not visible under its soft-delete state
    #[error("{entity} {key} not found")]
    NotFound { entity: Entity, key: String },

    /// Restore or hard delete targeted a row that is not in the recycle bin
    #[error("{entity} {id} not found in recycle bin")]
    NotFoundInRecycleBin { entity: Entity, id: i64 },

    /// A uniqueness or referential constraint rejected the change
    #[error("{entity} conflict: {message}")]
    Conflict { entity: Entity, message: String },

    /// Malformed input reached the repository
    #[error("invalid {field}: {message}")]
    Validation {
        field: Cow<'static, str>,
        message: String,
    },

    /// Storage failure with the operation it interrupted
    #[error("failed to {op} {entity}: {source}")]
    Storage {
        entity: Entity,
        op: Operation,
        #[source]
        source: ExecError,
    },

    /// Failure while beginning or finishing a transaction
    #[error("failed to {op} transaction: {source}")]
    Transaction {
        op: Operation,
        #[source]
        source: ExecError,
    },
}

impl RepoError {
    pub fn not_found(entity: Entity, id: i64) -> Self {
        RepoError::NotFound {
            entity,
            key: id.to_string(),
        }
    }

    pub fn validation(field: impl Into<Cow<'static, str>>, message: impl Into<String>) -> Self {
        RepoError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Returns a mapper that wraps an [`ExecError`] with entity and operation context
    ///
    /// Constraint violations reported by Postgres are promoted to `Conflict` or
    /// `Validation`; everything else becomes `Storage`.
    pub fn storage(entity: Entity, op: Operation) -> impl FnOnce(ExecError) -> RepoError {
        move |source| RepoError::classify(entity, op, source)
    }

    /// Wraps a row decoding failure
    pub(crate) fn decode(entity: Entity) -> impl FnOnce(sqlx::Error) -> RepoError {
        move |err| RepoError::Storage {
            entity,
            op: Operation::Get,
            source: ExecError::Sql(err),
        }
    }

    fn classify(entity: Entity, op: Operation, source: ExecError) -> RepoError {
        if let Some(db) = source.as_database_error() {
            let constraint = db.constraint().unwrap_or("unnamed constraint").to_string();
            match db.kind() {
                DbErrorKind::UniqueViolation => {
                    return RepoError::Conflict {
                        entity,
                        message: format!("duplicate value violates {constraint}"),
                    };
                }
                DbErrorKind::ForeignKeyViolation if op.is_removal() => {
                    return RepoError::Conflict {
                        entity,
                        message: format!("still referenced ({constraint})"),
                    };
                }
                DbErrorKind::ForeignKeyViolation => {
                    return RepoError::validation(
                        "reference",
                        format!("referenced row does not exist ({constraint})"),
                    );
                }
                DbErrorKind::NotNullViolation | DbErrorKind::CheckViolation => {
                    let message = match db.kind() {
                        DbErrorKind::CheckViolation => format!("violates {constraint}"),
                        _ => db.message().to_string(),
                    };
                    return RepoError::validation(violated_field(entity, db), message);
                }
                _ => {}
            }

            // invalid_text_representation, string_data_right_truncation
            if matches!(db.code().as_deref(), Some("22P02") | Some("22001")) {
                return RepoError::validation(violated_field(entity, db), db.message().to_string());
            }
        }

        RepoError::Storage { entity, op, source }
    }

    /// Classifies the error for callers
    pub fn kind(&self) -> ErrorKind {
        match self {
            RepoError::NotFound { .. } => ErrorKind::NotFound,
            RepoError::NotFoundInRecycleBin { .. } => ErrorKind::NotFoundInRecycleBin,
            RepoError::Conflict { .. } => ErrorKind::Conflict,
            RepoError::Validation { .. } => ErrorKind::Validation,
            RepoError::Storage { .. } | RepoError::Transaction { .. } => ErrorKind::Connectivity,
        }
    }
}
