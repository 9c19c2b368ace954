//! Generic table access shared by every repository
//!
//! A [`Record`] describes how an entity maps onto a table or view: its column
//! list, which rows are visible, and how listings are ordered. [`Table`] runs the
//! statements that look the same for every entity (get, paged list, soft delete,
//! restore, purge) on any [`ExecutionContext`].
//!
//! Soft delete, restore and purge are conditional updates on `deleted_at`, so of
//! two concurrent attempts on one row exactly one sees an affected row.

use std::marker::PhantomData;

use sqlx::postgres::PgRow;
use sqlx::Row;
use tracing::debug;

use crate::db::context::{ExecutionContext, PgQuery};
use crate::error::{Entity, Operation, RepoError};

/// Mapping between an entity and the relation it is read from
pub trait Record: Sized + Send + Unpin + 'static {
    const ENTITY: Entity;

    /// Table or view name
    const TABLE: &'static str;

    /// Comma-separated column list selected for this entity
    const COLUMNS: &'static str;

    /// Predicate a row must satisfy to be visible through normal reads
    const VISIBLE: &'static str = "TRUE";

    /// Ordering applied by paged listings
    const ORDER_BY: &'static str = "created_at DESC, id DESC";

    fn decode(row: &PgRow) -> Result<Self, RepoError>;
}

/// Records whose table carries a nullable `deleted_at` column
pub trait SoftDeletable: Record {}

/// Optional equality filter applied on top of [`Record::VISIBLE`]
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    All,
    Int(&'static str, i64),
    Text(&'static str, String),
}

impl Filter {
    fn clause(&self) -> String {
        match self {
            Filter::All => String::new(),
            Filter::Int(column, _) | Filter::Text(column, _) => format!(" AND {column} = $1"),
        }
    }

    /// Index of the first placeholder after the filter's own
    fn next_param(&self) -> usize {
        match self {
            Filter::All => 1,
            _ => 2,
        }
    }

    fn bind<'q>(&self, query: PgQuery<'q>) -> PgQuery<'q> {
        match self {
            Filter::All => query,
            Filter::Int(_, value) => query.bind(*value),
            Filter::Text(_, value) => query.bind(value.clone()),
        }
    }
}

/// Statement runner for one record type on one execution context
pub struct Table<C, T> {
    ctx: C,
    _record: PhantomData<fn() -> T>,
}

impl<C: Clone, T> Clone for Table<C, T> {
    fn clone(&self) -> Self {
        Self {
            ctx: self.ctx.clone(),
            _record: PhantomData,
        }
    }
}

impl<C: ExecutionContext, T: Record> Table<C, T> {
    pub fn new(ctx: C) -> Self {
        Self {
            ctx,
            _record: PhantomData,
        }
    }

    pub fn context(&self) -> &C {
        &self.ctx
    }

    /// Runs a statement and decodes its first row, if any
    pub async fn fetch_optional(
        &self,
        op: Operation,
        query: PgQuery<'_>,
    ) -> Result<Option<T>, RepoError> {
        let row = self
            .ctx
            .query_one(query)
            .await
            .map_err(RepoError::storage(T::ENTITY, op))?;

        row.as_ref().map(T::decode).transpose()
    }

    /// Runs a statement that always returns a row (`INSERT .. RETURNING`)
    pub async fn fetch_returning(&self, op: Operation, query: PgQuery<'_>) -> Result<T, RepoError> {
        match self.fetch_optional(op, query).await? {
            Some(record) => Ok(record),
            None => Err(RepoError::storage(T::ENTITY, op)(sqlx::Error::RowNotFound.into())),
        }
    }

    /// Runs a statement and decodes every row
    pub async fn fetch_all(&self, op: Operation, query: PgQuery<'_>) -> Result<Vec<T>, RepoError> {
        let rows = self
            .ctx
            .query_many(query)
            .await
            .map_err(RepoError::storage(T::ENTITY, op))?;

        rows.iter().map(T::decode).collect()
    }

    /// Runs a statement and returns the affected row count
    pub async fn execute(&self, op: Operation, query: PgQuery<'_>) -> Result<u64, RepoError> {
        self.ctx
            .execute(query)
            .await
            .map_err(RepoError::storage(T::ENTITY, op))
    }

    /// Visible row by id
    pub async fn get(&self, id: i64) -> Result<T, RepoError> {
        let sql = format!(
            "SELECT {} FROM {} WHERE id = $1 AND {}",
            T::COLUMNS,
            T::TABLE,
            T::VISIBLE
        );

        self.fetch_optional(Operation::Get, sqlx::query(&sql).bind(id))
            .await?
            .ok_or_else(|| RepoError::not_found(T::ENTITY, id))
    }

    /// Counts visible rows matching `filter`
    pub async fn count(&self, filter: &Filter) -> Result<i64, RepoError> {
        let sql = format!(
            "SELECT COUNT(*) FROM {} WHERE {}{}",
            T::TABLE,
            T::VISIBLE,
            filter.clause()
        );

        let row = self
            .ctx
            .query_one(filter.bind(sqlx::query(&sql)))
            .await
            .map_err(RepoError::storage(T::ENTITY, Operation::List))?;

        match row {
            Some(row) => row
                .try_get::<i64, _>(0)
                .map_err(RepoError::decode(T::ENTITY)),
            None => Ok(0),
        }
    }

    /// One page of visible rows plus the total matching `filter`
    ///
    /// The count and the page are separate statements; wrap the call in a
    /// transaction with repeatable-read isolation for a consistent snapshot.
    pub async fn list(
        &self,
        filter: &Filter,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<T>, i64), RepoError> {
        let total = self.count(filter).await?;

        let limit_param = filter.next_param();
        let sql = format!(
            "SELECT {} FROM {} WHERE {}{} ORDER BY {} LIMIT ${} OFFSET ${}",
            T::COLUMNS,
            T::TABLE,
            T::VISIBLE,
            filter.clause(),
            T::ORDER_BY,
            limit_param,
            limit_param + 1
        );

        let query = filter.bind(sqlx::query(&sql)).bind(limit).bind(offset);
        let records = self.fetch_all(Operation::List, query).await?;

        debug!(
            entity = %T::ENTITY,
            total,
            returned = records.len(),
            limit,
            offset,
            "Listed records"
        );
        Ok((records, total))
    }

    /// Permanently removes a row regardless of soft-delete state
    pub async fn delete_row(&self, id: i64) -> Result<(), RepoError> {
        let sql = format!("DELETE FROM {} WHERE id = $1", T::TABLE);
        let affected = self
            .execute(Operation::Delete, sqlx::query(&sql).bind(id))
            .await?;

        if affected == 0 {
            return Err(RepoError::not_found(T::ENTITY, id));
        }
        Ok(())
    }
}

impl<C: ExecutionContext, T: SoftDeletable> Table<C, T> {
    /// Stamps `deleted_at` on a live row
    pub async fn soft_delete(&self, id: i64) -> Result<(), RepoError> {
        let sql = format!(
            "UPDATE {} SET deleted_at = NOW() WHERE id = $1 AND deleted_at IS NULL",
            T::TABLE
        );
        let affected = self
            .execute(Operation::Delete, sqlx::query(&sql).bind(id))
            .await?;

        if affected == 0 {
            return Err(RepoError::not_found(T::ENTITY, id));
        }
        Ok(())
    }

    /// Clears `deleted_at` on a recycled row
    pub async fn restore(&self, id: i64) -> Result<(), RepoError> {
        let sql = format!(
            "UPDATE {} SET deleted_at = NULL WHERE id = $1 AND deleted_at IS NOT NULL",
            T::TABLE
        );
        let affected = self
            .execute(Operation::Restore, sqlx::query(&sql).bind(id))
            .await?;

        if affected == 0 {
            return Err(RepoError::NotFoundInRecycleBin {
                entity: T::ENTITY,
                id,
            });
        }
        Ok(())
    }

    /// Permanently removes a recycled row; live rows are never touched
    pub async fn purge(&self, id: i64) -> Result<(), RepoError> {
        let sql = format!(
            "DELETE FROM {} WHERE id = $1 AND deleted_at IS NOT NULL",
            T::TABLE
        );
        let affected = self
            .execute(Operation::HardDelete, sqlx::query(&sql).bind(id))
            .await?;

        if affected == 0 {
            return Err(RepoError::NotFoundInRecycleBin {
                entity: T::ENTITY,
                id,
            });
        }
        Ok(())
    }
}
