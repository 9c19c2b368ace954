//! Audit log repository
//!
//! Append and read only. Callers decide what is worth recording and which
//! snapshot to attach; this repository enforces nothing beyond the storage
//! contract.

use serde::Serialize;
use sqlx::postgres::PgRow;
use sqlx::FromRow;
use tracing::debug;

use super::table::{Filter, Record, Table};
use crate::db::context::ExecutionContext;
use crate::error::{Entity, Operation, RepoError};
use crate::models::audit_log::{
    non_empty, snapshot_document, AuditAction, AuditLog, AuditLogRow, NewAuditLog, RequestMeta,
};
use crate::models::json;

const AUDIT_COLUMNS: &str =
    "id, user_id, action, entity_type, entity_id, entity_data, ip_address, user_agent, created_at";

impl Record for AuditLog {
    const ENTITY: Entity = Entity::AuditLog;
    const TABLE: &'static str = "system_audit_log";
    const COLUMNS: &'static str = AUDIT_COLUMNS;

    fn decode(row: &PgRow) -> Result<Self, RepoError> {
        AuditLogRow::from_row(row)
            .map_err(RepoError::decode(Entity::AuditLog))?
            .try_into()
    }
}

#[derive(Clone)]
pub struct AuditRepository<C> {
    table: Table<C, AuditLog>,
}

impl<C: ExecutionContext> AuditRepository<C> {
    pub fn new(ctx: C) -> Self {
        Self {
            table: Table::new(ctx),
        }
    }

    /// Records `action` on `entity` with a serialized snapshot
    pub async fn log_action<S>(
        &self,
        meta: &RequestMeta,
        action: AuditAction,
        entity: Entity,
        entity_id: i64,
        snapshot: &S,
    ) -> Result<AuditLog, RepoError>
    where
        S: Serialize + ?Sized + Sync,
    {
        let entity_data = snapshot_document(json::encode("entity_data", &snapshot)?);

        self.record(NewAuditLog {
            user_id: meta.actor_id,
            action: action.as_str().to_string(),
            entity_type: entity.as_str().to_string(),
            entity_id,
            entity_data,
            ip_address: non_empty(meta.ip_address.as_deref()),
            user_agent: non_empty(meta.user_agent.as_deref()),
        })
        .await
    }

    /// Appends one entry
    pub async fn record(&self, entry: NewAuditLog) -> Result<AuditLog, RepoError> {
        let sql = format!(
            "INSERT INTO system_audit_log
                (user_id, action, entity_type, entity_id, entity_data, ip_address, user_agent)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING {AUDIT_COLUMNS}"
        );
        let entity_data = serde_json::Value::Object(entry.entity_data);
        let query = sqlx::query(&sql)
            .bind(entry.user_id)
            .bind(entry.action)
            .bind(entry.entity_type)
            .bind(entry.entity_id)
            .bind(entity_data)
            .bind(entry.ip_address)
            .bind(entry.user_agent);

        let log = self.table.fetch_returning(Operation::Append, query).await?;
        debug!(
            audit_id = log.id,
            action = %log.action,
            entity_type = %log.entity_type,
            entity_id = log.entity_id,
            "Audit entry recorded"
        );
        Ok(log)
    }

    /// Entries, newest first
    pub async fn list(&self, limit: i64, offset: i64) -> Result<(Vec<AuditLog>, i64), RepoError> {
        self.table.list(&Filter::All, limit, offset).await
    }

    /// Entries about one entity, newest first
    pub async fn list_for_entity(
        &self,
        entity: Entity,
        entity_id: i64,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<AuditLog>, RepoError> {
        let sql = format!(
            "SELECT {AUDIT_COLUMNS} FROM system_audit_log
             WHERE entity_type = $1 AND entity_id = $2
             ORDER BY created_at DESC, id DESC
             LIMIT $3 OFFSET $4"
        );
        let query = sqlx::query(&sql)
            .bind(entity.as_str())
            .bind(entity_id)
            .bind(limit)
            .bind(offset);

        self.table.fetch_all(Operation::List, query).await
    }
}
