/// Audit log model
///
/// Entries are append-only: the repository exposes no update or delete, and a
/// trigger on `system_audit_log` rejects both at the storage level.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE system_audit_log (
///     id BIGSERIAL PRIMARY KEY,
///     user_id BIGINT,
///     action VARCHAR(50) NOT NULL,
///     entity_type VARCHAR(50) NOT NULL,
///     entity_id BIGINT NOT NULL,
///     entity_data JSONB,
///     ip_address VARCHAR(45),
///     user_agent TEXT,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use super::json::{self, JsonMap};
use crate::error::RepoError;

/// Verb recorded for an audited action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    Create,
    Update,
    Delete,
    UpdateStatus,
    BulkImport,
    Restore,
    HardDelete,
    Register,
    Logout,
    RoleChange,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::Create => "create",
            AuditAction::Update => "update",
            AuditAction::Delete => "delete",
            AuditAction::UpdateStatus => "update_status",
            AuditAction::BulkImport => "bulk_import",
            AuditAction::Restore => "restore",
            AuditAction::HardDelete => "hard_delete",
            AuditAction::Register => "register",
            AuditAction::Logout => "logout",
            AuditAction::RoleChange => "role_change",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who performed a request and where it came from
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestMeta {
    pub actor_id: Option<i64>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl RequestMeta {
    pub fn for_actor(actor_id: i64) -> Self {
        Self {
            actor_id: Some(actor_id),
            ..Default::default()
        }
    }
}

/// A stored audit entry
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditLog {
    pub id: i64,
    pub user_id: Option<i64>,
    pub action: String,
    pub entity_type: String,
    pub entity_id: i64,
    pub entity_data: JsonMap,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct AuditLogRow {
    id: i64,
    user_id: Option<i64>,
    action: String,
    entity_type: String,
    entity_id: i64,
    entity_data: Option<JsonValue>,
    ip_address: Option<String>,
    user_agent: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<AuditLogRow> for AuditLog {
    type Error = RepoError;

    fn try_from(row: AuditLogRow) -> Result<Self, Self::Error> {
        Ok(AuditLog {
            id: row.id,
            user_id: row.user_id,
            action: row.action,
            entity_type: row.entity_type,
            entity_id: row.entity_id,
            entity_data: json::decode("entity_data", row.entity_data)?,
            ip_address: row.ip_address,
            user_agent: row.user_agent,
            created_at: row.created_at,
        })
    }
}

/// Input for appending an audit entry
#[derive(Debug, Clone, PartialEq)]
pub struct NewAuditLog {
    pub user_id: Option<i64>,
    pub action: String,
    pub entity_type: String,
    pub entity_id: i64,
    pub entity_data: JsonMap,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

/// Turns an arbitrary snapshot into the object stored in `entity_data`
///
/// Objects are kept as they are, null becomes `{}`, anything else is wrapped
/// as `{"data": value}`.
pub fn snapshot_document(value: JsonValue) -> JsonMap {
    match value {
        JsonValue::Object(map) => map,
        JsonValue::Null => JsonMap::new(),
        other => {
            let mut wrapped = JsonMap::new();
            wrapped.insert("data".to_string(), other);
            wrapped
        }
    }
}

/// Maps an empty string to `None`
pub(crate) fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
