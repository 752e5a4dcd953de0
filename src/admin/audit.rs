/// Admin audit logging
use crate::{
    error::{AppError, AppResult},
    metrics,
    request::RequestContext,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::{Row, SqlitePool};

/// Action names recorded in the audit log
pub mod actions {
    pub const LOGIN: &str = "LOGIN";
    pub const LOGOUT: &str = "LOGOUT";
}

/// Target types recorded in the audit log
pub mod targets {
    pub const ADMIN: &str = "ADMIN";
}

/// Request details captured with an audit entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditRequestContext {
    pub request_id: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

/// Admin action audit log entry
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditLogEntry {
    pub id: i64,
    pub actor_id: String,
    pub action: String,
    pub target_type: String,
    pub target_id: Option<String>,
    pub metadata: Value,
    pub request_context: AuditRequestContext,
    pub timestamp: DateTime<Utc>,
}

/// An action about to be recorded
#[derive(Debug, Clone)]
pub struct NewAuditEntry<'a> {
    pub actor_id: &'a str,
    pub action: &'a str,
    pub target_type: &'a str,
    pub target_id: Option<&'a str>,
    pub metadata: Value,
}

/// Append-only writer and reader for `admin_audit_log`
#[derive(Clone)]
pub struct AuditLogger {
    db: SqlitePool,
}

impl AuditLogger {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Record an administrative action.
    ///
    /// The action has already happened by the time this is called, so a failed
    /// write is logged and counted but never surfaced to the caller.
    pub async fn create_audit_log(&self, entry: NewAuditEntry<'_>, request: &RequestContext) {
        match self.insert(&entry, request).await {
            Ok(id) => {
                metrics::record_audit_write("ok");
                tracing::info!(
                    request_id = %request.request_id,
                    audit_id = id,
                    actor_id = %entry.actor_id,
                    action = %entry.action,
                    target_type = %entry.target_type,
                    "Audit entry recorded"
                );
            }
            Err(e) => {
                metrics::record_audit_write("failed");
                tracing::error!(
                    request_id = %request.request_id,
                    actor_id = %entry.actor_id,
                    action = %entry.action,
                    error = %e,
                    "Failed to write audit entry"
                );
            }
        }
    }

    async fn insert(&self, entry: &NewAuditEntry<'_>, request: &RequestContext) -> AppResult<i64> {
        let metadata = serde_json::to_string(&entry.metadata)
            .map_err(|e| AppError::Internal(format!("Unserializable audit metadata: {}", e)))?;

        let result = sqlx::query(
            r#"
            INSERT INTO admin_audit_log
                (actor_id, action, target_type, target_id, metadata, request_id, ip_address, user_agent, timestamp)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(entry.actor_id)
        .bind(entry.action)
        .bind(entry.target_type)
        .bind(entry.target_id)
        .bind(metadata)
        .bind(&request.request_id)
        .bind(&request.ip_address)
        .bind(&request.user_agent)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.db)
        .await?;

        Ok(result.last_insert_rowid())
    }

    /// List entries, newest first
    pub async fn list_entries(&self, limit: i64, offset: i64) -> AppResult<Vec<AuditLogEntry>> {
        let rows = sqlx::query(
            r#"
            SELECT id, actor_id, action, target_type, target_id, metadata,
                   request_id, ip_address, user_agent, timestamp
            FROM admin_audit_log
            ORDER BY id DESC
            LIMIT ?1 OFFSET ?2
            "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.db)
        .await?;

        let mut entries = Vec::with_capacity(rows.len());
        for row in rows {
            let timestamp_str: String = row.get("timestamp");
            let timestamp = DateTime::parse_from_rfc3339(&timestamp_str)
                .map_err(|e| AppError::Internal(format!("Invalid timestamp: {}", e)))?
                .with_timezone(&Utc);

            let metadata_str: String = row.get("metadata");
            let metadata = serde_json::from_str(&metadata_str).unwrap_or(Value::Null);

            entries.push(AuditLogEntry {
                id: row.get("id"),
                actor_id: row.get("actor_id"),
                action: row.get("action"),
                target_type: row.get("target_type"),
                target_id: row.get("target_id"),
                metadata,
                request_context: AuditRequestContext {
                    request_id: row.get("request_id"),
                    ip_address: row.get("ip_address"),
                    user_agent: row.get("user_agent"),
                },
                timestamp,
            });
        }

        Ok(entries)
    }

    /// Number of entries recorded for an action
    pub async fn count_action(&self, action: &str) -> AppResult<i64> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM admin_audit_log WHERE action = ?1")
            .bind(action)
            .fetch_one(&self.db)
            .await?;
        Ok(count)
    }
}
