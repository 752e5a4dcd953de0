/// Audit log API
use crate::{
    admin::{AuditLogEntry, Role},
    auth::AdminAuthContext,
    context::AppContext,
    error::{AppError, ErrorEnvelope},
    require_admin_role,
};
use axum::{
    extract::{rejection::QueryRejection, Query, State},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};

const DEFAULT_PAGE_SIZE: i64 = 50;
const MAX_PAGE_SIZE: i64 = 100;

/// Build audit routes
pub fn routes() -> Router<AppContext> {
    Router::new().route("/api/admin/audit-logs", get(list_audit_logs))
}

#[derive(Debug, Deserialize)]
struct ListAuditLogsQuery {
    limit: Option<i64>,
    offset: Option<i64>,
}

#[derive(Debug, Serialize)]
struct AuditLogPage {
    entries: Vec<AuditLogEntry>,
    limit: i64,
    offset: i64,
}

/// List audit entries, newest first. Requires the admin role.
async fn list_audit_logs(
    State(ctx): State<AppContext>,
    auth: AdminAuthContext,
    query: Result<Query<ListAuditLogsQuery>, QueryRejection>,
) -> Result<Json<AuditLogPage>, ErrorEnvelope> {
    require_admin_role!(auth, Role::Admin);

    let Query(query) = query
        .map_err(|_| auth.request.fail(AppError::Validation("查詢參數錯誤".to_string())))?;

    let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
    let offset = query.offset.unwrap_or(0).max(0);

    let entries = ctx
        .audit
        .list_entries(limit, offset)
        .await
        .map_err(|e| auth.request.fail(e))?;

    Ok(Json(AuditLogPage {
        entries,
        limit,
        offset,
    }))
}
