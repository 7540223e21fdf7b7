// handlers/protected/audit.rs - GET /audit

use axum::extract::{rejection::QueryRejection, Query, State};
use chrono::{Duration, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::database::models::{AuditFilter, AuditQuery};
use crate::error::ApiError;
use crate::handlers::Pagination;
use crate::middleware::{ApiResponse, ApiResult, Principal};
use crate::state::AppState;

const DEFAULT_LIMIT: i64 = 50;
const MAX_LIMIT: i64 = 100;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditParams {
    #[serde(rename = "type")]
    pub view: Option<String>,
    pub action: Option<String>,
    pub user_id: Option<Uuid>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

enum AuditView {
    List(AuditFilter),
    Stats,
}

impl AuditParams {
    fn view(&self) -> Result<AuditView, ApiError> {
        match self.view.as_deref().unwrap_or("all") {
            "all" => Ok(AuditView::List(AuditFilter::All)),
            "suspicious" => Ok(AuditView::List(AuditFilter::Suspicious)),
            "by-action" => self
                .action
                .as_deref()
                .map(str::trim)
                .filter(|a| !a.is_empty())
                .map(|a| AuditView::List(AuditFilter::Action(a.to_string())))
                .ok_or_else(|| ApiError::bad_request("Parâmetro action é obrigatório")),
            "stats" => Ok(AuditView::Stats),
            _ => Err(ApiError::bad_request("Tipo de consulta inválido")),
        }
    }

    fn query(&self, filter: AuditFilter) -> AuditQuery {
        AuditQuery {
            filter,
            user_id: self.user_id,
            limit: self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT),
            offset: self.offset.unwrap_or(0).max(0),
        }
    }
}

/**
 * GET /audit?type=all|suspicious|by-action|stats&action=&userId=&limit=&offset=
 *
 * Listing views:
 * ```json
 * {
 *   "success": true,
 *   "logs": [{ "id": "uuid", "action": "login_failed", "ipAddress": "10.0.0.1", ... }],
 *   "pagination": { "total": 3, "limit": 50, "offset": 0, "hasMore": false }
 * }
 * ```
 *
 * `type=stats`:
 * ```json
 * { "success": true, "stats": { "total": 120, "last24h": 8, "suspicious": 2, "byAction": { "login": 40 } } }
 * ```
 *
 * Callers outside `security.audit_admins` only ever see their own entries;
 * their `userId` parameter is replaced with their own id.
 */
pub async fn query(
    principal: Principal,
    State(state): State<AppState>,
    params: Result<Query<AuditParams>, QueryRejection>,
) -> ApiResult<Value> {
    let Query(mut params) = params?;
    if !state.config.security.is_audit_admin(&principal.email) {
        params.user_id = Some(principal.id);
    }

    match params.view()? {
        AuditView::Stats => {
            let since = Utc::now() - Duration::hours(24);
            let stats = state.store.audit_stats(params.user_id, since).await?;
            Ok(ApiResponse::success(json!({ "stats": stats })))
        }
        AuditView::List(filter) => {
            let query = params.query(filter);
            let (logs, total) = state.store.list_audit(&query).await?;
            Ok(ApiResponse::success(json!({
                "logs": logs,
                "pagination": Pagination::new(total, query.limit, query.offset),
            })))
        }
    }
}
