// handlers/protected/reports.rs - Processed report history for the caller

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::database::models::{AuditAction, Page};
use crate::handlers::{or_not_found, Pagination};
use crate::middleware::{ApiResponse, ApiResult, ClientInfo, Principal};
use crate::state::AppState;
use crate::validation::schemas::{ReportCreate, REPORT_CREATE};

const REPORT_NOT_FOUND: &str = "Relatório não encontrado";

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/**
 * GET /reports?limit=&offset= - Caller's reports, newest first
 *
 * ```json
 * {
 *   "success": true,
 *   "reports": [{ "id": "uuid", "fileName": "janeiro.xlsx", "totalItems": 152, ... }],
 *   "pagination": { "total": 45, "limit": 20, "offset": 0, "hasMore": true }
 * }
 * ```
 */
pub async fn list(
    State(state): State<AppState>,
    principal: Principal,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> ApiResult<Value> {
    let Query(query) = query?;
    let page = Page::new(query.limit, query.offset);

    let (reports, total) = state.store.list_reports(principal.id, page).await?;
    Ok(ApiResponse::success(json!({
        "reports": reports,
        "pagination": Pagination::new(total, page.limit, page.offset),
    })))
}

/**
 * POST /reports - Store a processed spreadsheet
 *
 * Expected Input:
 * ```json
 * {
 *   "fileName": "janeiro.xlsx",
 *   "processingTimeMs": 840,
 *   "items": [{ "formNorm": "Cápsula 500mg", "quantidade": 10, "valor": 129.9, "categoria": "Cápsulas" }]
 * }
 * ```
 *
 * Totals are computed from the items. Expected Output (201): `{ "report": { ... } }`.
 */
pub async fn create(
    State(state): State<AppState>,
    principal: Principal,
    client: ClientInfo,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Value> {
    let Json(body) = body?;
    let report = REPORT_CREATE.parse::<ReportCreate>(body)?.into_new_report();

    let report = state.store.create_report(principal.id, report).await?;
    tracing::info!("Stored report {} with {} items", report.id, report.total_items);

    state
        .audit
        .record(
            Some(principal.id),
            AuditAction::ReportCreated,
            &client,
            json!({ "reportId": report.id, "fileName": report.file_name, "items": report.total_items }),
        )
        .await;

    Ok(ApiResponse::created(json!({ "report": report })))
}

/// GET /reports/:id - One report with its items
pub async fn get(
    State(state): State<AppState>,
    principal: Principal,
    id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<Value> {
    let Path(id) = id?;
    let (report, items) = state
        .store
        .find_report(principal.id, id)
        .await
        .map_err(or_not_found(REPORT_NOT_FOUND))?;

    Ok(ApiResponse::success(json!({ "report": report, "items": items })))
}

/// DELETE /reports/:id - Removes the report and its items
pub async fn delete(
    State(state): State<AppState>,
    principal: Principal,
    client: ClientInfo,
    id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<Value> {
    let Path(id) = id?;
    state
        .store
        .delete_report(principal.id, id)
        .await
        .map_err(or_not_found(REPORT_NOT_FOUND))?;

    state
        .audit
        .record(Some(principal.id), AuditAction::ReportDeleted, &client, json!({ "reportId": id }))
        .await;

    Ok(ApiResponse::success(json!({ "message": "Relatório excluído com sucesso" })))
}
