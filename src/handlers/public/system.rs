// handlers/public/system.rs - GET / and GET /health

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde_json::{json, Value};

use crate::middleware::ApiResponse;
use crate::state::AppState;

/// GET / - Service information and route overview
pub async fn root() -> ApiResponse<Value> {
    ApiResponse::success(json!({
        "name": "FarmaGenius API",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Relatórios de produção farmacêutica, mapeamentos, análises e pagamentos",
        "endpoints": {
            "public": ["/signup", "/auth/login", "/preview-excel", "/export-report", "/payment/public"],
            "user": ["/user/profile", "/user/password", "/user/stats"],
            "mappings": ["/mappings", "/mappings/:id", "/mappings/:id/default"],
            "reports": ["/reports", "/reports/:id", "/analytics"],
            "audit": ["/audit"],
            "payment": ["/payment"],
        }
    }))
}

/**
 * GET /health - Liveness plus a store round-trip
 *
 * ```json
 * { "success": true, "status": "ok", "timestamp": "...", "database": "postgres" }
 * ```
 *
 * Returns 503 with `"status": "degraded"` when the store does not answer.
 */
pub async fn health(State(state): State<AppState>) -> Response {
    let now = chrono::Utc::now();

    match state.store.health_check().await {
        Ok(()) => ApiResponse::success(json!({
            "status": "ok",
            "timestamp": now,
            "database": state.store.backend(),
        }))
        .into_response(),
        Err(e) => {
            tracing::error!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "success": false,
                    "error": "Banco de dados indisponível",
                    "code": "SERVICE_UNAVAILABLE",
                    "status": "degraded",
                    "timestamp": now,
                })),
            )
                .into_response()
        }
    }
}
