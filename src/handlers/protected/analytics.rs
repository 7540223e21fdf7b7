// handlers/protected/analytics.rs - GET /analytics

use axum::extract::State;

use crate::database::models::Analytics;
use crate::middleware::{ApiResponse, ApiResult, Principal};
use crate::state::AppState;

/**
 * GET /analytics - Totals across all of the caller's reports
 *
 * ```json
 * {
 *   "success": true,
 *   "totals": { "reports": 3, "items": 410, "quantity": 1250, "value": 48210.5 },
 *   "byCategory": [{ "key": "Cápsulas", "items": 200, "quantity": 700, "value": 30100 }],
 *   "bySeller": [{ "key": "Sem vendedor", "items": 12, "quantity": 20, "value": 890 }]
 * }
 * ```
 *
 * Items without a category are grouped under "Não mapeado"; groups are sorted
 * by value, highest first.
 */
pub async fn summary(State(state): State<AppState>, principal: Principal) -> ApiResult<Analytics> {
    let analytics = state.store.analytics(principal.id).await?;
    Ok(ApiResponse::success(analytics))
}
