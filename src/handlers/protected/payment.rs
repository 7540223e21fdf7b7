// handlers/protected/payment.rs - POST /payment and GET /payment?id=

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::database::models::AuditAction;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, ClientInfo, Principal};
use crate::services::payment::{PaymentError, PaymentRequest};
use crate::state::AppState;
use crate::validation::schemas::PAYMENT;

/**
 * POST /payment - Start a checkout attributed to the caller
 *
 * Expected Input:
 * ```json
 * {
 *   "amount": 199.9,
 *   "description": "Plano Profissional",
 *   "planType": "professional",
 *   "customer": { "name": "Ana", "email": "ana@farmacia.com" }
 * }
 * ```
 *
 * Expected Output (201):
 * ```json
 * { "success": true, "data": { "id": "pay_123", "status": "pending", "checkoutUrl": "..." } }
 * ```
 */
pub async fn create_payment(
    State(state): State<AppState>,
    principal: Principal,
    client: ClientInfo,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Value> {
    let Json(body) = body?;
    let mut request = PAYMENT.parse::<PaymentRequest>(body)?.normalized();
    request.external_reference = Some(principal.id);

    let payment = state.payments.create_payment(&request).await?;
    tracing::info!("Payment {} created for {}", payment.id, principal.id);

    state
        .audit
        .record(
            Some(principal.id),
            AuditAction::PaymentCreated,
            &client,
            json!({ "paymentId": payment.id, "planType": payment.plan_type, "amount": payment.amount }),
        )
        .await;

    Ok(ApiResponse::created(json!({ "data": payment })))
}

#[derive(Debug, Deserialize)]
pub struct PaymentStatusQuery {
    pub id: Option<String>,
}

/// GET /payment?id= - Current provider status of one of the caller's payments
///
/// Payments started by another account, or without an account, are 404.
pub async fn payment_status(
    principal: Principal,
    State(state): State<AppState>,
    query: Result<Query<PaymentStatusQuery>, QueryRejection>,
) -> ApiResult<Value> {
    let Query(query) = query?;
    let id = query
        .id
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ApiError::bad_request("ID do pagamento é obrigatório"))?;

    let payment = state.payments.payment_status(&id).await?;
    if !payment.belongs_to(principal.id) {
        return Err(PaymentError::NotFound(id).into());
    }
    Ok(ApiResponse::success(json!({ "data": payment })))
}
