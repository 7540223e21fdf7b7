// handlers/public/payment.rs - POST /payment/public

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use serde_json::{json, Value};

use crate::database::models::AuditAction;
use crate::middleware::{ApiResponse, ApiResult, ClientInfo};
use crate::services::payment::PaymentRequest;
use crate::state::AppState;
use crate::validation::schemas::PAYMENT;

/// POST /payment/public - Checkout for visitors without an account
///
/// Same body and validation as `POST /payment`; the payment carries no
/// external reference.
pub async fn create_public_payment(
    State(state): State<AppState>,
    client: ClientInfo,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Value> {
    let Json(body) = body?;
    let request = PAYMENT.parse::<PaymentRequest>(body)?.normalized();

    let payment = state.payments.create_payment(&request).await?;

    state
        .audit
        .record(
            None,
            AuditAction::PaymentCreated,
            &client,
            json!({ "paymentId": payment.id, "planType": payment.plan_type, "public": true }),
        )
        .await;

    Ok(ApiResponse::created(json!({ "data": payment })))
}
