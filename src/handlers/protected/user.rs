// handlers/protected/user.rs - /user/profile, /user/password, /user/stats

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use serde_json::{json, Value};

use crate::auth::{hash_in_background, verify_in_background};
use crate::database::models::{AuditAction, PublicUser, User, UserChanges};
use crate::database::DatabaseError;
use crate::error::ApiError;
use crate::handlers::or_not_found;
use crate::middleware::{ApiResponse, ApiResult, ClientInfo, Principal};
use crate::state::AppState;
use crate::validation::schemas::{parse_password_change, ProfileUpdate, PROFILE_UPDATE};

const USER_NOT_FOUND: &str = "Usuário não encontrado";

async fn current_user(state: &AppState, principal: &Principal) -> Result<User, ApiError> {
    state
        .store
        .find_user_by_id(principal.id)
        .await?
        .ok_or_else(|| ApiError::not_found(USER_NOT_FOUND))
}

/// GET /user/profile
pub async fn get_profile(
    State(state): State<AppState>,
    principal: Principal,
) -> ApiResult<PublicUser> {
    let user = current_user(&state, &principal).await?;
    Ok(ApiResponse::success(user.public()))
}

/**
 * PUT /user/profile - Change name and/or email
 *
 * Expected Input (at least one field):
 * ```json
 * { "name": "Ana Souza", "email": "ana.souza@farmacia.com" }
 * ```
 *
 * Expected Output:
 * ```json
 * { "success": true, "id": "uuid", "name": "Ana Souza", "email": "ana.souza@farmacia.com" }
 * ```
 *
 * An email already used by another account is a 409.
 */
pub async fn update_profile(
    State(state): State<AppState>,
    principal: Principal,
    client: ClientInfo,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<PublicUser> {
    let Json(body) = body?;
    let changes = PROFILE_UPDATE.parse::<ProfileUpdate>(body)?.into_changes();

    if let Some(email) = changes.email.as_deref() {
        if let Some(existing) = state.store.find_user_by_email(email).await? {
            if existing.id != principal.id {
                return Err(ApiError::conflict("Email já está em uso"));
            }
        }
    }

    let fields: Vec<&str> = [
        changes.name.as_ref().map(|_| "name"),
        changes.email.as_ref().map(|_| "email"),
    ]
    .into_iter()
    .flatten()
    .collect();

    let user = state
        .store
        .update_user(principal.id, changes)
        .await
        .map_err(|e| match e {
            DatabaseError::Conflict(_) => ApiError::conflict("Email já está em uso"),
            other => or_not_found(USER_NOT_FOUND)(other),
        })?;

    state
        .audit
        .record(Some(user.id), AuditAction::ProfileUpdated, &client, json!({ "fields": fields }))
        .await;

    Ok(ApiResponse::success(user.public()))
}

/**
 * PUT /user/password - Change the account password
 *
 * Expected Input:
 * ```json
 * { "currentPassword": "Senha@123", "newPassword": "Nova@4567", "confirmPassword": "Nova@4567" }
 * ```
 *
 * A wrong current password is a 400 and is written to the audit log.
 */
pub async fn change_password(
    State(state): State<AppState>,
    principal: Principal,
    client: ClientInfo,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Value> {
    let Json(body) = body?;
    let request = parse_password_change(body)?;

    let user = current_user(&state, &principal).await?;
    let verified =
        verify_in_background(request.current_password, Some(user.password_hash.clone())).await?;
    if !verified {
        state
            .audit
            .record(Some(user.id), AuditAction::PasswordChangeFailed, &client, json!({}))
            .await;
        return Err(ApiError::bad_request("Senha atual incorreta"));
    }

    let password_hash = hash_in_background(request.new_password).await?;

    state
        .store
        .update_user(
            user.id,
            UserChanges {
                password_hash: Some(password_hash),
                ..Default::default()
            },
        )
        .await
        .map_err(or_not_found(USER_NOT_FOUND))?;

    state
        .audit
        .record(Some(user.id), AuditAction::PasswordChanged, &client, json!({}))
        .await;

    Ok(ApiResponse::success(json!({ "message": "Senha alterada com sucesso" })))
}

/**
 * GET /user/stats - Report counters for the caller
 *
 * ```json
 * {
 *   "success": true,
 *   "totalReports": 12,
 *   "completedReports": 11,
 *   "lastLogin": "2025-01-01T12:00:00Z",
 *   "accountCreated": "2024-11-03T09:30:00Z",
 *   "totalProcessingTime": 48211
 * }
 * ```
 *
 * `lastLogin` is the account's last update time.
 */
pub async fn stats(State(state): State<AppState>, principal: Principal) -> ApiResult<Value> {
    let user = current_user(&state, &principal).await?;
    let stats = state.store.report_stats(user.id).await?;

    Ok(ApiResponse::success(json!({
        "totalReports": stats.total_reports,
        "completedReports": stats.completed_reports,
        "lastLogin": user.updated_at,
        "accountCreated": user.created_at,
        "totalProcessingTime": stats.total_processing_time_ms,
    })))
}
