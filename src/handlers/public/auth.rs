// handlers/public/auth.rs - POST /signup and POST /auth/login

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use serde_json::{json, Value};

use crate::auth::{hash_in_background, verify_in_background};
use crate::database::models::{AuditAction, NewUser};
use crate::database::DatabaseError;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, ClientInfo, Principal};
use crate::state::AppState;
use crate::validation::schemas::{LoginRequest, SignupRequest, LOGIN, SIGNUP};

const EMAIL_TAKEN: &str = "Email já cadastrado";

/**
 * POST /signup - Create an account
 *
 * Expected Input:
 * ```json
 * { "name": "Ana Souza", "email": "ana@farmacia.com", "password": "Senha@123" }
 * ```
 *
 * Expected Output (201):
 * ```json
 * {
 *   "success": true,
 *   "message": "Conta criada com sucesso",
 *   "user": { "id": "uuid", "name": "Ana Souza", "email": "ana@farmacia.com" }
 * }
 * ```
 *
 * Errors: 400 validation, 409 email already registered (any letter case).
 */
pub async fn signup(
    State(state): State<AppState>,
    client: ClientInfo,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Value> {
    let Json(body) = body?;
    let request = SIGNUP.parse::<SignupRequest>(body)?.normalized();

    if state.store.find_user_by_email(&request.email).await?.is_some() {
        return Err(ApiError::conflict(EMAIL_TAKEN));
    }

    let password_hash = hash_in_background(request.password).await?;

    let user = state
        .store
        .create_user(NewUser {
            name: request.name,
            email: request.email,
            password_hash,
        })
        .await
        .map_err(|e| match e {
            // Lost a race with a concurrent signup for the same address
            DatabaseError::Conflict(_) => ApiError::conflict(EMAIL_TAKEN),
            other => other.into(),
        })?;

    tracing::info!("Created account {}", user.id);
    state
        .audit
        .record(Some(user.id), AuditAction::Signup, &client, json!({ "email": user.email }))
        .await;

    Ok(ApiResponse::created(json!({
        "message": "Conta criada com sucesso",
        "user": user.public(),
    })))
}

/**
 * POST /auth/login - Exchange credentials for a session token
 *
 * Expected Input:
 * ```json
 * { "email": "ana@farmacia.com", "password": "Senha@123" }
 * ```
 *
 * Expected Output:
 * ```json
 * { "success": true, "token": "eyJhbGciOi...", "expiresIn": 604800, "user": { ... } }
 * ```
 *
 * Unknown email and wrong password answer identically (401).
 */
pub async fn login(
    State(state): State<AppState>,
    client: ClientInfo,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Value> {
    let Json(body) = body?;
    let request: LoginRequest = LOGIN.parse(body)?;
    let email = request.email.trim().to_lowercase();

    let user = state.store.find_user_by_email(&email).await?;
    let stored_hash = user.as_ref().map(|user| user.password_hash.clone());
    let verified = verify_in_background(request.password, stored_hash).await?;
    let user = user.filter(|_| verified);

    let Some(user) = user else {
        state
            .audit
            .record(None, AuditAction::LoginFailed, &client, json!({ "email": email }))
            .await;
        return Err(ApiError::unauthorized("Email ou senha inválidos"));
    };

    let principal = Principal {
        id: user.id,
        email: user.email.clone(),
        name: user.name.clone(),
    };
    let token = state.sessions.issue(&principal).map_err(|e| {
        tracing::error!("Failed to issue session token: {}", e);
        ApiError::internal_server_error()
    })?;

    state
        .audit
        .record(Some(user.id), AuditAction::Login, &client, json!({}))
        .await;

    Ok(ApiResponse::success(json!({
        "token": token,
        "expiresIn": state.sessions.expires_in_secs(),
        "user": user.public(),
    })))
}
