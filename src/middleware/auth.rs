use async_trait::async_trait;
use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};
use serde_json::json;
use uuid::Uuid;

use crate::database::models::AuditAction;
use crate::error::ApiError;
use crate::middleware::client::ClientInfo;
use crate::state::AppState;

/// Authenticated account attached to a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub id: Uuid,
    pub email: String,
    pub name: String,
}

/// Turns a session token into a principal. No side effects.
#[async_trait]
pub trait PrincipalResolver: Send + Sync {
    async fn resolve(&self, token: &str) -> Option<Principal>;
}

/// Requiring `Principal` in a handler signature rejects unauthenticated
/// requests with 401 before the handler body (and the store) is reached.
#[axum::async_trait]
impl<S> FromRequestParts<S> for Principal
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let state = AppState::from_ref(state);

        if !parts.headers.contains_key(AUTHORIZATION) {
            return Err(ApiError::unauthorized("Não autorizado"));
        }

        if let Some(token) = bearer_token(&parts.headers) {
            if let Some(principal) = state.principals.resolve(token).await {
                return Ok(principal);
            }
        }

        let client = ClientInfo::from_http(
            &parts.headers,
            &parts.extensions,
            state.config.security.trust_proxy_headers,
        );
        state
            .audit
            .record(
                None,
                AuditAction::UnauthorizedAccess,
                &client,
                json!({ "path": parts.uri.path(), "method": parts.method.as_str() }),
            )
            .await;

        Err(ApiError::unauthorized("Sessão inválida ou expirada"))
    }
}

fn extract_bearer(value: &str) -> Option<&str> {
    value.strip_prefix("Bearer ").map(str::trim)
}

/// Bearer token from the Authorization header, if any
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()
        .and_then(extract_bearer)
        .filter(|token| !token.is_empty())
}
