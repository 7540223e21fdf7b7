use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::config::RateLimitPolicy;
use crate::database::models::AuditAction;
use crate::error::ApiError;
use crate::middleware::client::ClientInfo;
use crate::state::AppState;

/// Named policy guarding one group of routes; counters are kept per scope and client
#[derive(Debug, Clone, Copy)]
pub struct RateLimitScope {
    pub name: &'static str,
    pub policy: RateLimitPolicy,
}

impl RateLimitScope {
    pub fn new(name: &'static str, policy: RateLimitPolicy) -> Self {
        Self { name, policy }
    }
}

/// Fixed-window admission check, installed with `from_fn_with_state`
pub async fn rate_limit(
    State((state, scope)): State<(AppState, RateLimitScope)>,
    request: Request,
    next: Next,
) -> Response {
    if !state.config.api.enable_rate_limiting {
        return next.run(request).await;
    }

    let client = ClientInfo::from_http(
        request.headers(),
        request.extensions(),
        state.config.security.trust_proxy_headers,
    );
    let key = format!("{}:{}", scope.name, client.ip);

    if state
        .rate_limiter
        .allow(&key, scope.policy.max_requests, scope.policy.window())
    {
        return next.run(request).await;
    }

    tracing::warn!("Rate limit exceeded for {} on {}", client.ip, scope.name);
    state
        .audit
        .record(
            None,
            AuditAction::RateLimitExceeded,
            &client,
            json!({ "scope": scope.name, "path": request.uri().path() }),
        )
        .await;

    ApiError::too_many_requests("Muitas requisições. Tente novamente mais tarde.").into_response()
}
