use std::convert::Infallible;
use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, FromRef, FromRequestParts},
    http::{header::USER_AGENT, request::Parts, Extensions, HeaderMap},
};

use crate::state::AppState;

/// Caller address and agent, as recorded in audit entries and used as the rate-limit key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientInfo {
    pub ip: String,
    pub user_agent: Option<String>,
}

impl ClientInfo {
    /// First `X-Forwarded-For` hop, else `X-Real-IP`, else the socket peer, else `"unknown"`.
    /// The proxy headers are ignored unless `trust_proxy` is set.
    pub fn from_http(headers: &HeaderMap, extensions: &Extensions, trust_proxy: bool) -> Self {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
        };

        let forwarded = || {
            header("x-forwarded-for")
                .and_then(|v| v.split(',').next())
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .or_else(|| header("x-real-ip"))
        };

        let ip = trust_proxy
            .then(forwarded)
            .flatten()
            .map(str::to_string)
            .or_else(|| {
                extensions
                    .get::<ConnectInfo<SocketAddr>>()
                    .map(|ConnectInfo(addr)| addr.ip().to_string())
            })
            .unwrap_or_else(|| "unknown".to_string());

        let user_agent = headers
            .get(USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        Self { ip, user_agent }
    }
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for ClientInfo
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let state = AppState::from_ref(state);
        Ok(Self::from_http(
            &parts.headers,
            &parts.extensions,
            state.config.security.trust_proxy_headers,
        ))
    }
}
