use std::sync::Arc;

use crate::auth::{JwtSessions, SessionResolver};
use crate::config::AppConfig;
use crate::database::Store;
use crate::middleware::auth::PrincipalResolver;
use crate::services::{AuditLogger, FixedWindowLimiter, HttpPaymentGateway, PaymentGateway, RateLimiter};

/// Shared handles passed to every handler
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn Store>,
    pub sessions: Arc<JwtSessions>,
    pub principals: Arc<dyn PrincipalResolver>,
    pub rate_limiter: Arc<dyn RateLimiter>,
    pub payments: Arc<dyn PaymentGateway>,
    pub audit: AuditLogger,
}

impl AppState {
    pub fn new(config: AppConfig, store: Arc<dyn Store>) -> anyhow::Result<Self> {
        let sessions = Arc::new(JwtSessions::new(&config.security)?);
        let payments = Arc::new(HttpPaymentGateway::new(&config.payment)?);
        let audit = AuditLogger::new(store.clone(), config.security.enable_audit_logging);
        let principals = Arc::new(SessionResolver::new(sessions.clone(), store.clone()));

        Ok(Self {
            config: Arc::new(config),
            store,
            principals,
            sessions,
            rate_limiter: Arc::new(FixedWindowLimiter::new()),
            payments,
            audit,
        })
    }

    pub fn with_payments(mut self, payments: Arc<dyn PaymentGateway>) -> Self {
        self.payments = payments;
        self
    }
}
