use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

/// Actions the service writes to the audit log
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditAction {
    Signup,
    Login,
    LoginFailed,
    ProfileUpdated,
    PasswordChanged,
    PasswordChangeFailed,
    MappingCreated,
    MappingUpdated,
    MappingDeleted,
    MappingDefaultSet,
    ReportCreated,
    ReportDeleted,
    PaymentCreated,
    RateLimitExceeded,
    UnauthorizedAccess,
}

impl AuditAction {
    /// Actions flagged by the `suspicious` audit view
    pub const SUSPICIOUS: [&'static str; 4] = [
        "login_failed",
        "rate_limit_exceeded",
        "unauthorized_access",
        "password_change_failed",
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::Signup => "signup",
            AuditAction::Login => "login",
            AuditAction::LoginFailed => "login_failed",
            AuditAction::ProfileUpdated => "profile_updated",
            AuditAction::PasswordChanged => "password_changed",
            AuditAction::PasswordChangeFailed => "password_change_failed",
            AuditAction::MappingCreated => "mapping_created",
            AuditAction::MappingUpdated => "mapping_updated",
            AuditAction::MappingDeleted => "mapping_deleted",
            AuditAction::MappingDefaultSet => "mapping_default_set",
            AuditAction::ReportCreated => "report_created",
            AuditAction::ReportDeleted => "report_deleted",
            AuditAction::PaymentCreated => "payment_created",
            AuditAction::RateLimitExceeded => "rate_limit_exceeded",
            AuditAction::UnauthorizedAccess => "unauthorized_access",
        }
    }

    pub fn is_suspicious(action: &str) -> bool {
        Self::SUSPICIOUS.contains(&action)
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct AuditLogEntry {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub action: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub metadata: Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewAuditEntry {
    pub user_id: Option<Uuid>,
    pub action: AuditAction,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub metadata: Value,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuditFilter {
    All,
    Suspicious,
    Action(String),
}

#[derive(Debug, Clone)]
pub struct AuditQuery {
    pub filter: AuditFilter,
    pub user_id: Option<Uuid>,
    pub limit: i64,
    pub offset: i64,
}

impl AuditQuery {
    pub fn matches(&self, entry: &AuditLogEntry) -> bool {
        if let Some(user_id) = self.user_id {
            if entry.user_id != Some(user_id) {
                return false;
            }
        }
        match &self.filter {
            AuditFilter::All => true,
            AuditFilter::Suspicious => AuditAction::is_suspicious(&entry.action),
            AuditFilter::Action(action) => &entry.action == action,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AuditStats {
    pub total: i64,
    pub last24h: i64,
    pub suspicious: i64,
    pub by_action: BTreeMap<String, i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(action: &str, user_id: Option<Uuid>) -> AuditLogEntry {
        AuditLogEntry {
            id: Uuid::new_v4(),
            user_id,
            action: action.to_string(),
            ip_address: None,
            user_agent: None,
            metadata: Value::Null,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn suspicious_filter_uses_the_fixed_action_set() {
        let query = AuditQuery { filter: AuditFilter::Suspicious, user_id: None, limit: 10, offset: 0 };
        assert!(query.matches(&entry("login_failed", None)));
        assert!(!query.matches(&entry("login", None)));
    }

    #[test]
    fn user_filter_applies_to_every_view() {
        let owner = Uuid::new_v4();
        let query = AuditQuery {
            filter: AuditFilter::Action("signup".into()),
            user_id: Some(owner),
            limit: 10,
            offset: 0,
        };
        assert!(query.matches(&entry("signup", Some(owner))));
        assert!(!query.matches(&entry("signup", Some(Uuid::new_v4()))));
        assert!(!query.matches(&entry("login", Some(owner))));
    }
}
