use std::sync::Arc;

use serde_json::Value;
use uuid::Uuid;

use crate::database::models::{AuditAction, NewAuditEntry};
use crate::database::Store;
use crate::middleware::client::ClientInfo;

/// Best-effort audit trail; a failed write is logged and never fails the request
#[derive(Clone)]
pub struct AuditLogger {
    store: Arc<dyn Store>,
    enabled: bool,
}

impl AuditLogger {
    pub fn new(store: Arc<dyn Store>, enabled: bool) -> Self {
        Self { store, enabled }
    }

    pub async fn record(
        &self,
        user_id: Option<Uuid>,
        action: AuditAction,
        client: &ClientInfo,
        metadata: Value,
    ) {
        if !self.enabled {
            return;
        }

        let entry = NewAuditEntry {
            user_id,
            action,
            ip_address: Some(client.ip.clone()),
            user_agent: client.user_agent.clone(),
            metadata,
        };

        if let Err(e) = self.store.append_audit(entry).await {
            tracing::warn!("Failed to write audit entry {}: {}", action.as_str(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::{AuditFilter, AuditQuery};
    use crate::database::{AuditRepository, MemoryStore};
    use serde_json::json;

    fn client() -> ClientInfo {
        ClientInfo { ip: "10.1.1.1".into(), user_agent: Some("test".into()) }
    }

    async fn entries(store: &MemoryStore) -> i64 {
        let query = AuditQuery { filter: AuditFilter::All, user_id: None, limit: 100, offset: 0 };
        store.list_audit(&query).await.unwrap().1
    }

    #[tokio::test]
    async fn records_client_details() {
        let store = Arc::new(MemoryStore::new());
        let logger = AuditLogger::new(store.clone(), true);
        logger.record(None, AuditAction::LoginFailed, &client(), json!({"email": "x@y.z"})).await;

        let query = AuditQuery { filter: AuditFilter::Suspicious, user_id: None, limit: 10, offset: 0 };
        let (logs, _) = store.list_audit(&query).await.unwrap();
        assert_eq!(logs[0].ip_address.as_deref(), Some("10.1.1.1"));
        assert_eq!(logs[0].metadata["email"], "x@y.z");
    }

    #[tokio::test]
    async fn disabled_logger_writes_nothing() {
        let store = Arc::new(MemoryStore::new());
        AuditLogger::new(store.clone(), false)
            .record(None, AuditAction::Login, &client(), json!({}))
            .await;
        assert_eq!(entries(&store).await, 0);
    }
}
