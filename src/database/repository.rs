//! Persistence gateway seams. Every owner-scoped call filters by
//! `(id, owner)` and reports rows owned by someone else as `NotFound`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::database::manager::DatabaseError;
use crate::database::models::{
    Analytics, AuditLogEntry, AuditQuery, AuditStats, Mapping, MappingChanges, NewAuditEntry,
    NewMapping, NewReport, NewUser, Page, Report, ReportItem, ReportStats, User, UserChanges,
};

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Fails with `Conflict` when the email is already registered
    async fn create_user(&self, user: NewUser) -> Result<User, DatabaseError>;

    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>, DatabaseError>;

    /// Case-insensitive lookup
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, DatabaseError>;

    /// Applies only the supplied fields and refreshes `updated_at`
    async fn update_user(&self, id: Uuid, changes: UserChanges) -> Result<User, DatabaseError>;
}

#[async_trait]
pub trait MappingRepository: Send + Sync {
    /// A mapping created with `is_default` takes the flag from the owner's previous default
    async fn create_mapping(&self, owner: Uuid, mapping: NewMapping) -> Result<Mapping, DatabaseError>;

    async fn list_mappings(&self, owner: Uuid) -> Result<Vec<Mapping>, DatabaseError>;

    async fn find_mapping(&self, owner: Uuid, id: Uuid) -> Result<Mapping, DatabaseError>;

    async fn update_mapping(
        &self,
        owner: Uuid,
        id: Uuid,
        changes: MappingChanges,
    ) -> Result<Mapping, DatabaseError>;

    async fn delete_mapping(&self, owner: Uuid, id: Uuid) -> Result<(), DatabaseError>;

    /// Clears the flag on every other mapping of `owner` and sets it on `id`,
    /// as one transition. Nothing changes when `id` is not owned by `owner`.
    async fn set_default_mapping(&self, owner: Uuid, id: Uuid) -> Result<Mapping, DatabaseError>;
}

#[async_trait]
pub trait ReportRepository: Send + Sync {
    async fn create_report(&self, owner: Uuid, report: NewReport) -> Result<Report, DatabaseError>;

    /// Newest first, with the owner's total count
    async fn list_reports(&self, owner: Uuid, page: Page) -> Result<(Vec<Report>, i64), DatabaseError>;

    async fn find_report(&self, owner: Uuid, id: Uuid) -> Result<(Report, Vec<ReportItem>), DatabaseError>;

    async fn delete_report(&self, owner: Uuid, id: Uuid) -> Result<(), DatabaseError>;

    async fn report_stats(&self, owner: Uuid) -> Result<ReportStats, DatabaseError>;

    async fn analytics(&self, owner: Uuid) -> Result<Analytics, DatabaseError>;
}

#[async_trait]
pub trait AuditRepository: Send + Sync {
    async fn append_audit(&self, entry: NewAuditEntry) -> Result<AuditLogEntry, DatabaseError>;

    /// Newest first, with the total number of matching entries
    async fn list_audit(&self, query: &AuditQuery) -> Result<(Vec<AuditLogEntry>, i64), DatabaseError>;

    async fn audit_stats(
        &self,
        user_id: Option<Uuid>,
        since: DateTime<Utc>,
    ) -> Result<AuditStats, DatabaseError>;
}

/// Everything the HTTP layer needs from a backing store
#[async_trait]
pub trait Store: UserRepository + MappingRepository + ReportRepository + AuditRepository {
    async fn health_check(&self) -> Result<(), DatabaseError>;

    fn backend(&self) -> &'static str;
}
