use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::database::manager::DatabaseError;
use crate::database::models::{
    Analytics, AnalyticsTotals, AuditAction, AuditLogEntry, AuditQuery, AuditStats, GroupTotal,
    Mapping, MappingChanges, NewAuditEntry, NewMapping, NewReport, NewUser, Page, Report, ReportItem,
    ReportLine, ReportStats, ReportStatus, User, UserChanges,
};
use crate::database::repository::{
    AuditRepository, MappingRepository, ReportRepository, Store, UserRepository,
};

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    mappings: HashMap<Uuid, Mapping>,
    reports: HashMap<Uuid, Report>,
    report_items: HashMap<Uuid, Vec<ReportItem>>,
    audit_logs: Vec<AuditLogEntry>,
}

/// In-process store used by `serve --memory` and the test suite.
///
/// Every operation runs under a single lock, so multi-row transitions such as
/// moving the default mapping are observed atomically.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn group_totals<'a>(
    items: impl Iterator<Item = &'a ReportLine>,
    key: impl Fn(&ReportLine) -> &str,
) -> Vec<GroupTotal> {
    let mut groups: BTreeMap<String, GroupTotal> = BTreeMap::new();
    for line in items {
        let name = key(line).to_string();
        let group = groups.entry(name.clone()).or_insert_with(|| GroupTotal {
            key: name,
            items: 0,
            quantity: 0.0,
            value: 0.0,
        });
        group.items += 1;
        group.quantity += line.quantidade.unwrap_or_default();
        group.value += line.valor.unwrap_or_default();
    }

    let mut totals: Vec<GroupTotal> = groups.into_values().collect();
    totals.sort_by(|a, b| b.value.total_cmp(&a.value).then_with(|| a.key.cmp(&b.key)));
    totals
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn create_user(&self, user: NewUser) -> Result<User, DatabaseError> {
        let mut tables = self.tables.write().await;
        let email = user.email.to_lowercase();
        if tables.users.values().any(|u| u.email.to_lowercase() == email) {
            return Err(DatabaseError::Conflict("users_email_lower_key".to_string()));
        }

        let now = Utc::now();
        let created = User {
            id: Uuid::new_v4(),
            name: user.name,
            email: user.email,
            password_hash: user.password_hash,
            created_at: now,
            updated_at: now,
        };
        tables.users.insert(created.id, created.clone());
        Ok(created)
    }

    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>, DatabaseError> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, DatabaseError> {
        let email = email.to_lowercase();
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .values()
            .find(|u| u.email.to_lowercase() == email)
            .cloned())
    }

    async fn update_user(&self, id: Uuid, changes: UserChanges) -> Result<User, DatabaseError> {
        let mut tables = self.tables.write().await;
        if let Some(email) = &changes.email {
            let email = email.to_lowercase();
            if tables
                .users
                .values()
                .any(|u| u.id != id && u.email.to_lowercase() == email)
            {
                return Err(DatabaseError::Conflict("users_email_lower_key".to_string()));
            }
        }

        let user = tables.users.get_mut(&id).ok_or(DatabaseError::NotFound)?;
        if let Some(name) = changes.name {
            user.name = name;
        }
        if let Some(email) = changes.email {
            user.email = email;
        }
        if let Some(hash) = changes.password_hash {
            user.password_hash = hash;
        }
        user.updated_at = Utc::now();
        Ok(user.clone())
    }
}

#[async_trait]
impl MappingRepository for MemoryStore {
    async fn create_mapping(&self, owner: Uuid, mapping: NewMapping) -> Result<Mapping, DatabaseError> {
        let mut tables = self.tables.write().await;
        let now = Utc::now();

        if mapping.is_default {
            for existing in tables.mappings.values_mut() {
                if existing.user_id == owner && existing.is_default {
                    existing.is_default = false;
                    existing.updated_at = now;
                }
            }
        }

        let created = Mapping {
            id: Uuid::new_v4(),
            user_id: owner,
            name: mapping.name,
            description: mapping.description,
            mapping_data: mapping.mapping_data,
            is_default: mapping.is_default,
            created_at: now,
            updated_at: now,
        };
        tables.mappings.insert(created.id, created.clone());
        Ok(created)
    }

    async fn list_mappings(&self, owner: Uuid) -> Result<Vec<Mapping>, DatabaseError> {
        let tables = self.tables.read().await;
        let mut mappings: Vec<Mapping> = tables
            .mappings
            .values()
            .filter(|m| m.user_id == owner)
            .cloned()
            .collect();
        mappings.sort_by(|a, b| {
            b.is_default
                .cmp(&a.is_default)
                .then_with(|| b.created_at.cmp(&a.created_at))
        });
        Ok(mappings)
    }

    async fn find_mapping(&self, owner: Uuid, id: Uuid) -> Result<Mapping, DatabaseError> {
        let tables = self.tables.read().await;
        tables
            .mappings
            .get(&id)
            .filter(|m| m.user_id == owner)
            .cloned()
            .ok_or(DatabaseError::NotFound)
    }

    async fn update_mapping(
        &self,
        owner: Uuid,
        id: Uuid,
        changes: MappingChanges,
    ) -> Result<Mapping, DatabaseError> {
        let mut tables = self.tables.write().await;
        let mapping = tables
            .mappings
            .get_mut(&id)
            .filter(|m| m.user_id == owner)
            .ok_or(DatabaseError::NotFound)?;

        if let Some(name) = changes.name {
            mapping.name = name;
        }
        if let Some(description) = changes.description {
            mapping.description = Some(description);
        }
        if let Some(data) = changes.mapping_data {
            mapping.mapping_data = data;
        }
        mapping.updated_at = Utc::now();
        Ok(mapping.clone())
    }

    async fn delete_mapping(&self, owner: Uuid, id: Uuid) -> Result<(), DatabaseError> {
        let mut tables = self.tables.write().await;
        match tables.mappings.get(&id) {
            Some(m) if m.user_id == owner => {
                tables.mappings.remove(&id);
                Ok(())
            }
            _ => Err(DatabaseError::NotFound),
        }
    }

    async fn set_default_mapping(&self, owner: Uuid, id: Uuid) -> Result<Mapping, DatabaseError> {
        let mut tables = self.tables.write().await;
        if !tables.mappings.get(&id).is_some_and(|m| m.user_id == owner) {
            return Err(DatabaseError::NotFound);
        }

        let now = Utc::now();
        for mapping in tables.mappings.values_mut().filter(|m| m.user_id == owner) {
            let is_target = mapping.id == id;
            if mapping.is_default != is_target {
                mapping.is_default = is_target;
                mapping.updated_at = now;
            }
        }

        tables.mappings.get(&id).cloned().ok_or(DatabaseError::NotFound)
    }
}

#[async_trait]
impl ReportRepository for MemoryStore {
    async fn create_report(&self, owner: Uuid, report: NewReport) -> Result<Report, DatabaseError> {
        let created = Report {
            id: Uuid::new_v4(),
            user_id: owner,
            file_name: report.file_name.clone(),
            status: report.status.as_str().to_string(),
            total_items: report.lines.len() as i64,
            total_quantity: report.total_quantity(),
            total_value: report.total_value(),
            processing_time_ms: report.processing_time_ms,
            created_at: Utc::now(),
        };
        let items = report
            .lines
            .into_iter()
            .map(|line| ReportItem {
                id: Uuid::new_v4(),
                report_id: created.id,
                line,
            })
            .collect();

        let mut tables = self.tables.write().await;
        tables.reports.insert(created.id, created.clone());
        tables.report_items.insert(created.id, items);
        Ok(created)
    }

    async fn list_reports(&self, owner: Uuid, page: Page) -> Result<(Vec<Report>, i64), DatabaseError> {
        let tables = self.tables.read().await;
        let mut reports: Vec<&Report> = tables.reports.values().filter(|r| r.user_id == owner).collect();
        reports.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let total = reports.len() as i64;
        let window = reports
            .into_iter()
            .skip(page.offset as usize)
            .take(page.limit as usize)
            .cloned()
            .collect();
        Ok((window, total))
    }

    async fn find_report(&self, owner: Uuid, id: Uuid) -> Result<(Report, Vec<ReportItem>), DatabaseError> {
        let tables = self.tables.read().await;
        let report = tables
            .reports
            .get(&id)
            .filter(|r| r.user_id == owner)
            .cloned()
            .ok_or(DatabaseError::NotFound)?;
        let items = tables.report_items.get(&id).cloned().unwrap_or_default();
        Ok((report, items))
    }

    async fn delete_report(&self, owner: Uuid, id: Uuid) -> Result<(), DatabaseError> {
        let mut tables = self.tables.write().await;
        match tables.reports.get(&id) {
            Some(r) if r.user_id == owner => {
                tables.reports.remove(&id);
                tables.report_items.remove(&id);
                Ok(())
            }
            _ => Err(DatabaseError::NotFound),
        }
    }

    async fn report_stats(&self, owner: Uuid) -> Result<ReportStats, DatabaseError> {
        let tables = self.tables.read().await;
        let stats = tables
            .reports
            .values()
            .filter(|r| r.user_id == owner)
            .fold(ReportStats::default(), |mut stats, report| {
                stats.total_reports += 1;
                if report.status == ReportStatus::Completed.as_str() {
                    stats.completed_reports += 1;
                }
                stats.total_processing_time_ms += report.processing_time_ms;
                stats
            });
        Ok(stats)
    }

    async fn analytics(&self, owner: Uuid) -> Result<Analytics, DatabaseError> {
        let tables = self.tables.read().await;
        let owned: Vec<Uuid> = tables
            .reports
            .values()
            .filter(|r| r.user_id == owner)
            .map(|r| r.id)
            .collect();
        let lines: Vec<&ReportLine> = owned
            .iter()
            .filter_map(|id| tables.report_items.get(id))
            .flatten()
            .map(|item| &item.line)
            .collect();

        let totals = AnalyticsTotals {
            reports: owned.len() as i64,
            items: lines.len() as i64,
            quantity: lines.iter().filter_map(|l| l.quantidade).sum(),
            value: lines.iter().filter_map(|l| l.valor).sum(),
        };

        Ok(Analytics {
            totals,
            by_category: group_totals(lines.iter().copied(), ReportLine::category),
            by_seller: group_totals(lines.iter().copied(), ReportLine::seller),
        })
    }
}

#[async_trait]
impl AuditRepository for MemoryStore {
    async fn append_audit(&self, entry: NewAuditEntry) -> Result<AuditLogEntry, DatabaseError> {
        let created = AuditLogEntry {
            id: Uuid::new_v4(),
            user_id: entry.user_id,
            action: entry.action.as_str().to_string(),
            ip_address: entry.ip_address,
            user_agent: entry.user_agent,
            metadata: entry.metadata,
            created_at: Utc::now(),
        };
        self.tables.write().await.audit_logs.push(created.clone());
        Ok(created)
    }

    async fn list_audit(&self, query: &AuditQuery) -> Result<(Vec<AuditLogEntry>, i64), DatabaseError> {
        let tables = self.tables.read().await;
        // Appended in time order, so reversing gives newest first.
        let matching: Vec<&AuditLogEntry> = tables
            .audit_logs
            .iter()
            .rev()
            .filter(|e| query.matches(e))
            .collect();

        let total = matching.len() as i64;
        let window = matching
            .into_iter()
            .skip(query.offset.max(0) as usize)
            .take(query.limit.max(0) as usize)
            .cloned()
            .collect();
        Ok((window, total))
    }

    async fn audit_stats(
        &self,
        user_id: Option<Uuid>,
        since: DateTime<Utc>,
    ) -> Result<AuditStats, DatabaseError> {
        let tables = self.tables.read().await;
        let mut stats = AuditStats::default();
        for entry in tables
            .audit_logs
            .iter()
            .filter(|e| user_id.is_none() || e.user_id == user_id)
        {
            stats.total += 1;
            if entry.created_at >= since {
                stats.last24h += 1;
            }
            if AuditAction::is_suspicious(&entry.action) {
                stats.suspicious += 1;
            }
            *stats.by_action.entry(entry.action.clone()).or_insert(0) += 1;
        }
        Ok(stats)
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn health_check(&self) -> Result<(), DatabaseError> {
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}
