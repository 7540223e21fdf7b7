use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{types::Json, FromRow, PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::database::manager::{DatabaseError, DatabaseManager};
use crate::database::models::{
    Analytics, AnalyticsTotals, AuditAction, AuditFilter, AuditLogEntry, AuditQuery, AuditStats,
    GroupTotal, Mapping, MappingChanges, NewAuditEntry, NewMapping, NewReport, NewUser, Page, Report,
    ReportItem, ReportLine, ReportStats, User, UserChanges, UNASSIGNED_SELLER, UNMAPPED_CATEGORY,
};
use crate::database::repository::{
    AuditRepository, MappingRepository, ReportRepository, Store, UserRepository,
};

const USER_COLUMNS: &str = "id, name, email, password_hash, created_at, updated_at";
const MAPPING_COLUMNS: &str =
    "id, user_id, name, description, mapping_data, is_default, created_at, updated_at";
const REPORT_COLUMNS: &str = "id, user_id, file_name, status, total_items, total_quantity, \
     total_value, processing_time_ms, created_at";
const AUDIT_COLUMNS: &str = "id, user_id, action, ip_address, user_agent, metadata, created_at";

/// Postgres-backed store over a shared pool
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Serialises default-flag transitions per owner until the transaction ends
    async fn lock_owner(tx: &mut Transaction<'_, Postgres>, owner: Uuid) -> Result<(), DatabaseError> {
        sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
            .bind(format!("mappings:{}", owner))
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    async fn clear_default(
        tx: &mut Transaction<'_, Postgres>,
        owner: Uuid,
        keep: Option<Uuid>,
    ) -> Result<(), DatabaseError> {
        sqlx::query(
            "UPDATE mappings SET is_default = FALSE, updated_at = NOW() \
             WHERE user_id = $1 AND is_default AND ($2::uuid IS NULL OR id <> $2)",
        )
        .bind(owner)
        .bind(keep)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }
}

#[derive(FromRow)]
struct MappingRow {
    id: Uuid,
    user_id: Uuid,
    name: String,
    description: Option<String>,
    mapping_data: Json<BTreeMap<String, String>>,
    is_default: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<MappingRow> for Mapping {
    fn from(row: MappingRow) -> Self {
        Mapping {
            id: row.id,
            user_id: row.user_id,
            name: row.name,
            description: row.description,
            mapping_data: row.mapping_data.0,
            is_default: row.is_default,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(FromRow)]
struct ReportItemRow {
    id: Uuid,
    report_id: Uuid,
    form_norm: Option<String>,
    descricao: Option<String>,
    vendedor: Option<String>,
    data: Option<String>,
    quantidade: Option<f64>,
    valor: Option<f64>,
    cliente: Option<String>,
    categoria: Option<String>,
}

impl From<ReportItemRow> for ReportItem {
    fn from(row: ReportItemRow) -> Self {
        ReportItem {
            id: row.id,
            report_id: row.report_id,
            line: ReportLine {
                form_norm: row.form_norm,
                descricao: row.descricao,
                vendedor: row.vendedor,
                data: row.data,
                quantidade: row.quantidade,
                valor: row.valor,
                cliente: row.cliente,
                categoria: row.categoria,
            },
        }
    }
}

fn suspicious_actions() -> Vec<String> {
    AuditAction::SUSPICIOUS.iter().map(|a| a.to_string()).collect()
}

#[async_trait]
impl UserRepository for PgStore {
    async fn create_user(&self, user: NewUser) -> Result<User, DatabaseError> {
        let sql = format!(
            "INSERT INTO users (id, name, email, password_hash) VALUES ($1, $2, $3, $4) RETURNING {}",
            USER_COLUMNS
        );
        let row = sqlx::query_as::<_, User>(&sql)
            .bind(Uuid::new_v4())
            .bind(&user.name)
            .bind(&user.email)
            .bind(&user.password_hash)
            .fetch_one(&self.pool)
            .await?;
        Ok(row)
    }

    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>, DatabaseError> {
        let sql = format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS);
        let row = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, DatabaseError> {
        let sql = format!("SELECT {} FROM users WHERE lower(email) = lower($1)", USER_COLUMNS);
        let row = sqlx::query_as::<_, User>(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn update_user(&self, id: Uuid, changes: UserChanges) -> Result<User, DatabaseError> {
        let sql = format!(
            "UPDATE users SET name = COALESCE($2, name), email = COALESCE($3, email), \
             password_hash = COALESCE($4, password_hash), updated_at = NOW() \
             WHERE id = $1 RETURNING {}",
            USER_COLUMNS
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .bind(changes.name)
            .bind(changes.email)
            .bind(changes.password_hash)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(DatabaseError::NotFound)
    }
}

#[async_trait]
impl MappingRepository for PgStore {
    async fn create_mapping(&self, owner: Uuid, mapping: NewMapping) -> Result<Mapping, DatabaseError> {
        let mut tx = self.pool.begin().await?;
        if mapping.is_default {
            Self::lock_owner(&mut tx, owner).await?;
            Self::clear_default(&mut tx, owner, None).await?;
        }

        let sql = format!(
            "INSERT INTO mappings (id, user_id, name, description, mapping_data, is_default) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {}",
            MAPPING_COLUMNS
        );
        let row = sqlx::query_as::<_, MappingRow>(&sql)
            .bind(Uuid::new_v4())
            .bind(owner)
            .bind(&mapping.name)
            .bind(&mapping.description)
            .bind(Json(&mapping.mapping_data))
            .bind(mapping.is_default)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(row.into())
    }

    async fn list_mappings(&self, owner: Uuid) -> Result<Vec<Mapping>, DatabaseError> {
        let sql = format!(
            "SELECT {} FROM mappings WHERE user_id = $1 ORDER BY is_default DESC, created_at DESC",
            MAPPING_COLUMNS
        );
        let rows = sqlx::query_as::<_, MappingRow>(&sql)
            .bind(owner)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Mapping::from).collect())
    }

    async fn find_mapping(&self, owner: Uuid, id: Uuid) -> Result<Mapping, DatabaseError> {
        let sql = format!("SELECT {} FROM mappings WHERE id = $1 AND user_id = $2", MAPPING_COLUMNS);
        sqlx::query_as::<_, MappingRow>(&sql)
            .bind(id)
            .bind(owner)
            .fetch_optional(&self.pool)
            .await?
            .map(Mapping::from)
            .ok_or(DatabaseError::NotFound)
    }

    async fn update_mapping(
        &self,
        owner: Uuid,
        id: Uuid,
        changes: MappingChanges,
    ) -> Result<Mapping, DatabaseError> {
        let sql = format!(
            "UPDATE mappings SET name = COALESCE($3, name), description = COALESCE($4, description), \
             mapping_data = COALESCE($5, mapping_data), updated_at = NOW() \
             WHERE id = $1 AND user_id = $2 RETURNING {}",
            MAPPING_COLUMNS
        );
        sqlx::query_as::<_, MappingRow>(&sql)
            .bind(id)
            .bind(owner)
            .bind(changes.name)
            .bind(changes.description)
            .bind(changes.mapping_data.map(Json))
            .fetch_optional(&self.pool)
            .await?
            .map(Mapping::from)
            .ok_or(DatabaseError::NotFound)
    }

    async fn delete_mapping(&self, owner: Uuid, id: Uuid) -> Result<(), DatabaseError> {
        let result = sqlx::query("DELETE FROM mappings WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(owner)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound);
        }
        Ok(())
    }

    async fn set_default_mapping(&self, owner: Uuid, id: Uuid) -> Result<Mapping, DatabaseError> {
        let mut tx = self.pool.begin().await?;
        Self::lock_owner(&mut tx, owner).await?;

        // Dropping the transaction on NotFound rolls back the lock and leaves every row as it was.
        let owned: Option<(Uuid,)> =
            sqlx::query_as("SELECT id FROM mappings WHERE id = $1 AND user_id = $2 FOR UPDATE")
                .bind(id)
                .bind(owner)
                .fetch_optional(&mut *tx)
                .await?;
        if owned.is_none() {
            return Err(DatabaseError::NotFound);
        }

        Self::clear_default(&mut tx, owner, Some(id)).await?;

        let sql = format!(
            "UPDATE mappings SET is_default = TRUE, updated_at = NOW() \
             WHERE id = $1 AND user_id = $2 RETURNING {}",
            MAPPING_COLUMNS
        );
        let row = sqlx::query_as::<_, MappingRow>(&sql)
            .bind(id)
            .bind(owner)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(row.into())
    }
}

#[async_trait]
impl ReportRepository for PgStore {
    async fn create_report(&self, owner: Uuid, report: NewReport) -> Result<Report, DatabaseError> {
        let mut tx = self.pool.begin().await?;

        let sql = format!(
            "INSERT INTO reports (id, user_id, file_name, status, total_items, total_quantity, \
             total_value, processing_time_ms) VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING {}",
            REPORT_COLUMNS
        );
        let created = sqlx::query_as::<_, Report>(&sql)
            .bind(Uuid::new_v4())
            .bind(owner)
            .bind(&report.file_name)
            .bind(report.status.as_str())
            .bind(report.lines.len() as i64)
            .bind(report.total_quantity())
            .bind(report.total_value())
            .bind(report.processing_time_ms)
            .fetch_one(&mut *tx)
            .await?;

        for (position, line) in report.lines.iter().enumerate() {
            sqlx::query(
                "INSERT INTO report_items (id, report_id, position, form_norm, descricao, vendedor, \
                 data, quantidade, valor, cliente, categoria) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
            )
            .bind(Uuid::new_v4())
            .bind(created.id)
            .bind(position as i32)
            .bind(&line.form_norm)
            .bind(&line.descricao)
            .bind(&line.vendedor)
            .bind(&line.data)
            .bind(line.quantidade)
            .bind(line.valor)
            .bind(&line.cliente)
            .bind(&line.categoria)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(created)
    }

    async fn list_reports(&self, owner: Uuid, page: Page) -> Result<(Vec<Report>, i64), DatabaseError> {
        let sql = format!(
            "SELECT {} FROM reports WHERE user_id = $1 ORDER BY created_at DESC LIMIT $2 OFFSET $3",
            REPORT_COLUMNS
        );
        let reports = sqlx::query_as::<_, Report>(&sql)
            .bind(owner)
            .bind(page.limit)
            .bind(page.offset)
            .fetch_all(&self.pool)
            .await?;

        let (total,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM reports WHERE user_id = $1")
            .bind(owner)
            .fetch_one(&self.pool)
            .await?;

        Ok((reports, total))
    }

    async fn find_report(&self, owner: Uuid, id: Uuid) -> Result<(Report, Vec<ReportItem>), DatabaseError> {
        let sql = format!("SELECT {} FROM reports WHERE id = $1 AND user_id = $2", REPORT_COLUMNS);
        let report = sqlx::query_as::<_, Report>(&sql)
            .bind(id)
            .bind(owner)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(DatabaseError::NotFound)?;

        let items = sqlx::query_as::<_, ReportItemRow>(
            "SELECT id, report_id, form_norm, descricao, vendedor, data, quantidade, valor, cliente, \
             categoria FROM report_items WHERE report_id = $1 ORDER BY position",
        )
        .bind(report.id)
        .fetch_all(&self.pool)
        .await?;

        Ok((report, items.into_iter().map(ReportItem::from).collect()))
    }

    async fn delete_report(&self, owner: Uuid, id: Uuid) -> Result<(), DatabaseError> {
        let result = sqlx::query("DELETE FROM reports WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(owner)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound);
        }
        Ok(())
    }

    async fn report_stats(&self, owner: Uuid) -> Result<ReportStats, DatabaseError> {
        let stats = sqlx::query_as::<_, ReportStats>(
            "SELECT COUNT(*) AS total_reports, \
             COUNT(*) FILTER (WHERE status = 'completed') AS completed_reports, \
             COALESCE(SUM(processing_time_ms), 0)::BIGINT AS total_processing_time_ms \
             FROM reports WHERE user_id = $1",
        )
        .bind(owner)
        .fetch_one(&self.pool)
        .await?;
        Ok(stats)
    }

    async fn analytics(&self, owner: Uuid) -> Result<Analytics, DatabaseError> {
        let totals = sqlx::query_as::<_, AnalyticsTotals>(
            "SELECT (SELECT COUNT(*) FROM reports WHERE user_id = $1) AS reports, \
             COUNT(i.id) AS items, \
             COALESCE(SUM(i.quantidade), 0)::DOUBLE PRECISION AS quantity, \
             COALESCE(SUM(i.valor), 0)::DOUBLE PRECISION AS value \
             FROM report_items i JOIN reports r ON r.id = i.report_id WHERE r.user_id = $1",
        )
        .bind(owner)
        .fetch_one(&self.pool)
        .await?;

        let grouped = |column: &str| {
            format!(
                "SELECT COALESCE(NULLIF(TRIM(i.{column}), ''), $2) AS key, COUNT(*) AS items, \
                 COALESCE(SUM(i.quantidade), 0)::DOUBLE PRECISION AS quantity, \
                 COALESCE(SUM(i.valor), 0)::DOUBLE PRECISION AS value \
                 FROM report_items i JOIN reports r ON r.id = i.report_id WHERE r.user_id = $1 \
                 GROUP BY 1 ORDER BY value DESC, key"
            )
        };

        let by_category = sqlx::query_as::<_, GroupTotal>(&grouped("categoria"))
            .bind(owner)
            .bind(UNMAPPED_CATEGORY)
            .fetch_all(&self.pool)
            .await?;

        let by_seller = sqlx::query_as::<_, GroupTotal>(&grouped("vendedor"))
            .bind(owner)
            .bind(UNASSIGNED_SELLER)
            .fetch_all(&self.pool)
            .await?;

        Ok(Analytics { totals, by_category, by_seller })
    }
}

#[async_trait]
impl AuditRepository for PgStore {
    async fn append_audit(&self, entry: NewAuditEntry) -> Result<AuditLogEntry, DatabaseError> {
        let sql = format!(
            "INSERT INTO audit_logs (id, user_id, action, ip_address, user_agent, metadata) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {}",
            AUDIT_COLUMNS
        );
        let row = sqlx::query_as::<_, AuditLogEntry>(&sql)
            .bind(Uuid::new_v4())
            .bind(entry.user_id)
            .bind(entry.action.as_str())
            .bind(&entry.ip_address)
            .bind(&entry.user_agent)
            .bind(&entry.metadata)
            .fetch_one(&self.pool)
            .await?;
        Ok(row)
    }

    async fn list_audit(&self, query: &AuditQuery) -> Result<(Vec<AuditLogEntry>, i64), DatabaseError> {
        let (action, suspicious_only) = match &query.filter {
            AuditFilter::All => (None, false),
            AuditFilter::Suspicious => (None, true),
            AuditFilter::Action(action) => (Some(action.as_str()), false),
        };
        let conditions = "($1::uuid IS NULL OR user_id = $1) \
             AND ($2::text IS NULL OR action = $2) \
             AND (NOT $3 OR action = ANY($4))";

        let sql = format!(
            "SELECT {} FROM audit_logs WHERE {} ORDER BY created_at DESC LIMIT $5 OFFSET $6",
            AUDIT_COLUMNS, conditions
        );
        let logs = sqlx::query_as::<_, AuditLogEntry>(&sql)
            .bind(query.user_id)
            .bind(action)
            .bind(suspicious_only)
            .bind(suspicious_actions())
            .bind(query.limit)
            .bind(query.offset)
            .fetch_all(&self.pool)
            .await?;

        let count_sql = format!("SELECT COUNT(*) FROM audit_logs WHERE {}", conditions);
        let (total,): (i64,) = sqlx::query_as(&count_sql)
            .bind(query.user_id)
            .bind(action)
            .bind(suspicious_only)
            .bind(suspicious_actions())
            .fetch_one(&self.pool)
            .await?;

        Ok((logs, total))
    }

    async fn audit_stats(
        &self,
        user_id: Option<Uuid>,
        since: DateTime<Utc>,
    ) -> Result<AuditStats, DatabaseError> {
        let (total, last24h, suspicious): (i64, i64, i64) = sqlx::query_as(
            "SELECT COUNT(*), \
             COUNT(*) FILTER (WHERE created_at >= $2), \
             COUNT(*) FILTER (WHERE action = ANY($3)) \
             FROM audit_logs WHERE ($1::uuid IS NULL OR user_id = $1)",
        )
        .bind(user_id)
        .bind(since)
        .bind(suspicious_actions())
        .fetch_one(&self.pool)
        .await?;

        let by_action: Vec<(String, i64)> = sqlx::query_as(
            "SELECT action, COUNT(*) FROM audit_logs \
             WHERE ($1::uuid IS NULL OR user_id = $1) GROUP BY action",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(AuditStats {
            total,
            last24h,
            suspicious,
            by_action: by_action.into_iter().collect(),
        })
    }
}

#[async_trait]
impl Store for PgStore {
    async fn health_check(&self) -> Result<(), DatabaseError> {
        DatabaseManager::health_check(&self.pool).await
    }

    fn backend(&self) -> &'static str {
        "postgres"
    }
}
