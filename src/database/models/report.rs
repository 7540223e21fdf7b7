use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Category label used for items without a mapped category
pub const UNMAPPED_CATEGORY: &str = "Não mapeado";

/// Seller label used when an item has no seller
pub const UNASSIGNED_SELLER: &str = "Sem vendedor";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportStatus {
    Processing,
    Completed,
    Failed,
}

impl ReportStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportStatus::Processing => "processing",
            ReportStatus::Completed => "completed",
            ReportStatus::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub id: Uuid,
    pub user_id: Uuid,
    pub file_name: String,
    pub status: String,
    pub total_items: i64,
    pub total_quantity: f64,
    pub total_value: f64,
    pub processing_time_ms: i64,
    pub created_at: DateTime<Utc>,
}

/// One processed spreadsheet row as the client sends it
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ReportLine {
    pub form_norm: Option<String>,
    pub descricao: Option<String>,
    pub vendedor: Option<String>,
    pub data: Option<String>,
    pub quantidade: Option<f64>,
    pub valor: Option<f64>,
    pub cliente: Option<String>,
    pub categoria: Option<String>,
}

impl ReportLine {
    pub fn category(&self) -> &str {
        self.categoria
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .unwrap_or(UNMAPPED_CATEGORY)
    }

    pub fn seller(&self) -> &str {
        self.vendedor
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .unwrap_or(UNASSIGNED_SELLER)
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReportItem {
    pub id: Uuid,
    pub report_id: Uuid,
    #[serde(flatten)]
    pub line: ReportLine,
}

#[derive(Debug, Clone)]
pub struct NewReport {
    pub file_name: String,
    pub status: ReportStatus,
    pub processing_time_ms: i64,
    pub lines: Vec<ReportLine>,
}

impl NewReport {
    pub fn total_quantity(&self) -> f64 {
        self.lines.iter().filter_map(|l| l.quantidade).sum()
    }

    pub fn total_value(&self) -> f64 {
        self.lines.iter().filter_map(|l| l.valor).sum()
    }
}

/// Owner-wide counters behind `/user/stats`
#[derive(Debug, Clone, Copy, Default, PartialEq, FromRow)]
pub struct ReportStats {
    pub total_reports: i64,
    pub completed_reports: i64,
    pub total_processing_time_ms: i64,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsTotals {
    pub reports: i64,
    pub items: i64,
    pub quantity: f64,
    pub value: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct GroupTotal {
    pub key: String,
    pub items: i64,
    pub quantity: f64,
    pub value: f64,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Analytics {
    pub totals: AnalyticsTotals,
    pub by_category: Vec<GroupTotal>,
    pub by_seller: Vec<GroupTotal>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_category_counts_as_unmapped() {
        let line = ReportLine { categoria: Some("  ".into()), ..Default::default() };
        assert_eq!(line.category(), UNMAPPED_CATEGORY);

        let line = ReportLine { categoria: Some("Cápsulas".into()), ..Default::default() };
        assert_eq!(line.category(), "Cápsulas");
    }

    #[test]
    fn totals_skip_missing_values() {
        let report = NewReport {
            file_name: "producao.xlsx".into(),
            status: ReportStatus::Completed,
            processing_time_ms: 10,
            lines: vec![
                ReportLine { quantidade: Some(2.0), valor: Some(10.5), ..Default::default() },
                ReportLine { quantidade: None, valor: Some(4.5), ..Default::default() },
            ],
        };
        assert_eq!(report.total_quantity(), 2.0);
        assert_eq!(report.total_value(), 15.0);
    }

    #[test]
    fn lines_accept_partial_payloads() {
        let line: ReportLine =
            serde_json::from_value(serde_json::json!({"formNorm": "F1", "quantidade": 5})).unwrap();
        assert_eq!(line.form_norm.as_deref(), Some("F1"));
        assert_eq!(line.quantidade, Some(5.0));
        assert!(line.valor.is_none());
    }
}
