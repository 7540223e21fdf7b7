pub mod audit;
pub mod mapping;
pub mod report;
pub mod user;

pub use audit::{AuditAction, AuditFilter, AuditLogEntry, AuditQuery, AuditStats, NewAuditEntry};
pub use mapping::{Mapping, MappingChanges, NewMapping};
pub use report::{
    Analytics, AnalyticsTotals, GroupTotal, NewReport, Report, ReportItem, ReportLine, ReportStats,
    ReportStatus, UNASSIGNED_SELLER, UNMAPPED_CATEGORY,
};
pub use user::{NewUser, PublicUser, User, UserChanges};

/// Limit/offset window for owner-wide listings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub limit: i64,
    pub offset: i64,
}

impl Page {
    pub const DEFAULT_LIMIT: i64 = 20;
    pub const MAX_LIMIT: i64 = 100;

    /// Clamp raw query values into a usable window
    pub fn new(limit: Option<i64>, offset: Option<i64>) -> Self {
        Self {
            limit: limit.unwrap_or(Self::DEFAULT_LIMIT).clamp(1, Self::MAX_LIMIT),
            offset: offset.unwrap_or(0).max(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_clamps_limits() {
        assert_eq!(Page::new(None, None), Page { limit: 20, offset: 0 });
        assert_eq!(Page::new(Some(500), Some(-3)), Page { limit: 100, offset: 0 });
        assert_eq!(Page::new(Some(0), Some(40)), Page { limit: 1, offset: 40 });
    }
}
