// handlers/mod.rs - Two-tier handler layout
//
// Public (no principal) → Protected (Principal extractor, owner-scoped data)

pub mod protected;
pub mod public;

use serde::Serialize;

use crate::database::DatabaseError;
use crate::error::ApiError;

/// Listing window echoed back to the client
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
    pub has_more: bool,
}

impl Pagination {
    pub fn new(total: i64, limit: i64, offset: i64) -> Self {
        Self {
            total,
            limit,
            offset,
            has_more: offset.saturating_add(limit) < total,
        }
    }
}

/// Store errors with a resource-specific 404 message
pub(crate) fn or_not_found(message: &'static str) -> impl Fn(DatabaseError) -> ApiError {
    move |err| match err {
        DatabaseError::NotFound => ApiError::not_found(message),
        other => other.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pagination_knows_when_more_remain() {
        assert!(Pagination::new(45, 20, 20).has_more);
        assert!(!Pagination::new(45, 20, 40).has_more);
        assert!(!Pagination::new(0, 20, 0).has_more);
    }

    #[test]
    fn extreme_offsets_do_not_overflow() {
        assert!(!Pagination::new(10, 100, i64::MAX).has_more);
        assert!(!Pagination::new(i64::MAX, 1, i64::MAX - 1).has_more);
    }

    #[test]
    fn not_found_keeps_its_resource_message() {
        let err = or_not_found("Mapeamento não encontrado")(DatabaseError::NotFound);
        assert_eq!(err.message(), "Mapeamento não encontrado");
    }
}
