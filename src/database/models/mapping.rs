use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Column mapping from a spreadsheet header to a report field, owned by one user
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Mapping {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub mapping_data: BTreeMap<String, String>,
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewMapping {
    pub name: String,
    pub description: Option<String>,
    pub mapping_data: BTreeMap<String, String>,
    pub is_default: bool,
}

#[derive(Debug, Clone, Default)]
pub struct MappingChanges {
    pub name: Option<String>,
    pub description: Option<String>,
    pub mapping_data: Option<BTreeMap<String, String>>,
}
