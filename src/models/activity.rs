//! Activity (audit trail) entries

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

/// Stored audit row
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct ActivityEntry {
    pub id: i64,
    pub user_id: i32,
    pub action: String,
    pub description: String,
    pub table_name: String,
    pub record_id: i64,
    pub created_at: DateTime<Utc>,
}

/// Audit row appended inside a workflow transaction
#[derive(Debug, Clone)]
pub struct NewActivity {
    pub user_id: i32,
    pub action: String,
    pub description: String,
    pub table_name: &'static str,
    pub record_id: i64,
}
