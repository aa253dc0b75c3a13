//! Audit trail read side

use crate::{
    error::{AppError, AppResult},
    models::activity::ActivityEntry,
    repository::Repository,
};

/// Tables that receive audit rows
const AUDITED_TABLES: &[&str] = &[
    "borrowed_tool_batches",
    "borrowed_tools",
    "withdrawal_batches",
    "withdrawals",
    "requests",
];

#[derive(Clone)]
pub struct ActivityService {
    repository: Repository,
}

impl ActivityService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// Audit rows of one record, oldest first
    pub async fn for_record(&self, table_name: &str, record_id: i64) -> AppResult<Vec<ActivityEntry>> {
        if !AUDITED_TABLES.contains(&table_name) {
            return Err(AppError::NotFound(format!(
                "No activity is kept for '{}'",
                table_name
            )));
        }
        self.repository.list_activity(table_name, record_id).await
    }
}
