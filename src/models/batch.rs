//! Borrowed-tool and withdrawal batches, their lines, and request payloads

use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use super::{
    enums::ItemCondition,
    incident::Incident,
    status::{Action, BatchStatus, Signoffs},
};
use crate::error::{AppError, AppResult};

text_enum! {
    /// The two line-based ledgers driven by the batch workflow
    Ledger {
        BorrowedTools => "borrowed_tools",
        Withdrawals => "withdrawals",
    }
}

impl Ledger {
    pub fn batch_table(&self) -> &'static str {
        match self {
            Ledger::BorrowedTools => "borrowed_tool_batches",
            Ledger::Withdrawals => "withdrawal_batches",
        }
    }

    pub fn line_table(&self) -> &'static str {
        match self {
            Ledger::BorrowedTools => "borrowed_tools",
            Ledger::Withdrawals => "withdrawals",
        }
    }

    pub fn reference_prefix(&self) -> &'static str {
        match self {
            Ledger::BorrowedTools => "BRW",
            Ledger::Withdrawals => "WDR",
        }
    }

    pub fn batch_label(&self) -> &'static str {
        match self {
            Ledger::BorrowedTools => "Borrowed tool batch",
            Ledger::Withdrawals => "Withdrawal batch",
        }
    }

    pub fn line_label(&self) -> &'static str {
        match self {
            Ledger::BorrowedTools => "Borrowed tool",
            Ledger::Withdrawals => "Withdrawal",
        }
    }

    /// Step at which stock leaves `available_quantity`
    pub fn reservation_action(&self) -> Action {
        match self {
            Ledger::BorrowedTools => Action::Release,
            Ledger::Withdrawals => Action::Approve,
        }
    }

    /// Whether a line in `status` currently holds reserved stock
    pub fn holds_stock(&self, status: BatchStatus) -> bool {
        match self {
            Ledger::BorrowedTools => matches!(
                status,
                BatchStatus::Released | BatchStatus::PartiallyReturned
            ),
            Ledger::Withdrawals => matches!(
                status,
                BatchStatus::Approved | BatchStatus::Released | BatchStatus::PartiallyReturned
            ),
        }
    }

    /// Reference number such as `WDR-2026-000042`
    pub fn reference(&self, id: i64, created_at: DateTime<Utc>) -> String {
        format!("{}-{}-{:06}", self.reference_prefix(), created_at.year(), id)
    }
}

/// Batch header
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct WorkflowBatch {
    pub id: i64,
    pub ledger: Ledger,
    pub reference: String,
    pub requested_by: i32,
    pub project_id: Option<i32>,
    pub purpose: Option<String>,
    pub expected_return: Option<DateTime<Utc>>,
    pub status: BatchStatus,
    pub signoffs: Signoffs,
    pub cancel_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Status as last read from storage, checked again on save
    #[serde(skip)]
    pub(crate) loaded_status: BatchStatus,
}

/// One borrowed tool or withdrawal line, standalone or owned by a batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct WorkflowLine {
    pub id: i64,
    pub ledger: Ledger,
    pub batch_id: Option<i64>,
    /// Set for standalone lines only
    pub reference: Option<String>,
    pub inventory_item_id: i64,
    pub quantity: i32,
    pub quantity_returned: i32,
    pub status: BatchStatus,
    pub condition_returned: Option<ItemCondition>,
    pub return_notes: Option<String>,
    pub notes: Option<String>,
    pub requested_by: i32,
    pub project_id: Option<i32>,
    pub purpose: Option<String>,
    pub expected_return: Option<DateTime<Utc>>,
    pub signoffs: Signoffs,
    pub cancel_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip)]
    pub(crate) loaded_status: BatchStatus,
}

impl WorkflowLine {
    /// Quantity still out of the store
    pub fn outstanding(&self) -> i32 {
        self.quantity - self.quantity_returned
    }
}

/// A batch with its lines, or a single standalone line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct Aggregate {
    pub ledger: Ledger,
    pub batch: Option<WorkflowBatch>,
    pub lines: Vec<WorkflowLine>,
}

impl Aggregate {
    /// Id of the batch, or of the standalone line
    pub fn record_id(&self) -> i64 {
        match &self.batch {
            Some(batch) => batch.id,
            None => self.lines.first().map(|l| l.id).unwrap_or_default(),
        }
    }

    pub fn table_name(&self) -> &'static str {
        if self.batch.is_some() {
            self.ledger.batch_table()
        } else {
            self.ledger.line_table()
        }
    }

    pub fn status(&self) -> BatchStatus {
        match &self.batch {
            Some(batch) => batch.status,
            None => self
                .lines
                .first()
                .map(|l| l.status)
                .unwrap_or(BatchStatus::Canceled),
        }
    }

    pub fn requested_by(&self) -> i32 {
        match &self.batch {
            Some(batch) => batch.requested_by,
            None => self.lines.first().map(|l| l.requested_by).unwrap_or_default(),
        }
    }

    pub fn reference(&self) -> String {
        match &self.batch {
            Some(batch) => batch.reference.clone(),
            None => self
                .lines
                .first()
                .and_then(|l| l.reference.clone())
                .unwrap_or_default(),
        }
    }

    /// Human label used in messages and the audit trail
    pub fn label(&self) -> String {
        let kind = if self.batch.is_some() {
            self.ledger.batch_label()
        } else {
            self.ledger.line_label()
        };
        format!("{} {}", kind, self.reference())
    }

    pub fn expected_return(&self) -> Option<DateTime<Utc>> {
        match &self.batch {
            Some(batch) => batch.expected_return,
            None => self.lines.first().and_then(|l| l.expected_return),
        }
    }

    pub fn total_quantity(&self) -> i32 {
        self.lines.iter().map(|l| l.quantity).sum()
    }

    pub fn outstanding(&self) -> i32 {
        self.lines
            .iter()
            .filter(|l| self.ledger.holds_stock(l.status))
            .map(|l| l.outstanding())
            .sum()
    }

    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        matches!(
            self.status(),
            BatchStatus::Released | BatchStatus::PartiallyReturned
        ) && self.expected_return().map(|d| d < now).unwrap_or(false)
    }
}

/// What a workflow call operates on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Target {
    Batch(i64),
    /// Standalone line without a batch
    Item(i64),
}

impl Target {
    /// Parse the `{scope}` path segment (`batches` or `items`)
    pub fn from_scope(scope: &str, id: i64) -> AppResult<Self> {
        match scope {
            "batches" => Ok(Target::Batch(id)),
            "items" => Ok(Target::Item(id)),
            other => Err(AppError::NotFound(format!("Unknown scope '{}'", other))),
        }
    }
}

/// Line requested by the maker
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct NewLine {
    #[validate(range(min = 1))]
    pub inventory_item_id: i64,
    #[validate(range(min = 1, message = "quantity must be at least 1"))]
    pub quantity: i32,
    pub notes: Option<String>,
}

/// Create batch (or single line) request
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateBatch {
    #[validate(length(min = 1, message = "at least one line is required"), nested)]
    pub lines: Vec<NewLine>,
    pub project_id: Option<i32>,
    #[validate(length(max = 500))]
    pub purpose: Option<String>,
    pub expected_return: Option<DateTime<Utc>>,
}

/// One line of a (partial) return
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct ReturnLine {
    pub line_id: i64,
    /// Defaults to everything still outstanding on the line
    #[validate(range(min = 1))]
    pub quantity: Option<i32>,
    pub condition: ItemCondition,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct ReturnItems {
    #[validate(length(min = 1, message = "at least one returned line is required"), nested)]
    pub lines: Vec<ReturnLine>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct TransitionNotes {
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CancelRequest {
    #[validate(length(min = 1, max = 500, message = "a cancellation reason is required"))]
    pub reason: String,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ExtendReturn {
    pub expected_return: DateTime<Utc>,
}

/// Query parameters for batch listing
#[derive(Debug, Default, Clone, Deserialize, utoipa::IntoParams)]
pub struct BatchQuery {
    pub status: Option<BatchStatus>,
    pub requested_by: Option<i32>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

/// Outcome of a return: the updated record plus the incidents raised for it
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ReturnReceipt {
    pub aggregate: Aggregate,
    pub incidents: Vec<Incident>,
}

/// Read-side counters for one ledger
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct LedgerSummary {
    pub ledger: Option<Ledger>,
    pub by_status: BTreeMap<String, i64>,
    pub overdue: i64,
    pub outstanding_quantity: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_reference_format() {
        let at = Utc.with_ymd_and_hms(2026, 3, 14, 9, 0, 0).unwrap();
        assert_eq!(Ledger::Withdrawals.reference(42, at), "WDR-2026-000042");
        assert_eq!(Ledger::BorrowedTools.reference(7, at), "BRW-2026-000007");
    }

    #[test]
    fn test_stock_holding_statuses() {
        assert!(Ledger::Withdrawals.holds_stock(BatchStatus::Approved));
        assert!(!Ledger::BorrowedTools.holds_stock(BatchStatus::Approved));
        assert!(Ledger::BorrowedTools.holds_stock(BatchStatus::PartiallyReturned));
        assert!(!Ledger::Withdrawals.holds_stock(BatchStatus::Returned));
    }

    #[test]
    fn test_scope_parsing() {
        assert_eq!(Target::from_scope("batches", 3).unwrap(), Target::Batch(3));
        assert_eq!(Target::from_scope("items", 4).unwrap(), Target::Item(4));
        assert!(Target::from_scope("lines", 4).is_err());
    }

    #[test]
    fn test_create_batch_validation() {
        let empty = CreateBatch {
            lines: vec![],
            project_id: None,
            purpose: None,
            expected_return: None,
        };
        assert!(empty.validate().is_err());

        let zero_qty = CreateBatch {
            lines: vec![NewLine {
                inventory_item_id: 1,
                quantity: 0,
                notes: None,
            }],
            project_id: None,
            purpose: None,
            expected_return: None,
        };
        assert!(zero_qty.validate().is_err());
    }
}
