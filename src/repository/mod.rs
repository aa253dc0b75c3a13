//! Repository layer for database operations
//!
//! Workflow services talk to storage through [`WorkflowStore`]. Each workflow
//! operation opens one [`StoreTx`]; dropping it without [`StoreTx::commit`]
//! rolls everything back.

pub mod memory;
pub mod postgres;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    error::AppResult,
    models::{
        activity::{ActivityEntry, NewActivity},
        batch::{Aggregate, BatchQuery, Ledger, Target},
        incident::{Incident, IncidentQuery, NewIncident},
        inventory::{CreateInventoryItem, InventoryItem, InventoryQuery, Reservation},
        request::{Request, RequestQuery},
        status::BatchStatus,
    },
};

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Storage used by the workflow services
#[async_trait]
pub trait WorkflowStore: Send + Sync {
    /// Open a transaction
    async fn begin(&self) -> AppResult<Box<dyn StoreTx>>;

    async fn create_inventory_item(&self, data: &CreateInventoryItem) -> AppResult<InventoryItem>;

    async fn get_inventory_item(&self, id: i64) -> AppResult<InventoryItem>;

    async fn list_inventory(&self, query: &InventoryQuery) -> AppResult<Vec<InventoryItem>>;

    /// Batches (or standalone lines) of a ledger, newest first
    async fn list_aggregates(
        &self,
        ledger: Ledger,
        query: &BatchQuery,
        limit: i64,
        offset: i64,
    ) -> AppResult<Vec<Aggregate>>;

    /// Count of batches and standalone lines per status
    async fn status_counts(&self, ledger: Ledger) -> AppResult<Vec<(BatchStatus, i64)>>;

    /// Batches and standalone lines still out past their expected return
    async fn count_overdue(&self, ledger: Ledger, now: DateTime<Utc>) -> AppResult<i64>;

    /// Sum of quantities currently holding stock
    async fn outstanding_quantity(&self, ledger: Ledger) -> AppResult<i64>;

    async fn list_requests(
        &self,
        query: &RequestQuery,
        limit: i64,
        offset: i64,
    ) -> AppResult<Vec<Request>>;

    async fn list_activity(&self, table_name: &str, record_id: i64) -> AppResult<Vec<ActivityEntry>>;

    async fn list_incidents(&self, query: &IncidentQuery) -> AppResult<Vec<Incident>>;

    async fn get_incident(&self, id: i64) -> AppResult<Incident>;
}

/// Operations available inside one workflow transaction
#[async_trait]
pub trait StoreTx: Send {
    /// Load a batch with its lines, or a standalone line; `NotFound` when missing
    async fn load(&mut self, ledger: Ledger, target: Target) -> AppResult<Aggregate>;

    /// Insert a new batch or standalone line, assigning ids and reference numbers
    async fn insert_aggregate(&mut self, draft: &Aggregate) -> AppResult<Aggregate>;

    /// Persist status, stamps and return bookkeeping.
    ///
    /// Each row is only written while it still has the status it was loaded
    /// with; otherwise the call fails with `ConcurrencyConflict`.
    async fn save(&mut self, aggregate: &Aggregate) -> AppResult<()>;

    /// Conditional decrement of available stock
    async fn try_reserve(&mut self, inventory_item_id: i64, quantity: i32) -> AppResult<Reservation>;

    /// Unconditional increment of available stock
    async fn restore(&mut self, inventory_item_id: i64, quantity: i32) -> AppResult<()>;

    async fn inventory_item(&mut self, id: i64) -> AppResult<InventoryItem>;

    async fn insert_request(&mut self, draft: &Request) -> AppResult<Request>;

    async fn load_request(&mut self, id: i64) -> AppResult<Request>;

    /// Status-guarded like [`StoreTx::save`]
    async fn save_request(&mut self, request: &Request) -> AppResult<()>;

    async fn log_activity(&mut self, entry: &NewActivity) -> AppResult<()>;

    async fn commit(self: Box<Self>) -> AppResult<()>;
}

/// Destination for incidents raised after a workflow transaction committed
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IncidentSink: Send + Sync {
    async fn record_incident(&self, incident: &NewIncident) -> AppResult<Incident>;
}

/// Shared handle to the configured store
pub type Repository = Arc<dyn WorkflowStore>;
