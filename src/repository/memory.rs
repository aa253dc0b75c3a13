//! In-process store
//!
//! Intended for tests and local runs. Transactions serialize on a single async
//! mutex and work on a copy of the state that replaces it on commit.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::{IncidentSink, StoreTx, WorkflowStore};
use crate::{
    error::{AppError, AppResult},
    models::{
        activity::{ActivityEntry, NewActivity},
        batch::{Aggregate, BatchQuery, Ledger, Target, WorkflowBatch, WorkflowLine},
        incident::{Incident, IncidentQuery, NewIncident},
        inventory::{CreateInventoryItem, InventoryItem, InventoryQuery, Reservation},
        request::{Request, RequestQuery},
        status::BatchStatus,
    },
};

#[derive(Debug, Default, Clone)]
struct MemoryState {
    next_id: i64,
    inventory: BTreeMap<i64, InventoryItem>,
    batches: BTreeMap<i64, WorkflowBatch>,
    lines: BTreeMap<i64, WorkflowLine>,
    requests: BTreeMap<i64, Request>,
    activity: Vec<ActivityEntry>,
    incidents: Vec<Incident>,
}

impl MemoryState {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn inventory_item(&self, id: i64) -> AppResult<InventoryItem> {
        self.inventory
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Inventory item {} not found", id)))
    }

    fn batch_lines(&self, batch_id: i64) -> Vec<WorkflowLine> {
        self.lines
            .values()
            .filter(|l| l.batch_id == Some(batch_id))
            .map(fresh_line)
            .collect()
    }

    fn load(&self, ledger: Ledger, target: Target) -> AppResult<Aggregate> {
        match target {
            Target::Batch(id) => {
                let batch = self
                    .batches
                    .get(&id)
                    .filter(|b| b.ledger == ledger)
                    .map(fresh_batch)
                    .ok_or_else(|| {
                        AppError::NotFound(format!("{} {} not found", ledger.batch_label(), id))
                    })?;
                Ok(Aggregate {
                    ledger,
                    lines: self.batch_lines(id),
                    batch: Some(batch),
                })
            }
            Target::Item(id) => {
                let line = self
                    .lines
                    .get(&id)
                    .filter(|l| l.ledger == ledger)
                    .map(fresh_line)
                    .ok_or_else(|| {
                        AppError::NotFound(format!("{} {} not found", ledger.line_label(), id))
                    })?;
                if let Some(batch_id) = line.batch_id {
                    return Err(AppError::Validation(format!(
                        "{} {} belongs to batch {}; act on the batch",
                        ledger.line_label(),
                        id,
                        batch_id
                    )));
                }
                Ok(Aggregate {
                    ledger,
                    batch: None,
                    lines: vec![line],
                })
            }
        }
    }

    /// Batches plus standalone lines of a ledger
    fn aggregates(&self, ledger: Ledger) -> Vec<Aggregate> {
        let batches = self
            .batches
            .values()
            .filter(|b| b.ledger == ledger)
            .map(|b| Aggregate {
                ledger,
                batch: Some(fresh_batch(b)),
                lines: self.batch_lines(b.id),
            });
        let singles = self
            .lines
            .values()
            .filter(|l| l.ledger == ledger && l.batch_id.is_none())
            .map(|l| Aggregate {
                ledger,
                batch: None,
                lines: vec![fresh_line(l)],
            });
        batches.chain(singles).collect()
    }
}

fn fresh_batch(batch: &WorkflowBatch) -> WorkflowBatch {
    let mut batch = batch.clone();
    batch.loaded_status = batch.status;
    batch
}

fn fresh_line(line: &WorkflowLine) -> WorkflowLine {
    let mut line = line.clone();
    line.loaded_status = line.status;
    line
}

fn conflict(label: &str) -> AppError {
    AppError::ConcurrencyConflict(format!(
        "{} was modified by another request; reload and try again",
        label
    ))
}

/// In-memory [`WorkflowStore`]
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WorkflowStore for MemoryStore {
    async fn begin(&self) -> AppResult<Box<dyn StoreTx>> {
        let guard = self.state.clone().lock_owned().await;
        let work = guard.clone();
        Ok(Box::new(MemoryTx { guard, work }))
    }

    async fn create_inventory_item(&self, data: &CreateInventoryItem) -> AppResult<InventoryItem> {
        let mut state = self.state.lock().await;
        if state.inventory.values().any(|i| i.code == data.code) {
            return Err(AppError::Validation(format!(
                "Inventory code {} already exists",
                data.code
            )));
        }
        let now = Utc::now();
        let id = state.next_id();
        let item = InventoryItem {
            id,
            code: data.code.clone(),
            name: data.name.clone(),
            category: data.category.clone(),
            unit: data.unit.clone().unwrap_or_else(|| "pcs".to_string()),
            total_quantity: data.quantity,
            available_quantity: data.quantity,
            is_critical: data.is_critical,
            created_at: now,
            updated_at: now,
        };
        state.inventory.insert(id, item.clone());
        Ok(item)
    }

    async fn get_inventory_item(&self, id: i64) -> AppResult<InventoryItem> {
        self.state.lock().await.inventory_item(id)
    }

    async fn list_inventory(&self, query: &InventoryQuery) -> AppResult<Vec<InventoryItem>> {
        let state = self.state.lock().await;
        let mut items: Vec<InventoryItem> = state
            .inventory
            .values()
            .filter(|i| query.category.is_none() || i.category == query.category)
            .filter(|i| !query.available_only.unwrap_or(false) || i.available_quantity > 0)
            .cloned()
            .collect();
        items.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(items)
    }

    async fn list_aggregates(
        &self,
        ledger: Ledger,
        query: &BatchQuery,
        limit: i64,
        offset: i64,
    ) -> AppResult<Vec<Aggregate>> {
        let state = self.state.lock().await;
        let mut aggregates: Vec<Aggregate> = state
            .aggregates(ledger)
            .into_iter()
            .filter(|a| query.status.map(|s| a.status() == s).unwrap_or(true))
            .filter(|a| {
                query
                    .requested_by
                    .map(|u| a.requested_by() == u)
                    .unwrap_or(true)
            })
            .collect();
        aggregates.sort_by_key(|a| std::cmp::Reverse(a.record_id()));
        Ok(aggregates
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn status_counts(&self, ledger: Ledger) -> AppResult<Vec<(BatchStatus, i64)>> {
        let state = self.state.lock().await;
        let mut counts: BTreeMap<BatchStatus, i64> = BTreeMap::new();
        for aggregate in state.aggregates(ledger) {
            *counts.entry(aggregate.status()).or_default() += 1;
        }
        Ok(counts.into_iter().collect())
    }

    async fn count_overdue(&self, ledger: Ledger, now: DateTime<Utc>) -> AppResult<i64> {
        let state = self.state.lock().await;
        Ok(state
            .aggregates(ledger)
            .iter()
            .filter(|a| a.is_overdue(now))
            .count() as i64)
    }

    async fn outstanding_quantity(&self, ledger: Ledger) -> AppResult<i64> {
        let state = self.state.lock().await;
        Ok(state
            .lines
            .values()
            .filter(|l| l.ledger == ledger && ledger.holds_stock(l.status))
            .map(|l| l.outstanding() as i64)
            .sum())
    }

    async fn list_requests(
        &self,
        query: &RequestQuery,
        limit: i64,
        offset: i64,
    ) -> AppResult<Vec<Request>> {
        let state = self.state.lock().await;
        Ok(state
            .requests
            .values()
            .rev()
            .filter(|r| query.status.map(|s| r.status == s).unwrap_or(true))
            .filter(|r| query.project_id.map(|p| r.project_id == p).unwrap_or(true))
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn list_activity(&self, table_name: &str, record_id: i64) -> AppResult<Vec<ActivityEntry>> {
        let state = self.state.lock().await;
        Ok(state
            .activity
            .iter()
            .filter(|a| a.table_name == table_name && a.record_id == record_id)
            .cloned()
            .collect())
    }

    async fn list_incidents(&self, query: &IncidentQuery) -> AppResult<Vec<Incident>> {
        let state = self.state.lock().await;
        Ok(state
            .incidents
            .iter()
            .filter(|i| query.severity.map(|s| i.severity == s).unwrap_or(true))
            .filter(|i| {
                query
                    .inventory_item_id
                    .map(|id| i.inventory_item_id == id)
                    .unwrap_or(true)
            })
            .cloned()
            .collect())
    }

    async fn get_incident(&self, id: i64) -> AppResult<Incident> {
        let state = self.state.lock().await;
        state
            .incidents
            .iter()
            .find(|i| i.id == id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Incident {} not found", id)))
    }
}

#[async_trait]
impl IncidentSink for MemoryStore {
    async fn record_incident(&self, incident: &NewIncident) -> AppResult<Incident> {
        let mut state = self.state.lock().await;
        let id = state.next_id();
        let stored = Incident {
            id,
            inventory_item_id: incident.inventory_item_id,
            source: incident.source,
            source_id: incident.source_id,
            batch_id: incident.batch_id,
            incident_type: incident.incident_type,
            severity: incident.severity,
            quantity: incident.quantity,
            description: incident.description.clone(),
            reported_by: incident.reported_by,
            created_at: Utc::now(),
        };
        state.incidents.push(stored.clone());
        Ok(stored)
    }
}

struct MemoryTx {
    guard: OwnedMutexGuard<MemoryState>,
    work: MemoryState,
}

#[async_trait]
impl StoreTx for MemoryTx {
    async fn load(&mut self, ledger: Ledger, target: Target) -> AppResult<Aggregate> {
        self.work.load(ledger, target)
    }

    async fn insert_aggregate(&mut self, draft: &Aggregate) -> AppResult<Aggregate> {
        let ledger = draft.ledger;
        let mut stored = draft.clone();

        let batch_id = match stored.batch.as_mut() {
            Some(batch) => {
                batch.id = self.work.next_id();
                batch.ledger = ledger;
                batch.reference = ledger.reference(batch.id, batch.created_at);
                batch.loaded_status = batch.status;
                self.work.batches.insert(batch.id, batch.clone());
                Some(batch.id)
            }
            None => None,
        };

        for line in stored.lines.iter_mut() {
            line.id = self.work.next_id();
            line.ledger = ledger;
            line.batch_id = batch_id;
            line.reference = match batch_id {
                Some(_) => None,
                None => Some(ledger.reference(line.id, line.created_at)),
            };
            line.loaded_status = line.status;
            self.work.lines.insert(line.id, line.clone());
        }

        Ok(stored)
    }

    async fn save(&mut self, aggregate: &Aggregate) -> AppResult<()> {
        let label = aggregate.label();

        if let Some(batch) = &aggregate.batch {
            let stored = self
                .work
                .batches
                .get_mut(&batch.id)
                .ok_or_else(|| AppError::NotFound(format!("{} not found", label)))?;
            if stored.status != batch.loaded_status {
                return Err(conflict(&label));
            }
            *stored = fresh_batch(batch);
        }

        for line in &aggregate.lines {
            let stored = self
                .work
                .lines
                .get_mut(&line.id)
                .ok_or_else(|| AppError::NotFound(format!("Line {} not found", line.id)))?;
            if stored.status != line.loaded_status {
                return Err(conflict(&label));
            }
            *stored = fresh_line(line);
        }
        Ok(())
    }

    async fn try_reserve(&mut self, inventory_item_id: i64, quantity: i32) -> AppResult<Reservation> {
        let item = self
            .work
            .inventory
            .get_mut(&inventory_item_id)
            .ok_or_else(|| {
                AppError::NotFound(format!("Inventory item {} not found", inventory_item_id))
            })?;
        if item.available_quantity >= quantity {
            item.available_quantity -= quantity;
            item.updated_at = Utc::now();
            Ok(Reservation::Reserved {
                remaining: item.available_quantity,
            })
        } else {
            Ok(Reservation::Insufficient {
                available: item.available_quantity,
            })
        }
    }

    async fn restore(&mut self, inventory_item_id: i64, quantity: i32) -> AppResult<()> {
        let item = self
            .work
            .inventory
            .get_mut(&inventory_item_id)
            .ok_or_else(|| {
                AppError::NotFound(format!("Inventory item {} not found", inventory_item_id))
            })?;
        item.available_quantity += quantity;
        item.updated_at = Utc::now();
        Ok(())
    }

    async fn inventory_item(&mut self, id: i64) -> AppResult<InventoryItem> {
        self.work.inventory_item(id)
    }

    async fn insert_request(&mut self, draft: &Request) -> AppResult<Request> {
        let mut request = draft.clone();
        request.id = self.work.next_id();
        request.reference = Request::reference_for(request.id, request.created_at);
        request.loaded_status = request.status;
        self.work.requests.insert(request.id, request.clone());
        Ok(request)
    }

    async fn load_request(&mut self, id: i64) -> AppResult<Request> {
        let mut request = self
            .work
            .requests
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Request {} not found", id)))?;
        request.loaded_status = request.status;
        Ok(request)
    }

    async fn save_request(&mut self, request: &Request) -> AppResult<()> {
        let stored = self
            .work
            .requests
            .get_mut(&request.id)
            .ok_or_else(|| AppError::NotFound(format!("Request {} not found", request.id)))?;
        if stored.status != request.loaded_status {
            return Err(conflict(&request.label()));
        }
        *stored = request.clone();
        stored.loaded_status = stored.status;
        Ok(())
    }

    async fn log_activity(&mut self, entry: &NewActivity) -> AppResult<()> {
        let id = self.work.next_id();
        self.work.activity.push(ActivityEntry {
            id,
            user_id: entry.user_id,
            action: entry.action.clone(),
            description: entry.description.clone(),
            table_name: entry.table_name.to_string(),
            record_id: entry.record_id,
            created_at: Utc::now(),
        });
        Ok(())
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        let MemoryTx { mut guard, work } = *self;
        *guard = work;
        Ok(())
    }
}
