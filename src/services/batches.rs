//! Borrowed-tool and withdrawal workflow service
//!
//! Every operation runs in one store transaction: load, engine, stock
//! movements, save, audit row, commit. Any error drops the transaction.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use chrono::{Duration, Utc};
use validator::Validate;

use crate::{
    config::WorkflowConfig,
    error::{AppError, AppResult},
    models::{
        activity::NewActivity,
        batch::{
            Aggregate, BatchQuery, CreateBatch, ExtendReturn, Ledger, LedgerSummary, ReturnItems,
            ReturnReceipt, Target, WorkflowBatch, WorkflowLine,
        },
        incident::NewIncident,
        inventory::Reservation,
        status::{Action, BatchStatus, Signoff, Signoffs},
        user::Actor,
    },
    repository::{IncidentSink, Repository, StoreTx},
    workflow::{rules::MAKERS, Movement, StockMovement},
};

#[derive(Clone)]
pub struct BatchWorkflowService {
    ledger: Ledger,
    repository: Repository,
    incidents: Arc<dyn IncidentSink>,
    policy: Arc<WorkflowConfig>,
}

impl BatchWorkflowService {
    pub fn new(
        ledger: Ledger,
        repository: Repository,
        incidents: Arc<dyn IncidentSink>,
        policy: Arc<WorkflowConfig>,
    ) -> Self {
        Self {
            ledger,
            repository,
            incidents,
            policy,
        }
    }

    pub fn ledger(&self) -> Ledger {
        self.ledger
    }

    /// Create a batch of one or more lines
    pub async fn create_batch(&self, actor: &Actor, data: CreateBatch) -> AppResult<Aggregate> {
        self.create(actor, data, true).await
    }

    /// Create one standalone line without a batch
    pub async fn create_single(&self, actor: &Actor, data: CreateBatch) -> AppResult<Aggregate> {
        if data.lines.len() != 1 {
            return Err(AppError::Validation(format!(
                "A single {} takes exactly one line",
                self.ledger.line_label().to_lowercase()
            )));
        }
        self.create(actor, data, false).await
    }

    async fn create(&self, actor: &Actor, data: CreateBatch, as_batch: bool) -> AppResult<Aggregate> {
        data.validate()
            .map_err(|e| AppError::Validation(e.to_string()))?;
        actor.require_any(MAKERS, &format!("create {}", self.ledger.as_str()))?;

        let mut seen = HashSet::new();
        for line in &data.lines {
            if !seen.insert(line.inventory_item_id) {
                return Err(AppError::Validation(format!(
                    "Inventory item {} appears more than once",
                    line.inventory_item_id
                )));
            }
        }

        let mut tx = self.repository.begin().await?;

        let mut critical = false;
        for line in &data.lines {
            let item = tx.inventory_item(line.inventory_item_id).await?;
            if line.quantity > item.available_quantity {
                return Err(AppError::Validation(format!(
                    "Requested {} {} of {} ({}) but only {} available",
                    line.quantity, item.unit, item.name, item.code, item.available_quantity
                )));
            }
            critical |= item.is_critical;
        }

        let now = Utc::now();
        let streamlined = self.ledger == Ledger::BorrowedTools
            && self.policy.streamline_basic_tools
            && !critical;
        let status = if streamlined {
            BatchStatus::Approved
        } else {
            BatchStatus::PendingVerification
        };

        let mut signoffs = Signoffs::default();
        let stamp = Signoff {
            by: actor.user_id,
            at: now,
        };
        signoffs.set(Action::Submit, stamp);
        if streamlined {
            signoffs.set(Action::Verify, stamp);
            signoffs.set(Action::Approve, stamp);
        }

        let expected_return = match (self.ledger, data.expected_return) {
            (_, Some(at)) => Some(at),
            (Ledger::BorrowedTools, None) => {
                Some(now + Duration::days(self.policy.default_borrow_days))
            }
            (Ledger::Withdrawals, None) => None,
        };

        let lines = data
            .lines
            .iter()
            .map(|line| WorkflowLine {
                id: 0,
                ledger: self.ledger,
                batch_id: None,
                reference: None,
                inventory_item_id: line.inventory_item_id,
                quantity: line.quantity,
                quantity_returned: 0,
                status,
                condition_returned: None,
                return_notes: None,
                notes: line.notes.clone(),
                requested_by: actor.user_id,
                project_id: data.project_id,
                purpose: data.purpose.clone(),
                expected_return,
                signoffs: signoffs.clone(),
                cancel_reason: None,
                created_at: now,
                updated_at: now,
                loaded_status: status,
            })
            .collect();

        let batch = as_batch.then(|| WorkflowBatch {
            id: 0,
            ledger: self.ledger,
            reference: String::new(),
            requested_by: actor.user_id,
            project_id: data.project_id,
            purpose: data.purpose.clone(),
            expected_return,
            status,
            signoffs: signoffs.clone(),
            cancel_reason: None,
            created_at: now,
            updated_at: now,
            loaded_status: status,
        });

        let draft = Aggregate {
            ledger: self.ledger,
            batch,
            lines,
        };
        let created = tx.insert_aggregate(&draft).await?;

        let description = if streamlined {
            format!(
                "{} created by user {} and approved directly (no critical tools)",
                created.label(),
                actor.user_id
            )
        } else {
            format!(
                "{} created by user {} with {} line(s), {} unit(s)",
                created.label(),
                actor.user_id,
                created.lines.len(),
                created.total_quantity()
            )
        };
        tx.log_activity(&activity(&created, "created", actor, description))
            .await?;
        tx.commit().await?;

        tracing::info!(
            ledger = %self.ledger.as_str(),
            reference = %created.reference(),
            status = %created.status(),
            "{} created",
            created.label()
        );
        Ok(created)
    }

    /// Load a batch with its lines, or a standalone line
    pub async fn get(&self, target: Target) -> AppResult<Aggregate> {
        let mut tx = self.repository.begin().await?;
        tx.load(self.ledger, target).await
    }

    /// Batches and standalone lines, newest first
    pub async fn list(&self, query: &BatchQuery) -> AppResult<Vec<Aggregate>> {
        let (limit, offset) = page_window(query.page, query.per_page, &self.policy);
        self.repository
            .list_aggregates(self.ledger, query, limit, offset)
            .await
    }

    pub async fn verify(
        &self,
        actor: &Actor,
        target: Target,
        notes: Option<String>,
    ) -> AppResult<Aggregate> {
        self.transition(actor, target, Action::Verify, notes).await
    }

    pub async fn approve(
        &self,
        actor: &Actor,
        target: Target,
        notes: Option<String>,
    ) -> AppResult<Aggregate> {
        self.transition(actor, target, Action::Approve, notes).await
    }

    pub async fn release(
        &self,
        actor: &Actor,
        target: Target,
        notes: Option<String>,
    ) -> AppResult<Aggregate> {
        self.transition(actor, target, Action::Release, notes).await
    }

    pub async fn cancel(&self, actor: &Actor, target: Target, reason: String) -> AppResult<Aggregate> {
        if reason.trim().is_empty() {
            return Err(AppError::Validation(
                "A cancellation reason is required".to_string(),
            ));
        }
        self.transition(actor, target, Action::Cancel, Some(reason))
            .await
    }

    async fn transition(
        &self,
        actor: &Actor,
        target: Target,
        action: Action,
        notes: Option<String>,
    ) -> AppResult<Aggregate> {
        let result = self.run_transition(actor, target, action, notes).await;
        match &result {
            Ok(aggregate) => tracing::info!(
                ledger = %self.ledger.as_str(),
                action = %action,
                user_id = actor.user_id,
                status = %aggregate.status(),
                "{} {}",
                aggregate.label(),
                action.past_tense()
            ),
            Err(e) => tracing::warn!(
                ledger = %self.ledger.as_str(),
                action = %action,
                user_id = actor.user_id,
                target = ?target,
                "Workflow transition failed: {}",
                e
            ),
        }
        result
    }

    async fn run_transition(
        &self,
        actor: &Actor,
        target: Target,
        action: Action,
        notes: Option<String>,
    ) -> AppResult<Aggregate> {
        let mut tx = self.repository.begin().await?;
        let mut aggregate = tx.load(self.ledger, target).await?;

        let movements = aggregate.apply(action, actor, Utc::now(), &self.policy)?;
        if action == Action::Cancel {
            mark_canceled(&mut aggregate, notes.clone());
        }

        execute(tx.as_mut(), &movements).await?;
        tx.save(&aggregate).await?;

        let mut description = format!(
            "{} {} by user {}",
            aggregate.label(),
            action.past_tense(),
            actor.user_id
        );
        let moved: i32 = movements.iter().map(|m| m.quantity).sum();
        if moved > 0 {
            let verb = match movements[0].kind {
                Movement::Reserve => "reserved",
                Movement::Restore => "restored",
            };
            description.push_str(&format!("; {} unit(s) {}", moved, verb));
        }
        if let Some(notes) = notes.as_deref().filter(|n| !n.trim().is_empty()) {
            description.push_str(&format!(": {}", notes.trim()));
        }
        tx.log_activity(&activity(&aggregate, action.past_tense(), actor, description))
            .await?;
        tx.commit().await?;

        Ok(aggregate)
    }

    /// Record a full or partial return; incidents are raised after commit
    pub async fn return_items(
        &self,
        actor: &Actor,
        target: Target,
        data: ReturnItems,
    ) -> AppResult<ReturnReceipt> {
        data.validate()
            .map_err(|e| AppError::Validation(e.to_string()))?;

        let result = self.run_return(actor, target, &data).await;
        let (aggregate, reports) = match result {
            Ok(done) => done,
            Err(e) => {
                tracing::warn!(
                    ledger = %self.ledger.as_str(),
                    user_id = actor.user_id,
                    target = ?target,
                    "Return failed: {}",
                    e
                );
                return Err(e);
            }
        };

        let mut incidents = Vec::new();
        for report in &reports {
            let Some(incident) = NewIncident::for_return(self.ledger, report, actor.user_id) else {
                continue;
            };
            match self.incidents.record_incident(&incident).await {
                Ok(recorded) => {
                    tracing::info!(
                        incident_id = recorded.id,
                        severity = %recorded.severity.as_str(),
                        "Incident raised for {}",
                        aggregate.label()
                    );
                    incidents.push(recorded);
                }
                Err(e) => tracing::error!(
                    line_id = report.line_id,
                    inventory_item_id = report.inventory_item_id,
                    "Failed to record incident for {}: {}",
                    aggregate.label(),
                    e
                ),
            }
        }

        Ok(ReturnReceipt {
            aggregate,
            incidents,
        })
    }

    async fn run_return(
        &self,
        actor: &Actor,
        target: Target,
        data: &ReturnItems,
    ) -> AppResult<(Aggregate, Vec<crate::models::incident::ConditionReport>)> {
        let mut tx = self.repository.begin().await?;
        let mut aggregate = tx.load(self.ledger, target).await?;

        let outcome = aggregate.record_returns(&data.lines, actor, Utc::now(), &self.policy)?;
        execute(tx.as_mut(), &outcome.movements).await?;
        tx.save(&aggregate).await?;

        let returned: i32 = outcome.movements.iter().map(|m| m.quantity).sum();
        let verb = if aggregate.status() == BatchStatus::PartiallyReturned {
            "partially returned"
        } else {
            "returned"
        };
        let description = format!(
            "{} {} by user {}; {} unit(s) back in stock, {} outstanding",
            aggregate.label(),
            verb,
            actor.user_id,
            returned,
            aggregate.outstanding()
        );
        tx.log_activity(&activity(
            &aggregate,
            Action::Return.past_tense(),
            actor,
            description,
        ))
        .await?;
        tx.commit().await?;

        Ok((aggregate, outcome.reports))
    }

    /// Push back the expected return date of borrowed tools
    pub async fn extend(
        &self,
        actor: &Actor,
        target: Target,
        data: ExtendReturn,
    ) -> AppResult<Aggregate> {
        let result = self.run_extend(actor, target, &data).await;
        if let Err(e) = &result {
            tracing::warn!(
                ledger = %self.ledger.as_str(),
                user_id = actor.user_id,
                target = ?target,
                "Extending the return date failed: {}",
                e
            );
        }
        result
    }

    async fn run_extend(
        &self,
        actor: &Actor,
        target: Target,
        data: &ExtendReturn,
    ) -> AppResult<Aggregate> {
        let mut tx = self.repository.begin().await?;
        let mut aggregate = tx.load(self.ledger, target).await?;
        let previous = aggregate.expected_return();

        aggregate.extend_return(data.expected_return, actor, Utc::now())?;
        tx.save(&aggregate).await?;

        let description = match previous {
            Some(previous) => format!(
                "{} return date extended from {} to {} by user {}",
                aggregate.label(),
                previous.format("%Y-%m-%d"),
                data.expected_return.format("%Y-%m-%d"),
                actor.user_id
            ),
            None => format!(
                "{} return date set to {} by user {}",
                aggregate.label(),
                data.expected_return.format("%Y-%m-%d"),
                actor.user_id
            ),
        };
        tx.log_activity(&activity(&aggregate, "extended", actor, description))
            .await?;
        tx.commit().await?;

        tracing::info!(reference = %aggregate.reference(), "Return date extended");
        Ok(aggregate)
    }

    /// Counts per status, overdue count and quantity still out
    pub async fn summary(&self) -> AppResult<LedgerSummary> {
        let counts = self.repository.status_counts(self.ledger).await?;
        let overdue = self.repository.count_overdue(self.ledger, Utc::now()).await?;
        let outstanding_quantity = self.repository.outstanding_quantity(self.ledger).await?;

        let mut by_status: BTreeMap<String, i64> = BatchStatus::ALL
            .iter()
            .map(|s| (s.as_str().to_string(), 0))
            .collect();
        for (status, count) in counts {
            by_status.insert(status.as_str().to_string(), count);
        }

        Ok(LedgerSummary {
            ledger: Some(self.ledger),
            by_status,
            overdue,
            outstanding_quantity,
        })
    }
}

/// Perform the engine's stock movements inside the open transaction
async fn execute(tx: &mut dyn StoreTx, movements: &[StockMovement]) -> AppResult<()> {
    for movement in movements {
        match movement.kind {
            Movement::Reserve => {
                let reservation = tx
                    .try_reserve(movement.inventory_item_id, movement.quantity)
                    .await?;
                if let Reservation::Insufficient { available } = reservation {
                    let item = tx.inventory_item(movement.inventory_item_id).await?;
                    return Err(AppError::ConcurrencyConflict(format!(
                        "Insufficient stock for {} ({}): {} requested, {} available",
                        item.name, item.code, movement.quantity, available
                    )));
                }
            }
            Movement::Restore => {
                tx.restore(movement.inventory_item_id, movement.quantity)
                    .await?;
            }
        }
    }
    Ok(())
}

/// Record the reason on the batch and every line the cancellation reached
fn mark_canceled(aggregate: &mut Aggregate, reason: Option<String>) {
    if let Some(batch) = aggregate.batch.as_mut() {
        batch.cancel_reason = reason.clone();
    }
    for line in aggregate
        .lines
        .iter_mut()
        .filter(|l| l.status == BatchStatus::Canceled && l.loaded_status != BatchStatus::Canceled)
    {
        line.cancel_reason = reason.clone();
    }
}

fn activity(aggregate: &Aggregate, verb: &str, actor: &Actor, description: String) -> NewActivity {
    let entity = match (aggregate.ledger, aggregate.batch.is_some()) {
        (Ledger::BorrowedTools, true) => "borrowed_tool_batch",
        (Ledger::BorrowedTools, false) => "borrowed_tool",
        (Ledger::Withdrawals, true) => "withdrawal_batch",
        (Ledger::Withdrawals, false) => "withdrawal",
    };
    NewActivity {
        user_id: actor.user_id,
        action: format!("{}_{}", entity, verb),
        description,
        table_name: aggregate.table_name(),
        record_id: aggregate.record_id(),
    }
}

/// `(limit, offset)` for a 1-based page, capped at the configured page size
pub(crate) fn page_window(
    page: Option<i64>,
    per_page: Option<i64>,
    policy: &WorkflowConfig,
) -> (i64, i64) {
    let per_page = per_page.unwrap_or(20).clamp(1, policy.max_page_size.max(1));
    let page = page.unwrap_or(1).max(1);
    (per_page, (page - 1).saturating_mul(per_page))
}
