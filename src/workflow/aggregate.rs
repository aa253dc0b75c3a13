//! Transitions over a batch and its lines, or a single standalone line

use std::collections::HashSet;

use chrono::{DateTime, Utc};

use super::{
    rules::{authorize, guard, STOREKEEPERS},
    Transitionable,
};
use crate::{
    config::WorkflowConfig,
    error::{AppError, AppResult},
    models::{
        batch::{Aggregate, Ledger, ReturnLine},
        enums::Role,
        incident::ConditionReport,
        status::{Action, BatchStatus, Signoff, WorkflowStatus},
        user::Actor,
    },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Movement {
    /// Conditional decrement of `available_quantity`
    Reserve,
    /// Unconditional increment of `available_quantity`
    Restore,
}

/// Stock change implied by a transition on one line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StockMovement {
    pub line_id: i64,
    pub inventory_item_id: i64,
    pub quantity: i32,
    pub kind: Movement,
}

/// Result of recording a (partial) return
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReturnOutcome {
    pub movements: Vec<StockMovement>,
    pub reports: Vec<ConditionReport>,
}

impl Aggregate {
    /// Apply a uniform transition to the batch and every line moving with it.
    ///
    /// Nothing is modified when the guard, the role check or any line check fails.
    /// Returns the stock movements the caller must perform in the same transaction.
    pub fn apply(
        &mut self,
        action: Action,
        actor: &Actor,
        at: DateTime<Utc>,
        policy: &WorkflowConfig,
    ) -> AppResult<Vec<StockMovement>> {
        if action == Action::Return {
            return Err(AppError::Validation(
                "Returns must go through record_returns".to_string(),
            ));
        }
        if self.lines.is_empty() {
            return Err(AppError::Internal(format!("{} has no lines", self.label())));
        }

        let rules = self.ledger.rules();
        let label = self.label();
        let rule = guard(rules, action, self.status(), &label)?;
        authorize(rule, actor, self.requested_by(), &label, policy)?;

        // Lines move in lockstep with their batch; a batch cannot be released
        // unless each of its lines completed approval.
        for line in self.lines.iter().filter(|l| moves_with(action, l.status)) {
            guard(rules, action, line.status, &line_label(&label, line.id))?;
        }

        let movements = self.movements_for(action);
        let signoff = Signoff {
            by: actor.user_id,
            at,
        };

        if let Some(batch) = self.batch.as_mut() {
            batch.apply_transition(rule.to, action, signoff);
        }
        for line in self.lines.iter_mut().filter(|l| moves_with(action, l.status)) {
            line.apply_transition(rule.to, action, signoff);
        }

        Ok(movements)
    }

    /// Stock movements implied by `action`, computed from the current line statuses
    fn movements_for(&self, action: Action) -> Vec<StockMovement> {
        if action == self.ledger.reservation_action() {
            self.lines
                .iter()
                .map(|line| StockMovement {
                    line_id: line.id,
                    inventory_item_id: line.inventory_item_id,
                    quantity: line.quantity,
                    kind: Movement::Reserve,
                })
                .collect()
        } else if action == Action::Cancel {
            self.lines
                .iter()
                .filter(|line| self.ledger.holds_stock(line.status) && line.outstanding() > 0)
                .map(|line| StockMovement {
                    line_id: line.id,
                    inventory_item_id: line.inventory_item_id,
                    quantity: line.outstanding(),
                    kind: Movement::Restore,
                })
                .collect()
        } else {
            Vec::new()
        }
    }

    /// Record a (partial) return of some lines.
    ///
    /// Each returned line becomes `returned` once nothing is outstanding,
    /// `partially_returned` otherwise; the batch follows its lines.
    pub fn record_returns(
        &mut self,
        returns: &[ReturnLine],
        actor: &Actor,
        at: DateTime<Utc>,
        policy: &WorkflowConfig,
    ) -> AppResult<ReturnOutcome> {
        if returns.is_empty() {
            return Err(AppError::Validation(
                "At least one returned line is required".to_string(),
            ));
        }

        let rules = self.ledger.rules();
        let label = self.label();
        let rule = guard(rules, Action::Return, self.status(), &label)?;
        authorize(rule, actor, self.requested_by(), &label, policy)?;

        let mut seen = HashSet::new();
        let mut planned = Vec::with_capacity(returns.len());
        for ret in returns {
            if !seen.insert(ret.line_id) {
                return Err(AppError::Validation(format!(
                    "Line {} appears more than once",
                    ret.line_id
                )));
            }
            let idx = self
                .lines
                .iter()
                .position(|l| l.id == ret.line_id)
                .ok_or_else(|| {
                    AppError::NotFound(format!("Line {} is not part of {}", ret.line_id, label))
                })?;
            let line = &self.lines[idx];
            guard(rules, Action::Return, line.status, &line_label(&label, line.id))?;

            let outstanding = line.outstanding();
            let quantity = ret.quantity.unwrap_or(outstanding);
            if quantity < 1 || quantity > outstanding {
                return Err(AppError::Validation(format!(
                    "Cannot return {} unit(s) on line {}: {} outstanding",
                    quantity, line.id, outstanding
                )));
            }
            planned.push((idx, quantity, ret));
        }

        let signoff = Signoff {
            by: actor.user_id,
            at,
        };
        let mut outcome = ReturnOutcome::default();

        for (idx, quantity, ret) in planned {
            let line = &mut self.lines[idx];
            line.quantity_returned += quantity;
            line.condition_returned = Some(ret.condition);
            line.return_notes = ret.notes.clone();
            let to = if line.outstanding() == 0 {
                BatchStatus::Returned
            } else {
                BatchStatus::PartiallyReturned
            };
            line.apply_transition(to, Action::Return, signoff);

            outcome.movements.push(StockMovement {
                line_id: line.id,
                inventory_item_id: line.inventory_item_id,
                quantity,
                kind: Movement::Restore,
            });
            outcome.reports.push(ConditionReport {
                line_id: line.id,
                batch_id: line.batch_id,
                inventory_item_id: line.inventory_item_id,
                quantity,
                condition: ret.condition,
                notes: ret.notes.clone(),
            });
        }

        let all_back = self.lines.iter().all(|l| l.status.is_terminal());
        if let Some(batch) = self.batch.as_mut() {
            let to = if all_back {
                BatchStatus::Returned
            } else {
                BatchStatus::PartiallyReturned
            };
            batch.apply_transition(to, Action::Return, signoff);
        }

        Ok(outcome)
    }

    /// Push back the expected return date of tools that are out
    pub fn extend_return(
        &mut self,
        until: DateTime<Utc>,
        actor: &Actor,
        at: DateTime<Utc>,
    ) -> AppResult<()> {
        if self.ledger != Ledger::BorrowedTools {
            return Err(AppError::Validation(format!(
                "{} does not support extend",
                self.label()
            )));
        }
        let status = self.status();
        if !matches!(
            status,
            BatchStatus::Released | BatchStatus::PartiallyReturned
        ) {
            return Err(AppError::InvalidStatus {
                entity: self.label(),
                current: status.to_string(),
                action: "extend".to_string(),
                expected: format!(
                    "{} or {}",
                    BatchStatus::Released,
                    BatchStatus::PartiallyReturned
                ),
            });
        }

        let mut allowed = STOREKEEPERS.to_vec();
        allowed.push(Role::ProjectManager);
        actor.require_any(&allowed, "extend borrowed tools")?;

        let current = self.expected_return();
        if until <= at || current.map(|c| until <= c).unwrap_or(false) {
            return Err(AppError::Validation(
                "The new return date must be later than the current one".to_string(),
            ));
        }

        if let Some(batch) = self.batch.as_mut() {
            batch.expected_return = Some(until);
            batch.updated_at = at;
        }
        for line in self.lines.iter_mut().filter(|l| !l.status.is_terminal()) {
            line.expected_return = Some(until);
            line.updated_at = at;
        }
        Ok(())
    }
}

/// Lines already closed stay where they are when the batch is canceled
fn moves_with(action: Action, status: BatchStatus) -> bool {
    !(action == Action::Cancel && status.is_terminal())
}

fn line_label(label: &str, line_id: i64) -> String {
    format!("{} line {}", label, line_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        batch::{WorkflowBatch, WorkflowLine},
        enums::ItemCondition,
        status::Signoffs,
    };

    fn line(id: i64, item: i64, quantity: i32) -> WorkflowLine {
        let now = Utc::now();
        WorkflowLine {
            id,
            ledger: Ledger::Withdrawals,
            batch_id: Some(1),
            reference: None,
            inventory_item_id: item,
            quantity,
            quantity_returned: 0,
            status: BatchStatus::PendingVerification,
            condition_returned: None,
            return_notes: None,
            notes: None,
            requested_by: 100,
            project_id: None,
            purpose: None,
            expected_return: None,
            signoffs: Signoffs::default(),
            cancel_reason: None,
            created_at: now,
            updated_at: now,
            loaded_status: BatchStatus::PendingVerification,
        }
    }

    fn batch(ledger: Ledger, lines: Vec<WorkflowLine>) -> Aggregate {
        let now = Utc::now();
        Aggregate {
            ledger,
            batch: Some(WorkflowBatch {
                id: 1,
                ledger,
                reference: ledger.reference(1, now),
                requested_by: 100,
                project_id: None,
                purpose: None,
                expected_return: None,
                status: BatchStatus::PendingVerification,
                signoffs: Signoffs::default(),
                cancel_reason: None,
                created_at: now,
                updated_at: now,
                loaded_status: BatchStatus::PendingVerification,
            }),
            lines: lines
                .into_iter()
                .map(|mut l| {
                    l.ledger = ledger;
                    l
                })
                .collect(),
        }
    }

    fn pm() -> Actor {
        Actor::new(2, vec![Role::ProjectManager])
    }
    fn director() -> Actor {
        Actor::new(3, vec![Role::AssetDirector])
    }
    fn warehouse() -> Actor {
        Actor::new(4, vec![Role::Warehouseman])
    }

    fn approved(ledger: Ledger) -> Aggregate {
        let policy = WorkflowConfig::default();
        let mut agg = batch(ledger, vec![line(10, 7, 5), line(11, 8, 2)]);
        agg.apply(Action::Verify, &pm(), Utc::now(), &policy).unwrap();
        agg.apply(Action::Approve, &director(), Utc::now(), &policy)
            .unwrap();
        agg
    }

    fn total(movements: &[StockMovement], kind: Movement) -> i32 {
        movements
            .iter()
            .filter(|m| m.kind == kind)
            .map(|m| m.quantity)
            .sum()
    }

    #[test]
    fn test_withdrawal_reserves_at_approval() {
        let policy = WorkflowConfig::default();
        let mut agg = batch(Ledger::Withdrawals, vec![line(10, 7, 5), line(11, 8, 2)]);
        let verify = agg.apply(Action::Verify, &pm(), Utc::now(), &policy).unwrap();
        assert!(verify.is_empty());

        let approve = agg
            .apply(Action::Approve, &director(), Utc::now(), &policy)
            .unwrap();
        assert_eq!(total(&approve, Movement::Reserve), 7);
        assert!(agg.lines.iter().all(|l| l.status == BatchStatus::Approved));
        assert_eq!(
            agg.batch.as_ref().unwrap().signoffs.approved.map(|s| s.by),
            Some(3)
        );
    }

    #[test]
    fn test_borrowed_tools_reserve_at_release() {
        let policy = WorkflowConfig::default();
        let mut agg = approved(Ledger::BorrowedTools);
        let release = agg
            .apply(Action::Release, &warehouse(), Utc::now(), &policy)
            .unwrap();
        assert_eq!(total(&release, Movement::Reserve), 7);
    }

    #[test]
    fn test_cancel_before_approval_moves_no_stock() {
        let policy = WorkflowConfig::default();
        let mut agg = batch(Ledger::Withdrawals, vec![line(10, 7, 5)]);
        agg.apply(Action::Verify, &pm(), Utc::now(), &policy).unwrap();
        let cancel = agg
            .apply(Action::Cancel, &warehouse(), Utc::now(), &policy)
            .unwrap();
        assert!(cancel.is_empty());
        assert_eq!(agg.status(), BatchStatus::Canceled);
    }

    #[test]
    fn test_cancel_after_partial_return_restores_outstanding_only() {
        let policy = WorkflowConfig::default();
        let mut agg = approved(Ledger::Withdrawals);
        agg.apply(Action::Release, &warehouse(), Utc::now(), &policy)
            .unwrap();

        let returned = agg
            .record_returns(
                &[ReturnLine {
                    line_id: 10,
                    quantity: Some(3),
                    condition: ItemCondition::Good,
                    notes: None,
                }],
                &warehouse(),
                Utc::now(),
                &policy,
            )
            .unwrap();
        assert_eq!(agg.status(), BatchStatus::PartiallyReturned);

        let cancel = agg
            .apply(Action::Cancel, &warehouse(), Utc::now(), &policy)
            .unwrap();
        // 7 reserved at approval: 3 back through the return, 2 + 2 on cancel
        assert_eq!(
            total(&returned.movements, Movement::Restore) + total(&cancel, Movement::Restore),
            7
        );
        assert!(agg.lines.iter().all(|l| l.status == BatchStatus::Canceled));
    }

    #[test]
    fn test_release_requires_every_line_approved() {
        let policy = WorkflowConfig::default();
        let mut agg = approved(Ledger::Withdrawals);
        agg.lines[1].status = BatchStatus::PendingApproval;
        let before = agg.clone();

        let err = agg
            .apply(Action::Release, &warehouse(), Utc::now(), &policy)
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidStatus { .. }));
        assert_eq!(agg, before);
    }

    #[test]
    fn test_failed_guard_leaves_state_unchanged() {
        let policy = WorkflowConfig::default();
        let mut agg = batch(Ledger::Withdrawals, vec![line(10, 7, 5)]);
        let before = agg.clone();
        let err = agg
            .apply(Action::Approve, &director(), Utc::now(), &policy)
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidStatus { .. }));
        assert_eq!(agg, before);
    }

    #[test]
    fn test_partial_then_full_return() {
        let policy = WorkflowConfig::default();
        let mut agg = approved(Ledger::Withdrawals);
        agg.apply(Action::Release, &warehouse(), Utc::now(), &policy)
            .unwrap();

        let first = agg
            .record_returns(
                &[ReturnLine {
                    line_id: 10,
                    quantity: Some(3),
                    condition: ItemCondition::Good,
                    notes: None,
                }],
                &warehouse(),
                Utc::now(),
                &policy,
            )
            .unwrap();
        assert_eq!(total(&first.movements, Movement::Restore), 3);
        assert_eq!(agg.lines[0].outstanding(), 2);
        assert_eq!(agg.lines[0].status, BatchStatus::PartiallyReturned);
        assert_eq!(agg.lines[1].status, BatchStatus::Released);

        agg.record_returns(
            &[
                ReturnLine {
                    line_id: 10,
                    quantity: None,
                    condition: ItemCondition::Good,
                    notes: None,
                },
                ReturnLine {
                    line_id: 11,
                    quantity: None,
                    condition: ItemCondition::Damaged,
                    notes: Some("bent".to_string()),
                },
            ],
            &warehouse(),
            Utc::now(),
            &policy,
        )
        .unwrap();
        assert_eq!(agg.status(), BatchStatus::Returned);
        assert_eq!(agg.outstanding(), 0);
    }

    #[test]
    fn test_over_return_is_rejected() {
        let policy = WorkflowConfig::default();
        let mut agg = approved(Ledger::Withdrawals);
        agg.apply(Action::Release, &warehouse(), Utc::now(), &policy)
            .unwrap();
        let err = agg
            .record_returns(
                &[ReturnLine {
                    line_id: 11,
                    quantity: Some(3),
                    condition: ItemCondition::Good,
                    notes: None,
                }],
                &warehouse(),
                Utc::now(),
                &policy,
            )
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(agg.lines[1].quantity_returned, 0);
    }

    #[test]
    fn test_extend_only_while_out() {
        let policy = WorkflowConfig::default();
        let mut agg = approved(Ledger::BorrowedTools);
        let later = Utc::now() + chrono::Duration::days(3);
        assert!(matches!(
            agg.extend_return(later, &warehouse(), Utc::now()),
            Err(AppError::InvalidStatus { .. })
        ));

        agg.apply(Action::Release, &warehouse(), Utc::now(), &policy)
            .unwrap();
        agg.extend_return(later, &warehouse(), Utc::now()).unwrap();
        assert_eq!(agg.expected_return(), Some(later));
        assert!(agg.lines.iter().all(|l| l.expected_return == Some(later)));
    }
}
