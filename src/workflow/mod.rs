//! Maker / verifier / authorizer workflow engine
//!
//! Pure state handling: the guard, role checks, status changes and the stock
//! movements a transition implies. Persistence and the transaction boundary
//! live in the services.

pub mod aggregate;
pub mod rules;

use chrono::{DateTime, Utc};

use crate::{
    config::WorkflowConfig,
    error::{AppError, AppResult},
    models::{
        batch::{WorkflowBatch, WorkflowLine},
        request::Request,
        status::{Action, BatchStatus, RequestStatus, Signoff, WorkflowStatus},
        user::Actor,
    },
};

pub use aggregate::{Movement, ReturnOutcome, StockMovement};
pub use rules::{authorize, guard, TransitionRule};

/// Anything whose status the engine may move
pub trait Transitionable {
    type Status: WorkflowStatus;

    fn current_status(&self) -> Self::Status;

    /// Write the new status and stamp the actor for `action`
    fn apply_transition(&mut self, to: Self::Status, action: Action, signoff: Signoff);
}

impl Transitionable for WorkflowBatch {
    type Status = BatchStatus;

    fn current_status(&self) -> BatchStatus {
        self.status
    }

    fn apply_transition(&mut self, to: BatchStatus, action: Action, signoff: Signoff) {
        self.status = to;
        self.signoffs.set(action, signoff);
        self.updated_at = signoff.at;
    }
}

impl Transitionable for WorkflowLine {
    type Status = BatchStatus;

    fn current_status(&self) -> BatchStatus {
        self.status
    }

    fn apply_transition(&mut self, to: BatchStatus, action: Action, signoff: Signoff) {
        self.status = to;
        self.signoffs.set(action, signoff);
        self.updated_at = signoff.at;
    }
}

impl Transitionable for Request {
    type Status = RequestStatus;

    fn current_status(&self) -> RequestStatus {
        self.status
    }

    fn apply_transition(&mut self, to: RequestStatus, action: Action, signoff: Signoff) {
        self.status = to;
        self.signoffs.set(action, signoff);
        self.updated_at = signoff.at;
    }
}

impl Request {
    /// Guarded request transition; `remarks` is kept for declines and cancellations
    pub fn apply(
        &mut self,
        action: Action,
        actor: &Actor,
        at: DateTime<Utc>,
        remarks: Option<String>,
        policy: &WorkflowConfig,
    ) -> AppResult<()> {
        let label = self.label();
        let rule = guard(rules::REQUEST_RULES, action, self.current_status(), &label)?;
        authorize(rule, actor, self.requested_by, &label, policy)?;
        // Drafts belong to their maker until someone else picks them up
        if matches!(action, Action::Submit | Action::Cancel)
            && !actor.is_admin()
            && actor.user_id != self.requested_by
        {
            return Err(AppError::PermissionDenied(format!(
                "Only the maker of {} may {} it",
                label, action
            )));
        }

        self.apply_transition(
            rule.to,
            action,
            Signoff {
                by: actor.user_id,
                at,
            },
        );
        if remarks.is_some() {
            self.remarks = remarks;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::models::enums::{RequestType, Role, Urgency};
    use crate::models::status::Signoffs;

    fn draft(requested_by: i32) -> Request {
        let now = Utc::now();
        Request {
            id: 1,
            reference: "REQ-2026-000001".to_string(),
            request_type: RequestType::Material,
            project_id: 3,
            description: "Rebar 12mm".to_string(),
            quantity: Some(40),
            unit: Some("pcs".to_string()),
            urgency: Urgency::Normal,
            date_needed: None,
            estimated_cost: None,
            status: RequestStatus::Draft,
            requested_by,
            signoffs: Signoffs::default(),
            remarks: None,
            created_at: now,
            updated_at: now,
            loaded_status: RequestStatus::Draft,
        }
    }

    #[test]
    fn test_request_full_chain() {
        let policy = WorkflowConfig::default();
        let clerk = Actor::new(10, vec![Role::SiteInventoryClerk]);
        let pm = Actor::new(11, vec![Role::ProjectManager]);
        let finance = Actor::new(12, vec![Role::FinanceDirector]);
        let procurement = Actor::new(13, vec![Role::ProcurementOfficer]);
        let now = Utc::now();

        let mut request = draft(clerk.user_id);
        request.apply(Action::Submit, &clerk, now, None, &policy).unwrap();
        request.apply(Action::Verify, &pm, now, None, &policy).unwrap();
        request.apply(Action::Approve, &finance, now, None, &policy).unwrap();
        request.apply(Action::Procure, &procurement, now, None, &policy).unwrap();
        request.apply(Action::Fulfill, &procurement, now, None, &policy).unwrap();

        assert_eq!(request.status, RequestStatus::Fulfilled);
        assert_eq!(request.signoffs.verified.map(|s| s.by), Some(11));
        assert_eq!(request.signoffs.approved.map(|s| s.by), Some(12));
    }

    #[test]
    fn test_declined_request_is_terminal() {
        let policy = WorkflowConfig::default();
        let clerk = Actor::new(10, vec![Role::SiteInventoryClerk]);
        let pm = Actor::new(11, vec![Role::ProjectManager]);
        let now = Utc::now();

        let mut request = draft(clerk.user_id);
        request.apply(Action::Submit, &clerk, now, None, &policy).unwrap();
        request
            .apply(Action::Decline, &pm, now, Some("Use stock from site B".into()), &policy)
            .unwrap();
        assert_eq!(request.remarks.as_deref(), Some("Use stock from site B"));

        let err = request
            .apply(Action::Verify, &pm, now, None, &policy)
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidStatus { .. }));
        assert_eq!(request.status, RequestStatus::Declined);
    }

    #[test]
    fn test_only_maker_submits_or_cancels() {
        let policy = WorkflowConfig::default();
        let maker = Actor::new(10, vec![Role::SiteInventoryClerk]);
        let other = Actor::new(20, vec![Role::Warehouseman]);
        let admin = Actor::new(1, vec![Role::SystemAdmin]);
        let now = Utc::now();

        let mut request = draft(maker.user_id);
        let err = request
            .apply(Action::Submit, &other, now, None, &policy)
            .unwrap_err();
        assert!(matches!(err, AppError::PermissionDenied(_)));
        let err = request
            .apply(Action::Cancel, &other, now, None, &policy)
            .unwrap_err();
        assert!(matches!(err, AppError::PermissionDenied(_)));
        assert_eq!(request.status, RequestStatus::Draft);

        request.apply(Action::Submit, &maker, now, None, &policy).unwrap();
        request
            .apply(Action::Cancel, &admin, now, Some("Duplicate".into()), &policy)
            .unwrap();
        assert_eq!(request.status, RequestStatus::Canceled);
    }
}
