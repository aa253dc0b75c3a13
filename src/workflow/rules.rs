//! Transition tables and the status guard

use crate::{
    config::WorkflowConfig,
    error::{AppError, AppResult},
    models::{
        batch::Ledger,
        enums::Role,
        status::{Action, BatchStatus, RequestStatus, WorkflowStatus},
        user::Actor,
    },
};

use crate::models::status::{BatchStatus as B, RequestStatus as R};

/// One legal step: `action` moves an entity from any of `from` to `to`
#[derive(Debug)]
pub struct TransitionRule<S: 'static> {
    pub action: Action,
    pub from: &'static [S],
    pub to: S,
    pub roles: &'static [Role],
}

pub const MAKERS: &[Role] = &[
    Role::Warehouseman,
    Role::SiteInventoryClerk,
    Role::ProjectManager,
];
const VERIFIERS: &[Role] = &[Role::ProjectManager];
const AUTHORIZERS: &[Role] = &[Role::AssetDirector, Role::FinanceDirector];
pub const STOREKEEPERS: &[Role] = &[Role::Warehouseman, Role::SiteInventoryClerk];
const CANCELERS: &[Role] = &[
    Role::Warehouseman,
    Role::SiteInventoryClerk,
    Role::ProjectManager,
    Role::AssetDirector,
    Role::FinanceDirector,
];

static WITHDRAWAL_RULES: &[TransitionRule<BatchStatus>] = &[
    TransitionRule {
        action: Action::Verify,
        from: &[B::PendingVerification],
        to: B::PendingApproval,
        roles: VERIFIERS,
    },
    TransitionRule {
        action: Action::Approve,
        from: &[B::PendingApproval],
        to: B::Approved,
        roles: AUTHORIZERS,
    },
    TransitionRule {
        action: Action::Release,
        from: &[B::Approved],
        to: B::Released,
        roles: STOREKEEPERS,
    },
    TransitionRule {
        action: Action::Return,
        from: &[B::Released, B::PartiallyReturned],
        to: B::Returned,
        roles: STOREKEEPERS,
    },
    TransitionRule {
        action: Action::Cancel,
        from: &[
            B::PendingVerification,
            B::PendingApproval,
            B::Approved,
            B::Released,
            B::PartiallyReturned,
        ],
        to: B::Canceled,
        roles: CANCELERS,
    },
];

static BORROW_RULES: &[TransitionRule<BatchStatus>] = &[
    TransitionRule {
        action: Action::Verify,
        from: &[B::PendingVerification],
        to: B::PendingApproval,
        roles: VERIFIERS,
    },
    TransitionRule {
        action: Action::Approve,
        from: &[B::PendingApproval],
        to: B::Approved,
        roles: AUTHORIZERS,
    },
    TransitionRule {
        action: Action::Release,
        from: &[B::Approved],
        to: B::Released,
        roles: STOREKEEPERS,
    },
    TransitionRule {
        action: Action::Return,
        from: &[B::Released, B::PartiallyReturned],
        to: B::Returned,
        roles: STOREKEEPERS,
    },
    // Tools already handed out must come back through a return
    TransitionRule {
        action: Action::Cancel,
        from: &[B::PendingVerification, B::PendingApproval, B::Approved],
        to: B::Canceled,
        roles: CANCELERS,
    },
];

pub static REQUEST_RULES: &[TransitionRule<RequestStatus>] = &[
    TransitionRule {
        action: Action::Submit,
        from: &[R::Draft],
        to: R::Submitted,
        roles: MAKERS,
    },
    TransitionRule {
        action: Action::Verify,
        from: &[R::Submitted],
        to: R::Verified,
        roles: VERIFIERS,
    },
    TransitionRule {
        action: Action::Approve,
        from: &[R::Verified],
        to: R::Approved,
        roles: &[Role::FinanceDirector],
    },
    TransitionRule {
        action: Action::Decline,
        from: &[R::Submitted, R::Verified],
        to: R::Declined,
        roles: &[Role::ProjectManager, Role::FinanceDirector],
    },
    TransitionRule {
        action: Action::Procure,
        from: &[R::Approved],
        to: R::Procured,
        roles: &[Role::ProcurementOfficer],
    },
    TransitionRule {
        action: Action::Fulfill,
        from: &[R::Procured],
        to: R::Fulfilled,
        roles: &[Role::ProcurementOfficer, Role::Warehouseman],
    },
    TransitionRule {
        action: Action::Cancel,
        from: &[R::Draft, R::Submitted],
        to: R::Canceled,
        roles: MAKERS,
    },
];

impl Ledger {
    pub fn rules(&self) -> &'static [TransitionRule<BatchStatus>] {
        match self {
            Ledger::BorrowedTools => BORROW_RULES,
            Ledger::Withdrawals => WITHDRAWAL_RULES,
        }
    }
}

/// Find the rule for `action` and check `current` is one of its source statuses
pub fn guard<S: WorkflowStatus>(
    rules: &'static [TransitionRule<S>],
    action: Action,
    current: S,
    label: &str,
) -> AppResult<&'static TransitionRule<S>> {
    let rule = rules
        .iter()
        .find(|r| r.action == action)
        .ok_or_else(|| AppError::Validation(format!("{} does not support {}", label, action)))?;

    if rule.from.contains(&current) {
        Ok(rule)
    } else {
        Err(AppError::InvalidStatus {
            entity: label.to_string(),
            current: current.to_string(),
            action: action.to_string(),
            expected: join_statuses(rule.from),
        })
    }
}

/// Role check plus segregation of duties between maker and approvers
pub fn authorize<S>(
    rule: &TransitionRule<S>,
    actor: &Actor,
    maker: i32,
    label: &str,
    policy: &WorkflowConfig,
) -> AppResult<()> {
    if !actor.has_any(rule.roles) {
        let roles: Vec<String> = rule.roles.iter().map(|r| r.to_string()).collect();
        return Err(AppError::PermissionDenied(format!(
            "{} requires one of: {}",
            rule.action,
            roles.join(", ")
        )));
    }

    if policy.enforce_segregation
        && !actor.is_admin()
        && actor.user_id == maker
        && matches!(rule.action, Action::Verify | Action::Approve)
    {
        return Err(AppError::PermissionDenied(format!(
            "The maker of {} cannot {} it",
            label, rule.action
        )));
    }

    Ok(())
}

fn join_statuses<S: WorkflowStatus>(statuses: &[S]) -> String {
    let labels: Vec<String> = statuses.iter().map(|s| s.to_string()).collect();
    labels.join(" or ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> WorkflowConfig {
        WorkflowConfig::default()
    }

    #[test]
    fn test_every_non_source_status_is_rejected() {
        for ledger in Ledger::ALL {
            for rule in ledger.rules() {
                for status in BatchStatus::ALL {
                    let result = guard(ledger.rules(), rule.action, *status, "Batch X");
                    if rule.from.contains(status) {
                        assert!(result.is_ok());
                    } else {
                        assert!(
                            matches!(result, Err(AppError::InvalidStatus { .. })),
                            "{:?} {} from {:?} should be rejected",
                            ledger,
                            rule.action,
                            status
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn test_terminal_statuses_have_no_way_out() {
        for ledger in Ledger::ALL {
            for rule in ledger.rules() {
                assert!(rule.from.iter().all(|s| !s.is_terminal()));
            }
        }
        for rule in REQUEST_RULES {
            assert!(rule.from.iter().all(|s| !s.is_terminal()));
        }
    }

    #[test]
    fn test_invalid_status_names_prerequisite() {
        let err = guard(
            Ledger::Withdrawals.rules(),
            Action::Release,
            BatchStatus::PendingApproval,
            "Withdrawal batch WDR-2026-000001",
        )
        .unwrap_err();
        match err {
            AppError::InvalidStatus {
                current, expected, ..
            } => {
                assert_eq!(current, "Pending Approval");
                assert_eq!(expected, "Approved");
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_unsupported_action_is_validation_error() {
        let result = guard(
            Ledger::BorrowedTools.rules(),
            Action::Procure,
            BatchStatus::Approved,
            "Borrowed tool batch",
        );
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[test]
    fn test_borrowed_tools_cannot_cancel_once_released() {
        let result = guard(
            Ledger::BorrowedTools.rules(),
            Action::Cancel,
            BatchStatus::Released,
            "Borrowed tool batch",
        );
        assert!(matches!(result, Err(AppError::InvalidStatus { .. })));
        assert!(guard(
            Ledger::Withdrawals.rules(),
            Action::Cancel,
            BatchStatus::Released,
            "Withdrawal batch",
        )
        .is_ok());
    }

    #[test]
    fn test_maker_cannot_approve_own_batch() {
        let rule = guard(
            Ledger::Withdrawals.rules(),
            Action::Approve,
            BatchStatus::PendingApproval,
            "Withdrawal batch",
        )
        .unwrap();
        let director = Actor::new(5, vec![Role::AssetDirector]);
        assert!(matches!(
            authorize(rule, &director, 5, "Withdrawal batch", &policy()),
            Err(AppError::PermissionDenied(_))
        ));
        assert!(authorize(rule, &director, 6, "Withdrawal batch", &policy()).is_ok());

        let relaxed = WorkflowConfig {
            enforce_segregation: false,
            ..policy()
        };
        assert!(authorize(rule, &director, 5, "Withdrawal batch", &relaxed).is_ok());
    }

    #[test]
    fn test_wrong_role_is_denied() {
        let rule = guard(
            Ledger::Withdrawals.rules(),
            Action::Approve,
            BatchStatus::PendingApproval,
            "Withdrawal batch",
        )
        .unwrap();
        let clerk = Actor::new(9, vec![Role::SiteInventoryClerk]);
        assert!(matches!(
            authorize(rule, &clerk, 5, "Withdrawal batch", &policy()),
            Err(AppError::PermissionDenied(_))
        ));
    }
}
