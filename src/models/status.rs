//! Workflow statuses, actions and sign-off stamps

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Behaviour shared by every status set driven by the workflow engine
pub trait WorkflowStatus:
    Copy + Eq + fmt::Debug + fmt::Display + FromStr + Send + Sync + 'static
{
    fn as_str(&self) -> &'static str;

    /// No transition leaves a terminal status
    fn is_terminal(&self) -> bool;
}

text_enum! {
    /// Status chain shared by borrowed-tool and withdrawal batches and their lines
    BatchStatus {
        PendingVerification => "pending_verification",
        PendingApproval => "pending_approval",
        Approved => "approved",
        /// Goods handed over (borrowed tools: "Borrowed")
        Released => "released",
        PartiallyReturned => "partially_returned",
        Returned => "returned",
        Canceled => "canceled",
    }
}

text_enum! {
    /// Procurement request chain
    RequestStatus {
        Draft => "draft",
        Submitted => "submitted",
        Verified => "verified",
        Approved => "approved",
        Procured => "procured",
        Fulfilled => "fulfilled",
        Declined => "declined",
        Canceled => "canceled",
    }
}

impl WorkflowStatus for BatchStatus {
    fn as_str(&self) -> &'static str {
        BatchStatus::as_str(self)
    }

    fn is_terminal(&self) -> bool {
        matches!(self, BatchStatus::Returned | BatchStatus::Canceled)
    }
}

impl WorkflowStatus for RequestStatus {
    fn as_str(&self) -> &'static str {
        RequestStatus::as_str(self)
    }

    fn is_terminal(&self) -> bool {
        matches!(
            self,
            RequestStatus::Fulfilled | RequestStatus::Declined | RequestStatus::Canceled
        )
    }
}

impl fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            BatchStatus::PendingVerification => "Pending Verification",
            BatchStatus::PendingApproval => "Pending Approval",
            BatchStatus::Approved => "Approved",
            BatchStatus::Released => "Released",
            BatchStatus::PartiallyReturned => "Partially Returned",
            BatchStatus::Returned => "Returned",
            BatchStatus::Canceled => "Canceled",
        };
        write!(f, "{}", label)
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RequestStatus::Draft => "Draft",
            RequestStatus::Submitted => "Submitted",
            RequestStatus::Verified => "Verified",
            RequestStatus::Approved => "Approved",
            RequestStatus::Procured => "Procured",
            RequestStatus::Fulfilled => "Fulfilled",
            RequestStatus::Declined => "Declined",
            RequestStatus::Canceled => "Canceled",
        };
        write!(f, "{}", label)
    }
}

text_enum! {
    /// A workflow step requested by an actor
    Action {
        Submit => "submit",
        Verify => "verify",
        Approve => "approve",
        Release => "release",
        Return => "return",
        Cancel => "cancel",
        Decline => "decline",
        Procure => "procure",
        Fulfill => "fulfill",
    }
}

impl Action {
    /// Prefix of the `<prefix>_by` / `<prefix>_at` column pair stamped by this action
    pub fn past_tense(&self) -> &'static str {
        match self {
            Action::Submit => "submitted",
            Action::Verify => "verified",
            Action::Approve => "approved",
            Action::Release => "released",
            Action::Return => "returned",
            Action::Cancel => "canceled",
            Action::Decline => "declined",
            Action::Procure => "procured",
            Action::Fulfill => "fulfilled",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who performed a step, and when
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Signoff {
    pub by: i32,
    pub at: DateTime<Utc>,
}

/// One optional sign-off per workflow action
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Signoffs {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submitted: Option<Signoff>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verified: Option<Signoff>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approved: Option<Signoff>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub released: Option<Signoff>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub returned: Option<Signoff>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub canceled: Option<Signoff>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub declined: Option<Signoff>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub procured: Option<Signoff>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fulfilled: Option<Signoff>,
}

impl Signoffs {
    fn slot(&mut self, action: Action) -> &mut Option<Signoff> {
        match action {
            Action::Submit => &mut self.submitted,
            Action::Verify => &mut self.verified,
            Action::Approve => &mut self.approved,
            Action::Release => &mut self.released,
            Action::Return => &mut self.returned,
            Action::Cancel => &mut self.canceled,
            Action::Decline => &mut self.declined,
            Action::Procure => &mut self.procured,
            Action::Fulfill => &mut self.fulfilled,
        }
    }

    pub fn get(&self, action: Action) -> Option<Signoff> {
        match action {
            Action::Submit => self.submitted,
            Action::Verify => self.verified,
            Action::Approve => self.approved,
            Action::Release => self.released,
            Action::Return => self.returned,
            Action::Cancel => self.canceled,
            Action::Decline => self.declined,
            Action::Procure => self.procured,
            Action::Fulfill => self.fulfilled,
        }
    }

    pub fn set(&mut self, action: Action, signoff: Signoff) {
        *self.slot(action) = Some(signoff);
    }
}
