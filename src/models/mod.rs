//! Data models for SiteStock

/// Declares a unit enum persisted as snake_case text, with `as_str`, `ALL` and `FromStr`.
macro_rules! text_enum {
    (
        $(#[$meta:meta])*
        $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident => $text:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord,
            serde::Serialize, serde::Deserialize, utoipa::ToSchema,
        )]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $( $(#[$vmeta])* $variant ),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = crate::error::AppError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(crate::error::AppError::Validation(format!(
                        "Unknown {} '{}'",
                        stringify!($name),
                        other
                    ))),
                }
            }
        }
    };
}

pub mod activity;
pub mod batch;
pub mod enums;
pub mod incident;
pub mod inventory;
pub mod request;
pub mod status;
pub mod user;

// Re-export commonly used types
pub use activity::{ActivityEntry, NewActivity};
pub use batch::{Aggregate, Ledger, Target, WorkflowBatch, WorkflowLine};
pub use enums::{IncidentSeverity, IncidentType, ItemCondition, RequestType, Role, Urgency};
pub use incident::{Incident, NewIncident};
pub use inventory::{InventoryItem, Reservation};
pub use request::Request;
pub use status::{Action, BatchStatus, RequestStatus, Signoff, Signoffs, WorkflowStatus};
pub use user::{Actor, UserClaims};
