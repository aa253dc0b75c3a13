//! Procurement request model

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use super::{
    enums::{RequestType, Urgency},
    status::{RequestStatus, Signoffs},
};

/// Procurement request raised by a maker on site
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct Request {
    pub id: i64,
    pub reference: String,
    pub request_type: RequestType,
    pub project_id: i32,
    pub description: String,
    pub quantity: Option<i32>,
    pub unit: Option<String>,
    pub urgency: Urgency,
    pub date_needed: Option<NaiveDate>,
    #[schema(value_type = Option<String>)]
    pub estimated_cost: Option<Decimal>,
    pub status: RequestStatus,
    pub requested_by: i32,
    pub signoffs: Signoffs,
    /// Reason given on decline or cancel
    pub remarks: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip)]
    pub(crate) loaded_status: RequestStatus,
}

impl Request {
    pub fn label(&self) -> String {
        format!("Request {}", self.reference)
    }

    pub fn reference_for(id: i64, created_at: DateTime<Utc>) -> String {
        use chrono::Datelike;
        format!("REQ-{}-{:06}", created_at.year(), id)
    }
}

/// Create request payload
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateRequest {
    pub request_type: RequestType,
    #[validate(range(min = 1))]
    pub project_id: i32,
    #[validate(length(min = 3, max = 2000))]
    pub description: String,
    #[validate(range(min = 1))]
    pub quantity: Option<i32>,
    pub unit: Option<String>,
    pub urgency: Option<Urgency>,
    pub date_needed: Option<NaiveDate>,
    #[schema(value_type = Option<String>)]
    pub estimated_cost: Option<Decimal>,
    /// Submit straight away instead of saving a draft
    #[serde(default)]
    pub submit: bool,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct DeclineRequest {
    #[validate(length(min = 1, max = 500))]
    pub reason: String,
}

/// Query parameters for request listing
#[derive(Debug, Default, Clone, Deserialize, utoipa::IntoParams)]
pub struct RequestQuery {
    pub status: Option<RequestStatus>,
    pub project_id: Option<i32>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}
