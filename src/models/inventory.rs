//! Inventory item model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

/// Stock-keeping record; `available_quantity` only moves through reservations and restorations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct InventoryItem {
    pub id: i64,
    pub code: String,
    pub name: String,
    pub category: Option<String>,
    pub unit: String,
    pub total_quantity: i32,
    pub available_quantity: i32,
    /// Critical tools always go through the full verify / approve chain
    pub is_critical: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Create inventory item request
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateInventoryItem {
    #[validate(length(min = 1, max = 64))]
    pub code: String,
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    pub category: Option<String>,
    pub unit: Option<String>,
    #[validate(range(min = 0))]
    pub quantity: i32,
    #[serde(default)]
    pub is_critical: bool,
}

/// Outcome of a conditional stock decrement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reservation {
    Reserved { remaining: i32 },
    /// Another workflow consumed the stock first
    Insufficient { available: i32 },
}

impl Reservation {
    pub fn is_reserved(&self) -> bool {
        matches!(self, Reservation::Reserved { .. })
    }
}

/// Query parameters for inventory listing
#[derive(Debug, Default, Deserialize, utoipa::IntoParams)]
pub struct InventoryQuery {
    pub category: Option<String>,
    /// Only items with stock on hand
    pub available_only: Option<bool>,
}
