//! Shared fixtures for the integration tests

#![allow(dead_code)]

use std::sync::Arc;

use sitestock_server::{
    config::WorkflowConfig,
    models::{
        batch::{CreateBatch, NewLine},
        enums::Role,
        inventory::{CreateInventoryItem, InventoryItem},
        user::Actor,
    },
    repository::{MemoryStore, WorkflowStore},
    services::Services,
};

pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub services: Services,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_policy(WorkflowConfig::default())
    }

    pub fn with_policy(policy: WorkflowConfig) -> Self {
        let store = Arc::new(MemoryStore::new());
        let services = Services::new(store.clone(), store.clone(), policy);
        Self { store, services }
    }

    /// Register an inventory item with `quantity` units on hand
    pub async fn stock(&self, code: &str, quantity: i32, is_critical: bool) -> InventoryItem {
        self.store
            .create_inventory_item(&CreateInventoryItem {
                code: code.to_string(),
                name: format!("Item {}", code),
                category: Some("site".to_string()),
                unit: None,
                quantity,
                is_critical,
            })
            .await
            .unwrap()
    }

    pub async fn available(&self, item_id: i64) -> i32 {
        self.store
            .get_inventory_item(item_id)
            .await
            .unwrap()
            .available_quantity
    }
}

pub fn clerk() -> Actor {
    Actor::new(10, vec![Role::SiteInventoryClerk])
}

pub fn project_manager() -> Actor {
    Actor::new(11, vec![Role::ProjectManager])
}

pub fn asset_director() -> Actor {
    Actor::new(12, vec![Role::AssetDirector])
}

pub fn finance_director() -> Actor {
    Actor::new(13, vec![Role::FinanceDirector])
}

pub fn warehouseman() -> Actor {
    Actor::new(14, vec![Role::Warehouseman])
}

pub fn procurement_officer() -> Actor {
    Actor::new(15, vec![Role::ProcurementOfficer])
}

/// Payload with one line per `(item id, quantity)`
pub fn lines(items: &[(i64, i32)]) -> CreateBatch {
    CreateBatch {
        lines: items
            .iter()
            .map(|&(inventory_item_id, quantity)| NewLine {
                inventory_item_id,
                quantity,
                notes: None,
            })
            .collect(),
        project_id: Some(3),
        purpose: Some("Level 2 formwork".to_string()),
        expected_return: None,
    }
}
