//! Inventory service
//!
//! Quantities are never edited here; they move only through the workflows.

use validator::Validate;

use crate::{
    error::{AppError, AppResult},
    models::{
        enums::Role,
        inventory::{CreateInventoryItem, InventoryItem, InventoryQuery},
        user::Actor,
    },
    repository::Repository,
};

#[derive(Clone)]
pub struct InventoryService {
    repository: Repository,
}

impl InventoryService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// Register a new stock-keeping item with its opening quantity
    pub async fn create(&self, actor: &Actor, data: CreateInventoryItem) -> AppResult<InventoryItem> {
        data.validate()
            .map_err(|e| AppError::Validation(e.to_string()))?;
        actor.require_any(
            &[Role::AssetDirector, Role::Warehouseman],
            "register inventory items",
        )?;

        let item = self.repository.create_inventory_item(&data).await?;
        tracing::info!(code = %item.code, quantity = item.total_quantity, "Inventory item created");
        Ok(item)
    }

    pub async fn get(&self, id: i64) -> AppResult<InventoryItem> {
        self.repository.get_inventory_item(id).await
    }

    pub async fn list(&self, query: &InventoryQuery) -> AppResult<Vec<InventoryItem>> {
        self.repository.list_inventory(query).await
    }
}
