//! Inventory endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

use crate::{
    error::AppResult,
    models::inventory::{CreateInventoryItem, InventoryItem, InventoryQuery},
    AppState,
};

use super::{ApiResponse, AuthenticatedUser};

/// List inventory items
#[utoipa::path(
    get,
    path = "/inventory",
    tag = "inventory",
    security(("bearer_auth" = [])),
    params(InventoryQuery),
    responses(
        (status = 200, description = "Inventory items", body = [InventoryItem]),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn list_inventory(
    State(state): State<AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Query(query): Query<InventoryQuery>,
) -> AppResult<Json<ApiResponse<Vec<InventoryItem>>>> {
    let items = state.services.inventory.list(&query).await?;
    Ok(ApiResponse::ok(format!("{} item(s)", items.len()), items))
}

/// Get inventory item by ID
#[utoipa::path(
    get,
    path = "/inventory/{id}",
    tag = "inventory",
    security(("bearer_auth" = [])),
    params(("id" = i64, Path, description = "Inventory item ID")),
    responses(
        (status = 200, description = "Inventory item", body = InventoryItem),
        (status = 404, description = "Item not found")
    )
)]
pub async fn get_inventory_item(
    State(state): State<AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Path(id): Path<i64>,
) -> AppResult<Json<ApiResponse<InventoryItem>>> {
    let item = state.services.inventory.get(id).await?;
    Ok(ApiResponse::ok(item.name.clone(), item))
}

/// Register an inventory item
#[utoipa::path(
    post,
    path = "/inventory",
    tag = "inventory",
    security(("bearer_auth" = [])),
    request_body = CreateInventoryItem,
    responses(
        (status = 201, description = "Item created", body = InventoryItem),
        (status = 400, description = "Invalid input or duplicate code"),
        (status = 403, description = "Not allowed to register items")
    )
)]
pub async fn create_inventory_item(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(data): Json<CreateInventoryItem>,
) -> AppResult<(StatusCode, Json<ApiResponse<InventoryItem>>)> {
    let item = state.services.inventory.create(&claims.actor(), data).await?;
    let message = format!("Inventory item {} created", item.code);
    Ok((StatusCode::CREATED, ApiResponse::ok(message, item)))
}
