//! OpenAPI documentation

use axum::Router;
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::api::{activity, health, incidents, inventory, requests, workflows};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "SiteStock API",
        version = "1.0.0",
        description = "Construction asset and inventory workflow REST API"
    ),
    servers(
        (url = "/api/v1", description = "API v1")
    ),
    paths(
        // Health
        health::health_check,
        health::readiness_check,
        // Inventory
        inventory::list_inventory,
        inventory::get_inventory_item,
        inventory::create_inventory_item,
        // Borrowed tools and withdrawals
        workflows::list_batches,
        workflows::create_batch,
        workflows::create_item,
        workflows::summary,
        workflows::get_record,
        workflows::verify,
        workflows::approve,
        workflows::release,
        workflows::cancel,
        workflows::return_items,
        workflows::extend,
        // Requests
        requests::list_requests,
        requests::create_request,
        requests::get_request,
        requests::submit_request,
        requests::verify_request,
        requests::approve_request,
        requests::decline_request,
        requests::procure_request,
        requests::fulfill_request,
        requests::cancel_request,
        // Incidents
        incidents::list_incidents,
        incidents::get_incident,
        // Activity
        activity::record_activity,
    ),
    components(
        schemas(
            // Inventory
            crate::models::inventory::InventoryItem,
            crate::models::inventory::CreateInventoryItem,
            // Workflows
            crate::models::batch::Ledger,
            crate::models::batch::WorkflowBatch,
            crate::models::batch::WorkflowLine,
            crate::models::batch::Aggregate,
            crate::models::batch::NewLine,
            crate::models::batch::CreateBatch,
            crate::models::batch::ReturnLine,
            crate::models::batch::ReturnItems,
            crate::models::batch::ReturnReceipt,
            crate::models::batch::TransitionNotes,
            crate::models::batch::CancelRequest,
            crate::models::batch::ExtendReturn,
            crate::models::batch::LedgerSummary,
            crate::models::status::BatchStatus,
            crate::models::status::RequestStatus,
            crate::models::status::Signoff,
            crate::models::status::Signoffs,
            crate::models::enums::ItemCondition,
            // Requests
            crate::models::request::Request,
            crate::models::request::CreateRequest,
            crate::models::request::DeclineRequest,
            crate::models::enums::RequestType,
            crate::models::enums::Urgency,
            // Incidents
            crate::models::incident::Incident,
            crate::models::enums::IncidentType,
            crate::models::enums::IncidentSeverity,
            // Activity
            crate::models::activity::ActivityEntry,
            // Health
            health::HealthResponse,
            // Errors
            crate::error::ErrorResponse,
        )
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "inventory", description = "Inventory items"),
        (name = "workflows", description = "Borrowed-tool and withdrawal batches"),
        (name = "requests", description = "Procurement requests"),
        (name = "incidents", description = "Incidents raised on returns"),
        (name = "activity", description = "Audit trail")
    )
)]
pub struct ApiDoc;

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// Create the OpenAPI documentation router
pub fn create_openapi_router() -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
