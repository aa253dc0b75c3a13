//! API handlers for SiteStock REST endpoints

pub mod activity;
pub mod health;
pub mod incidents;
pub mod inventory;
pub mod openapi;
pub mod requests;
pub mod workflows;

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{error::AppError, models::{batch::Ledger, user::UserClaims}, AppState};

/// Extractor for authenticated user from JWT token
pub struct AuthenticatedUser(pub UserClaims);

#[async_trait]
impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| AppError::Authentication("Missing authorization header".to_string()))?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or_else(|| AppError::Authentication("Invalid authorization header format".to_string()))?;

        let claims = UserClaims::from_token(token, &state.config.auth.jwt_secret)
            .map_err(|e| AppError::Authentication(e.to_string()))?;

        Ok(AuthenticatedUser(claims))
    }
}

/// Uniform success envelope
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub message: String,
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(message: impl Into<String>, data: T) -> Json<Self> {
        Json(Self {
            success: true,
            message: message.into(),
            data,
        })
    }
}

/// Build the full application router
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_v1 = Router::new()
        // Health check
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        // Inventory
        .route(
            "/inventory",
            get(inventory::list_inventory).post(inventory::create_inventory_item),
        )
        .route("/inventory/:id", get(inventory::get_inventory_item))
        // Borrowed tools and withdrawals
        .nest("/borrowed-tools", workflows::ledger_router(Ledger::BorrowedTools))
        .nest("/withdrawals", workflows::ledger_router(Ledger::Withdrawals))
        // Requests
        .route("/requests", get(requests::list_requests).post(requests::create_request))
        .route("/requests/:id", get(requests::get_request))
        .route("/requests/:id/submit", post(requests::submit_request))
        .route("/requests/:id/verify", post(requests::verify_request))
        .route("/requests/:id/approve", post(requests::approve_request))
        .route("/requests/:id/decline", post(requests::decline_request))
        .route("/requests/:id/procure", post(requests::procure_request))
        .route("/requests/:id/fulfill", post(requests::fulfill_request))
        .route("/requests/:id/cancel", post(requests::cancel_request))
        // Incidents
        .route("/incidents", get(incidents::list_incidents))
        .route("/incidents/:id", get(incidents::get_incident))
        // Audit trail
        .route("/activity/:table/:id", get(activity::record_activity))
        .with_state(state);

    Router::new()
        .nest("/api/v1", api_v1)
        .merge(openapi::create_openapi_router())
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(cors)
}
