//! Incident endpoints

use axum::{
    extract::{Path, Query, State},
    Json,
};

use crate::{
    error::AppResult,
    models::incident::{Incident, IncidentQuery},
    AppState,
};

use super::{ApiResponse, AuthenticatedUser};

/// List incidents raised on returns
#[utoipa::path(
    get,
    path = "/incidents",
    tag = "incidents",
    security(("bearer_auth" = [])),
    params(IncidentQuery),
    responses((status = 200, description = "Incidents, newest first", body = [Incident]))
)]
pub async fn list_incidents(
    State(state): State<AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Query(query): Query<IncidentQuery>,
) -> AppResult<Json<ApiResponse<Vec<Incident>>>> {
    let incidents = state.services.incidents.list(&query).await?;
    Ok(ApiResponse::ok(format!("{} incident(s)", incidents.len()), incidents))
}

#[utoipa::path(
    get,
    path = "/incidents/{id}",
    tag = "incidents",
    security(("bearer_auth" = [])),
    params(("id" = i64, Path, description = "Incident ID")),
    responses(
        (status = 200, description = "Incident", body = Incident),
        (status = 404, description = "Incident not found")
    )
)]
pub async fn get_incident(
    State(state): State<AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Path(id): Path<i64>,
) -> AppResult<Json<ApiResponse<Incident>>> {
    let incident = state.services.incidents.get(id).await?;
    Ok(ApiResponse::ok(incident.description.clone(), incident))
}
