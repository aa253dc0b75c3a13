//! Audit trail endpoint

use axum::{
    extract::{Path, State},
    Json,
};

use crate::{error::AppResult, models::activity::ActivityEntry, AppState};

use super::{ApiResponse, AuthenticatedUser};

/// Activity recorded for one record
#[utoipa::path(
    get,
    path = "/activity/{table}/{id}",
    tag = "activity",
    security(("bearer_auth" = [])),
    params(
        ("table" = String, Path, description = "Table name, e.g. withdrawal_batches"),
        ("id" = i64, Path, description = "Record ID")
    ),
    responses(
        (status = 200, description = "Audit rows, oldest first", body = [ActivityEntry]),
        (status = 404, description = "Table is not audited")
    )
)]
pub async fn record_activity(
    State(state): State<AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Path((table, id)): Path<(String, i64)>,
) -> AppResult<Json<ApiResponse<Vec<ActivityEntry>>>> {
    let entries = state.services.activity.for_record(&table, id).await?;
    Ok(ApiResponse::ok(format!("{} activity entries", entries.len()), entries))
}
