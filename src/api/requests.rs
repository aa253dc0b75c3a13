//! Procurement request endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

use crate::{
    error::AppResult,
    models::{
        batch::CancelRequest,
        request::{CreateRequest, DeclineRequest, Request, RequestQuery},
    },
    AppState,
};

use super::{ApiResponse, AuthenticatedUser};

/// List requests
#[utoipa::path(
    get,
    path = "/requests",
    tag = "requests",
    security(("bearer_auth" = [])),
    params(RequestQuery),
    responses((status = 200, description = "Requests, newest first", body = [Request]))
)]
pub async fn list_requests(
    State(state): State<AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Query(query): Query<RequestQuery>,
) -> AppResult<Json<ApiResponse<Vec<Request>>>> {
    let requests = state.services.requests.list(&query).await?;
    Ok(ApiResponse::ok(format!("{} request(s)", requests.len()), requests))
}

/// Create a request, as a draft or submitted straight away
#[utoipa::path(
    post,
    path = "/requests",
    tag = "requests",
    security(("bearer_auth" = [])),
    request_body = CreateRequest,
    responses(
        (status = 201, description = "Request created", body = Request),
        (status = 400, description = "Invalid input")
    )
)]
pub async fn create_request(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(data): Json<CreateRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<Request>>)> {
    let request = state.services.requests.create(&claims.actor(), data).await?;
    let message = format!("{} created", request.label());
    Ok((StatusCode::CREATED, ApiResponse::ok(message, request)))
}

#[utoipa::path(
    get,
    path = "/requests/{id}",
    tag = "requests",
    security(("bearer_auth" = [])),
    params(("id" = i64, Path, description = "Request ID")),
    responses(
        (status = 200, description = "Request", body = Request),
        (status = 404, description = "Request not found")
    )
)]
pub async fn get_request(
    State(state): State<AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Path(id): Path<i64>,
) -> AppResult<Json<ApiResponse<Request>>> {
    let request = state.services.requests.get(id).await?;
    Ok(ApiResponse::ok(request.label(), request))
}

#[utoipa::path(
    post,
    path = "/requests/{id}/submit",
    tag = "requests",
    security(("bearer_auth" = [])),
    params(("id" = i64, Path, description = "Request ID")),
    responses(
        (status = 200, description = "Submitted", body = Request),
        (status = 409, description = "Not a draft")
    )
)]
pub async fn submit_request(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i64>,
) -> AppResult<Json<ApiResponse<Request>>> {
    let request = state.services.requests.submit(&claims.actor(), id).await?;
    let message = format!("{} submitted", request.label());
    Ok(ApiResponse::ok(message, request))
}

#[utoipa::path(
    post,
    path = "/requests/{id}/verify",
    tag = "requests",
    security(("bearer_auth" = [])),
    params(("id" = i64, Path, description = "Request ID")),
    responses(
        (status = 200, description = "Verified", body = Request),
        (status = 409, description = "Not submitted")
    )
)]
pub async fn verify_request(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i64>,
) -> AppResult<Json<ApiResponse<Request>>> {
    let request = state.services.requests.verify(&claims.actor(), id).await?;
    let message = format!("{} verified", request.label());
    Ok(ApiResponse::ok(message, request))
}

#[utoipa::path(
    post,
    path = "/requests/{id}/approve",
    tag = "requests",
    security(("bearer_auth" = [])),
    params(("id" = i64, Path, description = "Request ID")),
    responses(
        (status = 200, description = "Approved", body = Request),
        (status = 409, description = "Not verified")
    )
)]
pub async fn approve_request(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i64>,
) -> AppResult<Json<ApiResponse<Request>>> {
    let request = state.services.requests.approve(&claims.actor(), id).await?;
    let message = format!("{} approved", request.label());
    Ok(ApiResponse::ok(message, request))
}

#[utoipa::path(
    post,
    path = "/requests/{id}/decline",
    tag = "requests",
    security(("bearer_auth" = [])),
    params(("id" = i64, Path, description = "Request ID")),
    request_body = DeclineRequest,
    responses(
        (status = 200, description = "Declined", body = Request),
        (status = 409, description = "Already past approval")
    )
)]
pub async fn decline_request(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i64>,
    Json(data): Json<DeclineRequest>,
) -> AppResult<Json<ApiResponse<Request>>> {
    let request = state
        .services
        .requests
        .decline(&claims.actor(), id, data.reason)
        .await?;
    let message = format!("{} declined", request.label());
    Ok(ApiResponse::ok(message, request))
}

#[utoipa::path(
    post,
    path = "/requests/{id}/procure",
    tag = "requests",
    security(("bearer_auth" = [])),
    params(("id" = i64, Path, description = "Request ID")),
    responses(
        (status = 200, description = "Procured", body = Request),
        (status = 409, description = "Not approved")
    )
)]
pub async fn procure_request(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i64>,
) -> AppResult<Json<ApiResponse<Request>>> {
    let request = state.services.requests.procure(&claims.actor(), id).await?;
    let message = format!("{} procured", request.label());
    Ok(ApiResponse::ok(message, request))
}

#[utoipa::path(
    post,
    path = "/requests/{id}/fulfill",
    tag = "requests",
    security(("bearer_auth" = [])),
    params(("id" = i64, Path, description = "Request ID")),
    responses(
        (status = 200, description = "Fulfilled", body = Request),
        (status = 409, description = "Not procured")
    )
)]
pub async fn fulfill_request(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i64>,
) -> AppResult<Json<ApiResponse<Request>>> {
    let request = state.services.requests.fulfill(&claims.actor(), id).await?;
    let message = format!("{} fulfilled", request.label());
    Ok(ApiResponse::ok(message, request))
}

#[utoipa::path(
    post,
    path = "/requests/{id}/cancel",
    tag = "requests",
    security(("bearer_auth" = [])),
    params(("id" = i64, Path, description = "Request ID")),
    request_body = CancelRequest,
    responses(
        (status = 200, description = "Canceled", body = Request),
        (status = 409, description = "Already verified")
    )
)]
pub async fn cancel_request(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i64>,
    body: Option<Json<CancelRequest>>,
) -> AppResult<Json<ApiResponse<Request>>> {
    let reason = body.map(|Json(b)| b.reason);
    let request = state
        .services
        .requests
        .cancel(&claims.actor(), id, reason)
        .await?;
    let message = format!("{} canceled", request.label());
    Ok(ApiResponse::ok(message, request))
}
