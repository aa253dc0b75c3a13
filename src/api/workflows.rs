//! Borrowed-tool and withdrawal endpoints
//!
//! Both ledgers share these handlers; the router nests them once per ledger
//! and passes the ledger as an extension.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Extension, Json, Router,
};

use crate::{
    error::AppResult,
    models::batch::{
        Aggregate, BatchQuery, CancelRequest, CreateBatch, ExtendReturn, Ledger, LedgerSummary,
        ReturnItems, ReturnReceipt, Target, TransitionNotes,
    },
    AppState,
};

use super::{ApiResponse, AuthenticatedUser};

/// Routes for one ledger, nested under `/borrowed-tools` or `/withdrawals`
pub fn ledger_router(ledger: Ledger) -> Router<AppState> {
    Router::new()
        .route("/batches", get(list_batches).post(create_batch))
        .route("/items", post(create_item))
        .route("/summary", get(summary))
        .route("/:scope/:id", get(get_record))
        .route("/:scope/:id/verify", post(verify))
        .route("/:scope/:id/approve", post(approve))
        .route("/:scope/:id/release", post(release))
        .route("/:scope/:id/cancel", post(cancel))
        .route("/:scope/:id/return", post(return_items))
        .route("/:scope/:id/extend", post(extend))
        .layer(Extension(ledger))
}

/// List batches and standalone lines
#[utoipa::path(
    get,
    path = "/{ledger}/batches",
    tag = "workflows",
    security(("bearer_auth" = [])),
    params(
        ("ledger" = String, Path, description = "borrowed-tools or withdrawals"),
        BatchQuery
    ),
    responses(
        (status = 200, description = "Batches, newest first", body = [Aggregate]),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn list_batches(
    State(state): State<AppState>,
    Extension(ledger): Extension<Ledger>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Query(query): Query<BatchQuery>,
) -> AppResult<Json<ApiResponse<Vec<Aggregate>>>> {
    let batches = state.services.ledger(ledger).list(&query).await?;
    Ok(ApiResponse::ok(format!("{} record(s)", batches.len()), batches))
}

/// Create a batch
#[utoipa::path(
    post,
    path = "/{ledger}/batches",
    tag = "workflows",
    security(("bearer_auth" = [])),
    params(("ledger" = String, Path, description = "borrowed-tools or withdrawals")),
    request_body = CreateBatch,
    responses(
        (status = 201, description = "Batch created", body = Aggregate),
        (status = 400, description = "Invalid lines or not enough stock"),
        (status = 403, description = "Not a maker")
    )
)]
pub async fn create_batch(
    State(state): State<AppState>,
    Extension(ledger): Extension<Ledger>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(data): Json<CreateBatch>,
) -> AppResult<(StatusCode, Json<ApiResponse<Aggregate>>)> {
    let created = state
        .services
        .ledger(ledger)
        .create_batch(&claims.actor(), data)
        .await?;
    let message = format!("{} created", created.label());
    Ok((StatusCode::CREATED, ApiResponse::ok(message, created)))
}

/// Create a single line without a batch
#[utoipa::path(
    post,
    path = "/{ledger}/items",
    tag = "workflows",
    security(("bearer_auth" = [])),
    params(("ledger" = String, Path, description = "borrowed-tools or withdrawals")),
    request_body = CreateBatch,
    responses(
        (status = 201, description = "Line created", body = Aggregate),
        (status = 400, description = "Invalid line or not enough stock")
    )
)]
pub async fn create_item(
    State(state): State<AppState>,
    Extension(ledger): Extension<Ledger>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(data): Json<CreateBatch>,
) -> AppResult<(StatusCode, Json<ApiResponse<Aggregate>>)> {
    let created = state
        .services
        .ledger(ledger)
        .create_single(&claims.actor(), data)
        .await?;
    let message = format!("{} created", created.label());
    Ok((StatusCode::CREATED, ApiResponse::ok(message, created)))
}

/// Status counts, overdue count and quantity out
#[utoipa::path(
    get,
    path = "/{ledger}/summary",
    tag = "workflows",
    security(("bearer_auth" = [])),
    params(("ledger" = String, Path, description = "borrowed-tools or withdrawals")),
    responses((status = 200, description = "Ledger summary", body = LedgerSummary))
)]
pub async fn summary(
    State(state): State<AppState>,
    Extension(ledger): Extension<Ledger>,
    AuthenticatedUser(_claims): AuthenticatedUser,
) -> AppResult<Json<ApiResponse<LedgerSummary>>> {
    let summary = state.services.ledger(ledger).summary().await?;
    Ok(ApiResponse::ok("Summary", summary))
}

/// Get a batch or a standalone line
#[utoipa::path(
    get,
    path = "/{ledger}/{scope}/{id}",
    tag = "workflows",
    security(("bearer_auth" = [])),
    params(
        ("ledger" = String, Path, description = "borrowed-tools or withdrawals"),
        ("scope" = String, Path, description = "batches or items"),
        ("id" = i64, Path, description = "Batch or line ID")
    ),
    responses(
        (status = 200, description = "Record with its lines", body = Aggregate),
        (status = 404, description = "Not found")
    )
)]
pub async fn get_record(
    State(state): State<AppState>,
    Extension(ledger): Extension<Ledger>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Path((scope, id)): Path<(String, i64)>,
) -> AppResult<Json<ApiResponse<Aggregate>>> {
    let target = Target::from_scope(&scope, id)?;
    let record = state.services.ledger(ledger).get(target).await?;
    let message = record.label();
    Ok(ApiResponse::ok(message, record))
}

/// Verify (maker's request checked by the project manager)
#[utoipa::path(
    post,
    path = "/{ledger}/{scope}/{id}/verify",
    tag = "workflows",
    security(("bearer_auth" = [])),
    params(
        ("ledger" = String, Path, description = "borrowed-tools or withdrawals"),
        ("scope" = String, Path, description = "batches or items"),
        ("id" = i64, Path, description = "Batch or line ID")
    ),
    request_body = TransitionNotes,
    responses(
        (status = 200, description = "Verified", body = Aggregate),
        (status = 403, description = "Role not allowed"),
        (status = 409, description = "Not pending verification")
    )
)]
pub async fn verify(
    State(state): State<AppState>,
    Extension(ledger): Extension<Ledger>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path((scope, id)): Path<(String, i64)>,
    body: Option<Json<TransitionNotes>>,
) -> AppResult<Json<ApiResponse<Aggregate>>> {
    let target = Target::from_scope(&scope, id)?;
    let notes = body.and_then(|Json(b)| b.notes);
    let record = state
        .services
        .ledger(ledger)
        .verify(&claims.actor(), target, notes)
        .await?;
    let message = format!("{} verified", record.label());
    Ok(ApiResponse::ok(message, record))
}

/// Approve; withdrawals reserve stock here
#[utoipa::path(
    post,
    path = "/{ledger}/{scope}/{id}/approve",
    tag = "workflows",
    security(("bearer_auth" = [])),
    params(
        ("ledger" = String, Path, description = "borrowed-tools or withdrawals"),
        ("scope" = String, Path, description = "batches or items"),
        ("id" = i64, Path, description = "Batch or line ID")
    ),
    request_body = TransitionNotes,
    responses(
        (status = 200, description = "Approved", body = Aggregate),
        (status = 403, description = "Role not allowed"),
        (status = 409, description = "Not pending approval, or stock taken by another approval")
    )
)]
pub async fn approve(
    State(state): State<AppState>,
    Extension(ledger): Extension<Ledger>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path((scope, id)): Path<(String, i64)>,
    body: Option<Json<TransitionNotes>>,
) -> AppResult<Json<ApiResponse<Aggregate>>> {
    let target = Target::from_scope(&scope, id)?;
    let notes = body.and_then(|Json(b)| b.notes);
    let record = state
        .services
        .ledger(ledger)
        .approve(&claims.actor(), target, notes)
        .await?;
    let message = format!("{} approved", record.label());
    Ok(ApiResponse::ok(message, record))
}

/// Hand the goods over; borrowed tools reserve stock here
#[utoipa::path(
    post,
    path = "/{ledger}/{scope}/{id}/release",
    tag = "workflows",
    security(("bearer_auth" = [])),
    params(
        ("ledger" = String, Path, description = "borrowed-tools or withdrawals"),
        ("scope" = String, Path, description = "batches or items"),
        ("id" = i64, Path, description = "Batch or line ID")
    ),
    request_body = TransitionNotes,
    responses(
        (status = 200, description = "Released", body = Aggregate),
        (status = 409, description = "Not approved")
    )
)]
pub async fn release(
    State(state): State<AppState>,
    Extension(ledger): Extension<Ledger>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path((scope, id)): Path<(String, i64)>,
    body: Option<Json<TransitionNotes>>,
) -> AppResult<Json<ApiResponse<Aggregate>>> {
    let target = Target::from_scope(&scope, id)?;
    let notes = body.and_then(|Json(b)| b.notes);
    let record = state
        .services
        .ledger(ledger)
        .release(&claims.actor(), target, notes)
        .await?;
    let message = format!("{} released", record.label());
    Ok(ApiResponse::ok(message, record))
}

/// Cancel, restoring any reserved stock
#[utoipa::path(
    post,
    path = "/{ledger}/{scope}/{id}/cancel",
    tag = "workflows",
    security(("bearer_auth" = [])),
    params(
        ("ledger" = String, Path, description = "borrowed-tools or withdrawals"),
        ("scope" = String, Path, description = "batches or items"),
        ("id" = i64, Path, description = "Batch or line ID")
    ),
    request_body = CancelRequest,
    responses(
        (status = 200, description = "Canceled", body = Aggregate),
        (status = 409, description = "Status does not allow cancellation")
    )
)]
pub async fn cancel(
    State(state): State<AppState>,
    Extension(ledger): Extension<Ledger>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path((scope, id)): Path<(String, i64)>,
    Json(data): Json<CancelRequest>,
) -> AppResult<Json<ApiResponse<Aggregate>>> {
    let target = Target::from_scope(&scope, id)?;
    let record = state
        .services
        .ledger(ledger)
        .cancel(&claims.actor(), target, data.reason)
        .await?;
    let message = format!("{} canceled", record.label());
    Ok(ApiResponse::ok(message, record))
}

/// Record a full or partial return
#[utoipa::path(
    post,
    path = "/{ledger}/{scope}/{id}/return",
    tag = "workflows",
    security(("bearer_auth" = [])),
    params(
        ("ledger" = String, Path, description = "borrowed-tools or withdrawals"),
        ("scope" = String, Path, description = "batches or items"),
        ("id" = i64, Path, description = "Batch or line ID")
    ),
    request_body = ReturnItems,
    responses(
        (status = 200, description = "Return recorded", body = ReturnReceipt),
        (status = 400, description = "More returned than outstanding"),
        (status = 409, description = "Nothing released")
    )
)]
pub async fn return_items(
    State(state): State<AppState>,
    Extension(ledger): Extension<Ledger>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path((scope, id)): Path<(String, i64)>,
    Json(data): Json<ReturnItems>,
) -> AppResult<Json<ApiResponse<ReturnReceipt>>> {
    let target = Target::from_scope(&scope, id)?;
    let receipt = state
        .services
        .ledger(ledger)
        .return_items(&claims.actor(), target, data)
        .await?;
    let message = format!(
        "{} is now {}",
        receipt.aggregate.label(),
        receipt.aggregate.status()
    );
    Ok(ApiResponse::ok(message, receipt))
}

/// Extend the expected return date of borrowed tools
#[utoipa::path(
    post,
    path = "/{ledger}/{scope}/{id}/extend",
    tag = "workflows",
    security(("bearer_auth" = [])),
    params(
        ("ledger" = String, Path, description = "borrowed-tools"),
        ("scope" = String, Path, description = "batches or items"),
        ("id" = i64, Path, description = "Batch or line ID")
    ),
    request_body = ExtendReturn,
    responses(
        (status = 200, description = "Return date extended", body = Aggregate),
        (status = 409, description = "Tools are not out")
    )
)]
pub async fn extend(
    State(state): State<AppState>,
    Extension(ledger): Extension<Ledger>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path((scope, id)): Path<(String, i64)>,
    Json(data): Json<ExtendReturn>,
) -> AppResult<Json<ApiResponse<Aggregate>>> {
    let target = Target::from_scope(&scope, id)?;
    let record = state
        .services
        .ledger(ledger)
        .extend(&claims.actor(), target, data)
        .await?;
    let message = format!("{} extended", record.label());
    Ok(ApiResponse::ok(message, record))
}
