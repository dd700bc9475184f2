// src/handlers/pickups.rs

use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::error::AppError,
    config::AppState,
    middleware::{
        auth::AuthenticatedUser,
        rbac::{PermFieldOps, RequirePermission},
    },
    models::pickup::{Pickup, PickupStop, SkipPickupPayload, UpdatePickupStatusPayload},
};

// =============================================================================
//  CUSTOMER
// =============================================================================

// GET /api/pickups
#[utoipa::path(
    get,
    path = "/api/pickups",
    tag = "Pickups",
    responses((status = 200, description = "Own pickups from today on", body = Vec<Pickup>)),
    security(("api_jwt" = []))
)]
pub async fn list_my_pickups(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<impl IntoResponse, AppError> {
    let pickups = app_state.pickup_service.list_upcoming_for_user(&user).await?;
    Ok(Json(pickups))
}

// POST /api/pickups/{id}/skip
#[utoipa::path(
    post,
    path = "/api/pickups/{id}/skip",
    tag = "Pickups",
    request_body = SkipPickupPayload,
    params(("id" = Uuid, Path, description = "Pickup ID")),
    responses(
        (status = 200, description = "Pickup skipped", body = Pickup),
        (status = 409, description = "Pickup already underway, or skip limit reached")
    ),
    security(("api_jwt" = []))
)]
pub async fn skip_pickup(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(pickup_id): Path<Uuid>,
    Json(payload): Json<SkipPickupPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let pickup = app_state
        .pickup_service
        .skip(&user, pickup_id, payload)
        .await?;
    Ok(Json(pickup))
}

// =============================================================================
//  FIELD OPERATIONS
// =============================================================================

// GET /api/ops/pickups/today
#[utoipa::path(
    get,
    path = "/api/ops/pickups/today",
    tag = "Operations",
    responses(
        (status = 200, description = "Today's route", body = Vec<PickupStop>),
        (status = 403, description = "Not a driver or staff member")
    ),
    security(("api_jwt" = []))
)]
pub async fn list_today(
    State(app_state): State<AppState>,
    _perm: RequirePermission<PermFieldOps>,
) -> Result<impl IntoResponse, AppError> {
    let stops = app_state.pickup_service.list_today().await?;
    Ok(Json(stops))
}

// GET /api/ops/pickups/needs-reminder
#[utoipa::path(
    get,
    path = "/api/ops/pickups/needs-reminder",
    tag = "Operations",
    responses((status = 200, description = "Scheduled pickups with no reminder sent", body = Vec<Pickup>)),
    security(("api_jwt" = []))
)]
pub async fn list_needing_reminder(
    State(app_state): State<AppState>,
    _perm: RequirePermission<PermFieldOps>,
) -> Result<impl IntoResponse, AppError> {
    let pickups = app_state.pickup_service.list_needing_reminder().await?;
    Ok(Json(pickups))
}

// POST /api/ops/subscriptions/{id}/schedule
#[utoipa::path(
    post,
    path = "/api/ops/subscriptions/{id}/schedule",
    tag = "Operations",
    params(("id" = Uuid, Path, description = "Subscription ID")),
    responses(
        (status = 200, description = "Next pickup (existing one if already booked)", body = Pickup),
        (status = 409, description = "Subscription is not active")
    ),
    security(("api_jwt" = []))
)]
pub async fn schedule_next(
    State(app_state): State<AppState>,
    _perm: RequirePermission<PermFieldOps>,
    Path(subscription_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let pickup = app_state
        .pickup_service
        .schedule_next(subscription_id)
        .await?;
    Ok(Json(pickup))
}

// POST /api/ops/pickups/{id}/status
#[utoipa::path(
    post,
    path = "/api/ops/pickups/{id}/status",
    tag = "Operations",
    request_body = UpdatePickupStatusPayload,
    params(("id" = Uuid, Path, description = "Pickup ID")),
    responses(
        (status = 200, description = "Status updated", body = Pickup),
        (status = 409, description = "Illegal transition")
    ),
    security(("api_jwt" = []))
)]
pub async fn update_status(
    State(app_state): State<AppState>,
    _perm: RequirePermission<PermFieldOps>,
    Path(pickup_id): Path<Uuid>,
    Json(payload): Json<UpdatePickupStatusPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let pickup = app_state
        .pickup_service
        .update_status(pickup_id, payload)
        .await?;
    Ok(Json(pickup))
}
