// src/handlers/bags.rs

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
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
    models::bag::{Bag, CreateBagsPayload, ScanBagPayload},
};

// GET /api/bags
#[utoipa::path(
    get,
    path = "/api/bags",
    tag = "Bags",
    responses((status = 200, description = "Own bags with their scan history", body = Vec<Bag>)),
    security(("api_jwt" = []))
)]
pub async fn list_my_bags(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<impl IntoResponse, AppError> {
    let bags = app_state.bag_service.list_for_user(&user).await?;
    Ok(Json(bags))
}

// GET /api/bags/{id}/label.svg
#[utoipa::path(
    get,
    path = "/api/bags/{id}/label.svg",
    tag = "Bags",
    params(("id" = Uuid, Path, description = "Bag ID")),
    responses(
        (status = 200, description = "Printable QR label", content_type = "image/svg+xml", body = String),
        (status = 404, description = "Unknown bag")
    ),
    security(("api_jwt" = []))
)]
pub async fn bag_label(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(bag_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let svg = app_state.bag_service.label_svg(&user, bag_id).await?;
    Ok(([(header::CONTENT_TYPE, "image/svg+xml")], svg))
}

// POST /api/ops/bags/scan
#[utoipa::path(
    post,
    path = "/api/ops/bags/scan",
    tag = "Operations",
    request_body = ScanBagPayload,
    responses(
        (status = 200, description = "Scan recorded", body = Bag),
        (status = 404, description = "Unknown QR code"),
        (status = 409, description = "Illegal status change")
    ),
    security(("api_jwt" = []))
)]
pub async fn scan_bag(
    State(app_state): State<AppState>,
    _perm: RequirePermission<PermFieldOps>,
    AuthenticatedUser(user): AuthenticatedUser,
    Json(payload): Json<ScanBagPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let bag = app_state.bag_service.scan(&payload, &user).await?;
    Ok(Json(bag))
}

// POST /api/ops/subscriptions/{id}/bags
#[utoipa::path(
    post,
    path = "/api/ops/subscriptions/{id}/bags",
    tag = "Operations",
    request_body = CreateBagsPayload,
    params(("id" = Uuid, Path, description = "Subscription ID")),
    responses(
        (status = 201, description = "Bags issued", body = Vec<Bag>),
        (status = 503, description = "No free QR code found, retry")
    ),
    security(("api_jwt" = []))
)]
pub async fn create_bags(
    State(app_state): State<AppState>,
    _perm: RequirePermission<PermFieldOps>,
    Path(subscription_id): Path<Uuid>,
    Json(payload): Json<CreateBagsPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let bags = app_state
        .bag_service
        .create_for_subscription(subscription_id, &payload)
        .await?;
    Ok((StatusCode::CREATED, Json(bags)))
}
