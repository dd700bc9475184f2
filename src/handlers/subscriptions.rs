// src/handlers/subscriptions.rs

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use validator::Validate;

use crate::{
    common::error::AppError,
    config::AppState,
    middleware::auth::AuthenticatedUser,
    models::subscription::{
        CancelSubscriptionPayload, ChangePlanPayload, CreateSubscriptionPayload,
        NextPickupResponse, PauseSubscriptionPayload, Subscription,
    },
};

// POST /api/subscriptions
#[utoipa::path(
    post,
    path = "/api/subscriptions",
    tag = "Subscriptions",
    request_body = CreateSubscriptionPayload,
    responses(
        (status = 201, description = "Subscription started, bags issued, first pickup booked", body = Subscription),
        (status = 404, description = "No usable address"),
        (status = 409, description = "A subscription is already running")
    ),
    security(("api_jwt" = []))
)]
pub async fn create_subscription(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Json(payload): Json<CreateSubscriptionPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let subscription = app_state
        .subscription_service
        .create(&user, &payload)
        .await?;

    Ok((StatusCode::CREATED, Json(subscription)))
}

// GET /api/subscriptions/current
#[utoipa::path(
    get,
    path = "/api/subscriptions/current",
    tag = "Subscriptions",
    responses(
        (status = 200, description = "The running subscription", body = Subscription),
        (status = 404, description = "No running subscription")
    ),
    security(("api_jwt" = []))
)]
pub async fn get_current(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<impl IntoResponse, AppError> {
    let subscription = app_state.subscription_service.get_current(&user).await?;
    Ok(Json(subscription))
}

// GET /api/subscriptions/current/next-pickup
#[utoipa::path(
    get,
    path = "/api/subscriptions/current/next-pickup",
    tag = "Subscriptions",
    responses(
        (status = 200, description = "Next pickup date", body = NextPickupResponse),
        (status = 404, description = "No running subscription")
    ),
    security(("api_jwt" = []))
)]
pub async fn next_pickup(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<impl IntoResponse, AppError> {
    let next = app_state.subscription_service.next_pickup(&user).await?;
    Ok(Json(next))
}

// POST /api/subscriptions/current/pause
#[utoipa::path(
    post,
    path = "/api/subscriptions/current/pause",
    tag = "Subscriptions",
    request_body = PauseSubscriptionPayload,
    responses(
        (status = 200, description = "Paused", body = Subscription),
        (status = 409, description = "Subscription cannot be paused from its status")
    ),
    security(("api_jwt" = []))
)]
pub async fn pause(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Json(payload): Json<PauseSubscriptionPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let subscription = app_state
        .subscription_service
        .pause(&user, payload.weeks)
        .await?;
    Ok(Json(subscription))
}

// POST /api/subscriptions/current/resume
#[utoipa::path(
    post,
    path = "/api/subscriptions/current/resume",
    tag = "Subscriptions",
    responses(
        (status = 200, description = "Active again", body = Subscription),
        (status = 409, description = "Subscription is not paused")
    ),
    security(("api_jwt" = []))
)]
pub async fn resume(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<impl IntoResponse, AppError> {
    let subscription = app_state.subscription_service.resume(&user).await?;
    Ok(Json(subscription))
}

// POST /api/subscriptions/current/cancel
#[utoipa::path(
    post,
    path = "/api/subscriptions/current/cancel",
    tag = "Subscriptions",
    request_body = CancelSubscriptionPayload,
    responses(
        (status = 200, description = "Cancelled, or flagged to cancel at period end", body = Subscription)
    ),
    security(("api_jwt" = []))
)]
pub async fn cancel(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Json(payload): Json<CancelSubscriptionPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let subscription = app_state.subscription_service.cancel(&user, payload).await?;
    Ok(Json(subscription))
}

// POST /api/subscriptions/current/plan
#[utoipa::path(
    post,
    path = "/api/subscriptions/current/plan",
    tag = "Subscriptions",
    request_body = ChangePlanPayload,
    responses((status = 200, description = "Plan changed", body = Subscription)),
    security(("api_jwt" = []))
)]
pub async fn change_plan(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Json(payload): Json<ChangePlanPayload>,
) -> Result<impl IntoResponse, AppError> {
    let subscription = app_state
        .subscription_service
        .change_plan(&user, payload.plan)
        .await?;
    Ok(Json(subscription))
}
