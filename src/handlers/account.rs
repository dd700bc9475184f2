// src/handlers/account.rs

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use validator::Validate;

use crate::{
    common::error::AppError,
    config::AppState,
    middleware::auth::AuthenticatedUser,
    models::{
        address::{Address, CreateAddressPayload},
        auth::SocialAccount,
        preferences::{
            NotificationPreferences, Preferences, UpdateNotificationPreferencesPayload,
            UpdatePreferencesPayload,
        },
    },
};

// =============================================================================
//  ADDRESSES
// =============================================================================

// GET /api/users/me/addresses
#[utoipa::path(
    get,
    path = "/api/users/me/addresses",
    tag = "Users",
    responses((status = 200, description = "Saved addresses, default first", body = Vec<Address>)),
    security(("api_jwt" = []))
)]
pub async fn list_addresses(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<impl IntoResponse, AppError> {
    let addresses = app_state.address_repo.list_for_user(user.id).await?;
    Ok(Json(addresses))
}

// POST /api/users/me/addresses
#[utoipa::path(
    post,
    path = "/api/users/me/addresses",
    tag = "Users",
    request_body = CreateAddressPayload,
    responses(
        (status = 201, description = "Address saved", body = Address),
        (status = 400, description = "Invalid input")
    ),
    security(("api_jwt" = []))
)]
pub async fn create_address(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Json(payload): Json<CreateAddressPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let address = app_state
        .address_repo
        .create(&app_state.db_pool, user.id, &payload)
        .await?;

    Ok((StatusCode::CREATED, Json(address)))
}

// GET /api/users/me/social-accounts
#[utoipa::path(
    get,
    path = "/api/users/me/social-accounts",
    tag = "Users",
    responses((status = 200, description = "Linked social logins", body = Vec<SocialAccount>)),
    security(("api_jwt" = []))
)]
pub async fn list_social_accounts(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<impl IntoResponse, AppError> {
    let accounts = app_state
        .user_repo
        .list_social_accounts(&app_state.db_pool, user.id)
        .await?;
    Ok(Json(accounts))
}

// =============================================================================
//  PREFERENCES
// =============================================================================

// GET /api/users/me/preferences
#[utoipa::path(
    get,
    path = "/api/users/me/preferences",
    tag = "Users",
    responses((status = 200, description = "Laundry preferences (defaults if never saved)", body = Preferences)),
    security(("api_jwt" = []))
)]
pub async fn get_preferences(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<impl IntoResponse, AppError> {
    let prefs = app_state.preferences_repo.get_preferences(user.id).await?;
    Ok(Json(prefs))
}

// PUT /api/users/me/preferences
#[utoipa::path(
    put,
    path = "/api/users/me/preferences",
    tag = "Users",
    request_body = UpdatePreferencesPayload,
    responses((status = 200, description = "Preferences saved", body = Preferences)),
    security(("api_jwt" = []))
)]
pub async fn update_preferences(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Json(payload): Json<UpdatePreferencesPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let prefs = app_state
        .preferences_repo
        .upsert_preferences(&app_state.db_pool, user.id, &payload)
        .await?;
    Ok(Json(prefs))
}

// GET /api/users/me/notification-preferences
#[utoipa::path(
    get,
    path = "/api/users/me/notification-preferences",
    tag = "Users",
    responses((status = 200, description = "Notification channels", body = NotificationPreferences)),
    security(("api_jwt" = []))
)]
pub async fn get_notification_preferences(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<impl IntoResponse, AppError> {
    let prefs = app_state
        .preferences_repo
        .get_notification_preferences(user.id)
        .await?;
    Ok(Json(prefs))
}

// PUT /api/users/me/notification-preferences
#[utoipa::path(
    put,
    path = "/api/users/me/notification-preferences",
    tag = "Users",
    request_body = UpdateNotificationPreferencesPayload,
    responses((status = 200, description = "Notification channels saved", body = NotificationPreferences)),
    security(("api_jwt" = []))
)]
pub async fn update_notification_preferences(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Json(payload): Json<UpdateNotificationPreferencesPayload>,
) -> Result<impl IntoResponse, AppError> {
    let prefs = app_state
        .preferences_repo
        .upsert_notification_preferences(&app_state.db_pool, user.id, &payload)
        .await?;
    Ok(Json(prefs))
}
