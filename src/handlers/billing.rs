// src/handlers/billing.rs

use axum::{
    extract::{Path, State},
    http::StatusCode,
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
        rbac::{PermBilling, RequirePermission},
    },
    models::{
        invoice::{CreateInvoicePayload, Invoice},
        subscription::{RenewSubscriptionPayload, Subscription},
    },
};

// =============================================================================
//  CUSTOMER INVOICES
// =============================================================================

// GET /api/invoices
#[utoipa::path(
    get,
    path = "/api/invoices",
    tag = "Billing",
    responses((status = 200, description = "Own invoices, newest first", body = Vec<Invoice>)),
    security(("api_jwt" = []))
)]
pub async fn list_my_invoices(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<impl IntoResponse, AppError> {
    let invoices = app_state.invoice_service.list_for_user(&user).await?;
    Ok(Json(invoices))
}

// GET /api/invoices/{id}
#[utoipa::path(
    get,
    path = "/api/invoices/{id}",
    tag = "Billing",
    params(("id" = Uuid, Path, description = "Invoice ID")),
    responses(
        (status = 200, description = "Invoice", body = Invoice),
        (status = 404, description = "Unknown invoice")
    ),
    security(("api_jwt" = []))
)]
pub async fn get_my_invoice(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(invoice_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let invoice = app_state
        .invoice_service
        .get_for_user(&user, invoice_id)
        .await?;
    Ok(Json(invoice))
}

// =============================================================================
//  STAFF
// =============================================================================

// POST /api/billing/invoices
#[utoipa::path(
    post,
    path = "/api/billing/invoices",
    tag = "Billing",
    request_body = CreateInvoicePayload,
    responses(
        (status = 201, description = "Invoice recorded with the next number", body = Invoice),
        (status = 400, description = "Negative amounts or bad currency"),
        (status = 503, description = "No free invoice number found, retry")
    ),
    security(("api_jwt" = []))
)]
pub async fn create_invoice(
    State(app_state): State<AppState>,
    _perm: RequirePermission<PermBilling>,
    Json(payload): Json<CreateInvoicePayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let invoice = app_state.invoice_service.create(&payload).await?;
    Ok((StatusCode::CREATED, Json(invoice)))
}

// POST /api/billing/subscriptions/{id}/past-due
#[utoipa::path(
    post,
    path = "/api/billing/subscriptions/{id}/past-due",
    tag = "Billing",
    params(("id" = Uuid, Path, description = "Subscription ID")),
    responses(
        (status = 200, description = "Dunning started", body = Subscription),
        (status = 409, description = "Illegal transition")
    ),
    security(("api_jwt" = []))
)]
pub async fn mark_past_due(
    State(app_state): State<AppState>,
    _perm: RequirePermission<PermBilling>,
    Path(subscription_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let subscription = app_state
        .subscription_service
        .mark_past_due(subscription_id)
        .await?;
    Ok(Json(subscription))
}

// POST /api/billing/subscriptions/{id}/dunning-email
#[utoipa::path(
    post,
    path = "/api/billing/subscriptions/{id}/dunning-email",
    tag = "Billing",
    params(("id" = Uuid, Path, description = "Subscription ID")),
    responses((status = 200, description = "Dunning email counted", body = Subscription)),
    security(("api_jwt" = []))
)]
pub async fn record_dunning_email(
    State(app_state): State<AppState>,
    _perm: RequirePermission<PermBilling>,
    Path(subscription_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let subscription = app_state
        .subscription_service
        .record_dunning_email(subscription_id)
        .await?;
    Ok(Json(subscription))
}

// POST /api/billing/subscriptions/{id}/recover
#[utoipa::path(
    post,
    path = "/api/billing/subscriptions/{id}/recover",
    tag = "Billing",
    params(("id" = Uuid, Path, description = "Subscription ID")),
    responses((status = 200, description = "Back to active", body = Subscription)),
    security(("api_jwt" = []))
)]
pub async fn recover(
    State(app_state): State<AppState>,
    _perm: RequirePermission<PermBilling>,
    Path(subscription_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let subscription = app_state
        .subscription_service
        .recover(subscription_id)
        .await?;
    Ok(Json(subscription))
}

// POST /api/billing/subscriptions/{id}/renew
#[utoipa::path(
    post,
    path = "/api/billing/subscriptions/{id}/renew",
    tag = "Billing",
    request_body = RenewSubscriptionPayload,
    params(("id" = Uuid, Path, description = "Subscription ID")),
    responses((status = 200, description = "New billing period, or period-end cancellation completed", body = Subscription)),
    security(("api_jwt" = []))
)]
pub async fn renew(
    State(app_state): State<AppState>,
    _perm: RequirePermission<PermBilling>,
    Path(subscription_id): Path<Uuid>,
    Json(payload): Json<RenewSubscriptionPayload>,
) -> Result<impl IntoResponse, AppError> {
    let subscription = app_state
        .subscription_service
        .renew(subscription_id, &payload)
        .await?;
    Ok(Json(subscription))
}

// DELETE /api/billing/subscriptions/{id}
#[utoipa::path(
    delete,
    path = "/api/billing/subscriptions/{id}",
    tag = "Billing",
    params(("id" = Uuid, Path, description = "Subscription ID")),
    responses(
        (status = 204, description = "Soft-deleted"),
        (status = 404, description = "Unknown or already deleted")
    ),
    security(("api_jwt" = []))
)]
pub async fn delete_subscription(
    State(app_state): State<AppState>,
    _perm: RequirePermission<PermBilling>,
    Path(subscription_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    app_state
        .subscription_service
        .soft_delete(subscription_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

// POST /api/billing/subscriptions/{id}/restore
#[utoipa::path(
    post,
    path = "/api/billing/subscriptions/{id}/restore",
    tag = "Billing",
    params(("id" = Uuid, Path, description = "Subscription ID")),
    responses(
        (status = 200, description = "Restored", body = Subscription),
        (status = 404, description = "No deleted subscription with that ID")
    ),
    security(("api_jwt" = []))
)]
pub async fn restore_subscription(
    State(app_state): State<AppState>,
    _perm: RequirePermission<PermBilling>,
    Path(subscription_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let subscription = app_state
        .subscription_service
        .restore(subscription_id)
        .await?;
    Ok(Json(subscription))
}
