// src/main.rs

use axum::{
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

mod common;
mod config;
mod db;
mod docs;
mod handlers;
mod middleware;
mod models;
mod services;

use crate::config::AppState;
use crate::docs::ApiDoc;
use crate::middleware::auth::auth_guard;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .compact()
        .init();

    let app_state = AppState::new().await?;

    sqlx::migrate!().run(&app_state.db_pool).await?;
    tracing::info!("Database migrations applied");

    // Public
    let auth_routes = Router::new()
        .route("/register", post(handlers::auth::register))
        .route("/login", post(handlers::auth::login));

    // Everything below needs a bearer token
    let user_routes = Router::new()
        .route("/me", get(handlers::auth::get_me))
        .route(
            "/me/addresses",
            get(handlers::account::list_addresses).post(handlers::account::create_address),
        )
        .route(
            "/me/social-accounts",
            get(handlers::account::list_social_accounts),
        )
        .route(
            "/me/preferences",
            get(handlers::account::get_preferences).put(handlers::account::update_preferences),
        )
        .route(
            "/me/notification-preferences",
            get(handlers::account::get_notification_preferences)
                .put(handlers::account::update_notification_preferences),
        );

    let subscription_routes = Router::new()
        .route("/", post(handlers::subscriptions::create_subscription))
        .route("/current", get(handlers::subscriptions::get_current))
        .route(
            "/current/next-pickup",
            get(handlers::subscriptions::next_pickup),
        )
        .route("/current/pause", post(handlers::subscriptions::pause))
        .route("/current/resume", post(handlers::subscriptions::resume))
        .route("/current/cancel", post(handlers::subscriptions::cancel))
        .route("/current/plan", post(handlers::subscriptions::change_plan));

    let pickup_routes = Router::new()
        .route("/", get(handlers::pickups::list_my_pickups))
        .route("/{id}/skip", post(handlers::pickups::skip_pickup));

    let bag_routes = Router::new()
        .route("/", get(handlers::bags::list_my_bags))
        .route("/{id}/label.svg", get(handlers::bags::bag_label));

    let invoice_routes = Router::new()
        .route("/", get(handlers::billing::list_my_invoices))
        .route("/{id}", get(handlers::billing::get_my_invoice));

    // Role checks happen in the handlers through RequirePermission
    let ops_routes = Router::new()
        .route("/pickups/today", get(handlers::pickups::list_today))
        .route(
            "/pickups/needs-reminder",
            get(handlers::pickups::list_needing_reminder),
        )
        .route("/pickups/{id}/status", post(handlers::pickups::update_status))
        .route(
            "/subscriptions/{id}/schedule",
            post(handlers::pickups::schedule_next),
        )
        .route(
            "/subscriptions/{id}/bags",
            post(handlers::bags::create_bags),
        )
        .route("/bags/scan", post(handlers::bags::scan_bag));

    let billing_routes = Router::new()
        .route("/invoices", post(handlers::billing::create_invoice))
        .route(
            "/subscriptions/{id}",
            axum::routing::delete(handlers::billing::delete_subscription),
        )
        .route(
            "/subscriptions/{id}/past-due",
            post(handlers::billing::mark_past_due),
        )
        .route(
            "/subscriptions/{id}/dunning-email",
            post(handlers::billing::record_dunning_email),
        )
        .route(
            "/subscriptions/{id}/recover",
            post(handlers::billing::recover),
        )
        .route("/subscriptions/{id}/renew", post(handlers::billing::renew))
        .route(
            "/subscriptions/{id}/restore",
            post(handlers::billing::restore_subscription),
        );

    let protected = Router::new()
        .nest("/users", user_routes)
        .nest("/subscriptions", subscription_routes)
        .nest("/pickups", pickup_routes)
        .nest("/bags", bag_routes)
        .nest("/invoices", invoice_routes)
        .nest("/ops", ops_routes)
        .nest("/billing", billing_routes)
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            auth_guard,
        ));

    let app = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/api/health", get(|| async { "OK" }))
        .nest("/api/auth", auth_routes)
        .nest("/api", protected)
        .with_state(app_state.clone());

    let addr = std::env::var("APP_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!(
        "Serving {} on {}",
        app_state.region.name,
        listener.local_addr()?
    );

    axum::serve(listener, app).await?;
    Ok(())
}
