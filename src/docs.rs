// src/docs.rs

use crate::handlers;
use crate::models;
use utoipa::openapi::security::{Http, HttpAuthScheme, SecurityScheme};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Laundry subscription API",
        description = "Weekly pickup, wash and delivery subscriptions."
    ),
    paths(
        // --- Auth ---
        handlers::auth::register,
        handlers::auth::login,

        // --- Users ---
        handlers::auth::get_me,
        handlers::account::list_addresses,
        handlers::account::create_address,
        handlers::account::list_social_accounts,
        handlers::account::get_preferences,
        handlers::account::update_preferences,
        handlers::account::get_notification_preferences,
        handlers::account::update_notification_preferences,

        // --- Subscriptions ---
        handlers::subscriptions::create_subscription,
        handlers::subscriptions::get_current,
        handlers::subscriptions::next_pickup,
        handlers::subscriptions::pause,
        handlers::subscriptions::resume,
        handlers::subscriptions::cancel,
        handlers::subscriptions::change_plan,

        // --- Pickups ---
        handlers::pickups::list_my_pickups,
        handlers::pickups::skip_pickup,

        // --- Bags ---
        handlers::bags::list_my_bags,
        handlers::bags::bag_label,

        // --- Operations ---
        handlers::pickups::list_today,
        handlers::pickups::list_needing_reminder,
        handlers::pickups::schedule_next,
        handlers::pickups::update_status,
        handlers::bags::scan_bag,
        handlers::bags::create_bags,

        // --- Billing ---
        handlers::billing::list_my_invoices,
        handlers::billing::get_my_invoice,
        handlers::billing::create_invoice,
        handlers::billing::mark_past_due,
        handlers::billing::record_dunning_email,
        handlers::billing::recover,
        handlers::billing::renew,
        handlers::billing::delete_subscription,
        handlers::billing::restore_subscription,
    ),
    components(
        schemas(
            // --- Auth ---
            models::auth::UserRole,
            models::auth::User,
            models::auth::SocialAccount,
            models::auth::RegisterUserPayload,
            models::auth::LoginUserPayload,
            models::auth::AuthResponse,

            // --- Account ---
            models::address::Address,
            models::address::CreateAddressPayload,
            models::preferences::Detergent,
            models::preferences::Preferences,
            models::preferences::UpdatePreferencesPayload,
            models::preferences::NotificationPreferences,
            models::preferences::UpdateNotificationPreferencesPayload,

            // --- Subscriptions ---
            models::subscription::Plan,
            models::subscription::SubscriptionStatus,
            models::subscription::PickupDay,
            models::subscription::Subscription,
            models::subscription::CreateSubscriptionPayload,
            models::subscription::PauseSubscriptionPayload,
            models::subscription::CancelSubscriptionPayload,
            models::subscription::ChangePlanPayload,
            models::subscription::RenewSubscriptionPayload,
            models::subscription::NextPickupResponse,

            // --- Pickups & bags ---
            models::pickup::PickupStatus,
            models::pickup::Pickup,
            models::pickup::PickupStop,
            models::pickup::SkipPickupPayload,
            models::pickup::UpdatePickupStatusPayload,
            models::bag::BagStatus,
            models::bag::BagScan,
            models::bag::Bag,
            models::bag::ScanBagPayload,
            models::bag::CreateBagsPayload,

            // --- Billing ---
            models::invoice::InvoiceStatus,
            models::invoice::Invoice,
            models::invoice::CreateInvoicePayload,
        )
    ),
    tags(
        (name = "Auth", description = "Registration and login"),
        (name = "Users", description = "Profile, addresses and preferences"),
        (name = "Subscriptions", description = "Plan, pause, resume and cancellation"),
        (name = "Pickups", description = "Customer view of pickups"),
        (name = "Bags", description = "Customer bags and QR labels"),
        (name = "Operations", description = "Driver and facility work"),
        (name = "Billing", description = "Invoices and dunning")
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "api_jwt",
            SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_route_is_documented() {
        let doc = ApiDoc::openapi();
        for path in [
            "/api/auth/register",
            "/api/subscriptions/current/pause",
            "/api/pickups/{id}/skip",
            "/api/bags/{id}/label.svg",
            "/api/ops/bags/scan",
            "/api/billing/invoices",
            "/api/billing/subscriptions/{id}/restore",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {}", path);
        }
    }

    #[test]
    fn bearer_scheme_is_registered() {
        let doc = ApiDoc::openapi();
        let components = doc.components.expect("components");
        assert!(components.security_schemes.contains_key("api_jwt"));
    }
}
