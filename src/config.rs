// src/config.rs

pub mod region;

use std::{env, time::Duration};

use anyhow::Context;
use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::{
    config::region::RegionConfig,
    db::{
        AddressRepository, BagRepository, InvoiceRepository, PickupRepository,
        PreferencesRepository, SubscriptionRepository, UserRepository,
    },
    services::{
        auth::AuthService, bag_service::BagService, invoice_service::InvoiceService,
        pickup_service::PickupService, subscription_service::SubscriptionService,
    },
};

#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
    pub region: RegionConfig,

    // Repositories used directly by the simple account handlers
    pub user_repo: UserRepository,
    pub address_repo: AddressRepository,
    pub preferences_repo: PreferencesRepository,

    pub auth_service: AuthService,
    pub subscription_service: SubscriptionService,
    pub pickup_service: PickupService,
    pub bag_service: BagService,
    pub invoice_service: InvoiceService,
}

impl AppState {
    pub async fn new() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let database_url = env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
        let jwt_secret = env::var("JWT_SECRET").context("JWT_SECRET must be set")?;
        let max_connections = match env::var("DATABASE_MAX_CONNECTIONS") {
            Ok(raw) => raw
                .parse::<u32>()
                .with_context(|| format!("DATABASE_MAX_CONNECTIONS must be a number, got '{}'", raw))?,
            Err(_) => 5,
        };
        let region = RegionConfig::from_env()?;

        let db_pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(3))
            .connect(&database_url)
            .await
            .context("Could not connect to the database")?;

        tracing::info!("Database connection established");

        // --- Dependency graph ---
        let user_repo = UserRepository::new(db_pool.clone());
        let address_repo = AddressRepository::new(db_pool.clone());
        let subscription_repo = SubscriptionRepository::new(db_pool.clone());
        let pickup_repo = PickupRepository::new(db_pool.clone());
        let bag_repo = BagRepository::new(db_pool.clone());
        let invoice_repo = InvoiceRepository::new(db_pool.clone());
        let preferences_repo = PreferencesRepository::new(db_pool.clone());

        let auth_service = AuthService::new(
            user_repo.clone(),
            region.clone(),
            jwt_secret,
            db_pool.clone(),
        );
        let pickup_service = PickupService::new(
            pickup_repo.clone(),
            subscription_repo.clone(),
            db_pool.clone(),
        );
        let bag_service = BagService::new(
            bag_repo,
            pickup_repo,
            subscription_repo.clone(),
            db_pool.clone(),
        );
        let subscription_service = SubscriptionService::new(
            subscription_repo,
            address_repo.clone(),
            bag_service.clone(),
            pickup_service.clone(),
            region.clone(),
            db_pool.clone(),
        );
        let invoice_service =
            InvoiceService::new(invoice_repo, user_repo.clone(), db_pool.clone());

        Ok(Self {
            db_pool,
            region,
            user_repo,
            address_repo,
            preferences_repo,
            auth_service,
            subscription_service,
            pickup_service,
            bag_service,
            invoice_service,
        })
    }
}
