// src/common/test_support.rs

//! Helpers for the `#[ignore]`d tests that need a real Postgres.

use sqlx::{postgres::PgPoolOptions, PgPool};
use uuid::Uuid;

use crate::models::auth::User;

pub async fn test_pool() -> PgPool {
    dotenvy::dotenv().ok();
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let pool = PgPoolOptions::new()
        .max_connections(8)
        .connect(&url)
        .await
        .expect("connect to test database");
    sqlx::migrate!().run(&pool).await.expect("run migrations");
    pool
}

/// Inserts a user with an address and a family subscription.
/// Returns `(user_id, subscription_id)`.
pub async fn seed_subscription(pool: &PgPool) -> (i64, i64) {
    let email = format!("seed-{}@example.com", Uuid::new_v4());
    let user_id: i64 = sqlx::query_scalar(
        "INSERT INTO users (name, email, password_hash, region, timezone)
         VALUES ('Seed User', $1, 'x', 'austin', 'America/Chicago') RETURNING id",
    )
    .bind(email)
    .fetch_one(pool)
    .await
    .expect("seed user");

    let address_id: i64 = sqlx::query_scalar(
        "INSERT INTO addresses (user_id, line1, city, state, postal_code, is_default)
         VALUES ($1, '1 Main St', 'Austin', 'TX', '78701', TRUE) RETURNING id",
    )
    .bind(user_id)
    .fetch_one(pool)
    .await
    .expect("seed address");

    let subscription_id: i64 = sqlx::query_scalar(
        "INSERT INTO subscriptions (user_id, address_id, region, plan, bags_per_week, pickup_day, period_start, period_end)
         VALUES ($1, $2, 'austin', 'family', 2, 'monday', NOW(), NOW() + INTERVAL '1 month') RETURNING id",
    )
    .bind(user_id)
    .bind(address_id)
    .fetch_one(pool)
    .await
    .expect("seed subscription");

    (user_id, subscription_id)
}

pub async fn user_by_id(pool: &PgPool, user_id: i64) -> User {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_one(pool)
        .await
        .expect("seeded user")
}
