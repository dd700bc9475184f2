// src/db/pickup_repo.rs

use chrono::NaiveDate;
use sqlx::{Executor, PgPool, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::pickup::{Pickup, PickupStop},
};

#[derive(Clone)]
pub struct PickupRepository {
    pool: PgPool,
}

impl PickupRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Inserts the pickup unless the subscription already has one on that
    /// date, in which case `None` comes back and nothing is written.
    pub async fn insert_if_absent<'e, E>(
        &self,
        executor: E,
        subscription_id: i64,
        address_id: i64,
        scheduled_date: NaiveDate,
        bags_expected: i32,
    ) -> Result<Option<Pickup>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let pickup = sqlx::query_as::<_, Pickup>(
            r#"
            INSERT INTO pickups (subscription_id, address_id, scheduled_date, bags_expected)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT ON CONSTRAINT pickups_subscription_date_key DO NOTHING
            RETURNING *
            "#,
        )
        .bind(subscription_id)
        .bind(address_id)
        .bind(scheduled_date)
        .bind(bags_expected)
        .fetch_optional(executor)
        .await?;

        Ok(pickup)
    }

    pub async fn find_by_subscription_and_date<'e, E>(
        &self,
        executor: E,
        subscription_id: i64,
        scheduled_date: NaiveDate,
    ) -> Result<Option<Pickup>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let pickup = sqlx::query_as::<_, Pickup>(
            "SELECT * FROM pickups WHERE subscription_id = $1 AND scheduled_date = $2",
        )
        .bind(subscription_id)
        .bind(scheduled_date)
        .fetch_optional(executor)
        .await?;

        Ok(pickup)
    }

    pub async fn find_by_uuid<'e, E>(
        &self,
        executor: E,
        uuid: Uuid,
    ) -> Result<Option<Pickup>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let pickup = sqlx::query_as::<_, Pickup>("SELECT * FROM pickups WHERE uuid = $1")
            .bind(uuid)
            .fetch_optional(executor)
            .await?;

        Ok(pickup)
    }

    pub async fn lock_by_uuid<'e, E>(
        &self,
        executor: E,
        uuid: Uuid,
    ) -> Result<Option<Pickup>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let pickup =
            sqlx::query_as::<_, Pickup>("SELECT * FROM pickups WHERE uuid = $1 FOR UPDATE")
                .bind(uuid)
                .fetch_optional(executor)
                .await?;

        Ok(pickup)
    }

    // Only pickups of the user's own live subscriptions.
    pub async fn lock_for_user<'e, E>(
        &self,
        executor: E,
        uuid: Uuid,
        user_id: i64,
    ) -> Result<Option<Pickup>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let pickup = sqlx::query_as::<_, Pickup>(
            r#"
            SELECT p.* FROM pickups p
            JOIN subscriptions s ON s.id = p.subscription_id
            WHERE p.uuid = $1 AND s.user_id = $2 AND s.deleted_at IS NULL
            FOR UPDATE OF p
            "#,
        )
        .bind(uuid)
        .bind(user_id)
        .fetch_optional(executor)
        .await?;

        Ok(pickup)
    }

    pub async fn update<'e, E>(&self, executor: E, pickup: &Pickup) -> Result<Pickup, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let updated = sqlx::query_as::<_, Pickup>(
            r#"
            UPDATE pickups SET
                status = $2,
                bags_collected = $3,
                reminder_sent_at = $4,
                picked_up_at = $5,
                processing_started_at = $6,
                ready_at = $7,
                out_for_delivery_at = $8,
                delivered_at = $9,
                skipped_at = $10,
                skip_reason = $11,
                driver_notes = $12,
                delivery_photo_path = $13,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(pickup.id)
        .bind(pickup.status)
        .bind(pickup.bags_collected)
        .bind(pickup.reminder_sent_at)
        .bind(pickup.picked_up_at)
        .bind(pickup.processing_started_at)
        .bind(pickup.ready_at)
        .bind(pickup.out_for_delivery_at)
        .bind(pickup.delivered_at)
        .bind(pickup.skipped_at)
        .bind(&pickup.skip_reason)
        .bind(&pickup.driver_notes)
        .bind(&pickup.delivery_photo_path)
        .fetch_one(executor)
        .await?;

        Ok(updated)
    }

    // Paused, cancelled and deleted subscriptions get no reminders.
    pub async fn list_needing_reminder(&self) -> Result<Vec<Pickup>, AppError> {
        let pickups = sqlx::query_as::<_, Pickup>(
            r#"
            SELECT p.* FROM pickups p
            JOIN subscriptions s ON s.id = p.subscription_id
            WHERE p.status = 'scheduled'
              AND p.reminder_sent_at IS NULL
              AND s.status = 'active'
              AND s.deleted_at IS NULL
            ORDER BY p.scheduled_date, p.id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(pickups)
    }

    pub async fn list_upcoming_for_user(
        &self,
        user_id: i64,
        today: NaiveDate,
    ) -> Result<Vec<Pickup>, AppError> {
        let pickups = sqlx::query_as::<_, Pickup>(
            r#"
            SELECT p.* FROM pickups p
            JOIN subscriptions s ON s.id = p.subscription_id
            WHERE s.user_id = $1 AND s.deleted_at IS NULL AND p.scheduled_date >= $2
            ORDER BY p.scheduled_date
            "#,
        )
        .bind(user_id)
        .bind(today)
        .fetch_all(&self.pool)
        .await?;

        Ok(pickups)
    }

    /// The driver route for `date`: every pickup of an active subscription
    /// still on the books that day, joined with the customer and the address
    /// to drive to.
    pub async fn list_stops_for_date(&self, date: NaiveDate) -> Result<Vec<PickupStop>, AppError> {
        let stops = sqlx::query_as::<_, PickupStop>(
            r#"
            SELECT
                p.uuid AS pickup_id,
                p.status,
                p.bags_expected,
                u.name AS customer_name,
                u.phone AS customer_phone,
                a.line1,
                a.line2,
                a.city,
                a.postal_code,
                a.instructions
            FROM pickups p
            JOIN subscriptions s ON s.id = p.subscription_id
            JOIN users u ON u.id = s.user_id
            JOIN addresses a ON a.id = p.address_id
            WHERE p.scheduled_date = $1
              AND p.status NOT IN ('skipped', 'missed')
              AND s.status = 'active'
              AND s.deleted_at IS NULL
            ORDER BY a.postal_code, a.line1
            "#,
        )
        .bind(date)
        .fetch_all(&self.pool)
        .await?;

        Ok(stops)
    }
}
