// src/db/subscription_repo.rs

use chrono::{DateTime, Utc};
use sqlx::{Executor, PgPool, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::subscription::{PickupDay, Plan, Subscription},
};

/// Columns a new subscription is created with; everything else starts at
/// its table default.
pub struct NewSubscription<'a> {
    pub user_id: i64,
    pub address_id: i64,
    pub region: &'a str,
    pub plan: Plan,
    pub pickup_day: PickupDay,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    pub trial_ends_at: Option<DateTime<Utc>>,
    pub promo_code: Option<&'a str>,
}

// Soft-deleted rows are filtered out of every read here except `restore`.
#[derive(Clone)]
pub struct SubscriptionRepository {
    pool: PgPool,
}

impl SubscriptionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn insert<'e, E>(
        &self,
        executor: E,
        new: &NewSubscription<'_>,
    ) -> Result<Subscription, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let subscription = sqlx::query_as::<_, Subscription>(
            r#"
            INSERT INTO subscriptions (
                user_id, address_id, region, plan, bags_per_week, pickup_day,
                period_start, period_end, trial_ends_at, promo_code
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING *
            "#,
        )
        .bind(new.user_id)
        .bind(new.address_id)
        .bind(new.region)
        .bind(new.plan)
        .bind(new.plan.bags_per_week())
        .bind(new.pickup_day)
        .bind(new.period_start)
        .bind(new.period_end)
        .bind(new.trial_ends_at)
        .bind(new.promo_code)
        .fetch_one(executor)
        .await?;

        Ok(subscription)
    }

    /// Most recent live subscription of a user that is not cancelled.
    pub async fn find_current_for_user(
        &self,
        user_id: i64,
    ) -> Result<Option<Subscription>, AppError> {
        let subscription = sqlx::query_as::<_, Subscription>(
            r#"
            SELECT * FROM subscriptions
            WHERE user_id = $1 AND deleted_at IS NULL AND status <> 'cancelled'
            ORDER BY created_at DESC, id DESC
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(subscription)
    }

    // Same selection as `find_current_for_user`, row-locked for a
    // read-modify-write inside a transaction.
    pub async fn lock_current_for_user<'e, E>(
        &self,
        executor: E,
        user_id: i64,
    ) -> Result<Option<Subscription>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let subscription = sqlx::query_as::<_, Subscription>(
            r#"
            SELECT * FROM subscriptions
            WHERE user_id = $1 AND deleted_at IS NULL AND status <> 'cancelled'
            ORDER BY created_at DESC, id DESC
            LIMIT 1
            FOR UPDATE
            "#,
        )
        .bind(user_id)
        .fetch_optional(executor)
        .await?;

        Ok(subscription)
    }

    pub async fn lock_by_uuid<'e, E>(
        &self,
        executor: E,
        uuid: Uuid,
    ) -> Result<Option<Subscription>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let subscription = sqlx::query_as::<_, Subscription>(
            "SELECT * FROM subscriptions WHERE uuid = $1 AND deleted_at IS NULL FOR UPDATE",
        )
        .bind(uuid)
        .fetch_optional(executor)
        .await?;

        Ok(subscription)
    }

    pub async fn lock_by_id<'e, E>(
        &self,
        executor: E,
        id: i64,
    ) -> Result<Option<Subscription>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let subscription = sqlx::query_as::<_, Subscription>(
            "SELECT * FROM subscriptions WHERE id = $1 AND deleted_at IS NULL FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(executor)
        .await?;

        Ok(subscription)
    }

    /// Writes back every field the lifecycle mutators may touch.
    pub async fn update<'e, E>(
        &self,
        executor: E,
        subscription: &Subscription,
    ) -> Result<Subscription, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let updated = sqlx::query_as::<_, Subscription>(
            r#"
            UPDATE subscriptions SET
                plan = $2,
                status = $3,
                bags_per_week = $4,
                period_start = $5,
                period_end = $6,
                paused_at = $7,
                resume_at = $8,
                pause_weeks = $9,
                cancelled_at = $10,
                cancellation_reason = $11,
                cancellation_feedback = $12,
                cancel_at_period_end = $13,
                dunning_started_at = $14,
                dunning_emails_sent = $15,
                skips_used_this_period = $16,
                updated_at = NOW()
            WHERE id = $1 AND deleted_at IS NULL
            RETURNING *
            "#,
        )
        .bind(subscription.id)
        .bind(subscription.plan)
        .bind(subscription.status)
        .bind(subscription.bags_per_week)
        .bind(subscription.period_start)
        .bind(subscription.period_end)
        .bind(subscription.paused_at)
        .bind(subscription.resume_at)
        .bind(subscription.pause_weeks)
        .bind(subscription.cancelled_at)
        .bind(&subscription.cancellation_reason)
        .bind(&subscription.cancellation_feedback)
        .bind(subscription.cancel_at_period_end)
        .bind(subscription.dunning_started_at)
        .bind(subscription.dunning_emails_sent)
        .bind(subscription.skips_used_this_period)
        .fetch_optional(executor)
        .await?
        .ok_or(AppError::NotFound("subscription"))?;

        Ok(updated)
    }

    /// Returns false when there was no live row to delete.
    pub async fn soft_delete<'e, E>(&self, executor: E, uuid: Uuid) -> Result<bool, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let result = sqlx::query(
            r#"
            UPDATE subscriptions SET deleted_at = NOW(), updated_at = NOW()
            WHERE uuid = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(uuid)
        .execute(executor)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    // The only read that sees soft-deleted rows; restore needs the owner.
    pub async fn lock_deleted_by_uuid<'e, E>(
        &self,
        executor: E,
        uuid: Uuid,
    ) -> Result<Option<Subscription>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let subscription = sqlx::query_as::<_, Subscription>(
            "SELECT * FROM subscriptions WHERE uuid = $1 AND deleted_at IS NOT NULL FOR UPDATE",
        )
        .bind(uuid)
        .fetch_optional(executor)
        .await?;

        Ok(subscription)
    }

    pub async fn restore<'e, E>(
        &self,
        executor: E,
        uuid: Uuid,
    ) -> Result<Option<Subscription>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let restored = sqlx::query_as::<_, Subscription>(
            r#"
            UPDATE subscriptions SET deleted_at = NULL, updated_at = NOW()
            WHERE uuid = $1 AND deleted_at IS NOT NULL
            RETURNING *
            "#,
        )
        .bind(uuid)
        .fetch_optional(executor)
        .await?;

        Ok(restored)
    }
}
