// src/services/subscription_service.rs

use chrono::{DateTime, Duration, Local, Months, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    config::region::RegionConfig,
    db::{subscription_repo::NewSubscription, AddressRepository, SubscriptionRepository},
    models::{
        auth::User,
        subscription::{
            CancelSubscriptionPayload, CreateSubscriptionPayload, NextPickupResponse, Plan,
            RenewSubscriptionPayload, Subscription,
        },
    },
    services::{bag_service::BagService, pickup_service::PickupService},
};

#[derive(Clone)]
pub struct SubscriptionService {
    subscription_repo: SubscriptionRepository,
    address_repo: AddressRepository,
    bag_service: BagService,
    pickup_service: PickupService,
    region: RegionConfig,
    pool: PgPool,
}

impl SubscriptionService {
    pub fn new(
        subscription_repo: SubscriptionRepository,
        address_repo: AddressRepository,
        bag_service: BagService,
        pickup_service: PickupService,
        region: RegionConfig,
        pool: PgPool,
    ) -> Self {
        Self {
            subscription_repo,
            address_repo,
            bag_service,
            pickup_service,
            region,
            pool,
        }
    }

    // =========================================================================
    //  CUSTOMER
    // =========================================================================

    /// Starts a subscription in the configured region, issues its bags and
    /// books the first pickup, all in one transaction.
    pub async fn create(
        &self,
        user: &User,
        payload: &CreateSubscriptionPayload,
    ) -> Result<Subscription, AppError> {
        let mut tx = self.pool.begin().await?;

        // 1. One running subscription per customer
        if self
            .subscription_repo
            .lock_current_for_user(&mut *tx, user.id)
            .await?
            .is_some()
        {
            return Err(AppError::Conflict(
                "You already have a subscription; change its plan instead".to_string(),
            ));
        }

        // 2. Where the bags get picked up
        let address = match payload.address_id {
            Some(address_uuid) => {
                self.address_repo
                    .find_for_user(&mut *tx, user.id, address_uuid)
                    .await?
            }
            None => self.address_repo.find_default_for_user(&mut *tx, user.id).await?,
        }
        .ok_or(AppError::NotFound("address"))?;

        // 3. Billing window and trial
        let now = Utc::now();
        let period_end = one_month_after(now)?;
        let trial_ends_at =
            (self.region.trial_days > 0).then(|| now + Duration::days(self.region.trial_days));

        let subscription = self
            .subscription_repo
            .insert(
                &mut *tx,
                &NewSubscription {
                    user_id: user.id,
                    address_id: address.id,
                    region: &self.region.key,
                    plan: payload.plan,
                    pickup_day: payload.pickup_day,
                    period_start: now,
                    period_end,
                    trial_ends_at,
                    promo_code: payload.promo_code.as_deref(),
                },
            )
            .await?;

        // 4. Bags
        for _ in 0..subscription.bags_per_week {
            self.bag_service
                .create_bag(&mut *tx, subscription.id, None)
                .await?;
        }

        // 5. First pickup
        let first_pickup = subscription.next_pickup_date(Local::now().naive_local());
        self.pickup_service
            .schedule_on(&mut *tx, &subscription, first_pickup)
            .await?;

        tx.commit().await?;

        tracing::info!(
            subscription = %subscription.uuid,
            user = %user.uuid,
            plan = subscription.plan.as_str(),
            region = %self.region.name,
            "Subscription created"
        );
        Ok(subscription)
    }

    pub async fn get_current(&self, user: &User) -> Result<Subscription, AppError> {
        self.subscription_repo
            .find_current_for_user(user.id)
            .await?
            .ok_or(AppError::NotFound("subscription"))
    }

    pub async fn next_pickup(&self, user: &User) -> Result<NextPickupResponse, AppError> {
        let subscription = self.get_current(user).await?;
        Ok(NextPickupResponse {
            pickup_day: subscription.pickup_day,
            date: subscription.next_pickup_date(Local::now().naive_local()),
        })
    }

    pub async fn pause(&self, user: &User, weeks: i32) -> Result<Subscription, AppError> {
        let now = Utc::now();
        let updated = self
            .update_current(user, |sub| sub.pause(weeks, now))
            .await?;
        log_status(&updated, "Subscription paused");
        Ok(updated)
    }

    pub async fn resume(&self, user: &User) -> Result<Subscription, AppError> {
        let updated = self.update_current(user, |sub| sub.resume()).await?;
        log_status(&updated, "Subscription resumed");
        Ok(updated)
    }

    pub async fn cancel(
        &self,
        user: &User,
        payload: CancelSubscriptionPayload,
    ) -> Result<Subscription, AppError> {
        let now = Utc::now();
        let CancelSubscriptionPayload {
            at_period_end,
            reason,
            feedback,
        } = payload;

        let updated = self
            .update_current(user, |sub| sub.cancel(at_period_end, reason, feedback, now))
            .await?;

        tracing::info!(
            subscription = %updated.uuid,
            status = updated.status.as_str(),
            at_period_end,
            "Subscription cancellation requested"
        );
        Ok(updated)
    }

    pub async fn change_plan(&self, user: &User, plan: Plan) -> Result<Subscription, AppError> {
        let updated = self
            .update_current(user, |sub| sub.change_plan(plan))
            .await?;
        tracing::info!(
            subscription = %updated.uuid,
            plan = plan.as_str(),
            bags_per_week = updated.bags_per_week,
            "Plan changed"
        );
        Ok(updated)
    }

    // =========================================================================
    //  BILLING
    // =========================================================================

    pub async fn mark_past_due(&self, uuid: Uuid) -> Result<Subscription, AppError> {
        let now = Utc::now();
        let updated = self
            .update_by_uuid(uuid, |sub| sub.mark_past_due(now))
            .await?;
        tracing::warn!(subscription = %updated.uuid, "Subscription is past due");
        Ok(updated)
    }

    pub async fn record_dunning_email(&self, uuid: Uuid) -> Result<Subscription, AppError> {
        let updated = self
            .update_by_uuid(uuid, |sub| sub.record_dunning_email())
            .await?;
        tracing::info!(
            subscription = %updated.uuid,
            emails_sent = updated.dunning_emails_sent,
            "Dunning email recorded"
        );
        Ok(updated)
    }

    pub async fn recover(&self, uuid: Uuid) -> Result<Subscription, AppError> {
        let updated = self.update_by_uuid(uuid, |sub| sub.recover()).await?;
        log_status(&updated, "Subscription recovered from dunning");
        Ok(updated)
    }

    /// Rolls the billing window; completes a pending period-end cancellation.
    pub async fn renew(
        &self,
        uuid: Uuid,
        payload: &RenewSubscriptionPayload,
    ) -> Result<Subscription, AppError> {
        let (start, end) = (payload.period_start, payload.period_end);
        let updated = self
            .update_by_uuid(uuid, |sub| sub.start_new_period(start, end))
            .await?;
        log_status(&updated, "Billing period rolled over");
        Ok(updated)
    }

    pub async fn soft_delete(&self, uuid: Uuid) -> Result<(), AppError> {
        if !self.subscription_repo.soft_delete(&self.pool, uuid).await? {
            return Err(AppError::NotFound("subscription"));
        }
        tracing::info!(subscription = %uuid, "Subscription deleted");
        Ok(())
    }

    /// Un-deletes a subscription unless its owner has started another one
    /// in the meantime.
    pub async fn restore(&self, uuid: Uuid) -> Result<Subscription, AppError> {
        let mut tx = self.pool.begin().await?;

        let deleted = self
            .subscription_repo
            .lock_deleted_by_uuid(&mut *tx, uuid)
            .await?
            .ok_or(AppError::NotFound("subscription"))?;

        if !deleted.is_cancelled()
            && self
                .subscription_repo
                .lock_current_for_user(&mut *tx, deleted.user_id)
                .await?
                .is_some()
        {
            return Err(AppError::Conflict(
                "The customer already has a running subscription".to_string(),
            ));
        }

        let restored = self
            .subscription_repo
            .restore(&mut *tx, uuid)
            .await?
            .ok_or(AppError::NotFound("subscription"))?;
        tx.commit().await?;

        tracing::info!(subscription = %uuid, "Subscription restored");
        Ok(restored)
    }

    // =========================================================================
    //  HELPERS
    // =========================================================================

    // Locks the user's current subscription, applies `apply` and writes the
    // result back. Nothing is written when `apply` fails.
    async fn update_current<F>(&self, user: &User, apply: F) -> Result<Subscription, AppError>
    where
        F: FnOnce(&mut Subscription) -> Result<(), AppError> + Send,
    {
        let mut tx = self.pool.begin().await?;
        let mut subscription = self
            .subscription_repo
            .lock_current_for_user(&mut *tx, user.id)
            .await?
            .ok_or(AppError::NotFound("subscription"))?;

        apply(&mut subscription)?;

        let updated = self.subscription_repo.update(&mut *tx, &subscription).await?;
        tx.commit().await?;
        Ok(updated)
    }

    async fn update_by_uuid<F>(&self, uuid: Uuid, apply: F) -> Result<Subscription, AppError>
    where
        F: FnOnce(&mut Subscription) -> Result<(), AppError> + Send,
    {
        let mut tx = self.pool.begin().await?;
        let mut subscription = self
            .subscription_repo
            .lock_by_uuid(&mut *tx, uuid)
            .await?
            .ok_or(AppError::NotFound("subscription"))?;

        apply(&mut subscription)?;

        let updated = self.subscription_repo.update(&mut *tx, &subscription).await?;
        tx.commit().await?;
        Ok(updated)
    }
}

fn one_month_after(start: DateTime<Utc>) -> Result<DateTime<Utc>, AppError> {
    start
        .checked_add_months(Months::new(1))
        .ok_or_else(|| anyhow::anyhow!("Billing period end out of range for {}", start).into())
}

fn log_status(subscription: &Subscription, message: &str) {
    tracing::info!(
        subscription = %subscription.uuid,
        status = subscription.status.as_str(),
        "{}",
        message
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::test_support::{seed_subscription, test_pool};
    use crate::db::{BagRepository, PickupRepository};
    use chrono::TimeZone;

    fn service(pool: &PgPool) -> SubscriptionService {
        let subscription_repo = SubscriptionRepository::new(pool.clone());
        let pickup_repo = PickupRepository::new(pool.clone());
        SubscriptionService::new(
            subscription_repo.clone(),
            AddressRepository::new(pool.clone()),
            BagService::new(
                BagRepository::new(pool.clone()),
                pickup_repo.clone(),
                subscription_repo.clone(),
                pool.clone(),
            ),
            PickupService::new(pickup_repo, subscription_repo, pool.clone()),
            RegionConfig {
                key: "austin".to_string(),
                name: "Austin".to_string(),
                timezone: "America/Chicago".to_string(),
                trial_days: 0,
            },
            pool.clone(),
        )
    }

    async fn running_count(pool: &PgPool, user_id: i64) -> i64 {
        sqlx::query_scalar(
            "SELECT COUNT(*) FROM subscriptions
             WHERE user_id = $1 AND deleted_at IS NULL AND status <> 'cancelled'",
        )
        .bind(user_id)
        .fetch_one(pool)
        .await
        .unwrap()
    }

    #[tokio::test]
    #[ignore = "needs DATABASE_URL"]
    async fn restore_refuses_a_second_running_subscription() {
        let pool = test_pool().await;
        let (user_id, subscription_id) = seed_subscription(&pool).await;
        let svc = service(&pool);

        let (old_uuid, address_id): (Uuid, i64) =
            sqlx::query_as("SELECT uuid, address_id FROM subscriptions WHERE id = $1")
                .bind(subscription_id)
                .fetch_one(&pool)
                .await
                .unwrap();
        svc.soft_delete(old_uuid).await.unwrap();

        sqlx::query(
            "INSERT INTO subscriptions (user_id, address_id, region, plan, bags_per_week, pickup_day, period_start, period_end)
             VALUES ($1, $2, 'austin', 'light', 1, 'friday', NOW(), NOW() + INTERVAL '1 month')",
        )
        .bind(user_id)
        .bind(address_id)
        .execute(&pool)
        .await
        .unwrap();

        let err = svc.restore(old_uuid).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        assert_eq!(running_count(&pool, user_id).await, 1);
    }

    #[tokio::test]
    #[ignore = "needs DATABASE_URL"]
    async fn restore_brings_back_the_only_subscription() {
        let pool = test_pool().await;
        let (user_id, subscription_id) = seed_subscription(&pool).await;
        let svc = service(&pool);

        let uuid: Uuid = sqlx::query_scalar("SELECT uuid FROM subscriptions WHERE id = $1")
            .bind(subscription_id)
            .fetch_one(&pool)
            .await
            .unwrap();
        svc.soft_delete(uuid).await.unwrap();
        assert_eq!(running_count(&pool, user_id).await, 0);

        let restored = svc.restore(uuid).await.unwrap();
        assert_eq!(restored.id, subscription_id);
        assert_eq!(running_count(&pool, user_id).await, 1);
    }

    #[test]
    fn billing_period_is_one_calendar_month() {
        let start = Utc.with_ymd_and_hms(2026, 10, 18, 9, 30, 0).unwrap();
        assert_eq!(
            one_month_after(start).unwrap(),
            Utc.with_ymd_and_hms(2026, 11, 18, 9, 30, 0).unwrap()
        );
    }

    #[test]
    fn month_end_start_clamps_to_shorter_month() {
        let start = Utc.with_ymd_and_hms(2027, 1, 31, 0, 0, 0).unwrap();
        assert_eq!(
            one_month_after(start).unwrap(),
            Utc.with_ymd_and_hms(2027, 2, 28, 0, 0, 0).unwrap()
        );
    }
}
