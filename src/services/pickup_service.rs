// src/services/pickup_service.rs

use chrono::{Local, NaiveDate, Utc};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::{
    common::{error::AppError, phone::display_phone},
    db::{PickupRepository, SubscriptionRepository},
    models::{
        auth::User,
        pickup::{Pickup, PickupStatus, PickupStop, SkipPickupPayload, UpdatePickupStatusPayload},
        subscription::Subscription,
    },
};

#[derive(Clone)]
pub struct PickupService {
    pickup_repo: PickupRepository,
    subscription_repo: SubscriptionRepository,
    pool: PgPool,
}

impl PickupService {
    pub fn new(
        pickup_repo: PickupRepository,
        subscription_repo: SubscriptionRepository,
        pool: PgPool,
    ) -> Self {
        Self {
            pickup_repo,
            subscription_repo,
            pool,
        }
    }

    /// Idempotent: a second call for the same subscription and date hands
    /// back the pickup that already exists.
    pub async fn schedule_on(
        &self,
        conn: &mut PgConnection,
        subscription: &Subscription,
        date: NaiveDate,
    ) -> Result<Pickup, AppError> {
        let inserted = self
            .pickup_repo
            .insert_if_absent(
                &mut *conn,
                subscription.id,
                subscription.address_id,
                date,
                subscription.bags_per_week,
            )
            .await?;

        match inserted {
            Some(pickup) => {
                tracing::info!(
                    subscription = %subscription.uuid,
                    pickup = %pickup.uuid,
                    date = %date,
                    "Pickup scheduled"
                );
                Ok(pickup)
            }
            None => self
                .pickup_repo
                .find_by_subscription_and_date(&mut *conn, subscription.id, date)
                .await?
                .ok_or(AppError::NotFound("pickup")),
        }
    }

    /// Schedules the subscription's next pickup day. Only active
    /// subscriptions get pickups.
    pub async fn schedule_next(&self, subscription_uuid: Uuid) -> Result<Pickup, AppError> {
        let mut tx = self.pool.begin().await?;

        let subscription = self
            .subscription_repo
            .lock_by_uuid(&mut *tx, subscription_uuid)
            .await?
            .ok_or(AppError::NotFound("subscription"))?;

        if !subscription.is_active() {
            return Err(AppError::Conflict(format!(
                "Only active subscriptions are scheduled (status is '{}')",
                subscription.status.as_str()
            )));
        }

        let date = subscription.next_pickup_date(Local::now().naive_local());
        let pickup = self.schedule_on(&mut *tx, &subscription, date).await?;

        tx.commit().await?;
        Ok(pickup)
    }

    /// Customer skip. Counts against the subscription's per-period allowance
    /// in the same transaction as the pickup change.
    pub async fn skip(
        &self,
        user: &User,
        pickup_uuid: Uuid,
        payload: SkipPickupPayload,
    ) -> Result<Pickup, AppError> {
        let mut tx = self.pool.begin().await?;

        let mut pickup = self
            .pickup_repo
            .lock_for_user(&mut *tx, pickup_uuid, user.id)
            .await?
            .ok_or(AppError::NotFound("pickup"))?;

        let mut subscription = self
            .subscription_repo
            .lock_by_id(&mut *tx, pickup.subscription_id)
            .await?
            .ok_or(AppError::NotFound("subscription"))?;

        pickup.skip(payload.reason, Utc::now())?;
        subscription.record_skip()?;

        let pickup = self.pickup_repo.update(&mut *tx, &pickup).await?;
        let subscription = self.subscription_repo.update(&mut *tx, &subscription).await?;
        tx.commit().await?;

        tracing::info!(
            pickup = %pickup.uuid,
            skips_used = subscription.skips_used_this_period,
            "Pickup skipped"
        );
        Ok(pickup)
    }

    /// Field update from a driver or the facility.
    pub async fn update_status(
        &self,
        pickup_uuid: Uuid,
        payload: UpdatePickupStatusPayload,
    ) -> Result<Pickup, AppError> {
        // Skips go through the customer flow so the allowance is enforced
        if payload.status == PickupStatus::Skipped {
            return Err(AppError::InvalidInput(
                "Skips are requested by the customer".to_string(),
            ));
        }
        if payload.bags_collected.is_some() && !payload.status.is_in_progress() {
            return Err(AppError::InvalidInput(
                "bags_collected can only be recorded once the pickup is underway".to_string(),
            ));
        }

        let mut tx = self.pool.begin().await?;

        let mut pickup = self
            .pickup_repo
            .lock_by_uuid(&mut *tx, pickup_uuid)
            .await?
            .ok_or(AppError::NotFound("pickup"))?;

        let from = pickup.status;
        pickup.transition_to(payload.status, Utc::now())?;

        if let Some(collected) = payload.bags_collected {
            pickup.bags_collected = Some(collected);
        }
        if payload.driver_notes.is_some() {
            pickup.driver_notes = payload.driver_notes;
        }
        if payload.delivery_photo_path.is_some() {
            pickup.delivery_photo_path = payload.delivery_photo_path;
        }

        let pickup = self.pickup_repo.update(&mut *tx, &pickup).await?;
        tx.commit().await?;

        tracing::info!(
            pickup = %pickup.uuid,
            from = from.as_str(),
            to = pickup.status.as_str(),
            "Pickup status changed"
        );
        Ok(pickup)
    }

    pub async fn list_upcoming_for_user(&self, user: &User) -> Result<Vec<Pickup>, AppError> {
        self.pickup_repo
            .list_upcoming_for_user(user.id, Local::now().date_naive())
            .await
    }

    pub async fn list_needing_reminder(&self) -> Result<Vec<Pickup>, AppError> {
        self.pickup_repo.list_needing_reminder().await
    }

    /// Today's route, with phone numbers formatted for the driver.
    pub async fn list_today(&self) -> Result<Vec<PickupStop>, AppError> {
        let mut stops = self
            .pickup_repo
            .list_stops_for_date(Local::now().date_naive())
            .await?;

        for stop in &mut stops {
            stop.customer_phone = stop.customer_phone.as_deref().map(display_phone);
        }
        Ok(stops)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::test_support::{seed_subscription, test_pool, user_by_id};
    use chrono::Duration;

    fn service(pool: &PgPool) -> PickupService {
        PickupService::new(
            PickupRepository::new(pool.clone()),
            SubscriptionRepository::new(pool.clone()),
            pool.clone(),
        )
    }

    async fn subscription(pool: &PgPool, id: i64) -> Subscription {
        SubscriptionRepository::new(pool.clone())
            .lock_by_id(pool, id)
            .await
            .unwrap()
            .unwrap()
    }

    async fn book(svc: &PickupService, pool: &PgPool, sub: &Subscription, date: NaiveDate) -> Pickup {
        let mut conn = pool.acquire().await.unwrap();
        svc.schedule_on(&mut *conn, sub, date).await.unwrap()
    }

    #[tokio::test]
    #[ignore = "needs DATABASE_URL"]
    async fn scheduling_twice_returns_the_same_pickup() {
        let pool = test_pool().await;
        let (_, subscription_id) = seed_subscription(&pool).await;
        let svc = service(&pool);
        let sub = subscription(&pool, subscription_id).await;
        let date = Local::now().date_naive() + Duration::days(3);

        let first = book(&svc, &pool, &sub, date).await;
        let second = book(&svc, &pool, &sub, date).await;

        assert_eq!(first.uuid, second.uuid);
        assert_eq!(first.bags_expected, sub.bags_per_week);
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM pickups WHERE subscription_id = $1 AND scheduled_date = $2",
        )
        .bind(subscription_id)
        .bind(date)
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    #[ignore = "needs DATABASE_URL"]
    async fn third_skip_in_a_period_is_refused_and_rolled_back() {
        let pool = test_pool().await;
        let (user_id, subscription_id) = seed_subscription(&pool).await;
        let svc = service(&pool);
        let user = user_by_id(&pool, user_id).await;
        let sub = subscription(&pool, subscription_id).await;
        let today = Local::now().date_naive();

        let mut pickups = Vec::new();
        for offset in 1..=3 {
            pickups.push(book(&svc, &pool, &sub, today + Duration::days(offset)).await);
        }

        for pickup in &pickups[..2] {
            let skipped = svc
                .skip(&user, pickup.uuid, SkipPickupPayload::default())
                .await
                .unwrap();
            assert_eq!(skipped.status, PickupStatus::Skipped);
        }

        let err = svc
            .skip(&user, pickups[2].uuid, SkipPickupPayload::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::SkipLimitReached(2)));

        let untouched = PickupRepository::new(pool.clone())
            .find_by_uuid(&pool, pickups[2].uuid)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(untouched.status, PickupStatus::Scheduled);
        assert_eq!(subscription(&pool, subscription_id).await.skips_used_this_period, 2);
    }

    #[tokio::test]
    #[ignore = "needs DATABASE_URL"]
    async fn deleted_subscription_needs_no_reminder() {
        let pool = test_pool().await;
        let (_, subscription_id) = seed_subscription(&pool).await;
        let svc = service(&pool);
        let sub = subscription(&pool, subscription_id).await;
        let pickup = book(&svc, &pool, &sub, Local::now().date_naive() + Duration::days(2)).await;

        let listed = svc.list_needing_reminder().await.unwrap();
        assert!(listed.iter().any(|p| p.uuid == pickup.uuid));

        SubscriptionRepository::new(pool.clone())
            .soft_delete(&pool, sub.uuid)
            .await
            .unwrap();

        let listed = svc.list_needing_reminder().await.unwrap();
        assert!(!listed.iter().any(|p| p.uuid == pickup.uuid));
    }

    #[tokio::test]
    #[ignore = "needs DATABASE_URL"]
    async fn paused_or_cancelled_subscriptions_drop_off_the_route() {
        let pool = test_pool().await;
        let (_, subscription_id) = seed_subscription(&pool).await;
        let svc = service(&pool);
        let sub = subscription(&pool, subscription_id).await;
        let pickup = book(&svc, &pool, &sub, Local::now().date_naive()).await;

        let on_route = |stops: &[PickupStop]| stops.iter().any(|s| s.pickup_id == pickup.uuid);
        assert!(on_route(&svc.list_today().await.unwrap()));

        for status in ["paused", "cancelled"] {
            sqlx::query("UPDATE subscriptions SET status = $2::subscription_status WHERE id = $1")
                .bind(subscription_id)
                .bind(status)
                .execute(&pool)
                .await
                .unwrap();

            assert!(!on_route(&svc.list_today().await.unwrap()), "{}", status);
            let reminders = svc.list_needing_reminder().await.unwrap();
            assert!(!reminders.iter().any(|p| p.uuid == pickup.uuid), "{}", status);
        }
    }
}
