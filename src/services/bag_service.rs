// src/services/bag_service.rs

use chrono::Utc;
use qrcode::{render::svg, QrCode};
use rand::{rngs::StdRng, Rng, SeedableRng};
use sqlx::{Connection, PgConnection, PgPool};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::{bag_repo::QR_CODE_CONSTRAINT, BagRepository, PickupRepository, SubscriptionRepository},
    models::{
        auth::User,
        bag::{generate_qr_code, Bag, CreateBagsPayload, ScanBagPayload},
    },
};

/// Fresh codes drawn before giving up on a bag insert.
pub const MAX_QR_CODE_ATTEMPTS: u32 = 8;

#[derive(Clone)]
pub struct BagService {
    bag_repo: BagRepository,
    pickup_repo: PickupRepository,
    subscription_repo: SubscriptionRepository,
    pool: PgPool,
}

impl BagService {
    pub fn new(
        bag_repo: BagRepository,
        pickup_repo: PickupRepository,
        subscription_repo: SubscriptionRepository,
        pool: PgPool,
    ) -> Self {
        Self {
            bag_repo,
            pickup_repo,
            subscription_repo,
            pool,
        }
    }

    /// Inserts one bag with a newly generated QR code.
    ///
    /// Every attempt runs in its own savepoint, so a code collision only
    /// rolls back that attempt and the caller's transaction stays usable.
    pub async fn create_bag(
        &self,
        conn: &mut PgConnection,
        subscription_id: i64,
        label: Option<&str>,
    ) -> Result<Bag, AppError> {
        let mut rng = StdRng::from_entropy();
        self.create_bag_with(conn, subscription_id, label, &mut rng)
            .await
    }

    async fn create_bag_with<R: Rng + Send>(
        &self,
        conn: &mut PgConnection,
        subscription_id: i64,
        label: Option<&str>,
        rng: &mut R,
    ) -> Result<Bag, AppError> {
        for attempt in 1..=MAX_QR_CODE_ATTEMPTS {
            let qr_code = generate_qr_code(&mut *rng);

            let mut savepoint = conn.begin().await?;
            match self
                .bag_repo
                .insert(&mut *savepoint, subscription_id, &qr_code, label)
                .await
            {
                Ok(bag) => {
                    savepoint.commit().await?;
                    return Ok(bag);
                }
                Err(e) if e.is_unique_violation_of(QR_CODE_CONSTRAINT) => {
                    savepoint.rollback().await?;
                    tracing::warn!(attempt, %qr_code, "QR code already taken, drawing a new one");
                }
                Err(e) => return Err(e),
            }
        }

        Err(AppError::IdentifierExhausted("qr_code"))
    }

    /// Issues extra bags for a subscription (replacement or plan upgrade).
    pub async fn create_for_subscription(
        &self,
        subscription_uuid: Uuid,
        payload: &CreateBagsPayload,
    ) -> Result<Vec<Bag>, AppError> {
        let mut tx = self.pool.begin().await?;

        let subscription = self
            .subscription_repo
            .lock_by_uuid(&mut *tx, subscription_uuid)
            .await?
            .ok_or(AppError::NotFound("subscription"))?;

        if subscription.is_cancelled() {
            return Err(AppError::Conflict(
                "Bags cannot be issued for a cancelled subscription".to_string(),
            ));
        }

        let mut bags = Vec::with_capacity(payload.count as usize);
        for _ in 0..payload.count {
            bags.push(
                self.create_bag(&mut *tx, subscription.id, payload.label.as_deref())
                    .await?,
            );
        }

        tx.commit().await?;

        tracing::info!(
            subscription = %subscription.uuid,
            count = bags.len(),
            "Bags issued"
        );
        Ok(bags)
    }

    /// Records a scan, optionally moving the bag to a new status and/or
    /// attaching it to a pickup of the same subscription.
    pub async fn scan(&self, payload: &ScanBagPayload, scanned_by: &User) -> Result<Bag, AppError> {
        let mut tx = self.pool.begin().await?;

        let mut bag = self
            .bag_repo
            .lock_by_qr_code(&mut *tx, &payload.qr_code)
            .await?
            .ok_or(AppError::NotFound("bag"))?;

        // Repeat scans at the same stage only add to the history
        if let Some(status) = payload.status.filter(|status| *status != bag.status) {
            bag.transition_to(status)?;
        }

        if let Some(pickup_uuid) = payload.pickup_id {
            let pickup = self
                .pickup_repo
                .find_by_uuid(&mut *tx, pickup_uuid)
                .await?
                .ok_or(AppError::NotFound("pickup"))?;

            if pickup.subscription_id != bag.subscription_id {
                return Err(AppError::InvalidInput(
                    "The pickup belongs to a different subscription".to_string(),
                ));
            }
            bag.pickup_id = Some(pickup.id);
        }

        bag.record_scan(&payload.location, &scanned_by.email, Utc::now());

        let updated = self.bag_repo.update(&mut *tx, &bag).await?;
        tx.commit().await?;

        tracing::info!(
            qr_code = %updated.qr_code,
            status = updated.status.as_str(),
            location = %payload.location,
            "Bag scanned"
        );
        Ok(updated)
    }

    pub async fn list_for_user(&self, user: &User) -> Result<Vec<Bag>, AppError> {
        self.bag_repo.list_for_user(user.id).await
    }

    /// Printable SVG label encoding the bag's QR code.
    pub async fn label_svg(&self, user: &User, bag_uuid: Uuid) -> Result<String, AppError> {
        let bag = self
            .bag_repo
            .find_for_user(bag_uuid, user.id)
            .await?
            .ok_or(AppError::NotFound("bag"))?;

        render_label(&bag.qr_code)
    }
}

pub fn render_label(qr_code: &str) -> Result<String, AppError> {
    let code = QrCode::new(qr_code.as_bytes())
        .map_err(|e| anyhow::anyhow!("Could not encode QR code {}: {}", qr_code, e))?;

    Ok(code
        .render::<svg::Color>()
        .min_dimensions(200, 200)
        .quiet_zone(true)
        .build())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::test_support::{seed_subscription, test_pool, user_by_id};
    use crate::models::bag::BagStatus;

    #[test]
    fn label_is_an_svg_document() {
        let svg = render_label("LAU-7Q2K9D").unwrap();
        assert!(svg.starts_with("<?xml"));
        assert!(svg.contains("<svg"));
        assert!(svg.trim_end().ends_with("</svg>"));
    }

    fn service(pool: &PgPool) -> BagService {
        BagService::new(
            BagRepository::new(pool.clone()),
            PickupRepository::new(pool.clone()),
            SubscriptionRepository::new(pool.clone()),
            pool.clone(),
        )
    }

    #[tokio::test]
    #[ignore = "needs DATABASE_URL"]
    async fn taken_code_is_retried_inside_the_transaction() {
        let pool = test_pool().await;
        let (_, subscription_id) = seed_subscription(&pool).await;
        let svc = service(&pool);

        let mut tx = pool.begin().await.unwrap();
        let first = svc.create_bag(&mut *tx, subscription_id, None).await.unwrap();

        // Force a collision on the next raw insert; the transaction must survive it
        let mut savepoint = Connection::begin(&mut *tx).await.unwrap();
        let clash = svc
            .bag_repo
            .insert(&mut *savepoint, subscription_id, &first.qr_code, None)
            .await
            .unwrap_err();
        assert!(clash.is_unique_violation_of(QR_CODE_CONSTRAINT));
        savepoint.rollback().await.unwrap();

        let second = svc.create_bag(&mut *tx, subscription_id, None).await.unwrap();
        tx.commit().await.unwrap();

        assert_ne!(first.qr_code, second.qr_code);
    }

    #[tokio::test]
    #[ignore = "needs DATABASE_URL"]
    async fn every_code_taken_gives_up_after_bounded_attempts() {
        let pool = test_pool().await;
        let (_, subscription_id) = seed_subscription(&pool).await;
        let svc = service(&pool);
        let seed = Uuid::new_v4().as_u128() as u64;

        // Same seed, same codes: occupy every code the service will draw
        let mut occupied = StdRng::seed_from_u64(seed);
        for _ in 0..MAX_QR_CODE_ATTEMPTS {
            let code = generate_qr_code(&mut occupied);
            svc.bag_repo
                .insert(&pool, subscription_id, &code, None)
                .await
                .unwrap();
        }

        let mut tx = pool.begin().await.unwrap();
        let err = svc
            .create_bag_with(&mut *tx, subscription_id, None, &mut StdRng::seed_from_u64(seed))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::IdentifierExhausted("qr_code")));

        // Savepoints kept the outer transaction usable
        let bag = svc.create_bag(&mut *tx, subscription_id, None).await.unwrap();
        tx.commit().await.unwrap();
        assert!(bag.qr_code.starts_with("LAU-"));
    }

    async fn scan_at_facility(svc: &BagService, qr_code: &str, scanner: &User) -> Result<Bag, AppError> {
        let payload = ScanBagPayload {
            qr_code: qr_code.to_string(),
            location: "facility-1".to_string(),
            status: Some(BagStatus::AtFacility),
            pickup_id: None,
        };
        svc.scan(&payload, scanner).await
    }

    #[tokio::test]
    #[ignore = "needs DATABASE_URL"]
    async fn repeat_scan_at_same_stage_is_recorded() {
        let pool = test_pool().await;
        let (user_id, subscription_id) = seed_subscription(&pool).await;
        let svc = service(&pool);
        let scanner = user_by_id(&pool, user_id).await;

        let bag = svc
            .create_bag(&mut *pool.acquire().await.unwrap(), subscription_id, None)
            .await
            .unwrap();
        sqlx::query("UPDATE bags SET status = 'picked_up' WHERE id = $1")
            .bind(bag.id)
            .execute(&pool)
            .await
            .unwrap();

        scan_at_facility(&svc, &bag.qr_code, &scanner).await.unwrap();
        let again = scan_at_facility(&svc, &bag.qr_code, &scanner).await.unwrap();

        assert_eq!(again.status, BagStatus::AtFacility);
        assert_eq!(again.scans.len(), 2);
    }

    #[tokio::test]
    #[ignore = "needs DATABASE_URL"]
    async fn concurrent_bag_creation_never_repeats_a_code() {
        let pool = test_pool().await;
        let (_, subscription_id) = seed_subscription(&pool).await;
        let svc = service(&pool);

        let mut handles = Vec::new();
        for _ in 0..8 {
            let svc = svc.clone();
            let pool = pool.clone();
            handles.push(tokio::spawn(async move {
                let mut codes = Vec::new();
                for _ in 0..25 {
                    let mut tx = pool.begin().await.unwrap();
                    let bag = svc.create_bag(&mut *tx, subscription_id, None).await.unwrap();
                    tx.commit().await.unwrap();
                    codes.push(bag.qr_code);
                }
                codes
            }));
        }

        let mut all = Vec::new();
        for handle in handles {
            all.extend(handle.await.unwrap());
        }
        let unique: std::collections::HashSet<_> = all.iter().collect();
        assert_eq!(unique.len(), all.len());
    }
}
