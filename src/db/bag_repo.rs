// src/db/bag_repo.rs

use sqlx::{Executor, PgPool, Postgres};
use uuid::Uuid;

use crate::{common::error::AppError, models::bag::Bag};

pub const QR_CODE_CONSTRAINT: &str = "bags_qr_code_key";

#[derive(Clone)]
pub struct BagRepository {
    pool: PgPool,
}

impl BagRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A taken QR code comes back as
    /// `UniqueConstraintViolation("bags_qr_code_key")`.
    pub async fn insert<'e, E>(
        &self,
        executor: E,
        subscription_id: i64,
        qr_code: &str,
        label: Option<&str>,
    ) -> Result<Bag, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query_as::<_, Bag>(
            r#"
            INSERT INTO bags (subscription_id, qr_code, label)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(subscription_id)
        .bind(qr_code)
        .bind(label)
        .fetch_one(executor)
        .await
        .map_err(AppError::from_write)
    }

    pub async fn lock_by_qr_code<'e, E>(
        &self,
        executor: E,
        qr_code: &str,
    ) -> Result<Option<Bag>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let bag = sqlx::query_as::<_, Bag>("SELECT * FROM bags WHERE qr_code = $1 FOR UPDATE")
            .bind(qr_code)
            .fetch_optional(executor)
            .await?;

        Ok(bag)
    }

    pub async fn find_for_user(&self, uuid: Uuid, user_id: i64) -> Result<Option<Bag>, AppError> {
        let bag = sqlx::query_as::<_, Bag>(
            r#"
            SELECT b.* FROM bags b
            JOIN subscriptions s ON s.id = b.subscription_id
            WHERE b.uuid = $1 AND s.user_id = $2 AND s.deleted_at IS NULL
            "#,
        )
        .bind(uuid)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(bag)
    }

    pub async fn list_for_user(&self, user_id: i64) -> Result<Vec<Bag>, AppError> {
        let bags = sqlx::query_as::<_, Bag>(
            r#"
            SELECT b.* FROM bags b
            JOIN subscriptions s ON s.id = b.subscription_id
            WHERE s.user_id = $1 AND s.deleted_at IS NULL
            ORDER BY b.created_at, b.id
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(bags)
    }

    pub async fn update<'e, E>(&self, executor: E, bag: &Bag) -> Result<Bag, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let updated = sqlx::query_as::<_, Bag>(
            r#"
            UPDATE bags SET
                status = $2,
                pickup_id = $3,
                scans = $4,
                last_scanned_at = $5,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(bag.id)
        .bind(bag.status)
        .bind(bag.pickup_id)
        .bind(&bag.scans)
        .bind(bag.last_scanned_at)
        .fetch_one(executor)
        .await?;

        Ok(updated)
    }
}
