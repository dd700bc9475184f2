// src/db/address_repo.rs

use sqlx::{Executor, PgPool, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::address::{Address, CreateAddressPayload},
};

#[derive(Clone)]
pub struct AddressRepository {
    pool: PgPool,
}

impl AddressRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn list_for_user(&self, user_id: i64) -> Result<Vec<Address>, AppError> {
        let addresses = sqlx::query_as::<_, Address>(
            "SELECT * FROM addresses WHERE user_id = $1 ORDER BY is_default DESC, created_at",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(addresses)
    }

    /// Inserts an address. A user's first address is always the default, and
    /// a new default demotes the previous one in the same statement.
    pub async fn create<'e, E>(
        &self,
        executor: E,
        user_id: i64,
        payload: &CreateAddressPayload,
    ) -> Result<Address, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let address = sqlx::query_as::<_, Address>(
            r#"
            WITH demoted AS (
                UPDATE addresses SET is_default = FALSE
                WHERE user_id = $1 AND is_default AND $8
            )
            INSERT INTO addresses (
                user_id, line1, line2, city, state, postal_code, instructions, is_default
            )
            VALUES (
                $1, $2, $3, $4, $5, $6, $7,
                $8 OR NOT EXISTS (SELECT 1 FROM addresses WHERE user_id = $1)
            )
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(&payload.line1)
        .bind(&payload.line2)
        .bind(&payload.city)
        .bind(payload.state.to_uppercase())
        .bind(&payload.postal_code)
        .bind(&payload.instructions)
        .bind(payload.is_default)
        .fetch_one(executor)
        .await?;

        Ok(address)
    }

    pub async fn find_for_user<'e, E>(
        &self,
        executor: E,
        user_id: i64,
        uuid: Uuid,
    ) -> Result<Option<Address>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let address = sqlx::query_as::<_, Address>(
            "SELECT * FROM addresses WHERE user_id = $1 AND uuid = $2",
        )
        .bind(user_id)
        .bind(uuid)
        .fetch_optional(executor)
        .await?;

        Ok(address)
    }

    pub async fn find_default_for_user<'e, E>(
        &self,
        executor: E,
        user_id: i64,
    ) -> Result<Option<Address>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let address = sqlx::query_as::<_, Address>(
            r#"
            SELECT * FROM addresses
            WHERE user_id = $1
            ORDER BY is_default DESC, created_at DESC
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .fetch_optional(executor)
        .await?;

        Ok(address)
    }
}
