// src/db/invoice_repo.rs

use sqlx::{Executor, PgPool, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::invoice::{CreateInvoicePayload, Invoice},
};

pub const INVOICE_NUMBER_CONSTRAINT: &str = "invoices_invoice_number_key";

#[derive(Clone)]
pub struct InvoiceRepository {
    pool: PgPool,
}

impl InvoiceRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Bumps the counter for `year_month` and returns the new value.
    ///
    /// The first call of a month seeds the counter from the highest sequence
    /// already used by invoices of that month. The row stays locked until the
    /// surrounding transaction ends, so concurrent callers are serialized.
    pub async fn next_sequence<'e, E>(
        &self,
        executor: E,
        year_month: &str,
        number_prefix: &str,
    ) -> Result<i64, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let like_pattern = format!("{}%", number_prefix);
        // SUBSTRING is 1-based: the sequence starts right after the prefix
        let sequence_start = number_prefix.len() as i32 + 1;

        let value: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO invoice_number_sequences (year_month, last_value)
            VALUES (
                $1,
                COALESCE(
                    (SELECT MAX(CAST(SUBSTRING(invoice_number FROM $3) AS BIGINT))
                     FROM invoices
                     WHERE invoice_number LIKE $2),
                    0
                ) + 1
            )
            ON CONFLICT (year_month)
            DO UPDATE SET last_value = invoice_number_sequences.last_value + 1
            RETURNING last_value
            "#,
        )
        .bind(year_month)
        .bind(like_pattern)
        .bind(sequence_start)
        .fetch_one(executor)
        .await?;

        Ok(value)
    }

    /// A taken invoice number comes back as
    /// `UniqueConstraintViolation("invoices_invoice_number_key")`.
    pub async fn insert<'e, E>(
        &self,
        executor: E,
        invoice_number: &str,
        user_id: i64,
        subscription_id: Option<i64>,
        payload: &CreateInvoicePayload,
    ) -> Result<Invoice, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query_as::<_, Invoice>(
            r#"
            INSERT INTO invoices (
                user_id, subscription_id, stripe_invoice_id, invoice_number, status,
                subtotal, discount, tax, total, currency,
                period_start, period_end, due_date, paid_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(subscription_id)
        .bind(&payload.stripe_invoice_id)
        .bind(invoice_number)
        .bind(payload.status)
        .bind(payload.subtotal)
        .bind(payload.discount)
        .bind(payload.tax)
        .bind(payload.total)
        .bind(payload.currency.to_lowercase())
        .bind(payload.period_start)
        .bind(payload.period_end)
        .bind(payload.due_date)
        .bind(payload.paid_at)
        .fetch_one(executor)
        .await
        .map_err(AppError::from_write)
    }

    pub async fn list_for_user(&self, user_id: i64) -> Result<Vec<Invoice>, AppError> {
        let invoices = sqlx::query_as::<_, Invoice>(
            "SELECT * FROM invoices WHERE user_id = $1 ORDER BY created_at DESC, id DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(invoices)
    }

    pub async fn find_for_user(
        &self,
        uuid: Uuid,
        user_id: i64,
    ) -> Result<Option<Invoice>, AppError> {
        let invoice = sqlx::query_as::<_, Invoice>(
            "SELECT * FROM invoices WHERE uuid = $1 AND user_id = $2",
        )
        .bind(uuid)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(invoice)
    }
}
