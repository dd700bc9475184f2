// src/models/invoice.rs

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

pub const INVOICE_NUMBER_PREFIX: &str = "INV";
pub const INVOICE_SEQUENCE_WIDTH: usize = 5;
/// Highest sequence that still fits the fixed-width number.
pub const MAX_INVOICE_SEQUENCE: i64 = 99_999;

/// `YYYYMM` bucket an invoice created at `now` is numbered in.
pub fn invoice_year_month(now: DateTime<Utc>) -> String {
    now.format("%Y%m").to_string()
}

/// `INV-202610-` style prefix shared by every invoice of a month.
pub fn invoice_number_prefix(year_month: &str) -> String {
    format!("{}-{}-", INVOICE_NUMBER_PREFIX, year_month)
}

/// `None` once the month has run past [`MAX_INVOICE_SEQUENCE`].
pub fn format_invoice_number(year_month: &str, sequence: i64) -> Option<String> {
    if !(1..=MAX_INVOICE_SEQUENCE).contains(&sequence) {
        return None;
    }
    Some(format!(
        "{}{:0width$}",
        invoice_number_prefix(year_month),
        sequence,
        width = INVOICE_SEQUENCE_WIDTH
    ))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "invoice_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    Draft,
    Open,
    Paid,
    Void,
    Uncollectible,
}

// Amounts are integer minor units (cents).
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Invoice {
    #[serde(skip_serializing)]
    #[schema(ignore)]
    pub id: i64,

    #[serde(rename = "id")]
    pub uuid: Uuid,

    #[serde(skip_serializing)]
    #[schema(ignore)]
    pub user_id: i64,

    #[serde(skip_serializing)]
    #[schema(ignore)]
    pub subscription_id: Option<i64>,

    #[serde(skip_serializing)]
    #[schema(ignore)]
    pub stripe_invoice_id: Option<String>,

    #[schema(example = "INV-202610-00042")]
    pub invoice_number: String,

    pub status: InvoiceStatus,

    #[schema(example = 5900)]
    pub subtotal: i64,
    #[schema(example = 500)]
    pub discount: i64,
    #[schema(example = 445)]
    pub tax: i64,
    #[schema(example = 5845)]
    pub total: i64,

    #[schema(example = "usd")]
    pub currency: String,

    pub period_start: Option<DateTime<Utc>>,
    pub period_end: Option<DateTime<Utc>>,

    #[schema(value_type = Option<String>, format = Date, example = "2026-11-01")]
    pub due_date: Option<NaiveDate>,

    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateInvoicePayload {
    pub user_id: Uuid,
    pub subscription_id: Option<Uuid>,
    pub stripe_invoice_id: Option<String>,

    #[serde(default = "default_invoice_status")]
    pub status: InvoiceStatus,

    #[validate(range(min = 0, message = "Amounts cannot be negative."))]
    pub subtotal: i64,
    #[validate(range(min = 0, message = "Amounts cannot be negative."))]
    #[serde(default)]
    pub discount: i64,
    #[validate(range(min = 0, message = "Amounts cannot be negative."))]
    #[serde(default)]
    pub tax: i64,
    #[validate(range(min = 0, message = "Amounts cannot be negative."))]
    pub total: i64,

    #[validate(length(equal = 3, message = "Use a three-letter ISO currency code."))]
    #[serde(default = "default_currency")]
    pub currency: String,

    pub period_start: Option<DateTime<Utc>>,
    pub period_end: Option<DateTime<Utc>>,

    #[schema(value_type = Option<String>, format = Date)]
    pub due_date: Option<NaiveDate>,

    pub paid_at: Option<DateTime<Utc>>,
}

impl CreateInvoicePayload {
    pub fn expected_total(&self) -> i64 {
        self.subtotal - self.discount + self.tax
    }

    /// The billing processor is the source of truth for totals; a mismatch
    /// is reported, not rejected.
    pub fn totals_consistent(&self) -> bool {
        self.total == self.expected_total()
    }
}

fn default_invoice_status() -> InvoiceStatus {
    InvoiceStatus::Open
}

fn default_currency() -> String {
    "usd".to_string()
}
