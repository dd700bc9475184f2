// src/models/address.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    #[serde(skip_serializing)]
    #[schema(ignore)]
    pub id: i64,

    #[serde(rename = "id")]
    pub uuid: Uuid,

    #[serde(skip_serializing)]
    #[schema(ignore)]
    pub user_id: i64,

    #[schema(example = "1200 Barton Springs Rd")]
    pub line1: String,

    #[schema(example = "Apt 4B")]
    pub line2: Option<String>,

    #[schema(example = "Austin")]
    pub city: String,

    #[schema(example = "TX")]
    pub state: String,

    #[schema(example = "78704")]
    pub postal_code: String,

    // Gate codes, where to leave the bags, etc.
    #[schema(example = "Leave bags by the side gate")]
    pub instructions: Option<String>,

    pub is_default: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateAddressPayload {
    #[validate(length(min = 1, message = "required"))]
    pub line1: String,

    pub line2: Option<String>,

    #[validate(length(min = 1, message = "required"))]
    pub city: String,

    #[validate(length(equal = 2, message = "Use the two-letter state code."))]
    pub state: String,

    #[validate(length(min = 5, max = 10, message = "Postal code is invalid."))]
    pub postal_code: String,

    pub instructions: Option<String>,

    #[serde(default)]
    pub is_default: bool,
}
