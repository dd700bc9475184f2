// src/models/auth.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "user_role", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Customer,
    Driver,
    Staff,
    Admin,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Customer => "customer",
            UserRole::Driver => "driver",
            UserRole::Staff => "staff",
            UserRole::Admin => "admin",
        }
    }
}

// A user as stored in the database. The surrogate key never leaves the service.
#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(skip_serializing)]
    #[schema(ignore)]
    pub id: i64,

    #[serde(rename = "id")]
    #[schema(example = "550e8400-e29b-41d4-a716-446655440000")]
    pub uuid: Uuid,

    #[schema(example = "Dana Reyes")]
    pub name: String,

    #[schema(example = "dana@example.com")]
    pub email: String,

    #[schema(example = "+15125550199")]
    pub phone: Option<String>,

    #[serde(skip_serializing)]
    #[schema(ignore)]
    pub password_hash: String,

    pub role: UserRole,

    #[schema(example = "austin")]
    pub region: String,

    #[schema(example = "America/Chicago")]
    pub timezone: String,

    pub email_verified_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SocialAccount {
    #[serde(skip_serializing)]
    #[schema(ignore)]
    pub id: i64,

    #[serde(rename = "id")]
    pub uuid: Uuid,

    #[serde(skip_serializing)]
    #[schema(ignore)]
    pub user_id: i64,

    #[schema(example = "google")]
    pub provider: String,

    pub provider_user_id: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegisterUserPayload {
    #[validate(length(min = 1, max = 120, message = "Name is required."))]
    #[schema(example = "Dana Reyes")]
    pub name: String,

    #[validate(email(message = "Email address is invalid."))]
    #[schema(example = "dana@example.com")]
    pub email: String,

    #[validate(length(min = 8, message = "Password must have at least 8 characters."))]
    pub password: String,

    #[schema(example = "(512) 555-0199")]
    pub phone: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct LoginUserPayload {
    #[validate(email(message = "Email address is invalid."))]
    #[schema(example = "dana@example.com")]
    pub email: String,

    #[validate(length(min = 1, message = "Password is required."))]
    pub password: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AuthResponse {
    pub token: String,
}

// JWT claims. `sub` is the public user UUID.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub exp: usize,
    pub iat: usize,
}
