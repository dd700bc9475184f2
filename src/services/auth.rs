// src/services/auth.rs

use bcrypt::{hash, verify};
use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    common::{error::AppError, phone::normalize_phone},
    config::region::RegionConfig,
    db::UserRepository,
    models::auth::{Claims, RegisterUserPayload, User},
};

const TOKEN_TTL_DAYS: i64 = 7;

#[derive(Clone)]
pub struct AuthService {
    user_repo: UserRepository,
    region: RegionConfig,
    jwt_secret: String,
    pool: PgPool,
}

impl AuthService {
    pub fn new(
        user_repo: UserRepository,
        region: RegionConfig,
        jwt_secret: String,
        pool: PgPool,
    ) -> Self {
        Self {
            user_repo,
            region,
            jwt_secret,
            pool,
        }
    }

    /// Creates the account in the configured region and returns a token.
    pub async fn register_user(&self, payload: &RegisterUserPayload) -> Result<String, AppError> {
        // 1. Normalize before hashing so a bad phone fails fast
        let phone = payload
            .phone
            .as_deref()
            .filter(|raw| !raw.trim().is_empty())
            .map(normalize_phone)
            .transpose()?;

        let email = payload.email.trim().to_lowercase();

        // 2. Hashing is CPU-bound
        let password = payload.password.clone();
        let hashed_password =
            tokio::task::spawn_blocking(move || hash(&password, bcrypt::DEFAULT_COST))
                .await
                .map_err(|e| anyhow::anyhow!("Hashing task failed: {}", e))??;

        // 3. Insert
        let new_user = self
            .user_repo
            .create_user(
                &self.pool,
                payload.name.trim(),
                &email,
                &hashed_password,
                phone.as_deref(),
                &self.region.key,
                &self.region.timezone,
            )
            .await?;

        tracing::info!(user = %new_user.uuid, region = %new_user.region, "User registered");

        // 4. Token
        self.create_token(new_user.uuid)
    }

    pub async fn login_user(&self, email: &str, password: &str) -> Result<String, AppError> {
        let user = self
            .user_repo
            .find_by_email(&email.trim().to_lowercase())
            .await?
            .ok_or(AppError::InvalidCredentials)?;

        let password = password.to_owned();
        let password_hash = user.password_hash.clone();

        let is_password_valid =
            tokio::task::spawn_blocking(move || verify(&password, &password_hash))
                .await
                .map_err(|e| anyhow::anyhow!("Password verification task failed: {}", e))??;

        if !is_password_valid {
            return Err(AppError::InvalidCredentials);
        }

        self.create_token(user.uuid)
    }

    pub async fn validate_token(&self, token: &str) -> Result<User, AppError> {
        let token_data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.jwt_secret.as_ref()),
            &Validation::default(),
        )
        .map_err(|_| AppError::InvalidToken)?;

        // A token for a user that no longer exists is just an invalid token
        self.user_repo
            .find_by_uuid(token_data.claims.sub)
            .await?
            .ok_or(AppError::InvalidToken)
    }

    fn create_token(&self, user_uuid: Uuid) -> Result<String, AppError> {
        let now = Utc::now();
        let expires_at = now + chrono::Duration::days(TOKEN_TTL_DAYS);

        let claims = Claims {
            sub: user_uuid,
            exp: expires_at.timestamp() as usize,
            iat: now.timestamp() as usize,
        };

        Ok(encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.jwt_secret.as_ref()),
        )?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::postgres::PgPoolOptions;

    fn service() -> AuthService {
        // Never connects: token handling does not touch the database
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://localhost/unused")
            .unwrap();
        AuthService::new(
            UserRepository::new(pool.clone()),
            RegionConfig {
                key: "austin".to_string(),
                name: "Austin".to_string(),
                timezone: "America/Chicago".to_string(),
                trial_days: 0,
            },
            "test-secret".to_string(),
            pool,
        )
    }

    #[tokio::test]
    async fn token_carries_the_public_user_id() {
        let svc = service();
        let user_uuid = Uuid::new_v4();
        let token = svc.create_token(user_uuid).unwrap();

        let data = decode::<Claims>(
            &token,
            &DecodingKey::from_secret(b"test-secret"),
            &Validation::default(),
        )
        .unwrap();
        assert_eq!(data.claims.sub, user_uuid);
        assert_eq!(
            data.claims.exp - data.claims.iat,
            (TOKEN_TTL_DAYS * 24 * 3600) as usize
        );
    }

    #[tokio::test]
    async fn garbage_token_is_rejected_before_any_lookup() {
        let svc = service();
        let err = svc.validate_token("not-a-jwt").await.unwrap_err();
        assert!(matches!(err, AppError::InvalidToken));
    }
}
