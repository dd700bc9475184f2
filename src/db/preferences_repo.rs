// src/db/preferences_repo.rs

use sqlx::{Executor, PgPool, Postgres};

use crate::{
    common::error::AppError,
    models::preferences::{
        NotificationPreferences, Preferences, UpdateNotificationPreferencesPayload,
        UpdatePreferencesPayload,
    },
};

// Rows are created lazily on first save; reads fall back to the defaults.
#[derive(Clone)]
pub struct PreferencesRepository {
    pool: PgPool,
}

impl PreferencesRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn get_preferences(&self, user_id: i64) -> Result<Preferences, AppError> {
        let prefs = sqlx::query_as::<_, Preferences>("SELECT * FROM preferences WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(prefs.unwrap_or_else(|| Preferences::defaults_for(user_id)))
    }

    pub async fn upsert_preferences<'e, E>(
        &self,
        executor: E,
        user_id: i64,
        input: &UpdatePreferencesPayload,
    ) -> Result<Preferences, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let prefs = sqlx::query_as::<_, Preferences>(
            r#"
            INSERT INTO preferences (user_id, detergent, special_instructions)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id)
            DO UPDATE SET
                detergent = EXCLUDED.detergent,
                special_instructions = EXCLUDED.special_instructions,
                updated_at = NOW()
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(input.detergent)
        .bind(&input.special_instructions)
        .fetch_one(executor)
        .await?;

        Ok(prefs)
    }

    pub async fn get_notification_preferences(
        &self,
        user_id: i64,
    ) -> Result<NotificationPreferences, AppError> {
        let prefs = sqlx::query_as::<_, NotificationPreferences>(
            "SELECT * FROM notification_preferences WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(prefs.unwrap_or_else(|| NotificationPreferences::defaults_for(user_id)))
    }

    pub async fn upsert_notification_preferences<'e, E>(
        &self,
        executor: E,
        user_id: i64,
        input: &UpdateNotificationPreferencesPayload,
    ) -> Result<NotificationPreferences, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let prefs = sqlx::query_as::<_, NotificationPreferences>(
            r#"
            INSERT INTO notification_preferences (user_id, email_enabled, sms_enabled, push_enabled)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (user_id)
            DO UPDATE SET
                email_enabled = EXCLUDED.email_enabled,
                sms_enabled = EXCLUDED.sms_enabled,
                push_enabled = EXCLUDED.push_enabled,
                updated_at = NOW()
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(input.email_enabled)
        .bind(input.sms_enabled)
        .bind(input.push_enabled)
        .fetch_one(executor)
        .await?;

        Ok(prefs)
    }
}
