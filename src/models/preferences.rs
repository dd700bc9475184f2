// src/models/preferences.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "detergent", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Detergent {
    #[default]
    Standard,
    Hypoallergenic,
    FragranceFree,
    Eco,
}

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Preferences {
    #[serde(skip_serializing)]
    #[schema(ignore)]
    pub user_id: i64,

    pub detergent: Detergent,

    #[schema(example = "No fabric softener on the towels")]
    pub special_instructions: Option<String>,

    pub updated_at: Option<DateTime<Utc>>,
}

impl Preferences {
    /// What a user gets before they ever save preferences.
    pub fn defaults_for(user_id: i64) -> Self {
        Self {
            user_id,
            detergent: Detergent::default(),
            special_instructions: None,
            updated_at: None,
        }
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePreferencesPayload {
    pub detergent: Detergent,

    #[validate(length(max = 500, message = "Keep instructions under 500 characters."))]
    pub special_instructions: Option<String>,
}

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NotificationPreferences {
    #[serde(skip_serializing)]
    #[schema(ignore)]
    pub user_id: i64,

    pub email_enabled: bool,
    pub sms_enabled: bool,
    pub push_enabled: bool,

    pub updated_at: Option<DateTime<Utc>>,
}

impl NotificationPreferences {
    // Email on, everything else opt-in
    pub fn defaults_for(user_id: i64) -> Self {
        Self {
            user_id,
            email_enabled: true,
            sms_enabled: false,
            push_enabled: false,
            updated_at: None,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateNotificationPreferencesPayload {
    pub email_enabled: bool,
    pub sms_enabled: bool,
    pub push_enabled: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_column_defaults() {
        let prefs = Preferences::defaults_for(3);
        assert_eq!(prefs.detergent, Detergent::Standard);
        assert!(prefs.special_instructions.is_none());

        let notify = NotificationPreferences::defaults_for(3);
        assert!(notify.email_enabled);
        assert!(!notify.sms_enabled);
        assert!(!notify.push_enabled);
    }

    #[test]
    fn detergent_uses_snake_case_on_the_wire() {
        let parsed: UpdatePreferencesPayload =
            serde_json::from_str(r#"{"detergent":"fragrance_free"}"#).unwrap();
        assert_eq!(parsed.detergent, Detergent::FragranceFree);
        assert!(parsed.special_instructions.is_none());
    }
}
