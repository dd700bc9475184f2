// src/config/region.rs

use std::env;

use anyhow::Context;

/// Per-deployment region data (the city this instance serves).
///
/// Loaded once at startup and handed to the services that need it, so user
/// creation and subscription creation never read ambient configuration.
#[derive(Debug, Clone)]
pub struct RegionConfig {
    /// Stable key stored on users and subscriptions, e.g. `austin`.
    pub key: String,
    /// Display name used in customer-facing copy.
    pub name: String,
    /// IANA timezone assigned to new users.
    pub timezone: String,
    /// Free trial length for new subscriptions. Zero disables trials.
    pub trial_days: i64,
}

impl RegionConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let key = env::var("REGION_KEY").unwrap_or_else(|_| "austin".to_string());
        let name = env::var("REGION_NAME").unwrap_or_else(|_| "Austin".to_string());
        let timezone =
            env::var("REGION_TIMEZONE").unwrap_or_else(|_| "America/Chicago".to_string());
        let trial_days = match env::var("TRIAL_DAYS") {
            Ok(raw) => raw
                .parse::<i64>()
                .with_context(|| format!("TRIAL_DAYS must be an integer, got '{}'", raw))?,
            Err(_) => 0,
        };

        if trial_days < 0 {
            anyhow::bail!("TRIAL_DAYS must not be negative");
        }

        Ok(Self {
            key,
            name,
            timezone,
            trial_days,
        })
    }
}
