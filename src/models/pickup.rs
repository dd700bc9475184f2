// src/models/pickup.rs

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::common::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "pickup_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PickupStatus {
    Scheduled,
    ReminderSent,
    PickedUp,
    Processing,
    Ready,
    OutForDelivery,
    Delivered,
    Skipped,
    Missed,
}

impl PickupStatus {
    pub const ALL: [PickupStatus; 9] = [
        PickupStatus::Scheduled,
        PickupStatus::ReminderSent,
        PickupStatus::PickedUp,
        PickupStatus::Processing,
        PickupStatus::Ready,
        PickupStatus::OutForDelivery,
        PickupStatus::Delivered,
        PickupStatus::Skipped,
        PickupStatus::Missed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PickupStatus::Scheduled => "scheduled",
            PickupStatus::ReminderSent => "reminder_sent",
            PickupStatus::PickedUp => "picked_up",
            PickupStatus::Processing => "processing",
            PickupStatus::Ready => "ready",
            PickupStatus::OutForDelivery => "out_for_delivery",
            PickupStatus::Delivered => "delivered",
            PickupStatus::Skipped => "skipped",
            PickupStatus::Missed => "missed",
        }
    }

    // Position on the main track. Skipped and missed are side branches.
    fn rank(&self) -> Option<u8> {
        match self {
            PickupStatus::Scheduled => Some(0),
            PickupStatus::ReminderSent => Some(1),
            PickupStatus::PickedUp => Some(2),
            PickupStatus::Processing => Some(3),
            PickupStatus::Ready => Some(4),
            PickupStatus::OutForDelivery => Some(5),
            PickupStatus::Delivered => Some(6),
            PickupStatus::Skipped | PickupStatus::Missed => None,
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(
            self,
            PickupStatus::Delivered | PickupStatus::Skipped | PickupStatus::Missed
        )
    }

    pub fn is_in_progress(&self) -> bool {
        matches!(
            self,
            PickupStatus::PickedUp
                | PickupStatus::Processing
                | PickupStatus::Ready
                | PickupStatus::OutForDelivery
        )
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, PickupStatus::Scheduled | PickupStatus::ReminderSent)
    }

    /// Forward-only along the main track; skipped/missed only while pending.
    pub fn can_transition_to(&self, to: PickupStatus) -> bool {
        match (self.rank(), to.rank()) {
            (Some(from), Some(next)) => next > from,
            (Some(_), None) => self.is_pending(),
            (None, _) => false,
        }
    }
}

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Pickup {
    #[serde(skip_serializing)]
    #[schema(ignore)]
    pub id: i64,

    #[serde(rename = "id")]
    pub uuid: Uuid,

    #[serde(skip_serializing)]
    #[schema(ignore)]
    pub subscription_id: i64,

    #[serde(skip_serializing)]
    #[schema(ignore)]
    pub address_id: i64,

    #[schema(value_type = String, format = Date, example = "2026-10-19")]
    pub scheduled_date: NaiveDate,

    pub status: PickupStatus,

    #[schema(example = 2)]
    pub bags_expected: i32,
    pub bags_collected: Option<i32>,

    // One timestamp per lifecycle step
    pub reminder_sent_at: Option<DateTime<Utc>>,
    pub picked_up_at: Option<DateTime<Utc>>,
    pub processing_started_at: Option<DateTime<Utc>>,
    pub ready_at: Option<DateTime<Utc>>,
    pub out_for_delivery_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub skipped_at: Option<DateTime<Utc>>,

    pub skip_reason: Option<String>,
    pub driver_notes: Option<String>,
    pub delivery_photo_path: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Pickup {
    pub fn is_complete(&self) -> bool {
        self.status.is_complete()
    }

    /// Moves to `to` and stamps the matching timestamp. A timestamp that is
    /// already set is left untouched.
    pub fn transition_to(&mut self, to: PickupStatus, now: DateTime<Utc>) -> Result<(), AppError> {
        if !self.status.can_transition_to(to) {
            return Err(AppError::IllegalTransition {
                entity: "pickup",
                from: self.status.as_str(),
                to: to.as_str(),
            });
        }

        let stamp = match to {
            PickupStatus::ReminderSent => Some(&mut self.reminder_sent_at),
            PickupStatus::PickedUp => Some(&mut self.picked_up_at),
            PickupStatus::Processing => Some(&mut self.processing_started_at),
            PickupStatus::Ready => Some(&mut self.ready_at),
            PickupStatus::OutForDelivery => Some(&mut self.out_for_delivery_at),
            PickupStatus::Delivered => Some(&mut self.delivered_at),
            PickupStatus::Skipped => Some(&mut self.skipped_at),
            PickupStatus::Scheduled | PickupStatus::Missed => None,
        };
        if let Some(slot) = stamp {
            if slot.is_none() {
                *slot = Some(now);
            }
        }

        self.status = to;
        Ok(())
    }

    pub fn skip(&mut self, reason: Option<String>, now: DateTime<Utc>) -> Result<(), AppError> {
        self.transition_to(PickupStatus::Skipped, now)?;
        self.skip_reason = reason;
        Ok(())
    }
}

/// One row of a driver's route for the day.
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PickupStop {
    pub pickup_id: Uuid,
    pub status: PickupStatus,
    pub bags_expected: i32,
    pub customer_name: String,
    #[schema(example = "(512) 555-0199")]
    pub customer_phone: Option<String>,
    pub line1: String,
    pub line2: Option<String>,
    pub city: String,
    pub postal_code: String,
    pub instructions: Option<String>,
}

#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SkipPickupPayload {
    #[validate(length(max = 200))]
    #[schema(example = "Out of town")]
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePickupStatusPayload {
    pub status: PickupStatus,

    #[validate(range(min = 0, max = 20))]
    pub bags_collected: Option<i32>,

    #[validate(length(max = 1000))]
    pub driver_notes: Option<String>,

    pub delivery_photo_path: Option<String>,
}
