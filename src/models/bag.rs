// src/models/bag.rs

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use sqlx::{types::Json, FromRow};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::common::error::AppError;

pub const QR_CODE_PREFIX: &str = "LAU-";
pub const QR_CODE_SUFFIX_LEN: usize = 6;
const QR_CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Draws a fresh `LAU-XXXXXX` code. Uniqueness is the bag table's job.
pub fn generate_qr_code<R: Rng>(rng: &mut R) -> String {
    let suffix: String = (0..QR_CODE_SUFFIX_LEN)
        .map(|_| char::from(QR_CODE_ALPHABET[rng.gen_range(0..QR_CODE_ALPHABET.len())]))
        .collect();
    format!("{}{}", QR_CODE_PREFIX, suffix)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "bag_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum BagStatus {
    WithCustomer,
    PickedUp,
    AtFacility,
    Washing,
    Drying,
    Folding,
    Ready,
    OutForDelivery,
    Delivered,
}

impl BagStatus {
    pub const ALL: [BagStatus; 9] = [
        BagStatus::WithCustomer,
        BagStatus::PickedUp,
        BagStatus::AtFacility,
        BagStatus::Washing,
        BagStatus::Drying,
        BagStatus::Folding,
        BagStatus::Ready,
        BagStatus::OutForDelivery,
        BagStatus::Delivered,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BagStatus::WithCustomer => "with_customer",
            BagStatus::PickedUp => "picked_up",
            BagStatus::AtFacility => "at_facility",
            BagStatus::Washing => "washing",
            BagStatus::Drying => "drying",
            BagStatus::Folding => "folding",
            BagStatus::Ready => "ready",
            BagStatus::OutForDelivery => "out_for_delivery",
            BagStatus::Delivered => "delivered",
        }
    }

    fn rank(&self) -> usize {
        Self::ALL.iter().position(|s| s == self).unwrap_or(0)
    }

    /// Forward-only, plus delivered -> with_customer when the bag goes back
    /// into rotation.
    pub fn can_transition_to(&self, to: BagStatus) -> bool {
        (*self == BagStatus::Delivered && to == BagStatus::WithCustomer) || to.rank() > self.rank()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BagScan {
    #[schema(example = "facility:wash-line-2")]
    pub location: String,
    #[schema(example = "driver@example.com")]
    pub scanned_by: String,
    pub scanned_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Bag {
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
    pub pickup_id: Option<i64>,

    #[schema(example = "LAU-7Q2K9D")]
    pub qr_code: String,

    pub status: BagStatus,

    #[schema(example = "Darks")]
    pub label: Option<String>,

    // Append-only scan history, oldest first
    #[schema(value_type = Vec<BagScan>)]
    pub scans: Json<Vec<BagScan>>,

    pub last_scanned_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Bag {
    pub fn is_with_customer(&self) -> bool {
        self.status == BagStatus::WithCustomer
    }

    pub fn is_in_transit(&self) -> bool {
        matches!(self.status, BagStatus::PickedUp | BagStatus::OutForDelivery)
    }

    pub fn is_being_processed(&self) -> bool {
        matches!(
            self.status,
            BagStatus::AtFacility | BagStatus::Washing | BagStatus::Drying | BagStatus::Folding
        )
    }

    pub fn is_ready(&self) -> bool {
        self.status == BagStatus::Ready
    }

    pub fn is_delivered(&self) -> bool {
        self.status == BagStatus::Delivered
    }

    /// Appends a scan and moves `last_scanned_at` to it. Repeated identical
    /// scans each get their own entry.
    pub fn record_scan(&mut self, location: &str, scanned_by: &str, at: DateTime<Utc>) {
        self.scans.0.push(BagScan {
            location: location.to_string(),
            scanned_by: scanned_by.to_string(),
            scanned_at: at,
        });
        self.last_scanned_at = Some(at);
    }

    pub fn transition_to(&mut self, to: BagStatus) -> Result<(), AppError> {
        if !self.status.can_transition_to(to) {
            return Err(AppError::IllegalTransition {
                entity: "bag",
                from: self.status.as_str(),
                to: to.as_str(),
            });
        }
        self.status = to;
        Ok(())
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ScanBagPayload {
    #[validate(length(equal = 10, message = "Unknown QR code format."))]
    #[schema(example = "LAU-7Q2K9D")]
    pub qr_code: String,

    #[validate(length(min = 1, max = 120, message = "required"))]
    #[schema(example = "facility:intake")]
    pub location: String,

    /// Optional status change recorded with the scan.
    pub status: Option<BagStatus>,

    /// Attaches the bag to this pickup.
    pub pickup_id: Option<Uuid>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateBagsPayload {
    #[validate(range(min = 1, max = 10))]
    #[schema(example = 1)]
    pub count: i32,

    #[validate(length(max = 60))]
    pub label: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use rand::{rngs::StdRng, SeedableRng};
    use std::collections::HashSet;

    fn sample_bag(status: BagStatus) -> Bag {
        let created = Utc.with_ymd_and_hms(2026, 10, 1, 8, 0, 0).unwrap();
        Bag {
            id: 1,
            uuid: Uuid::new_v4(),
            subscription_id: 1,
            pickup_id: None,
            qr_code: "LAU-ABC123".to_string(),
            status,
            label: None,
            scans: Json(Vec::new()),
            last_scanned_at: None,
            created_at: created,
            updated_at: created,
        }
    }

    #[test]
    fn qr_codes_have_the_expected_shape() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..500 {
            let code = generate_qr_code(&mut rng);
            let suffix = code.strip_prefix(QR_CODE_PREFIX).expect("prefix");
            assert_eq!(suffix.len(), QR_CODE_SUFFIX_LEN);
            assert!(suffix
                .chars()
                .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
        }
    }

    #[test]
    fn qr_code_space_rarely_collides() {
        let mut rng = StdRng::seed_from_u64(42);
        let codes: HashSet<String> = (0..2_000).map(|_| generate_qr_code(&mut rng)).collect();
        // 36^6 codes; a handful of collisions at most, which the insert retry absorbs
        assert!(codes.len() >= 1_995);
    }

    #[test]
    fn scans_are_kept_in_call_order() {
        let mut bag = sample_bag(BagStatus::WithCustomer);
        let start = Utc.with_ymd_and_hms(2026, 10, 19, 9, 0, 0).unwrap();

        for i in 0..5 {
            bag.record_scan(&format!("stop-{}", i), "driver@example.com", start + Duration::minutes(i));
        }

        assert_eq!(bag.scans.0.len(), 5);
        let locations: Vec<&str> = bag.scans.0.iter().map(|s| s.location.as_str()).collect();
        assert_eq!(locations, ["stop-0", "stop-1", "stop-2", "stop-3", "stop-4"]);
        assert_eq!(bag.last_scanned_at, Some(bag.scans.0[4].scanned_at));
    }

    #[test]
    fn identical_scans_are_not_merged() {
        let mut bag = sample_bag(BagStatus::AtFacility);
        let at = Utc.with_ymd_and_hms(2026, 10, 19, 9, 0, 0).unwrap();

        bag.record_scan("facility", "staff@example.com", at);
        bag.record_scan("facility", "staff@example.com", at);

        assert_eq!(bag.scans.0.len(), 2);
        assert_eq!(bag.scans.0[0], bag.scans.0[1]);
        assert_eq!(bag.last_scanned_at, Some(at));
    }

    #[test]
    fn processing_predicate_covers_facility_stages() {
        for status in BagStatus::ALL {
            let expected = matches!(
                status,
                BagStatus::AtFacility | BagStatus::Washing | BagStatus::Drying | BagStatus::Folding
            );
            assert_eq!(sample_bag(status).is_being_processed(), expected, "{}", status.as_str());
        }
        assert!(sample_bag(BagStatus::PickedUp).is_in_transit());
        assert!(sample_bag(BagStatus::OutForDelivery).is_in_transit());
        assert!(sample_bag(BagStatus::Ready).is_ready());
    }

    #[test]
    fn bags_move_forward_and_return_to_the_customer() {
        let mut bag = sample_bag(BagStatus::WithCustomer);
        for next in &BagStatus::ALL[1..] {
            bag.transition_to(*next).unwrap();
        }
        assert!(bag.is_delivered());

        bag.transition_to(BagStatus::WithCustomer).unwrap();
        assert!(bag.is_with_customer());
    }

    #[test]
    fn bags_cannot_go_backwards() {
        let mut bag = sample_bag(BagStatus::Drying);
        assert!(matches!(
            bag.transition_to(BagStatus::Washing),
            Err(AppError::IllegalTransition { entity: "bag", .. })
        ));
        assert!(!BagStatus::Ready.can_transition_to(BagStatus::WithCustomer));
        assert!(!BagStatus::Washing.can_transition_to(BagStatus::Washing));
    }
}
