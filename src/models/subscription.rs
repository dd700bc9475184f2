// src/models/subscription.rs

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, Timelike, Utc, Weekday};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::common::error::AppError;

/// Same-day pickups are still possible before this local hour.
pub const PICKUP_CUTOFF_HOUR: u32 = 8;
pub const MAX_PAUSE_WEEKS: i32 = 8;
pub const MAX_SKIPS_PER_PERIOD: i32 = 2;

// --- Enums ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "subscription_plan", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Plan {
    Light,
    Family,
    Grand,
}

impl Plan {
    pub fn bags_per_week(&self) -> i32 {
        match self {
            Plan::Light => 1,
            Plan::Family => 2,
            Plan::Grand => 3,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Plan::Light => "light",
            Plan::Family => "family",
            Plan::Grand => "grand",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "subscription_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Active,
    Paused,
    Cancelled,
    PastDue,
}

impl SubscriptionStatus {
    pub const ALL: [SubscriptionStatus; 4] = [
        SubscriptionStatus::Active,
        SubscriptionStatus::Paused,
        SubscriptionStatus::Cancelled,
        SubscriptionStatus::PastDue,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::Paused => "paused",
            SubscriptionStatus::Cancelled => "cancelled",
            SubscriptionStatus::PastDue => "past_due",
        }
    }

    /// Allowed status edges. `cancelled` is terminal.
    pub fn can_transition_to(&self, to: SubscriptionStatus) -> bool {
        use SubscriptionStatus::*;
        matches!(
            (self, to),
            (Active, Paused)
                | (Active, PastDue)
                | (Active, Cancelled)
                | (Paused, Active)
                | (Paused, Cancelled)
                | (PastDue, Active)
                | (PastDue, Cancelled)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "pickup_day", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PickupDay {
    Sunday,
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
}

impl PickupDay {
    pub fn weekday(&self) -> Weekday {
        match self {
            PickupDay::Sunday => Weekday::Sun,
            PickupDay::Monday => Weekday::Mon,
            PickupDay::Tuesday => Weekday::Tue,
            PickupDay::Wednesday => Weekday::Wed,
            PickupDay::Thursday => Weekday::Thu,
            PickupDay::Friday => Weekday::Fri,
            PickupDay::Saturday => Weekday::Sat,
        }
    }
}

/// Next calendar occurrence of `day` as seen from the wall-clock `now`.
///
/// When `now` already falls on that weekday the pickup is still today as long
/// as the clock is before [`PICKUP_CUTOFF_HOUR`]; from the cutoff on it moves
/// to the same weekday next week.
pub fn next_pickup_date(day: PickupDay, now: NaiveDateTime) -> NaiveDate {
    let today = now.date();
    let target = i64::from(day.weekday().num_days_from_sunday());
    let current = i64::from(today.weekday().num_days_from_sunday());
    let days_ahead = (target - current).rem_euclid(7);

    if days_ahead == 0 {
        if now.hour() < PICKUP_CUTOFF_HOUR {
            return today;
        }
        return today + Duration::days(7);
    }

    today + Duration::days(days_ahead)
}

// --- Structs ---

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    #[serde(skip_serializing)]
    #[schema(ignore)]
    pub id: i64,

    #[serde(rename = "id")]
    #[schema(example = "550e8400-e29b-41d4-a716-446655440000")]
    pub uuid: Uuid,

    #[serde(skip_serializing)]
    #[schema(ignore)]
    pub user_id: i64,

    #[serde(skip_serializing)]
    #[schema(ignore)]
    pub address_id: i64,

    #[schema(example = "austin")]
    pub region: String,

    pub plan: Plan,
    pub status: SubscriptionStatus,

    #[schema(example = 2)]
    pub bags_per_week: i32,

    pub pickup_day: PickupDay,

    // Billing window
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    pub trial_ends_at: Option<DateTime<Utc>>,

    // Pause metadata, set and cleared together
    pub paused_at: Option<DateTime<Utc>>,
    pub resume_at: Option<DateTime<Utc>>,
    pub pause_weeks: Option<i32>,

    // Cancellation
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancellation_reason: Option<String>,
    pub cancellation_feedback: Option<String>,
    pub cancel_at_period_end: bool,

    // Dunning
    pub dunning_started_at: Option<DateTime<Utc>>,
    pub dunning_emails_sent: i32,

    pub promo_code: Option<String>,
    pub skips_used_this_period: i32,

    #[serde(skip_serializing)]
    #[schema(ignore)]
    pub stripe_customer_id: Option<String>,

    #[serde(skip_serializing)]
    #[schema(ignore)]
    pub stripe_subscription_id: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    #[serde(skip_serializing)]
    #[schema(ignore)]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Subscription {
    pub fn is_active(&self) -> bool {
        self.status == SubscriptionStatus::Active
    }

    pub fn is_paused(&self) -> bool {
        self.status == SubscriptionStatus::Paused
    }

    pub fn is_cancelled(&self) -> bool {
        self.status == SubscriptionStatus::Cancelled
    }

    pub fn is_past_due(&self) -> bool {
        self.status == SubscriptionStatus::PastDue
    }

    pub fn on_trial(&self, now: DateTime<Utc>) -> bool {
        self.trial_ends_at.is_some_and(|ends_at| ends_at > now)
    }

    pub fn will_cancel_at_period_end(&self) -> bool {
        self.cancel_at_period_end
    }

    pub fn next_pickup_date(&self, now: NaiveDateTime) -> NaiveDate {
        next_pickup_date(self.pickup_day, now)
    }

    /// True when the status agrees with the pause, cancellation and dunning
    /// metadata.
    pub fn metadata_consistent(&self) -> bool {
        let pause_fields = [
            self.paused_at.is_some(),
            self.resume_at.is_some(),
            self.pause_weeks.is_some(),
        ];
        let pause_all_set = pause_fields.iter().all(|set| *set);
        let pause_all_clear = pause_fields.iter().all(|set| !*set);

        (pause_all_set || pause_all_clear)
            && pause_all_set == self.is_paused()
            && self.cancelled_at.is_some() == self.is_cancelled()
            && self.dunning_started_at.is_some() == self.is_past_due()
    }

    fn transition(&mut self, to: SubscriptionStatus) -> Result<(), AppError> {
        if !self.status.can_transition_to(to) {
            return Err(self.illegal(to));
        }
        self.status = to;
        Ok(())
    }

    fn illegal(&self, to: SubscriptionStatus) -> AppError {
        AppError::IllegalTransition {
            entity: "subscription",
            from: self.status.as_str(),
            to: to.as_str(),
        }
    }

    fn clear_pause(&mut self) {
        self.paused_at = None;
        self.resume_at = None;
        self.pause_weeks = None;
    }

    fn clear_dunning(&mut self) {
        self.dunning_started_at = None;
        self.dunning_emails_sent = 0;
    }

    pub fn pause(&mut self, weeks: i32, now: DateTime<Utc>) -> Result<(), AppError> {
        if !(1..=MAX_PAUSE_WEEKS).contains(&weeks) {
            return Err(AppError::InvalidInput(format!(
                "A pause must last between 1 and {} weeks",
                MAX_PAUSE_WEEKS
            )));
        }

        self.transition(SubscriptionStatus::Paused)?;
        self.paused_at = Some(now);
        self.resume_at = Some(now + Duration::weeks(i64::from(weeks)));
        self.pause_weeks = Some(weeks);
        Ok(())
    }

    pub fn resume(&mut self) -> Result<(), AppError> {
        // past_due -> active is a recovery, not a resume
        if !self.is_paused() {
            return Err(self.illegal(SubscriptionStatus::Active));
        }
        self.transition(SubscriptionStatus::Active)?;
        self.clear_pause();
        Ok(())
    }

    /// Cancels now, or flags the subscription to cancel when the current
    /// billing period rolls over.
    pub fn cancel(
        &mut self,
        at_period_end: bool,
        reason: Option<String>,
        feedback: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<(), AppError> {
        if at_period_end {
            if !self.status.can_transition_to(SubscriptionStatus::Cancelled) {
                return Err(self.illegal(SubscriptionStatus::Cancelled));
            }
            self.cancel_at_period_end = true;
        } else {
            self.transition(SubscriptionStatus::Cancelled)?;
            self.cancelled_at = Some(now);
            self.clear_pause();
            self.clear_dunning();
        }

        self.cancellation_reason = reason;
        self.cancellation_feedback = feedback;
        Ok(())
    }

    pub fn mark_past_due(&mut self, now: DateTime<Utc>) -> Result<(), AppError> {
        self.transition(SubscriptionStatus::PastDue)?;
        if self.dunning_started_at.is_none() {
            self.dunning_started_at = Some(now);
        }
        Ok(())
    }

    pub fn record_dunning_email(&mut self) -> Result<(), AppError> {
        if !self.is_past_due() {
            return Err(AppError::Conflict(format!(
                "Dunning emails only apply to past_due subscriptions (status is '{}')",
                self.status.as_str()
            )));
        }
        self.dunning_emails_sent += 1;
        Ok(())
    }

    /// Payment came through after dunning: back to active.
    pub fn recover(&mut self) -> Result<(), AppError> {
        if !self.is_past_due() {
            return Err(self.illegal(SubscriptionStatus::Active));
        }
        self.transition(SubscriptionStatus::Active)?;
        self.clear_dunning();
        Ok(())
    }

    pub fn change_plan(&mut self, plan: Plan) -> Result<(), AppError> {
        if self.is_cancelled() {
            return Err(AppError::Conflict(
                "A cancelled subscription cannot change plans".to_string(),
            ));
        }
        self.plan = plan;
        self.bags_per_week = plan.bags_per_week();
        Ok(())
    }

    pub fn record_skip(&mut self) -> Result<(), AppError> {
        if self.skips_used_this_period >= MAX_SKIPS_PER_PERIOD {
            return Err(AppError::SkipLimitReached(MAX_SKIPS_PER_PERIOD));
        }
        self.skips_used_this_period += 1;
        Ok(())
    }

    /// Rolls the billing window. A pending period-end cancellation completes
    /// here instead, leaving the old window in place.
    pub fn start_new_period(
        &mut self,
        period_start: DateTime<Utc>,
        period_end: DateTime<Utc>,
    ) -> Result<(), AppError> {
        if period_end <= period_start {
            return Err(AppError::InvalidInput(
                "period_end must be after period_start".to_string(),
            ));
        }
        if self.is_cancelled() {
            return Err(AppError::Conflict(
                "A cancelled subscription has no new billing period".to_string(),
            ));
        }

        if self.cancel_at_period_end {
            self.transition(SubscriptionStatus::Cancelled)?;
            self.cancelled_at = Some(period_start);
            self.clear_pause();
            self.clear_dunning();
            return Ok(());
        }

        self.period_start = period_start;
        self.period_end = period_end;
        self.skips_used_this_period = 0;
        Ok(())
    }
}

// --- Payloads ---

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateSubscriptionPayload {
    pub plan: Plan,
    pub pickup_day: PickupDay,

    /// Defaults to the user's default address.
    pub address_id: Option<Uuid>,

    #[validate(length(min = 1, max = 40, message = "Promo code is invalid."))]
    #[schema(example = "FIRSTWEEK")]
    pub promo_code: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PauseSubscriptionPayload {
    #[validate(range(min = 1, max = 8, message = "A pause lasts 1 to 8 weeks."))]
    #[schema(example = 2)]
    pub weeks: i32,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CancelSubscriptionPayload {
    /// Cancel when the current billing period ends instead of right away.
    #[serde(default = "default_at_period_end")]
    pub at_period_end: bool,

    #[validate(length(max = 200))]
    #[schema(example = "Moving away")]
    pub reason: Option<String>,

    #[validate(length(max = 2000))]
    pub feedback: Option<String>,
}

fn default_at_period_end() -> bool {
    true
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChangePlanPayload {
    pub plan: Plan,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RenewSubscriptionPayload {
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NextPickupResponse {
    pub pickup_day: PickupDay,
    #[schema(value_type = String, format = Date, example = "2026-10-19")]
    pub date: NaiveDate,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_subscription(status: SubscriptionStatus) -> Subscription {
        let start = Utc.with_ymd_and_hms(2026, 10, 1, 0, 0, 0).unwrap();
        Subscription {
            id: 1,
            uuid: Uuid::new_v4(),
            user_id: 10,
            address_id: 20,
            region: "austin".to_string(),
            plan: Plan::Family,
            status,
            bags_per_week: 2,
            pickup_day: PickupDay::Monday,
            period_start: start,
            period_end: Utc.with_ymd_and_hms(2026, 11, 1, 0, 0, 0).unwrap(),
            trial_ends_at: None,
            paused_at: None,
            resume_at: None,
            pause_weeks: None,
            cancelled_at: None,
            cancellation_reason: None,
            cancellation_feedback: None,
            cancel_at_period_end: false,
            dunning_started_at: None,
            dunning_emails_sent: 0,
            promo_code: None,
            skips_used_this_period: 0,
            stripe_customer_id: None,
            stripe_subscription_id: None,
            created_at: start,
            updated_at: start,
            deleted_at: None,
        }
    }

    fn local(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 18, 12, 0, 0).unwrap()
    }

    #[test]
    fn status_predicates_are_exclusive() {
        for status in SubscriptionStatus::ALL {
            let sub = sample_subscription(status);
            assert_eq!(sub.is_active(), status == SubscriptionStatus::Active);
            assert_eq!(sub.is_paused(), status == SubscriptionStatus::Paused);
            assert_eq!(sub.is_cancelled(), status == SubscriptionStatus::Cancelled);
            assert_eq!(sub.is_past_due(), status == SubscriptionStatus::PastDue);
        }
    }

    #[test]
    fn plan_sets_bags_per_week() {
        assert_eq!(Plan::Light.bags_per_week(), 1);
        assert_eq!(Plan::Family.bags_per_week(), 2);
        assert_eq!(Plan::Grand.bags_per_week(), 3);
    }

    #[test]
    fn trial_must_end_strictly_in_the_future() {
        let mut sub = sample_subscription(SubscriptionStatus::Active);
        assert!(!sub.on_trial(now()));

        sub.trial_ends_at = Some(now() + Duration::days(3));
        assert!(sub.on_trial(now()));

        sub.trial_ends_at = Some(now());
        assert!(!sub.on_trial(now()));
    }

    #[test]
    fn same_weekday_before_cutoff_is_today() {
        // 2026-10-19 is a Monday
        let monday_early = local(2026, 10, 19, 7, 59);
        assert_eq!(
            next_pickup_date(PickupDay::Monday, monday_early),
            NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()
        );
    }

    #[test]
    fn same_weekday_at_or_after_cutoff_is_next_week() {
        let monday_late = local(2026, 10, 19, 8, 1);
        assert_eq!(
            next_pickup_date(PickupDay::Monday, monday_late),
            NaiveDate::from_ymd_opt(2026, 10, 26).unwrap()
        );

        let monday_cutoff = local(2026, 10, 19, 8, 0);
        assert_eq!(
            next_pickup_date(PickupDay::Monday, monday_cutoff),
            NaiveDate::from_ymd_opt(2026, 10, 26).unwrap()
        );
    }

    #[test]
    fn other_weekdays_roll_forward_within_the_week() {
        // Sunday 2026-10-18 at 23:00
        let sunday = local(2026, 10, 18, 23, 0);
        assert_eq!(
            next_pickup_date(PickupDay::Monday, sunday),
            NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()
        );
        assert_eq!(
            next_pickup_date(PickupDay::Saturday, sunday),
            NaiveDate::from_ymd_opt(2026, 10, 24).unwrap()
        );

        // Tuesday morning looking for Monday wraps around
        let tuesday = local(2026, 10, 20, 6, 0);
        assert_eq!(
            next_pickup_date(PickupDay::Monday, tuesday),
            NaiveDate::from_ymd_opt(2026, 10, 26).unwrap()
        );
    }

    #[test]
    fn transition_table_matches_allowed_edges() {
        use SubscriptionStatus::*;
        let allowed = [
            (Active, Paused),
            (Active, PastDue),
            (Active, Cancelled),
            (Paused, Active),
            (Paused, Cancelled),
            (PastDue, Active),
            (PastDue, Cancelled),
        ];
        for from in SubscriptionStatus::ALL {
            for to in SubscriptionStatus::ALL {
                assert_eq!(
                    from.can_transition_to(to),
                    allowed.contains(&(from, to)),
                    "{} -> {}",
                    from.as_str(),
                    to.as_str()
                );
            }
        }
    }

    #[test]
    fn pause_and_resume_keep_metadata_in_step() {
        let mut sub = sample_subscription(SubscriptionStatus::Active);
        sub.pause(2, now()).unwrap();

        assert!(sub.is_paused());
        assert_eq!(sub.paused_at, Some(now()));
        assert_eq!(sub.resume_at, Some(now() + Duration::weeks(2)));
        assert_eq!(sub.pause_weeks, Some(2));
        assert!(sub.metadata_consistent());

        sub.resume().unwrap();
        assert!(sub.is_active());
        assert!(sub.paused_at.is_none() && sub.resume_at.is_none() && sub.pause_weeks.is_none());
        assert!(sub.metadata_consistent());
    }

    #[test]
    fn pause_rejects_out_of_range_weeks() {
        let mut sub = sample_subscription(SubscriptionStatus::Active);
        assert!(matches!(sub.pause(0, now()), Err(AppError::InvalidInput(_))));
        assert!(matches!(
            sub.pause(MAX_PAUSE_WEEKS + 1, now()),
            Err(AppError::InvalidInput(_))
        ));
        assert!(sub.is_active());
    }

    #[test]
    fn resume_requires_a_paused_subscription() {
        let mut sub = sample_subscription(SubscriptionStatus::PastDue);
        let err = sub.resume().unwrap_err();
        assert!(matches!(
            err,
            AppError::IllegalTransition { from: "past_due", to: "active", .. }
        ));
    }

    #[test]
    fn cancelled_is_terminal() {
        let mut sub = sample_subscription(SubscriptionStatus::Active);
        sub.cancel(false, Some("moving".to_string()), None, now()).unwrap();

        assert!(sub.is_cancelled());
        assert_eq!(sub.cancelled_at, Some(now()));
        assert_eq!(sub.cancellation_reason.as_deref(), Some("moving"));
        assert!(sub.metadata_consistent());

        assert!(sub.pause(1, now()).is_err());
        assert!(sub.mark_past_due(now()).is_err());
        assert!(sub.cancel(false, None, None, now()).is_err());
    }

    #[test]
    fn cancelling_a_paused_subscription_clears_pause_fields() {
        let mut sub = sample_subscription(SubscriptionStatus::Active);
        sub.pause(3, now()).unwrap();
        sub.cancel(false, None, None, now()).unwrap();
        assert!(sub.paused_at.is_none());
        assert!(sub.metadata_consistent());
    }

    #[test]
    fn period_end_cancellation_completes_on_rollover() {
        let mut sub = sample_subscription(SubscriptionStatus::Active);
        sub.cancel(true, Some("too expensive".to_string()), None, now())
            .unwrap();

        assert!(sub.is_active());
        assert!(sub.will_cancel_at_period_end());
        assert!(sub.cancelled_at.is_none());

        let old_end = sub.period_end;
        sub.start_new_period(old_end, old_end + Duration::days(30))
            .unwrap();

        assert!(sub.is_cancelled());
        assert_eq!(sub.cancelled_at, Some(old_end));
        assert_eq!(sub.period_end, old_end);
        assert!(sub.metadata_consistent());
    }

    #[test]
    fn new_period_resets_skips() {
        let mut sub = sample_subscription(SubscriptionStatus::Active);
        sub.record_skip().unwrap();
        sub.record_skip().unwrap();
        assert!(matches!(
            sub.record_skip(),
            Err(AppError::SkipLimitReached(MAX_SKIPS_PER_PERIOD))
        ));

        let end = sub.period_end;
        sub.start_new_period(end, end + Duration::days(30)).unwrap();
        assert_eq!(sub.skips_used_this_period, 0);
        assert_eq!(sub.period_start, end);
        sub.record_skip().unwrap();
    }

    #[test]
    fn new_period_must_move_forward() {
        let mut sub = sample_subscription(SubscriptionStatus::Active);
        let start = sub.period_start;
        assert!(matches!(
            sub.start_new_period(start, start),
            Err(AppError::InvalidInput(_))
        ));
    }

    #[test]
    fn dunning_cycle() {
        let mut sub = sample_subscription(SubscriptionStatus::Active);
        assert!(sub.record_dunning_email().is_err());

        sub.mark_past_due(now()).unwrap();
        sub.record_dunning_email().unwrap();
        sub.record_dunning_email().unwrap();
        assert_eq!(sub.dunning_emails_sent, 2);
        assert_eq!(sub.dunning_started_at, Some(now()));
        assert!(sub.metadata_consistent());

        sub.recover().unwrap();
        assert!(sub.is_active());
        assert_eq!(sub.dunning_emails_sent, 0);
        assert!(sub.dunning_started_at.is_none());
        assert!(sub.metadata_consistent());
    }

    #[test]
    fn plan_change_updates_bag_count() {
        let mut sub = sample_subscription(SubscriptionStatus::Paused);
        sub.change_plan(Plan::Grand).unwrap();
        assert_eq!(sub.plan, Plan::Grand);
        assert_eq!(sub.bags_per_week, 3);

        let mut cancelled = sample_subscription(SubscriptionStatus::Cancelled);
        assert!(matches!(
            cancelled.change_plan(Plan::Light),
            Err(AppError::Conflict(_))
        ));
    }

    #[test]
    fn inconsistent_metadata_is_detected() {
        let mut sub = sample_subscription(SubscriptionStatus::Active);
        assert!(sub.metadata_consistent());

        sub.paused_at = Some(now());
        assert!(!sub.metadata_consistent());
    }
}
