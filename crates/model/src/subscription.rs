use bson::oid::ObjectId;
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::decimal::Decimal;

/// At most this many unused sessions survive into a renewed subscription.
pub const CARRY_OVER_CAP: u32 = 3;

/// Subscription product on sale.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Subscription {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub name: String,
    pub sessions: u32,
    pub price: Decimal,
    pub validity_days: u32,
    pub is_active: bool,
}

impl Subscription {
    pub fn new(name: String, sessions: u32, price: Decimal, validity_days: u32) -> Self {
        Subscription {
            id: ObjectId::new(),
            name,
            sessions,
            price,
            validity_days,
            is_active: true,
        }
    }
}

/// A subscription bought for one student: remaining sessions, validity and
/// freeze window.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct StudentSubscription {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub student_id: ObjectId,
    pub subscription_id: ObjectId,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub sessions_left: u32,
    #[serde(default)]
    pub transferred_sessions: u32,
    #[serde(default)]
    pub is_auto_renew: bool,
    #[serde(default)]
    pub freeze_start: Option<NaiveDate>,
    #[serde(default)]
    pub freeze_end: Option<NaiveDate>,
    /// Invoice of the renewal this subscription already triggered, if any.
    /// Guards against issuing a second renewal.
    #[serde(default)]
    pub auto_renewal_invoice_id: Option<ObjectId>,
}

impl StudentSubscription {
    pub fn new(
        student_id: ObjectId,
        product: &Subscription,
        start_date: NaiveDate,
        carried_over: u32,
        is_auto_renew: bool,
    ) -> Self {
        StudentSubscription {
            id: ObjectId::new(),
            student_id,
            subscription_id: product.id,
            start_date,
            end_date: start_date + Duration::days(product.validity_days as i64),
            sessions_left: product.sessions + carried_over,
            transferred_sessions: carried_over,
            is_auto_renew,
            freeze_start: None,
            freeze_end: None,
            auto_renewal_invoice_id: None,
        }
    }

    pub fn covers(&self, date: NaiveDate) -> bool {
        self.start_date <= date && date <= self.end_date
    }

    pub fn is_frozen_on(&self, date: NaiveDate) -> bool {
        match (self.freeze_start, self.freeze_end) {
            (Some(start), Some(end)) => start <= date && date <= end,
            _ => false,
        }
    }

    /// The freeze window has fully passed and should be cleared.
    pub fn freeze_expired(&self, today: NaiveDate) -> bool {
        matches!(self.freeze_end, Some(end) if end < today)
    }

    /// Eligible to cover a session on `date`: valid, not frozen, and either
    /// sessions remain or auto-renewal will replenish them.
    pub fn is_available_on(&self, date: NaiveDate) -> bool {
        self.covers(date)
            && !self.is_frozen_on(date)
            && (self.sessions_left > 0 || self.is_auto_renew)
    }

    pub fn deduct_session(&mut self) -> Result<(), SubscriptionStateError> {
        if self.sessions_left == 0 {
            return Err(SubscriptionStateError::NoSessionsLeft);
        }
        self.sessions_left -= 1;
        Ok(())
    }

    pub fn return_session(&mut self) {
        self.sessions_left += 1;
    }

    /// Ran out of sessions with auto-renewal on and no renewal issued yet.
    pub fn needs_renewal(&self) -> bool {
        self.sessions_left == 0 && self.is_auto_renew && self.auto_renewal_invoice_id.is_none()
    }

    pub fn carry_over(&self) -> u32 {
        self.sessions_left.min(CARRY_OVER_CAP)
    }

    /// Builds the follow-up subscription starting when this one ends.
    pub fn renewal(&self, product: &Subscription) -> StudentSubscription {
        StudentSubscription::new(
            self.student_id,
            product,
            self.end_date,
            self.carry_over(),
            true,
        )
    }

    pub fn freeze(
        &mut self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<(), SubscriptionStateError> {
        if self.freeze_start.is_some() || self.freeze_end.is_some() {
            return Err(SubscriptionStateError::AlreadyFrozen);
        }
        if end < start {
            return Err(SubscriptionStateError::InvalidFreezeWindow);
        }
        self.freeze_start = Some(start);
        self.freeze_end = Some(end);
        Ok(())
    }

    pub fn clear_freeze(&mut self) {
        self.freeze_start = None;
        self.freeze_end = None;
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SubscriptionStateError {
    #[error("No sessions left")]
    NoSessionsLeft,
    #[error("Subscription is already frozen")]
    AlreadyFrozen,
    #[error("Freeze window ends before it starts")]
    InvalidFreezeWindow,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn product() -> Subscription {
        Subscription::new("8 sessions".to_string(), 8, Decimal::int(120), 30)
    }

    fn subscription(sessions_left: u32, is_auto_renew: bool) -> StudentSubscription {
        let mut sub =
            StudentSubscription::new(ObjectId::new(), &product(), date(2026, 8, 1), 0, is_auto_renew);
        sub.sessions_left = sessions_left;
        sub
    }

    #[test]
    fn test_availability_window() {
        let sub = subscription(5, false);
        assert!(sub.is_available_on(date(2026, 8, 1)));
        assert!(sub.is_available_on(date(2026, 8, 31)));
        assert!(!sub.is_available_on(date(2026, 7, 31)));
        assert!(!sub.is_available_on(date(2026, 9, 1)));
    }

    #[test]
    fn test_availability_requires_sessions_or_auto_renew() {
        assert!(!subscription(0, false).is_available_on(date(2026, 8, 10)));
        assert!(subscription(0, true).is_available_on(date(2026, 8, 10)));
    }

    #[test]
    fn test_frozen_subscription_is_unavailable() {
        let mut sub = subscription(5, false);
        sub.freeze(date(2026, 8, 5), date(2026, 8, 15)).unwrap();
        assert!(!sub.is_available_on(date(2026, 8, 10)));
        assert!(sub.is_available_on(date(2026, 8, 16)));
        assert!(sub.is_available_on(date(2026, 8, 4)));
    }

    #[test]
    fn test_freeze_guards() {
        let mut sub = subscription(5, false);
        assert_eq!(
            Err(SubscriptionStateError::InvalidFreezeWindow),
            sub.freeze(date(2026, 8, 15), date(2026, 8, 5))
        );
        sub.freeze(date(2026, 8, 5), date(2026, 8, 15)).unwrap();
        assert_eq!(
            Err(SubscriptionStateError::AlreadyFrozen),
            sub.freeze(date(2026, 8, 20), date(2026, 8, 25))
        );
    }

    #[test]
    fn test_freeze_expiry() {
        let mut sub = subscription(5, false);
        sub.freeze(date(2026, 8, 5), date(2026, 8, 15)).unwrap();
        assert!(!sub.freeze_expired(date(2026, 8, 15)));
        assert!(sub.freeze_expired(date(2026, 8, 16)));
        sub.clear_freeze();
        assert!(!sub.freeze_expired(date(2026, 8, 16)));
    }

    #[test]
    fn test_deduct_and_return() {
        let mut sub = subscription(1, false);
        sub.deduct_session().unwrap();
        assert_eq!(0, sub.sessions_left);
        assert_eq!(
            Err(SubscriptionStateError::NoSessionsLeft),
            sub.deduct_session()
        );
        sub.return_session();
        assert_eq!(1, sub.sessions_left);
    }

    #[test]
    fn test_renewal_trigger_and_carry_over_cap() {
        let mut sub = subscription(0, true);
        assert!(sub.needs_renewal());
        sub.auto_renewal_invoice_id = Some(ObjectId::new());
        assert!(!sub.needs_renewal());

        let unused = subscription(5, true);
        assert_eq!(CARRY_OVER_CAP, unused.carry_over());
        let renewal = unused.renewal(&product());
        assert_eq!(unused.end_date, renewal.start_date);
        assert_eq!(8 + CARRY_OVER_CAP, renewal.sessions_left);
        assert_eq!(CARRY_OVER_CAP, renewal.transferred_sessions);
        assert!(renewal.is_auto_renew);
    }
}
