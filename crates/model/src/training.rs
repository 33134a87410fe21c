use bson::oid::ObjectId;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    day::Day, decimal::Decimal, template::TrainingTemplate, training_type::TrainingType,
};

/// One concrete, dated occurrence of a training. Capacity, price and the
/// cancellation threshold are snapshotted from the training type at
/// generation time, so later type edits do not rewrite history.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Training {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub training_type_id: ObjectId,
    #[serde(default)]
    pub template_id: Option<ObjectId>,
    pub name: String,
    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub start_at: DateTime<Utc>,
    pub capacity: u32,
    pub price: Decimal,
    #[serde(default)]
    pub safe_cancellation_hours: Option<u32>,
    #[serde(default)]
    pub students: Vec<Enrollment>,
    /// Set exactly once by settlement. Never cleared.
    #[serde(default)]
    pub processed_at: Option<DateTime<Utc>>,
    /// Cancellation is terminal.
    #[serde(default)]
    pub cancelled_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub cancellation_reason: Option<String>,
}

impl Training {
    pub fn from_template(
        template: &TrainingTemplate,
        training_type: &TrainingType,
        start_at: DateTime<Utc>,
    ) -> Training {
        Training {
            id: ObjectId::new(),
            training_type_id: training_type.id,
            template_id: Some(template.id),
            name: training_type.name.clone(),
            start_at,
            capacity: training_type.capacity,
            price: training_type.price,
            safe_cancellation_hours: training_type.safe_cancellation_hours,
            students: Vec::new(),
            processed_at: None,
            cancelled_at: None,
            cancellation_reason: None,
        }
    }

    pub fn day(&self) -> Day {
        Day::from(self.start_at)
    }

    pub fn is_processed(&self) -> bool {
        self.processed_at.is_some()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled_at.is_some()
    }

    pub fn is_full(&self) -> bool {
        self.students.len() as u32 >= self.capacity
    }

    pub fn is_free(&self) -> bool {
        !self.price.is_positive()
    }

    pub fn enrollment(&self, student_id: ObjectId) -> Option<&Enrollment> {
        self.students.iter().find(|e| e.student_id == student_id)
    }

    /// Enrolls a student if there is a free slot and no duplicate entry.
    pub fn enroll(&mut self, student_id: ObjectId) -> bool {
        if self.is_full() || self.enrollment(student_id).is_some() {
            return false;
        }
        self.students.push(Enrollment::new(student_id));
        true
    }

    /// SAFE iff the notice arrives at least the threshold ahead of start.
    pub fn cancellation_kind(&self, now: DateTime<Utc>, default_hours: u32) -> CancellationKind {
        let hours = self.safe_cancellation_hours.unwrap_or(default_hours);
        if now + Duration::hours(hours as i64) <= self.start_at {
            CancellationKind::Safe
        } else {
            CancellationKind::Penalty
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancellationKind {
    Safe,
    Penalty,
}

/// A student's participation in one training, with its financial state.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Enrollment {
    pub student_id: ObjectId,
    pub status: AttendanceStatus,
    #[serde(default)]
    pub marked_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub cancelled_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub cancellation_reason: Option<String>,
    /// Subscription a session was deducted from, while the deduction is live.
    #[serde(default)]
    pub subscription_id: Option<ObjectId>,
    #[serde(default)]
    pub session_deducted: bool,
    #[serde(default = "default_requires_payment")]
    pub requires_payment: bool,
}

fn default_requires_payment() -> bool {
    true
}

impl Enrollment {
    pub fn new(student_id: ObjectId) -> Enrollment {
        Enrollment {
            student_id,
            status: AttendanceStatus::Registered,
            marked_at: None,
            cancelled_at: None,
            cancellation_reason: None,
            subscription_id: None,
            session_deducted: false,
            requires_payment: true,
        }
    }

    /// Records that a session was deducted from `subscription_id`. Returns
    /// false when a deduction is already live, so calling twice without an
    /// intervening return changes nothing.
    pub fn mark_deducted(&mut self, subscription_id: ObjectId) -> bool {
        if self.session_deducted {
            return false;
        }
        self.session_deducted = true;
        self.subscription_id = Some(subscription_id);
        true
    }

    /// Reverses a live deduction, returning the subscription it came from.
    pub fn clear_deducted(&mut self) -> Option<ObjectId> {
        if !self.session_deducted {
            return None;
        }
        self.session_deducted = false;
        self.subscription_id.take()
    }

    pub fn mark_present(&mut self, now: DateTime<Utc>) -> bool {
        if self.status != AttendanceStatus::Registered {
            return false;
        }
        self.status = AttendanceStatus::Present;
        self.marked_at = Some(now);
        true
    }

    /// No-show. Attendance-wise absent; the financial penalty is applied by
    /// the cancellation engine.
    pub fn mark_absent(&mut self, now: DateTime<Utc>) {
        self.status = AttendanceStatus::Absent;
        self.marked_at = Some(now);
        self.requires_payment = true;
    }

    pub fn cancel(
        &mut self,
        status: AttendanceStatus,
        now: DateTime<Utc>,
        reason: Option<String>,
    ) {
        self.status = status;
        self.cancelled_at = Some(now);
        self.cancellation_reason = reason;
        self.requires_payment = status != AttendanceStatus::CancelledSafe;
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum AttendanceStatus {
    Registered,
    Present,
    CancelledSafe,
    CancelledPenalty,
    Absent,
}

impl AttendanceStatus {
    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            AttendanceStatus::CancelledSafe | AttendanceStatus::CancelledPenalty
        )
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone as _;

    use super::*;

    fn training(safe_hours: Option<u32>) -> Training {
        let training_type = TrainingType::new(
            "Boxing".to_string(),
            10,
            Decimal::int(20),
            safe_hours,
        );
        let template = TrainingTemplate::new(
            training_type.id,
            1,
            chrono::NaiveTime::from_hms_opt(18, 0, 0).unwrap(),
        );
        let start_at = Utc.with_ymd_and_hms(2026, 8, 10, 18, 0, 0).unwrap();
        Training::from_template(&template, &training_type, start_at)
    }

    #[test]
    fn test_enroll_respects_capacity() {
        let mut training = training(None);
        training.capacity = 2;
        assert!(training.enroll(ObjectId::new()));
        assert!(training.enroll(ObjectId::new()));
        assert!(!training.enroll(ObjectId::new()));
        assert_eq!(2, training.students.len());
    }

    #[test]
    fn test_enroll_rejects_duplicates() {
        let mut training = training(None);
        let student = ObjectId::new();
        assert!(training.enroll(student));
        assert!(!training.enroll(student));
        assert_eq!(1, training.students.len());
    }

    #[test]
    fn test_cancellation_kind_threshold() {
        let training = training(Some(12));
        let start = training.start_at;
        assert_eq!(
            CancellationKind::Safe,
            training.cancellation_kind(start - Duration::hours(13), 24)
        );
        assert_eq!(
            CancellationKind::Safe,
            training.cancellation_kind(start - Duration::hours(12), 24)
        );
        assert_eq!(
            CancellationKind::Penalty,
            training.cancellation_kind(start - Duration::hours(11), 24)
        );
    }

    #[test]
    fn test_cancellation_kind_falls_back_to_default() {
        let training = training(None);
        let start = training.start_at;
        assert_eq!(
            CancellationKind::Penalty,
            training.cancellation_kind(start - Duration::hours(13), 24)
        );
        assert_eq!(
            CancellationKind::Safe,
            training.cancellation_kind(start - Duration::hours(25), 24)
        );
    }

    #[test]
    fn test_deduction_flag_is_idempotent() {
        let mut enrollment = Enrollment::new(ObjectId::new());
        let subscription = ObjectId::new();
        assert!(enrollment.mark_deducted(subscription));
        assert!(!enrollment.mark_deducted(subscription));
        assert_eq!(Some(subscription), enrollment.subscription_id);

        assert_eq!(Some(subscription), enrollment.clear_deducted());
        assert_eq!(None, enrollment.clear_deducted());
        assert!(enrollment.mark_deducted(subscription));
    }

    #[test]
    fn test_generation_enrolls_earliest_prefix() {
        use chrono::NaiveDate;

        let mut template = TrainingTemplate::new(
            ObjectId::new(),
            1,
            chrono::NaiveTime::from_hms_opt(18, 0, 0).unwrap(),
        );
        for day in 1..=12 {
            template.students.push(crate::template::TemplateStudent {
                student_id: ObjectId::new(),
                start_date: NaiveDate::from_ymd_opt(2026, 7, day).unwrap(),
                is_frozen: false,
            });
        }
        let training_date = NaiveDate::from_ymd_opt(2026, 8, 10).unwrap();

        let mut training = training(None);
        training.capacity = 10;
        let mut skipped = 0;
        for student in template.eligible_students(training_date) {
            if !training.enroll(student.student_id) {
                skipped += 1;
            }
        }

        assert_eq!(10, training.students.len());
        assert_eq!(2, skipped);
        // Exactly the ten earliest joiners got a slot.
        let expected: Vec<_> = template
            .eligible_students(training_date)
            .iter()
            .take(10)
            .map(|s| s.student_id)
            .collect();
        let enrolled: Vec<_> = training.students.iter().map(|e| e.student_id).collect();
        assert_eq!(expected, enrolled);
    }

    #[test]
    fn test_deducting_twice_changes_sessions_once() {
        use crate::subscription::{StudentSubscription, Subscription};

        let product = Subscription::new("4 sessions".to_string(), 4, Decimal::int(80), 30);
        let mut sub = StudentSubscription::new(
            ObjectId::new(),
            &product,
            chrono::NaiveDate::from_ymd_opt(2026, 8, 1).unwrap(),
            0,
            false,
        );
        let mut enrollment = Enrollment::new(sub.student_id);

        for _ in 0..2 {
            if enrollment.mark_deducted(sub.id) {
                sub.deduct_session().unwrap();
            }
        }
        assert_eq!(3, sub.sessions_left);

        if enrollment.clear_deducted().is_some() {
            sub.return_session();
        }
        assert_eq!(4, sub.sessions_left);
    }

    #[test]
    fn test_mark_present_only_from_registered() {
        let now = Utc::now();
        let mut enrollment = Enrollment::new(ObjectId::new());
        assert!(enrollment.mark_present(now));
        assert_eq!(AttendanceStatus::Present, enrollment.status);
        assert!(!enrollment.mark_present(now));

        let mut cancelled = Enrollment::new(ObjectId::new());
        cancelled.cancel(AttendanceStatus::CancelledSafe, now, None);
        assert!(!cancelled.mark_present(now));
    }

    #[test]
    fn test_cancel_sets_requires_payment() {
        let now = Utc::now();
        let mut safe = Enrollment::new(ObjectId::new());
        safe.cancel(AttendanceStatus::CancelledSafe, now, Some("sick".to_string()));
        assert!(!safe.requires_payment);
        assert!(safe.status.is_cancelled());

        let mut late = Enrollment::new(ObjectId::new());
        late.cancel(AttendanceStatus::CancelledPenalty, now, None);
        assert!(late.requires_payment);
        assert!(late.status.is_cancelled());
    }
}
