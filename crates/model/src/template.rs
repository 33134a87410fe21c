use bson::oid::ObjectId;
use chrono::{Duration, NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

/// Recurring weekly training definition from which concrete trainings are
/// generated.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TrainingTemplate {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub training_type_id: ObjectId,
    /// 1 = Monday .. 7 = Sunday.
    pub day_number: u32,
    pub start_time: NaiveTime,
    pub is_active: bool,
    #[serde(default)]
    pub students: Vec<TemplateStudent>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TemplateStudent {
    pub student_id: ObjectId,
    pub start_date: NaiveDate,
    #[serde(default)]
    pub is_frozen: bool,
}

impl TrainingTemplate {
    pub fn new(
        training_type_id: ObjectId,
        day_number: u32,
        start_time: NaiveTime,
    ) -> TrainingTemplate {
        TrainingTemplate {
            id: ObjectId::new(),
            training_type_id,
            day_number,
            start_time,
            is_active: true,
            students: Vec::new(),
        }
    }

    /// Concrete date of this template within the week starting at `monday`.
    pub fn date_in_week(&self, monday: NaiveDate) -> NaiveDate {
        monday + Duration::days(self.day_number.saturating_sub(1) as i64)
    }

    /// Students eligible to attend on `date`: not frozen and already started.
    /// Earlier joiners come first; ties break on student id so the order is
    /// deterministic.
    pub fn eligible_students(&self, date: NaiveDate) -> Vec<&TemplateStudent> {
        let mut eligible: Vec<_> = self
            .students
            .iter()
            .filter(|student| !student.is_frozen && student.start_date <= date)
            .collect();
        eligible.sort_by_key(|student| (student.start_date, student.student_id));
        eligible
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn template_with(students: Vec<TemplateStudent>) -> TrainingTemplate {
        let mut template = TrainingTemplate::new(
            ObjectId::new(),
            3,
            NaiveTime::from_hms_opt(18, 30, 0).unwrap(),
        );
        template.students = students;
        template
    }

    fn student(start: NaiveDate, is_frozen: bool) -> TemplateStudent {
        TemplateStudent {
            student_id: ObjectId::new(),
            start_date: start,
            is_frozen,
        }
    }

    #[test]
    fn test_date_in_week() {
        let monday = date(2026, 8, 10);
        let template = template_with(vec![]);
        // day_number 3 is Wednesday.
        assert_eq!(date(2026, 8, 12), template.date_in_week(monday));
    }

    #[test]
    fn test_eligible_students_filter() {
        let training_date = date(2026, 8, 12);
        let started = student(date(2026, 8, 1), false);
        let frozen = student(date(2026, 8, 1), true);
        let not_started = student(date(2026, 8, 20), false);
        let template = template_with(vec![started.clone(), frozen, not_started]);

        let eligible = template.eligible_students(training_date);
        assert_eq!(1, eligible.len());
        assert_eq!(started.student_id, eligible[0].student_id);
    }

    #[test]
    fn test_eligible_students_priority_order() {
        let training_date = date(2026, 8, 12);
        let late = student(date(2026, 8, 5), false);
        let early = student(date(2026, 7, 1), false);
        let middle = student(date(2026, 7, 20), false);
        let template = template_with(vec![late.clone(), early.clone(), middle.clone()]);

        let eligible = template.eligible_students(training_date);
        let ids: Vec<_> = eligible.iter().map(|s| s.student_id).collect();
        assert_eq!(vec![early.student_id, middle.student_id, late.student_id], ids);
    }

    #[test]
    fn test_eligible_students_tie_break_is_deterministic() {
        let training_date = date(2026, 8, 12);
        let start = date(2026, 8, 1);
        let a = student(start, false);
        let b = student(start, false);
        let forward = template_with(vec![a.clone(), b.clone()]);
        let reversed = template_with(vec![b, a]);

        let forward_ids: Vec<_> = forward
            .eligible_students(training_date)
            .iter()
            .map(|s| s.student_id)
            .collect();
        let reversed_ids: Vec<_> = reversed
            .eligible_students(training_date)
            .iter()
            .map(|s| s.student_id)
            .collect();
        assert_eq!(forward_ids, reversed_ids);
    }
}
