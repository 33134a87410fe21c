use chrono::{
    DateTime, Datelike as _, Duration, Local, NaiveDate, NaiveTime, TimeZone as _, Utc,
};

/// Calendar day in the school's local timezone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Day(NaiveDate);

impl Day {
    pub fn new(date: NaiveDate) -> Day {
        Day(date)
    }

    pub fn today() -> Day {
        Day(Local::now().date_naive())
    }

    pub fn date(&self) -> NaiveDate {
        self.0
    }

    pub fn next(&self) -> Day {
        Day(self.0 + Duration::days(1))
    }

    /// Monday of the week after this day's week.
    pub fn next_week_monday(&self) -> Day {
        let ahead = 7 - self.0.weekday().num_days_from_monday() as i64;
        Day(self.0 + Duration::days(ahead))
    }

    /// Start of the day, local midnight in UTC.
    pub fn start(&self) -> DateTime<Utc> {
        self.at(NaiveTime::MIN)
    }

    /// Start of the next day; `start()..end()` covers the whole day.
    pub fn end(&self) -> DateTime<Utc> {
        self.next().start()
    }

    pub fn at(&self, time: NaiveTime) -> DateTime<Utc> {
        match Local.from_local_datetime(&self.0.and_time(time)).earliest() {
            Some(date_time) => date_time.with_timezone(&Utc),
            // Skipped by a DST jump; fall back to the naive reading.
            None => Utc.from_utc_datetime(&self.0.and_time(time)),
        }
    }
}

impl From<NaiveDate> for Day {
    fn from(date: NaiveDate) -> Self {
        Day(date)
    }
}

impl From<DateTime<Utc>> for Day {
    fn from(date_time: DateTime<Utc>) -> Self {
        Day(date_time.with_timezone(&Local).date_naive())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_next_week_monday() {
        // 2026-08-03 is a Monday.
        assert_eq!(
            Day::new(date(2026, 8, 10)),
            Day::new(date(2026, 8, 3)).next_week_monday()
        );
        assert_eq!(
            Day::new(date(2026, 8, 10)),
            Day::new(date(2026, 8, 6)).next_week_monday()
        );
        assert_eq!(
            Day::new(date(2026, 8, 10)),
            Day::new(date(2026, 8, 9)).next_week_monday()
        );
    }

    #[test]
    fn test_day_window() {
        let day = Day::new(date(2026, 8, 6));
        assert!(day.start() < day.end());
        assert_eq!(Duration::days(1), day.end() - day.start());
    }
}
