use bson::oid::ObjectId;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Audit record of one automated run, stored per invocation and queryable by
/// date range.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ProcessRun {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub process: ProcessKind,
    pub actor: ObjectId,
    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub finished_at: Option<DateTime<Utc>>,
    pub window_from: NaiveDate,
    pub window_to: NaiveDate,
    #[serde(default)]
    pub counters: RunCounters,
    #[serde(default)]
    pub errors: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum ProcessKind {
    GenerateWeek,
    DailyOperations,
    AutoUnfreeze,
}

#[derive(Debug, Default, Serialize, Deserialize, Clone, Copy)]
pub struct RunCounters {
    pub trainings_created: u32,
    pub students_enrolled: u32,
    pub students_skipped: u32,
    pub students_marked_present: u32,
    pub trainings_processed: u32,
    pub sessions_deducted: u32,
    pub invoices_created: u32,
    pub invoices_paid: u32,
    pub subscriptions_unfrozen: u32,
    pub failed_trainings: u32,
}

impl ProcessRun {
    pub fn start(
        process: ProcessKind,
        actor: ObjectId,
        window_from: NaiveDate,
        window_to: NaiveDate,
        now: DateTime<Utc>,
    ) -> ProcessRun {
        ProcessRun {
            id: ObjectId::new(),
            process,
            actor,
            started_at: now,
            finished_at: None,
            window_from,
            window_to,
            counters: RunCounters::default(),
            errors: Vec::new(),
        }
    }

    pub fn finish(&mut self, now: DateTime<Utc>) {
        self.finished_at = Some(now);
    }
}
