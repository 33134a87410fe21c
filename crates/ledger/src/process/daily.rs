use chrono::Utc;
use eyre::Result;
use log::info;
use model::{
    day::Day,
    process::{ProcessKind, ProcessRun},
    session::Session,
};

use crate::Ledger;

/// Daily operations: finalize today's attendance, then settle tomorrow's
/// trainings. Both steps are idempotent, so re-running within the same day
/// changes nothing.
pub struct DailyProcess {
    ledger: Ledger,
}

impl DailyProcess {
    pub fn new(ledger: Ledger) -> DailyProcess {
        DailyProcess { ledger }
    }

    pub async fn run(&self, session: &mut Session) -> Result<ProcessRun> {
        let today = Day::today();
        let tomorrow = today.next();
        info!("Starting daily operations for {}", today.date());
        let mut run = ProcessRun::start(
            ProcessKind::DailyOperations,
            session.actor(),
            today.date(),
            tomorrow.date(),
            Utc::now(),
        );

        let marked = self.ledger.calendar.finalize_attendance(session, today).await?;
        run.counters.students_marked_present = marked;

        let report = self.ledger.settlement.settle_day(session, tomorrow).await?;
        run.counters.trainings_processed = report.trainings_processed;
        run.counters.sessions_deducted = report.totals.sessions_deducted;
        run.counters.invoices_created = report.totals.invoices_created;
        run.counters.invoices_paid = report.totals.invoices_paid;
        run.counters.failed_trainings = report.failed.len() as u32;
        run.errors = report.failed;

        run.finish(Utc::now());
        self.ledger.history.store_run(session, &run).await?;
        info!(
            "Daily operations done: {} present, {} trainings settled, {} failed",
            run.counters.students_marked_present,
            run.counters.trainings_processed,
            run.counters.failed_trainings
        );
        Ok(run)
    }
}
