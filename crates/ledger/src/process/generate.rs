use chrono::{Duration, Utc};
use eyre::Result;
use model::{
    process::{ProcessKind, ProcessRun},
    session::Session,
};

use crate::Ledger;

/// Weekly generation of concrete trainings from the recurring templates.
pub struct GenerateProcess {
    ledger: Ledger,
}

impl GenerateProcess {
    pub fn new(ledger: Ledger) -> GenerateProcess {
        GenerateProcess { ledger }
    }

    pub async fn run(&self, session: &mut Session) -> Result<ProcessRun> {
        let generation = self.ledger.calendar.generate_next_week(session).await?;

        let mut run = ProcessRun::start(
            ProcessKind::GenerateWeek,
            session.actor(),
            generation.monday,
            generation.monday + Duration::days(6),
            Utc::now(),
        );
        run.counters.trainings_created = generation.created.len() as u32;
        run.counters.students_enrolled = generation.students_enrolled;
        run.counters.students_skipped = generation.students_skipped;
        run.finish(Utc::now());
        self.ledger.history.store_run(session, &run).await?;
        Ok(run)
    }
}
