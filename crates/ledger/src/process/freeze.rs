use chrono::Utc;
use eyre::Result;
use log::info;
use model::{
    day::Day,
    process::{ProcessKind, ProcessRun},
    session::Session,
};

use crate::Ledger;

/// Scheduled clearing of expired subscription freeze windows.
pub struct FreezeProcess {
    ledger: Ledger,
}

impl FreezeProcess {
    pub fn new(ledger: Ledger) -> FreezeProcess {
        FreezeProcess { ledger }
    }

    pub async fn run(&self, session: &mut Session) -> Result<ProcessRun> {
        let today = Day::today().date();
        let unfrozen = self
            .ledger
            .subscriptions
            .auto_unfreeze_expired(session)
            .await?;
        info!("Auto-unfroze {} subscriptions", unfrozen.len());

        let mut run = ProcessRun::start(
            ProcessKind::AutoUnfreeze,
            session.actor(),
            today,
            today,
            Utc::now(),
        );
        run.counters.subscriptions_unfrozen = unfrozen.len() as u32;
        run.finish(Utc::now());
        self.ledger.history.store_run(session, &run).await?;
        Ok(run)
    }
}
