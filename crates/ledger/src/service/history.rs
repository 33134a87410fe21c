use chrono::{DateTime, Utc};
use eyre::{Error, Result};
use model::{process::ProcessRun, session::Session};
use storage::process::ProcessRunStore;

/// Audit trail of automated runs, one record per invocation.
#[derive(Clone)]
pub struct History {
    store: ProcessRunStore,
}

impl History {
    pub fn new(store: ProcessRunStore) -> Self {
        History { store }
    }

    pub async fn store_run(&self, session: &mut Session, run: &ProcessRun) -> Result<(), Error> {
        self.store.store(session, run).await
    }

    pub async fn find_range(
        &self,
        session: &mut Session,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<Vec<ProcessRun>> {
        self.store.find_range(session, from, to).await
    }
}
