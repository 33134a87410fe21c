use std::sync::Arc;

use bson::doc;
use chrono::{DateTime, Utc};
use eyre::Error;
use model::{process::ProcessRun, session::Session};
use mongodb::{Collection, IndexModel};

use crate::session::Db;

const COLLECTION: &str = "process_runs";

#[derive(Clone)]
pub struct ProcessRunStore {
    collection: Arc<Collection<ProcessRun>>,
}

impl ProcessRunStore {
    pub(crate) async fn new(db: &Db) -> Result<Self, Error> {
        let collection: Collection<ProcessRun> = db.collection(COLLECTION);
        collection
            .create_index(IndexModel::builder().keys(doc! { "started_at": -1 }).build())
            .await?;
        Ok(ProcessRunStore {
            collection: Arc::new(collection),
        })
    }

    pub async fn store(&self, session: &mut Session, run: &ProcessRun) -> Result<(), Error> {
        self.collection
            .insert_one(run)
            .session(&mut **session)
            .await?;
        Ok(())
    }

    pub async fn find_range(
        &self,
        session: &mut Session,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<Vec<ProcessRun>, Error> {
        let mut range = doc! {};
        if let Some(from) = from {
            range.insert("$gte", bson::DateTime::from_chrono(from));
        }
        if let Some(to) = to {
            range.insert("$lt", bson::DateTime::from_chrono(to));
        }
        let filter = if range.is_empty() {
            doc! {}
        } else {
            doc! { "started_at": range }
        };

        let mut cursor = self
            .collection
            .find(filter)
            .sort(doc! { "started_at": -1 })
            .session(&mut **session)
            .await?;
        let mut runs = Vec::new();
        while let Some(run) = cursor.next(&mut *session).await {
            runs.push(run?);
        }
        Ok(runs)
    }
}
