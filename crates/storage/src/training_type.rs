use std::sync::Arc;

use bson::{doc, oid::ObjectId};
use eyre::Error;
use model::{session::Session, training_type::TrainingType};
use mongodb::Collection;

use crate::session::Db;

const COLLECTION: &str = "training_types";

#[derive(Clone)]
pub struct TrainingTypeStore {
    collection: Arc<Collection<TrainingType>>,
}

impl TrainingTypeStore {
    pub(crate) fn new(db: &Db) -> Self {
        TrainingTypeStore {
            collection: Arc::new(db.collection(COLLECTION)),
        }
    }

    pub async fn insert(
        &self,
        session: &mut Session,
        training_type: TrainingType,
    ) -> Result<(), Error> {
        self.collection
            .insert_one(training_type)
            .session(&mut **session)
            .await?;
        Ok(())
    }

    pub async fn get(
        &self,
        session: &mut Session,
        id: ObjectId,
    ) -> Result<Option<TrainingType>, Error> {
        Ok(self
            .collection
            .find_one(doc! { "_id": id })
            .session(&mut **session)
            .await?)
    }
}
