use std::sync::Arc;

use bson::{doc, oid::ObjectId, to_bson};
use chrono::{DateTime, Utc};
use eyre::Error;
use model::{session::Session, training::Enrollment, training::Training};
use mongodb::{Collection, IndexModel};

use crate::session::Db;

const COLLECTION: &str = "trainings";

#[derive(Clone)]
pub struct TrainingStore {
    collection: Arc<Collection<Training>>,
}

impl TrainingStore {
    pub(crate) async fn new(db: &Db) -> Result<Self, Error> {
        let collection: Collection<Training> = db.collection(COLLECTION);
        collection
            .create_index(IndexModel::builder().keys(doc! { "start_at": 1 }).build())
            .await?;
        collection
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "template_id": 1, "start_at": 1 })
                    .build(),
            )
            .await?;
        Ok(TrainingStore {
            collection: Arc::new(collection),
        })
    }

    pub async fn insert(&self, session: &mut Session, training: &Training) -> Result<(), Error> {
        self.collection
            .insert_one(training)
            .session(&mut **session)
            .await?;
        Ok(())
    }

    pub async fn get(
        &self,
        session: &mut Session,
        id: ObjectId,
    ) -> Result<Option<Training>, Error> {
        Ok(self
            .collection
            .find_one(doc! { "_id": id })
            .session(&mut **session)
            .await?)
    }

    pub async fn find_in_range(
        &self,
        session: &mut Session,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Training>, Error> {
        self.find(session, range_filter(from, to)).await
    }

    pub async fn find_unprocessed_in_range(
        &self,
        session: &mut Session,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Training>, Error> {
        let mut filter = range_filter(from, to);
        filter.insert("processed_at", bson::Bson::Null);
        filter.insert("cancelled_at", bson::Bson::Null);
        self.find(session, filter).await
    }

    /// Uniqueness guard for generation: is there already a training for this
    /// template inside the window?
    pub async fn exists_for_template(
        &self,
        session: &mut Session,
        template_id: ObjectId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<bool, Error> {
        let mut filter = range_filter(from, to);
        filter.insert("template_id", template_id);
        Ok(self
            .collection
            .find_one(filter)
            .session(&mut **session)
            .await?
            .is_some())
    }

    /// Stamps the processed timestamp, but only once: the filter refuses a
    /// training that already carries one.
    pub async fn set_processed(
        &self,
        session: &mut Session,
        id: ObjectId,
        at: DateTime<Utc>,
    ) -> Result<bool, Error> {
        let result = self
            .collection
            .update_one(
                doc! { "_id": id, "processed_at": bson::Bson::Null },
                doc! { "$set": { "processed_at": to_bson(&at)? } },
            )
            .session(&mut **session)
            .await?;
        Ok(result.modified_count == 1)
    }

    pub async fn set_cancelled(
        &self,
        session: &mut Session,
        id: ObjectId,
        at: DateTime<Utc>,
        reason: &str,
    ) -> Result<bool, Error> {
        let result = self
            .collection
            .update_one(
                doc! { "_id": id, "cancelled_at": bson::Bson::Null },
                doc! { "$set": {
                    "cancelled_at": to_bson(&at)?,
                    "cancellation_reason": reason,
                } },
            )
            .session(&mut **session)
            .await?;
        Ok(result.modified_count == 1)
    }

    pub async fn push_enrollment(
        &self,
        session: &mut Session,
        id: ObjectId,
        enrollment: &Enrollment,
    ) -> Result<(), Error> {
        self.collection
            .update_one(
                doc! { "_id": id },
                doc! { "$push": { "students": to_bson(enrollment)? } },
            )
            .session(&mut **session)
            .await?;
        Ok(())
    }

    pub async fn update_enrollment(
        &self,
        session: &mut Session,
        id: ObjectId,
        enrollment: &Enrollment,
    ) -> Result<(), Error> {
        self.collection
            .update_one(
                doc! { "_id": id, "students.student_id": enrollment.student_id },
                doc! { "$set": { "students.$": to_bson(enrollment)? } },
            )
            .session(&mut **session)
            .await?;
        Ok(())
    }

    async fn find(
        &self,
        session: &mut Session,
        filter: bson::Document,
    ) -> Result<Vec<Training>, Error> {
        let mut cursor = self
            .collection
            .find(filter)
            .sort(doc! { "start_at": 1 })
            .session(&mut **session)
            .await?;
        let mut trainings = Vec::new();
        while let Some(training) = cursor.next(&mut *session).await {
            trainings.push(training?);
        }
        Ok(trainings)
    }
}

fn range_filter(from: DateTime<Utc>, to: DateTime<Utc>) -> bson::Document {
    doc! {
        "start_at": {
            "$gte": bson::DateTime::from_chrono(from),
            "$lt": bson::DateTime::from_chrono(to),
        }
    }
}
