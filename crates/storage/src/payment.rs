use std::sync::Arc;

use bson::{doc, oid::ObjectId, to_bson};
use chrono::{DateTime, Utc};
use eyre::Error;
use model::{payment::Payment, session::Session};
use mongodb::Collection;

use crate::session::Db;

const COLLECTION: &str = "payments";

#[derive(Clone)]
pub struct PaymentStore {
    collection: Arc<Collection<Payment>>,
}

impl PaymentStore {
    pub(crate) fn new(db: &Db) -> Self {
        PaymentStore {
            collection: Arc::new(db.collection(COLLECTION)),
        }
    }

    pub async fn insert(&self, session: &mut Session, payment: &Payment) -> Result<(), Error> {
        self.collection
            .insert_one(payment)
            .session(&mut **session)
            .await?;
        Ok(())
    }

    pub async fn get(
        &self,
        session: &mut Session,
        id: ObjectId,
    ) -> Result<Option<Payment>, Error> {
        Ok(self
            .collection
            .find_one(doc! { "_id": id })
            .session(&mut **session)
            .await?)
    }

    pub async fn set_cancelled(
        &self,
        session: &mut Session,
        id: ObjectId,
        cancelled_by: ObjectId,
        at: DateTime<Utc>,
        reason: Option<&str>,
    ) -> Result<bool, Error> {
        let result = self
            .collection
            .update_one(
                doc! { "_id": id, "cancelled_at": bson::Bson::Null },
                doc! { "$set": {
                    "cancelled_at": to_bson(&at)?,
                    "cancelled_by": cancelled_by,
                    "cancellation_reason": to_bson(&reason)?,
                } },
            )
            .session(&mut **session)
            .await?;
        Ok(result.modified_count == 1)
    }
}
