use std::sync::Arc;

use bson::{doc, oid::ObjectId, to_bson};
use chrono::NaiveDate;
use eyre::Error;
use log::info;
use model::{
    session::Session,
    subscription::{StudentSubscription, Subscription},
};
use mongodb::{Collection, IndexModel};

use crate::session::Db;

const PRODUCTS: &str = "subscriptions";
const STUDENT_SUBSCRIPTIONS: &str = "student_subscriptions";

#[derive(Clone)]
pub struct SubscriptionsStore {
    collection: Arc<Collection<Subscription>>,
}

impl SubscriptionsStore {
    pub(crate) fn new(db: &Db) -> Self {
        SubscriptionsStore {
            collection: Arc::new(db.collection(PRODUCTS)),
        }
    }

    pub async fn insert(
        &self,
        session: &mut Session,
        subscription: Subscription,
    ) -> Result<(), Error> {
        info!("Inserting subscription: {:?}", subscription);
        self.collection
            .insert_one(subscription)
            .session(&mut **session)
            .await?;
        Ok(())
    }

    pub async fn get(
        &self,
        session: &mut Session,
        id: ObjectId,
    ) -> Result<Option<Subscription>, Error> {
        Ok(self
            .collection
            .find_one(doc! { "_id": id })
            .session(&mut **session)
            .await?)
    }
}

#[derive(Clone)]
pub struct StudentSubscriptionStore {
    collection: Arc<Collection<StudentSubscription>>,
}

impl StudentSubscriptionStore {
    pub(crate) async fn new(db: &Db) -> Result<Self, Error> {
        let collection: Collection<StudentSubscription> = db.collection(STUDENT_SUBSCRIPTIONS);
        collection
            .create_index(IndexModel::builder().keys(doc! { "student_id": 1 }).build())
            .await?;
        Ok(StudentSubscriptionStore {
            collection: Arc::new(collection),
        })
    }

    pub async fn insert(
        &self,
        session: &mut Session,
        subscription: &StudentSubscription,
    ) -> Result<(), Error> {
        self.collection
            .insert_one(subscription)
            .session(&mut **session)
            .await?;
        Ok(())
    }

    pub async fn get(
        &self,
        session: &mut Session,
        id: ObjectId,
    ) -> Result<Option<StudentSubscription>, Error> {
        Ok(self
            .collection
            .find_one(doc! { "_id": id })
            .session(&mut **session)
            .await?)
    }

    pub async fn find_by_student(
        &self,
        session: &mut Session,
        student_id: ObjectId,
    ) -> Result<Vec<StudentSubscription>, Error> {
        let mut cursor = self
            .collection
            .find(doc! { "student_id": student_id })
            .session(&mut **session)
            .await?;
        let mut subscriptions = Vec::new();
        while let Some(subscription) = cursor.next(&mut *session).await {
            subscriptions.push(subscription?);
        }
        Ok(subscriptions)
    }

    /// Candidates for auto-unfreeze: everything still carrying a freeze
    /// window. Expiry itself is checked by the caller.
    pub async fn find_frozen(
        &self,
        session: &mut Session,
    ) -> Result<Vec<StudentSubscription>, Error> {
        let mut cursor = self
            .collection
            .find(doc! { "freeze_end": { "$ne": bson::Bson::Null } })
            .session(&mut **session)
            .await?;
        let mut subscriptions = Vec::new();
        while let Some(subscription) = cursor.next(&mut *session).await {
            subscriptions.push(subscription?);
        }
        Ok(subscriptions)
    }

    /// Most recently ended subscription of the student on or before `date`;
    /// its leftovers may be carried into a new one.
    pub async fn find_latest_ended(
        &self,
        session: &mut Session,
        student_id: ObjectId,
        date: NaiveDate,
    ) -> Result<Option<StudentSubscription>, Error> {
        Ok(self
            .collection
            .find_one(doc! {
                "student_id": student_id,
                "end_date": { "$lte": to_bson(&date)? },
            })
            .sort(doc! { "end_date": -1 })
            .session(&mut **session)
            .await?)
    }

    pub async fn set_sessions_left(
        &self,
        session: &mut Session,
        id: ObjectId,
        sessions_left: u32,
    ) -> Result<(), Error> {
        self.collection
            .update_one(
                doc! { "_id": id },
                doc! { "$set": { "sessions_left": sessions_left } },
            )
            .session(&mut **session)
            .await?;
        Ok(())
    }

    pub async fn set_freeze(
        &self,
        session: &mut Session,
        id: ObjectId,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<(), Error> {
        self.collection
            .update_one(
                doc! { "_id": id },
                doc! { "$set": {
                    "freeze_start": to_bson(&start)?,
                    "freeze_end": to_bson(&end)?,
                } },
            )
            .session(&mut **session)
            .await?;
        Ok(())
    }

    pub async fn set_auto_renewal_invoice(
        &self,
        session: &mut Session,
        id: ObjectId,
        invoice_id: ObjectId,
    ) -> Result<(), Error> {
        self.collection
            .update_one(
                doc! { "_id": id },
                doc! { "$set": { "auto_renewal_invoice_id": invoice_id } },
            )
            .session(&mut **session)
            .await?;
        Ok(())
    }
}
