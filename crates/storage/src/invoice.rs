use std::sync::Arc;

use bson::{doc, oid::ObjectId, to_bson};
use eyre::Error;
use model::{invoice::Invoice, session::Session};
use mongodb::{Collection, IndexModel};

use crate::session::Db;

const COLLECTION: &str = "invoices";

#[derive(Clone)]
pub struct InvoiceStore {
    collection: Arc<Collection<Invoice>>,
}

impl InvoiceStore {
    pub(crate) async fn new(db: &Db) -> Result<Self, Error> {
        let collection: Collection<Invoice> = db.collection(COLLECTION);
        collection
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "client_id": 1, "status": 1 })
                    .build(),
            )
            .await?;
        collection
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "training_id": 1, "student_id": 1 })
                    .build(),
            )
            .await?;
        Ok(InvoiceStore {
            collection: Arc::new(collection),
        })
    }

    pub async fn insert(&self, session: &mut Session, invoice: &Invoice) -> Result<(), Error> {
        self.collection
            .insert_one(invoice)
            .session(&mut **session)
            .await?;
        Ok(())
    }

    pub async fn get(
        &self,
        session: &mut Session,
        id: ObjectId,
    ) -> Result<Option<Invoice>, Error> {
        Ok(self
            .collection
            .find_one(doc! { "_id": id })
            .session(&mut **session)
            .await?)
    }

    /// The live (non-cancelled) invoice for one student's participation in
    /// one training, if any.
    pub async fn find_for_training(
        &self,
        session: &mut Session,
        training_id: ObjectId,
        student_id: ObjectId,
    ) -> Result<Option<Invoice>, Error> {
        Ok(self
            .collection
            .find_one(doc! {
                "training_id": training_id,
                "student_id": student_id,
                "status": { "$ne": "Cancelled" },
            })
            .session(&mut **session)
            .await?)
    }

    /// Unpaid invoices of a client, oldest first: the payment sweep order.
    pub async fn find_unpaid_by_client(
        &self,
        session: &mut Session,
        client_id: ObjectId,
    ) -> Result<Vec<Invoice>, Error> {
        let mut cursor = self
            .collection
            .find(doc! { "client_id": client_id, "status": "Unpaid" })
            .sort(doc! { "created_at": 1 })
            .session(&mut **session)
            .await?;
        let mut invoices = Vec::new();
        while let Some(invoice) = cursor.next(&mut *session).await {
            invoices.push(invoice?);
        }
        Ok(invoices)
    }

    pub async fn find_paid_by_client(
        &self,
        session: &mut Session,
        client_id: ObjectId,
    ) -> Result<Vec<Invoice>, Error> {
        let mut cursor = self
            .collection
            .find(doc! { "client_id": client_id, "status": "Paid" })
            .session(&mut **session)
            .await?;
        let mut invoices = Vec::new();
        while let Some(invoice) = cursor.next(&mut *session).await {
            invoices.push(invoice?);
        }
        Ok(invoices)
    }

    /// Persists the status-bearing fields after a model-level transition.
    pub async fn update_status(
        &self,
        session: &mut Session,
        invoice: &Invoice,
    ) -> Result<(), Error> {
        self.collection
            .update_one(
                doc! { "_id": invoice.id },
                doc! { "$set": {
                    "status": to_bson(&invoice.status)?,
                    "paid_at": to_bson(&invoice.paid_at)?,
                    "cancelled_at": to_bson(&invoice.cancelled_at)?,
                    "cancelled_by": to_bson(&invoice.cancelled_by)?,
                } },
            )
            .session(&mut **session)
            .await?;
        Ok(())
    }
}
