use std::sync::Arc;

use bson::{doc, oid::ObjectId};
use eyre::Error;
use model::{
    client::{Client, Student},
    decimal::Decimal,
    session::Session,
};
use mongodb::Collection;

use crate::session::Db;

const CLIENTS: &str = "clients";
const STUDENTS: &str = "students";

#[derive(Clone)]
pub struct ClientStore {
    collection: Arc<Collection<Client>>,
}

impl ClientStore {
    pub(crate) fn new(db: &Db) -> Self {
        ClientStore {
            collection: Arc::new(db.collection(CLIENTS)),
        }
    }

    pub async fn insert(&self, session: &mut Session, client: Client) -> Result<(), Error> {
        self.collection
            .insert_one(client)
            .session(&mut **session)
            .await?;
        Ok(())
    }

    pub async fn get(&self, session: &mut Session, id: ObjectId) -> Result<Option<Client>, Error> {
        Ok(self
            .collection
            .find_one(doc! { "_id": id })
            .session(&mut **session)
            .await?)
    }

    pub async fn credit(
        &self,
        session: &mut Session,
        id: ObjectId,
        amount: Decimal,
    ) -> Result<bool, Error> {
        let result = self
            .collection
            .update_one(
                doc! { "_id": id },
                doc! { "$inc": { "balance": amount.inner() } },
            )
            .session(&mut **session)
            .await?;
        Ok(result.modified_count == 1)
    }

    /// Debits the balance only when it covers the amount; the filter makes
    /// the check and the decrement one atomic operation.
    pub async fn debit(
        &self,
        session: &mut Session,
        id: ObjectId,
        amount: Decimal,
    ) -> Result<bool, Error> {
        let result = self
            .collection
            .update_one(
                doc! { "_id": id, "balance": { "$gte": amount.inner() } },
                doc! { "$inc": { "balance": -amount.inner() } },
            )
            .session(&mut **session)
            .await?;
        Ok(result.modified_count == 1)
    }

    /// Unguarded signed adjustment. Payment cancellation uses it and then
    /// restores the balance to non-negative by reopening paid invoices.
    pub async fn adjust(
        &self,
        session: &mut Session,
        id: ObjectId,
        amount: i64,
    ) -> Result<bool, Error> {
        let result = self
            .collection
            .update_one(doc! { "_id": id }, doc! { "$inc": { "balance": amount } })
            .session(&mut **session)
            .await?;
        Ok(result.modified_count == 1)
    }
}

#[derive(Clone)]
pub struct StudentStore {
    collection: Arc<Collection<Student>>,
}

impl StudentStore {
    pub(crate) fn new(db: &Db) -> Self {
        StudentStore {
            collection: Arc::new(db.collection(STUDENTS)),
        }
    }

    pub async fn insert(&self, session: &mut Session, student: Student) -> Result<(), Error> {
        self.collection
            .insert_one(student)
            .session(&mut **session)
            .await?;
        Ok(())
    }

    pub async fn get(
        &self,
        session: &mut Session,
        id: ObjectId,
    ) -> Result<Option<Student>, Error> {
        Ok(self
            .collection
            .find_one(doc! { "_id": id })
            .session(&mut **session)
            .await?)
    }

    pub async fn find_by_client(
        &self,
        session: &mut Session,
        client_id: ObjectId,
    ) -> Result<Vec<Student>, Error> {
        let mut cursor = self
            .collection
            .find(doc! { "client_id": client_id })
            .session(&mut **session)
            .await?;
        let mut students = Vec::new();
        while let Some(student) = cursor.next(&mut *session).await {
            students.push(student?);
        }
        Ok(students)
    }
}
