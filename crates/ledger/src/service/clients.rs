use bson::oid::ObjectId;
use eyre::{Error, Result};
use model::{
    client::{Client, Student},
    decimal::Decimal,
    session::Session,
};
use storage::client::{ClientStore, StudentStore};

/// Client/student directory and the balance ledger. Balance mutations go
/// through here so they always run inside the caller's transaction.
#[derive(Clone)]
pub struct Clients {
    clients: ClientStore,
    students: StudentStore,
}

impl Clients {
    pub fn new(clients: ClientStore, students: StudentStore) -> Self {
        Clients { clients, students }
    }

    pub async fn create_client(&self, session: &mut Session, client: Client) -> Result<Client> {
        self.clients.insert(session, client.clone()).await?;
        Ok(client)
    }

    pub async fn create_student(&self, session: &mut Session, student: Student) -> Result<Student> {
        self.students.insert(session, student.clone()).await?;
        Ok(student)
    }

    pub async fn get_client(
        &self,
        session: &mut Session,
        id: ObjectId,
    ) -> Result<Option<Client>, Error> {
        self.clients.get(session, id).await
    }

    pub async fn get_student(
        &self,
        session: &mut Session,
        id: ObjectId,
    ) -> Result<Option<Student>, Error> {
        self.students.get(session, id).await
    }

    pub async fn balance(&self, session: &mut Session, client_id: ObjectId) -> Result<Decimal> {
        let client = self
            .clients
            .get(session, client_id)
            .await?
            .ok_or_else(|| eyre::eyre!("Client not found:{}", client_id))?;
        Ok(client.balance)
    }

    pub async fn credit(
        &self,
        session: &mut Session,
        client_id: ObjectId,
        amount: Decimal,
    ) -> Result<bool, Error> {
        self.clients.credit(session, client_id, amount).await
    }

    /// False when the balance does not cover the amount; nothing changes.
    pub async fn debit(
        &self,
        session: &mut Session,
        client_id: ObjectId,
        amount: Decimal,
    ) -> Result<bool, Error> {
        self.clients.debit(session, client_id, amount).await
    }

    /// Signed adjustment without the non-negative guard; only payment
    /// cancellation uses it, and it restores the invariant before committing.
    pub(crate) async fn adjust(
        &self,
        session: &mut Session,
        client_id: ObjectId,
        amount: i64,
    ) -> Result<bool, Error> {
        self.clients.adjust(session, client_id, amount).await
    }
}
