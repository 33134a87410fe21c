use bson::oid::ObjectId;
use chrono::Utc;
use log::info;
use model::{
    decimal::Decimal,
    invoice::InvalidInvoiceTransition,
    payment::Payment,
    session::Session,
};
use storage::payment::PaymentStore;
use thiserror::Error;
use tx_macro::tx;

use super::{
    clients::Clients,
    invoices::{InvoiceError, Invoices},
};

/// Payment registration and cancellation. A registered payment lands on the
/// balance and immediately sweeps the client's unpaid invoices, oldest
/// first; a cancelled payment leaves the books as if it never arrived.
#[derive(Clone)]
pub struct Payments {
    store: PaymentStore,
    invoices: Invoices,
    clients: Clients,
}

#[derive(Debug, Clone)]
pub struct PaymentOutcome {
    pub payment: Payment,
    pub invoices_paid: u32,
}

impl Payments {
    pub fn new(store: PaymentStore, invoices: Invoices, clients: Clients) -> Self {
        Payments {
            store,
            invoices,
            clients,
        }
    }

    pub async fn get(
        &self,
        session: &mut Session,
        id: ObjectId,
    ) -> Result<Option<Payment>, PaymentError> {
        Ok(self.store.get(session, id).await?)
    }

    /// Registers money received and pays every unpaid invoice the new
    /// balance covers, oldest first. Unaffordable invoices stay unpaid for
    /// the next payment.
    #[tx]
    pub async fn register(
        &self,
        session: &mut Session,
        client_id: ObjectId,
        amount: Decimal,
        description: Option<String>,
    ) -> Result<PaymentOutcome, PaymentError> {
        if !amount.is_positive() {
            return Err(PaymentError::InvalidAmount);
        }
        if self.clients.get_client(session, client_id).await?.is_none() {
            return Err(PaymentError::ClientNotFound);
        }

        let actor = session.actor();
        let payment = Payment::new(client_id, amount, actor, description, Utc::now());
        self.store.insert(session, &payment).await?;
        self.clients.credit(session, client_id, amount).await?;

        let mut invoices_paid = 0;
        for mut invoice in self.invoices.find_unpaid_by_client(session, client_id).await? {
            if self.invoices.attempt_auto_pay(session, &mut invoice).await? {
                invoices_paid += 1;
            }
        }
        info!(
            "Registered payment {} for client {}: {} ({} invoices paid)",
            payment.id, client_id, amount, invoices_paid
        );
        Ok(PaymentOutcome {
            payment,
            invoices_paid,
        })
    }

    /// Takes a cancelled payment back off the balance. If that would drive
    /// the balance negative, the most recently paid invoices are reopened
    /// until it is whole again.
    #[tx]
    pub async fn cancel(
        &self,
        session: &mut Session,
        payment_id: ObjectId,
        reason: Option<String>,
    ) -> Result<Payment, PaymentError> {
        let payment = self
            .store
            .get(session, payment_id)
            .await?
            .ok_or(PaymentError::PaymentNotFound)?;
        if payment.is_cancelled() {
            return Err(PaymentError::AlreadyCancelled);
        }

        if !self
            .clients
            .adjust(session, payment.client_id, -payment.amount.inner())
            .await?
        {
            return Err(PaymentError::ClientNotFound);
        }

        let mut balance = self
            .clients
            .get_client(session, payment.client_id)
            .await?
            .ok_or(PaymentError::ClientNotFound)?
            .balance;
        if balance.is_negative() {
            let mut paid = self
                .invoices
                .find_paid_by_client(session, payment.client_id)
                .await?;
            paid.sort_by(|a, b| b.paid_at.cmp(&a.paid_at));
            for mut invoice in paid {
                if !balance.is_negative() {
                    break;
                }
                invoice.reopen()?;
                self.invoices.update_status(session, &invoice).await?;
                self.clients
                    .adjust(session, payment.client_id, invoice.amount.inner())
                    .await?;
                balance += invoice.amount;
            }
        }

        let actor = session.actor();
        let now = Utc::now();
        if !self
            .store
            .set_cancelled(session, payment.id, actor, now, reason.as_deref())
            .await?
        {
            return Err(PaymentError::AlreadyCancelled);
        }
        info!(
            "Cancelled payment {} of client {}: {}",
            payment.id, payment.client_id, payment.amount
        );

        let mut payment = payment;
        payment.cancelled_at = Some(now);
        payment.cancelled_by = Some(actor);
        payment.cancellation_reason = reason;
        Ok(payment)
    }
}

#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("Client not found")]
    ClientNotFound,
    #[error("Payment not found")]
    PaymentNotFound,
    #[error("Payment is already cancelled")]
    AlreadyCancelled,
    #[error("Payment amount must be positive")]
    InvalidAmount,
    #[error(transparent)]
    InvalidTransition(#[from] InvalidInvoiceTransition),
    #[error(transparent)]
    Invoice(#[from] InvoiceError),
    #[error("Common error:{0}")]
    Common(#[from] eyre::Error),
}

impl From<mongodb::error::Error> for PaymentError {
    fn from(err: mongodb::error::Error) -> Self {
        PaymentError::Common(err.into())
    }
}
