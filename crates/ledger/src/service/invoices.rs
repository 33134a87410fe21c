use std::ops::Deref;

use chrono::Utc;
use log::{info, warn};
use model::{
    invoice::{InvalidInvoiceTransition, Invoice},
    session::Session,
};
use storage::invoice::InvoiceStore;
use thiserror::Error;

use super::clients::Clients;

/// Invoice ledger: owns status transitions and the auto-pay attempt. Balance
/// and status always move inside the same transaction.
#[derive(Clone)]
pub struct Invoices {
    store: InvoiceStore,
    clients: Clients,
}

impl Invoices {
    pub fn new(store: InvoiceStore, clients: Clients) -> Self {
        Invoices { store, clients }
    }

    pub async fn create(
        &self,
        session: &mut Session,
        invoice: Invoice,
    ) -> Result<Invoice, InvoiceError> {
        if self
            .clients
            .get_client(session, invoice.client_id)
            .await?
            .is_none()
        {
            return Err(InvoiceError::ClientNotFound);
        }
        info!(
            "Creating {:?} invoice for client {}: {} ({:?})",
            invoice.kind, invoice.client_id, invoice.amount, invoice.status
        );
        self.store.insert(session, &invoice).await?;
        Ok(invoice)
    }

    /// Pending -> Unpaid, making the invoice eligible for auto-pay.
    pub async fn finalize_to_unpaid(
        &self,
        session: &mut Session,
        invoice: &mut Invoice,
    ) -> Result<(), InvoiceError> {
        invoice.finalize()?;
        self.store.update_status(session, invoice).await?;
        Ok(())
    }

    /// Settles an unpaid invoice from the client balance. Returns false and
    /// leaves everything untouched when the balance is short or the invoice
    /// is not in the payable state; both are expected, not errors.
    pub async fn attempt_auto_pay(
        &self,
        session: &mut Session,
        invoice: &mut Invoice,
    ) -> Result<bool, InvoiceError> {
        if !invoice.can_auto_pay() {
            warn!(
                "Invoice {} is not payable in status {:?}",
                invoice.id, invoice.status
            );
            return Ok(false);
        }
        if !self
            .clients
            .debit(session, invoice.client_id, invoice.amount)
            .await?
        {
            info!(
                "Client {} cannot cover invoice {} ({}); left unpaid",
                invoice.client_id, invoice.id, invoice.amount
            );
            return Ok(false);
        }
        invoice.mark_paid(Utc::now())?;
        self.store.update_status(session, invoice).await?;
        Ok(true)
    }

    /// Pending/Unpaid -> Cancelled, no balance change.
    pub async fn cancel(
        &self,
        session: &mut Session,
        invoice: &mut Invoice,
    ) -> Result<(), InvoiceError> {
        let actor = session.actor();
        invoice.cancel(actor, Utc::now())?;
        self.store.update_status(session, invoice).await?;
        Ok(())
    }

    /// Paid -> Cancelled with the amount returned to the client balance.
    pub async fn refund_and_cancel(
        &self,
        session: &mut Session,
        invoice: &mut Invoice,
    ) -> Result<(), InvoiceError> {
        let actor = session.actor();
        invoice.cancel_refunded(actor, Utc::now())?;
        if !self
            .clients
            .credit(session, invoice.client_id, invoice.amount)
            .await?
        {
            return Err(InvoiceError::ClientNotFound);
        }
        info!(
            "Refunded invoice {} to client {}: {}",
            invoice.id, invoice.client_id, invoice.amount
        );
        self.store.update_status(session, invoice).await?;
        Ok(())
    }
}

impl Deref for Invoices {
    type Target = InvoiceStore;

    fn deref(&self) -> &Self::Target {
        &self.store
    }
}

#[derive(Debug, Error)]
pub enum InvoiceError {
    #[error("Client not found")]
    ClientNotFound,
    #[error(transparent)]
    InvalidTransition(#[from] InvalidInvoiceTransition),
    #[error("Common error:{0}")]
    Common(#[from] eyre::Error),
}

impl From<mongodb::error::Error> for InvoiceError {
    fn from(err: mongodb::error::Error) -> Self {
        InvoiceError::Common(err.into())
    }
}
