use bson::oid::ObjectId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::decimal::Decimal;

/// A charge against a client. Transitions are guarded here so no caller can
/// skip a state:
///
/// Pending -> Unpaid -> Paid
///    |          |        |
///    +----------+--> Cancelled (from Paid only via the refund path)
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Invoice {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub client_id: ObjectId,
    pub student_id: ObjectId,
    #[serde(default)]
    pub training_id: Option<ObjectId>,
    #[serde(default)]
    pub subscription_id: Option<ObjectId>,
    pub kind: InvoiceKind,
    pub amount: Decimal,
    pub description: String,
    pub status: InvoiceStatus,
    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub paid_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub cancelled_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub cancelled_by: Option<ObjectId>,
    #[serde(default)]
    pub is_auto_renewal: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum InvoiceStatus {
    Pending,
    Unpaid,
    Paid,
    Cancelled,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum InvoiceKind {
    Training,
    Subscription,
}

impl Invoice {
    pub fn training(
        client_id: ObjectId,
        student_id: ObjectId,
        training_id: ObjectId,
        amount: Decimal,
        description: String,
        status: InvoiceStatus,
        now: DateTime<Utc>,
    ) -> Invoice {
        Invoice {
            id: ObjectId::new(),
            client_id,
            student_id,
            training_id: Some(training_id),
            subscription_id: None,
            kind: InvoiceKind::Training,
            amount,
            description,
            status,
            created_at: now,
            paid_at: None,
            cancelled_at: None,
            cancelled_by: None,
            is_auto_renewal: false,
        }
    }

    pub fn subscription(
        client_id: ObjectId,
        student_id: ObjectId,
        subscription_id: ObjectId,
        amount: Decimal,
        description: String,
        is_auto_renewal: bool,
        now: DateTime<Utc>,
    ) -> Invoice {
        Invoice {
            id: ObjectId::new(),
            client_id,
            student_id,
            training_id: None,
            subscription_id: Some(subscription_id),
            kind: InvoiceKind::Subscription,
            amount,
            description,
            status: InvoiceStatus::Unpaid,
            created_at: now,
            paid_at: None,
            cancelled_at: None,
            cancelled_by: None,
            is_auto_renewal,
        }
    }

    /// Only an unpaid invoice may be settled from the balance; a pending one
    /// must be finalized first.
    pub fn can_auto_pay(&self) -> bool {
        self.status == InvoiceStatus::Unpaid
    }

    /// Pending -> Unpaid.
    pub fn finalize(&mut self) -> Result<(), InvalidInvoiceTransition> {
        self.transition(InvoiceStatus::Pending, InvoiceStatus::Unpaid)
    }

    /// Unpaid -> Paid.
    pub fn mark_paid(&mut self, now: DateTime<Utc>) -> Result<(), InvalidInvoiceTransition> {
        self.transition(InvoiceStatus::Unpaid, InvoiceStatus::Paid)?;
        self.paid_at = Some(now);
        Ok(())
    }

    /// Paid -> Unpaid: a cancelled payment reopens the invoice.
    pub fn reopen(&mut self) -> Result<(), InvalidInvoiceTransition> {
        self.transition(InvoiceStatus::Paid, InvoiceStatus::Unpaid)?;
        self.paid_at = None;
        Ok(())
    }

    /// Pending/Unpaid -> Cancelled. No money moved, no balance change.
    pub fn cancel(
        &mut self,
        cancelled_by: ObjectId,
        now: DateTime<Utc>,
    ) -> Result<(), InvalidInvoiceTransition> {
        match self.status {
            InvoiceStatus::Pending | InvoiceStatus::Unpaid => {
                self.status = InvoiceStatus::Cancelled;
                self.cancelled_at = Some(now);
                self.cancelled_by = Some(cancelled_by);
                Ok(())
            }
            from => Err(InvalidInvoiceTransition {
                from,
                to: InvoiceStatus::Cancelled,
            }),
        }
    }

    /// Paid -> Cancelled. The caller must credit the client's balance in the
    /// same transaction.
    pub fn cancel_refunded(
        &mut self,
        cancelled_by: ObjectId,
        now: DateTime<Utc>,
    ) -> Result<(), InvalidInvoiceTransition> {
        self.transition(InvoiceStatus::Paid, InvoiceStatus::Cancelled)?;
        self.cancelled_at = Some(now);
        self.cancelled_by = Some(cancelled_by);
        Ok(())
    }

    fn transition(
        &mut self,
        from: InvoiceStatus,
        to: InvoiceStatus,
    ) -> Result<(), InvalidInvoiceTransition> {
        if self.status != from {
            return Err(InvalidInvoiceTransition {
                from: self.status,
                to,
            });
        }
        self.status = to;
        Ok(())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Invalid invoice transition: {from:?} -> {to:?}")]
pub struct InvalidInvoiceTransition {
    pub from: InvoiceStatus,
    pub to: InvoiceStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pending_invoice() -> Invoice {
        let mut invoice = unpaid_invoice();
        invoice.status = InvoiceStatus::Pending;
        invoice
    }

    fn unpaid_invoice() -> Invoice {
        Invoice::training(
            ObjectId::new(),
            ObjectId::new(),
            ObjectId::new(),
            Decimal::int(20),
            "Training".to_string(),
            InvoiceStatus::Unpaid,
            Utc::now(),
        )
    }

    #[test]
    fn test_pending_is_never_auto_paid_directly() {
        let mut invoice = pending_invoice();
        assert!(!invoice.can_auto_pay());
        assert!(invoice.mark_paid(Utc::now()).is_err());
        assert_eq!(InvoiceStatus::Pending, invoice.status);

        invoice.finalize().unwrap();
        assert_eq!(InvoiceStatus::Unpaid, invoice.status);
        assert!(invoice.can_auto_pay());
        invoice.mark_paid(Utc::now()).unwrap();
        assert_eq!(InvoiceStatus::Paid, invoice.status);
        assert!(invoice.paid_at.is_some());
    }

    #[test]
    fn test_finalize_requires_pending() {
        let mut invoice = unpaid_invoice();
        assert!(invoice.finalize().is_err());

        invoice.mark_paid(Utc::now()).unwrap();
        assert!(invoice.finalize().is_err());
    }

    #[test]
    fn test_refund_requires_paid() {
        let actor = ObjectId::new();
        let mut unpaid = unpaid_invoice();
        assert!(unpaid.cancel_refunded(actor, Utc::now()).is_err());
        assert_eq!(InvoiceStatus::Unpaid, unpaid.status);

        let mut cancelled = unpaid_invoice();
        cancelled.cancel(actor, Utc::now()).unwrap();
        assert!(cancelled.cancel_refunded(actor, Utc::now()).is_err());

        let mut paid = unpaid_invoice();
        paid.mark_paid(Utc::now()).unwrap();
        paid.cancel_refunded(actor, Utc::now()).unwrap();
        assert_eq!(InvoiceStatus::Cancelled, paid.status);
        assert_eq!(Some(actor), paid.cancelled_by);
    }

    #[test]
    fn test_cancel_without_refund_covers_pending_and_unpaid() {
        let actor = ObjectId::new();
        let mut pending = pending_invoice();
        pending.cancel(actor, Utc::now()).unwrap();
        assert_eq!(InvoiceStatus::Cancelled, pending.status);

        let mut unpaid = unpaid_invoice();
        unpaid.cancel(actor, Utc::now()).unwrap();
        assert_eq!(InvoiceStatus::Cancelled, unpaid.status);

        let mut paid = unpaid_invoice();
        paid.mark_paid(Utc::now()).unwrap();
        assert!(paid.cancel(actor, Utc::now()).is_err());
        assert_eq!(InvoiceStatus::Paid, paid.status);
    }

    #[test]
    fn test_cancellation_is_terminal() {
        let actor = ObjectId::new();
        let mut invoice = unpaid_invoice();
        invoice.cancel(actor, Utc::now()).unwrap();
        assert!(invoice.cancel(actor, Utc::now()).is_err());
        assert!(invoice.mark_paid(Utc::now()).is_err());
        assert!(invoice.finalize().is_err());
        assert!(invoice.reopen().is_err());
    }

    #[test]
    fn test_reopen_requires_paid() {
        let mut invoice = unpaid_invoice();
        assert!(invoice.reopen().is_err());
        invoice.mark_paid(Utc::now()).unwrap();
        invoice.reopen().unwrap();
        assert_eq!(InvoiceStatus::Unpaid, invoice.status);
        assert!(invoice.paid_at.is_none());
    }
}
