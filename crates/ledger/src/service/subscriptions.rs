use bson::oid::ObjectId;
use chrono::Utc;
use log::{info, warn};
use model::{
    day::Day,
    invoice::Invoice,
    session::Session,
    subscription::{StudentSubscription, Subscription, SubscriptionStateError},
};
use storage::subscription::{StudentSubscriptionStore, SubscriptionsStore};
use thiserror::Error;
use tx_macro::tx;

use super::{clients::Clients, invoices::InvoiceError, invoices::Invoices};

/// Subscription ledger: availability checks, session deduction/return with
/// the auto-renewal trigger, and the freeze window lifecycle.
#[derive(Clone)]
pub struct Subscriptions {
    products: SubscriptionsStore,
    store: StudentSubscriptionStore,
    clients: Clients,
    invoices: Invoices,
}

impl Subscriptions {
    pub fn new(
        products: SubscriptionsStore,
        store: StudentSubscriptionStore,
        clients: Clients,
        invoices: Invoices,
    ) -> Self {
        Subscriptions {
            products,
            store,
            clients,
            invoices,
        }
    }

    pub async fn get(
        &self,
        session: &mut Session,
        id: ObjectId,
    ) -> Result<Option<StudentSubscription>, SubscriptionError> {
        Ok(self.store.get(session, id).await?)
    }

    pub async fn create_product(
        &self,
        session: &mut Session,
        product: Subscription,
    ) -> Result<Subscription, SubscriptionError> {
        self.products.insert(session, product.clone()).await?;
        Ok(product)
    }

    /// The subscription that should cover the student's session on `date`:
    /// valid, not frozen, with sessions left or auto-renewal. Subscriptions
    /// that still hold sessions win over exhausted auto-renewing ones;
    /// earlier start date breaks ties.
    pub async fn check_availability(
        &self,
        session: &mut Session,
        student_id: ObjectId,
        date: chrono::NaiveDate,
    ) -> Result<Option<StudentSubscription>, SubscriptionError> {
        let mut candidates: Vec<_> = self
            .store
            .find_by_student(session, student_id)
            .await?
            .into_iter()
            .filter(|sub| sub.is_available_on(date))
            .collect();
        candidates.sort_by_key(|sub| (sub.sessions_left == 0, sub.start_date, sub.id));
        Ok(candidates.into_iter().next())
    }

    /// Takes one session, returning the id of the subscription that actually
    /// lost it. Hitting zero with auto-renewal on creates the follow-up
    /// subscription and its invoice exactly once; an already exhausted
    /// auto-renewing subscription forwards the deduction to that follow-up.
    pub async fn deduct(
        &self,
        session: &mut Session,
        sub: &mut StudentSubscription,
    ) -> Result<ObjectId, SubscriptionError> {
        if sub.sessions_left == 0 {
            if !sub.is_auto_renew {
                return Err(SubscriptionStateError::NoSessionsLeft.into());
            }
            let mut renewal = match self.find_renewal(session, sub).await? {
                Some(renewal) => renewal,
                None => self.renew(session, sub).await?,
            };
            renewal.deduct_session()?;
            self.store
                .set_sessions_left(session, renewal.id, renewal.sessions_left)
                .await?;
            return Ok(renewal.id);
        }

        sub.deduct_session()?;
        self.store
            .set_sessions_left(session, sub.id, sub.sessions_left)
            .await?;
        if sub.needs_renewal() {
            self.renew(session, sub).await?;
        }
        Ok(sub.id)
    }

    pub async fn return_session(
        &self,
        session: &mut Session,
        sub: &mut StudentSubscription,
    ) -> Result<(), SubscriptionError> {
        sub.return_session();
        self.store
            .set_sessions_left(session, sub.id, sub.sessions_left)
            .await?;
        Ok(())
    }

    #[tx]
    pub async fn freeze(
        &self,
        session: &mut Session,
        id: ObjectId,
        start: chrono::NaiveDate,
        end: chrono::NaiveDate,
    ) -> Result<StudentSubscription, SubscriptionError> {
        let mut sub = self
            .store
            .get(session, id)
            .await?
            .ok_or(SubscriptionError::SubscriptionNotFound)?;
        sub.freeze(start, end)?;
        self.store
            .set_freeze(session, sub.id, sub.freeze_start, sub.freeze_end)
            .await?;
        Ok(sub)
    }

    /// Clears a freeze window before it runs out.
    #[tx]
    pub async fn unfreeze(
        &self,
        session: &mut Session,
        id: ObjectId,
    ) -> Result<StudentSubscription, SubscriptionError> {
        let mut sub = self
            .store
            .get(session, id)
            .await?
            .ok_or(SubscriptionError::SubscriptionNotFound)?;
        if sub.freeze_start.is_none() && sub.freeze_end.is_none() {
            return Err(SubscriptionError::NotFrozen);
        }
        sub.clear_freeze();
        self.store.set_freeze(session, sub.id, None, None).await?;
        Ok(sub)
    }

    /// Clears every freeze window that has fully passed and returns the
    /// affected subscriptions. Windows still running are left alone.
    #[tx]
    pub async fn auto_unfreeze_expired(
        &self,
        session: &mut Session,
    ) -> Result<Vec<StudentSubscription>, SubscriptionError> {
        let today = Day::today().date();
        let candidates = self.store.find_frozen(session).await?;
        let mut unfrozen = Vec::new();
        for mut sub in candidates {
            if !sub.freeze_expired(today) {
                continue;
            }
            info!(
                "Auto-unfreezing subscription {} of student {}",
                sub.id, sub.student_id
            );
            sub.clear_freeze();
            self.store.set_freeze(session, sub.id, None, None).await?;
            unfrozen.push(sub);
        }
        Ok(unfrozen)
    }

    /// Sells a subscription to a student. Up to the carry-over cap of unused
    /// sessions from the student's latest ended subscription move into the
    /// new one; the purchase invoice is created unpaid and auto-paid when
    /// the balance covers it.
    #[tx]
    pub async fn add_to_student(
        &self,
        session: &mut Session,
        student_id: ObjectId,
        subscription_id: ObjectId,
        is_auto_renew: bool,
    ) -> Result<StudentSubscription, SubscriptionError> {
        let product = self
            .products
            .get(session, subscription_id)
            .await?
            .ok_or(SubscriptionError::ProductNotFound)?;
        let student = self
            .clients
            .get_student(session, student_id)
            .await?
            .ok_or(SubscriptionError::StudentNotFound)?;

        let today = Day::today().date();
        let mut carried_over = 0;
        if let Some(previous) = self
            .store
            .find_latest_ended(session, student_id, today)
            .await?
        {
            carried_over = previous.carry_over();
            if previous.sessions_left > 0 {
                self.store
                    .set_sessions_left(session, previous.id, 0)
                    .await?;
            }
        }

        let sub =
            StudentSubscription::new(student_id, &product, today, carried_over, is_auto_renew);
        self.store.insert(session, &sub).await?;

        let invoice = Invoice::subscription(
            student.client_id,
            student.id,
            product.id,
            product.price,
            format!("Subscription: {}", product.name),
            false,
            Utc::now(),
        );
        let mut invoice = self.invoices.create(session, invoice).await?;
        self.invoices
            .attempt_auto_pay(session, &mut invoice)
            .await?;
        Ok(sub)
    }

    /// Creates the follow-up subscription and its auto-renewal invoice,
    /// marking the exhausted one so it never renews twice.
    async fn renew(
        &self,
        session: &mut Session,
        sub: &mut StudentSubscription,
    ) -> Result<StudentSubscription, SubscriptionError> {
        let product = self
            .products
            .get(session, sub.subscription_id)
            .await?
            .ok_or(SubscriptionError::ProductNotFound)?;
        let student = self
            .clients
            .get_student(session, sub.student_id)
            .await?
            .ok_or(SubscriptionError::StudentNotFound)?;

        let renewal = sub.renewal(&product);
        self.store.insert(session, &renewal).await?;

        let invoice = Invoice::subscription(
            student.client_id,
            student.id,
            product.id,
            product.price,
            format!("Auto-renewal: {}", product.name),
            true,
            Utc::now(),
        );
        let mut invoice = self.invoices.create(session, invoice).await?;
        self.invoices
            .attempt_auto_pay(session, &mut invoice)
            .await?;

        sub.auto_renewal_invoice_id = Some(invoice.id);
        self.store
            .set_auto_renewal_invoice(session, sub.id, invoice.id)
            .await?;
        info!(
            "Renewed subscription {} of student {} into {}",
            sub.id, sub.student_id, renewal.id
        );
        Ok(renewal)
    }

    /// The follow-up created by an earlier renewal of `sub`, if present.
    async fn find_renewal(
        &self,
        session: &mut Session,
        sub: &StudentSubscription,
    ) -> Result<Option<StudentSubscription>, SubscriptionError> {
        if sub.auto_renewal_invoice_id.is_none() {
            return Ok(None);
        }
        let follow_up = self
            .store
            .find_by_student(session, sub.student_id)
            .await?
            .into_iter()
            .find(|other| other.id != sub.id && other.start_date == sub.end_date);
        if follow_up.is_none() {
            warn!(
                "Subscription {} has a renewal invoice but no follow-up subscription",
                sub.id
            );
        }
        Ok(follow_up)
    }
}

#[derive(Debug, Error)]
pub enum SubscriptionError {
    #[error("Subscription not found")]
    SubscriptionNotFound,
    #[error("Subscription plan not found")]
    ProductNotFound,
    #[error("Student not found")]
    StudentNotFound,
    #[error("Subscription is not frozen")]
    NotFrozen,
    #[error(transparent)]
    State(#[from] SubscriptionStateError),
    #[error(transparent)]
    Invoice(#[from] InvoiceError),
    #[error("Common error:{0}")]
    Common(#[from] eyre::Error),
}

impl From<mongodb::error::Error> for SubscriptionError {
    fn from(err: mongodb::error::Error) -> Self {
        SubscriptionError::Common(err.into())
    }
}
