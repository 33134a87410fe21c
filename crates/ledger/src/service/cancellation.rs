use bson::oid::ObjectId;
use chrono::Utc;
use log::info;
use model::{
    invoice::{Invoice, InvoiceStatus},
    session::Session,
    training::{AttendanceStatus, CancellationKind, Enrollment, Training},
};
use storage::training::TrainingStore;
use thiserror::Error;
use tx_macro::tx;

use super::{
    clients::Clients,
    invoices::{InvoiceError, Invoices},
    subscriptions::{SubscriptionError, Subscriptions},
};

/// Cancellation engine: classifies a cancellation as safe or penalty against
/// the training's threshold and reverses or applies the settlement effects
/// accordingly. Relies on the enrollment's deduction flag, never on the
/// training's processed timestamp, so it is correct before and after
/// settlement.
#[derive(Clone)]
pub struct Cancellations {
    trainings: TrainingStore,
    subscriptions: Subscriptions,
    invoices: Invoices,
    clients: Clients,
    default_safe_hours: u32,
}

impl Cancellations {
    pub fn new(
        trainings: TrainingStore,
        subscriptions: Subscriptions,
        invoices: Invoices,
        clients: Clients,
        default_safe_hours: u32,
    ) -> Self {
        Cancellations {
            trainings,
            subscriptions,
            invoices,
            clients,
            default_safe_hours,
        }
    }

    pub fn classify(&self, training: &Training) -> CancellationKind {
        training.cancellation_kind(Utc::now(), self.default_safe_hours)
    }

    /// Cancels one student's participation. The moment of the call decides
    /// safe vs penalty.
    #[tx]
    pub async fn cancel_student(
        &self,
        session: &mut Session,
        training_id: ObjectId,
        student_id: ObjectId,
        reason: Option<String>,
    ) -> Result<CancellationKind, CancellationError> {
        let training = self
            .trainings
            .get(session, training_id)
            .await?
            .ok_or(CancellationError::TrainingNotFound)?;
        if training.is_cancelled() {
            return Err(CancellationError::TrainingCancelled);
        }
        let mut enrollment = training
            .enrollment(student_id)
            .cloned()
            .ok_or(CancellationError::StudentNotEnrolled)?;
        if enrollment.status.is_cancelled() {
            return Err(CancellationError::AlreadyCancelled);
        }

        let kind = self.classify(&training);
        info!(
            "Cancelling student {} on training {}: {:?}",
            student_id, training_id, kind
        );
        let status = match kind {
            CancellationKind::Safe => {
                self.apply_safe(session, &training, &mut enrollment).await?;
                AttendanceStatus::CancelledSafe
            }
            CancellationKind::Penalty => {
                self.apply_penalty(session, &training, &mut enrollment)
                    .await?;
                AttendanceStatus::CancelledPenalty
            }
        };
        enrollment.cancel(status, Utc::now(), reason);
        self.trainings
            .update_enrollment(session, training.id, &enrollment)
            .await?;
        Ok(kind)
    }

    /// No-show: attendance-wise the student is absent, financially it is a
    /// penalty cancellation.
    #[tx]
    pub async fn mark_absent(
        &self,
        session: &mut Session,
        training_id: ObjectId,
        student_id: ObjectId,
    ) -> Result<(), CancellationError> {
        let training = self
            .trainings
            .get(session, training_id)
            .await?
            .ok_or(CancellationError::TrainingNotFound)?;
        if training.is_cancelled() {
            return Err(CancellationError::TrainingCancelled);
        }
        let mut enrollment = training
            .enrollment(student_id)
            .cloned()
            .ok_or(CancellationError::StudentNotEnrolled)?;
        if enrollment.status.is_cancelled() {
            return Err(CancellationError::AlreadyCancelled);
        }

        self.apply_penalty(session, &training, &mut enrollment)
            .await?;
        enrollment.mark_absent(Utc::now());
        self.trainings
            .update_enrollment(session, training.id, &enrollment)
            .await?;
        Ok(())
    }

    /// Cancels the whole training. Every enrollment gets the safe treatment
    /// regardless of the threshold: the operator cancelled, not the student.
    #[tx]
    pub async fn cancel_training(
        &self,
        session: &mut Session,
        training_id: ObjectId,
        reason: &str,
    ) -> Result<u32, CancellationError> {
        let training = self
            .trainings
            .get(session, training_id)
            .await?
            .ok_or(CancellationError::TrainingNotFound)?;
        if training.is_cancelled() {
            return Err(CancellationError::TrainingCancelled);
        }
        if !self
            .trainings
            .set_cancelled(session, training.id, Utc::now(), reason)
            .await?
        {
            return Err(CancellationError::TrainingCancelled);
        }

        info!("Cancelling training {}: {}", training_id, reason);
        let mut affected = 0;
        for mut enrollment in training.students.clone() {
            if enrollment.status.is_cancelled() {
                continue;
            }
            self.apply_safe(session, &training, &mut enrollment).await?;
            enrollment.cancel(
                AttendanceStatus::CancelledSafe,
                Utc::now(),
                Some(reason.to_string()),
            );
            self.trainings
                .update_enrollment(session, training.id, &enrollment)
                .await?;
            affected += 1;
        }
        Ok(affected)
    }

    /// Safe path: return a deducted session, refund a paid invoice, void an
    /// open one. Without either there is nothing to reverse; when settlement
    /// never ran the deduction flag is still false and the subscription is
    /// left alone.
    async fn apply_safe(
        &self,
        session: &mut Session,
        training: &Training,
        enrollment: &mut Enrollment,
    ) -> Result<(), CancellationError> {
        if let Some(sub_id) = enrollment.clear_deducted() {
            let mut sub = self
                .subscriptions
                .get(session, sub_id)
                .await?
                .ok_or(CancellationError::SubscriptionNotFound)?;
            self.subscriptions.return_session(session, &mut sub).await?;
        }

        if let Some(mut invoice) = self
            .invoices
            .find_for_training(session, training.id, enrollment.student_id)
            .await?
        {
            match invoice.status {
                InvoiceStatus::Paid => {
                    self.invoices.refund_and_cancel(session, &mut invoice).await?;
                }
                InvoiceStatus::Pending | InvoiceStatus::Unpaid => {
                    self.invoices.cancel(session, &mut invoice).await?;
                }
                InvoiceStatus::Cancelled => {}
            }
        }
        Ok(())
    }

    /// Penalty path: the session is charged as if attended. Deduct it now,
    /// or drive the invoice to unpaid and try to collect. A live deduction
    /// means the penalty is already applied.
    async fn apply_penalty(
        &self,
        session: &mut Session,
        training: &Training,
        enrollment: &mut Enrollment,
    ) -> Result<(), CancellationError> {
        if enrollment.session_deducted {
            return Ok(());
        }

        let date = training.day().date();
        if let Some(mut sub) = self
            .subscriptions
            .check_availability(session, enrollment.student_id, date)
            .await?
        {
            let deducted_from = self.subscriptions.deduct(session, &mut sub).await?;
            enrollment.mark_deducted(deducted_from);
            return Ok(());
        }

        if training.is_free() {
            return Ok(());
        }
        match self
            .invoices
            .find_for_training(session, training.id, enrollment.student_id)
            .await?
        {
            Some(mut invoice) if invoice.status == InvoiceStatus::Pending => {
                self.invoices.finalize_to_unpaid(session, &mut invoice).await?;
                self.invoices.attempt_auto_pay(session, &mut invoice).await?;
            }
            Some(mut invoice) if invoice.status == InvoiceStatus::Unpaid => {
                self.invoices.attempt_auto_pay(session, &mut invoice).await?;
            }
            Some(_) => {
                // Already paid; the penalty is covered.
            }
            None => {
                let student = self
                    .clients
                    .get_student(session, enrollment.student_id)
                    .await?
                    .ok_or(CancellationError::StudentNotFound)?;
                let start_local = training.start_at.with_timezone(&chrono::Local);
                let invoice = Invoice::training(
                    student.client_id,
                    student.id,
                    training.id,
                    training.price,
                    format!(
                        "Late cancellation: {} on {}",
                        training.name,
                        start_local.format("%d.%m.%Y %H:%M")
                    ),
                    InvoiceStatus::Pending,
                    Utc::now(),
                );
                let mut invoice = self.invoices.create(session, invoice).await?;
                // Same pending -> unpaid path settlement-born invoices take.
                self.invoices.finalize_to_unpaid(session, &mut invoice).await?;
                self.invoices.attempt_auto_pay(session, &mut invoice).await?;
            }
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum CancellationError {
    #[error("Training not found")]
    TrainingNotFound,
    #[error("Training is cancelled")]
    TrainingCancelled,
    #[error("Student is not enrolled")]
    StudentNotEnrolled,
    #[error("Participation is already cancelled")]
    AlreadyCancelled,
    #[error("Student not found")]
    StudentNotFound,
    #[error("Subscription not found")]
    SubscriptionNotFound,
    #[error(transparent)]
    Subscription(#[from] SubscriptionError),
    #[error(transparent)]
    Invoice(#[from] InvoiceError),
    #[error("Common error:{0}")]
    Common(#[from] eyre::Error),
}

impl From<mongodb::error::Error> for CancellationError {
    fn from(err: mongodb::error::Error) -> Self {
        CancellationError::Common(err.into())
    }
}
