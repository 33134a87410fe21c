use bson::oid::ObjectId;
use chrono::{NaiveDate, Utc};
use eyre::Result;
use log::{error, info};
use model::{
    day::Day,
    invoice::{Invoice, InvoiceStatus},
    session::Session,
    training::Training,
};
use serde::{Deserialize, Serialize};
use storage::training::TrainingStore;
use thiserror::Error;
use tx_macro::tx;

use super::{
    clients::Clients,
    invoices::{InvoiceError, Invoices},
    subscriptions::{SubscriptionError, Subscriptions},
};

/// Settlement engine: turns tomorrow's trainings into final financial state,
/// exactly once per training. Each training settles inside its own
/// transaction; one failure never taints the others.
#[derive(Clone)]
pub struct Settlement {
    trainings: TrainingStore,
    subscriptions: Subscriptions,
    invoices: Invoices,
    clients: Clients,
}

#[derive(Debug, Default, Serialize, Deserialize, Clone, Copy)]
pub struct TrainingSettlement {
    pub students_processed: u32,
    pub sessions_deducted: u32,
    pub invoices_created: u32,
    pub invoices_paid: u32,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SettlementReport {
    pub date: NaiveDate,
    pub trainings_processed: u32,
    pub totals: TrainingSettlement,
    pub failed: Vec<String>,
}

impl Settlement {
    pub fn new(
        trainings: TrainingStore,
        subscriptions: Subscriptions,
        invoices: Invoices,
        clients: Clients,
    ) -> Self {
        Settlement {
            trainings,
            subscriptions,
            invoices,
            clients,
        }
    }

    /// Settles every unprocessed training of `day`, isolating failures at
    /// training granularity: a failed training rolls back and lands in the
    /// report while the rest commit.
    pub async fn settle_day(&self, session: &mut Session, day: Day) -> Result<SettlementReport> {
        let pending = self
            .trainings
            .find_unprocessed_in_range(session, day.start(), day.end())
            .await?;
        info!(
            "Settling {} trainings on {}",
            pending.len(),
            day.date()
        );

        let mut report = SettlementReport {
            date: day.date(),
            trainings_processed: 0,
            totals: TrainingSettlement::default(),
            failed: Vec::new(),
        };
        for training in pending {
            match self.settle_training(session, training.id).await {
                Ok(outcome) => {
                    report.trainings_processed += 1;
                    report.totals.students_processed += outcome.students_processed;
                    report.totals.sessions_deducted += outcome.sessions_deducted;
                    report.totals.invoices_created += outcome.invoices_created;
                    report.totals.invoices_paid += outcome.invoices_paid;
                }
                Err(err) => {
                    error!("Failed to settle training {}: {:#}", training.id, err);
                    report
                        .failed
                        .push(format!("training {}: {}", training.id, err));
                }
            }
        }
        Ok(report)
    }

    /// Settles one training atomically. Re-running against an already
    /// processed or cancelled training is a no-op.
    #[tx]
    pub async fn settle_training(
        &self,
        session: &mut Session,
        training_id: ObjectId,
    ) -> Result<TrainingSettlement, SettlementError> {
        let training = self
            .trainings
            .get(session, training_id)
            .await?
            .ok_or(SettlementError::TrainingNotFound)?;
        if training.is_processed() {
            info!("Training {} is already processed", training.id);
            return Ok(TrainingSettlement::default());
        }
        if training.is_cancelled() {
            info!("Training {} is cancelled; nothing to settle", training.id);
            return Ok(TrainingSettlement::default());
        }

        let mut outcome = TrainingSettlement::default();
        for mut enrollment in training.students.clone() {
            if enrollment.status.is_cancelled() {
                continue;
            }
            outcome.students_processed += 1;

            let date = training.day().date();
            if let Some(mut sub) = self
                .subscriptions
                .check_availability(session, enrollment.student_id, date)
                .await?
            {
                if !enrollment.session_deducted {
                    let deducted_from = self.subscriptions.deduct(session, &mut sub).await?;
                    enrollment.mark_deducted(deducted_from);
                    self.trainings
                        .update_enrollment(session, training.id, &enrollment)
                        .await?;
                    outcome.sessions_deducted += 1;
                }
                continue;
            }

            if training.is_free() {
                continue;
            }
            match self
                .invoices
                .find_for_training(session, training.id, enrollment.student_id)
                .await?
            {
                Some(mut invoice) if invoice.status == InvoiceStatus::Pending => {
                    self.invoices.finalize_to_unpaid(session, &mut invoice).await?;
                    if self.invoices.attempt_auto_pay(session, &mut invoice).await? {
                        outcome.invoices_paid += 1;
                    }
                }
                Some(_) => {
                    // Already billed by an earlier pass or a penalty.
                }
                None => {
                    let mut invoice = self
                        .issue_invoice(session, &training, enrollment.student_id)
                        .await?;
                    outcome.invoices_created += 1;
                    if self.invoices.attempt_auto_pay(session, &mut invoice).await? {
                        outcome.invoices_paid += 1;
                    }
                }
            }
        }

        if !self
            .trainings
            .set_processed(session, training.id, Utc::now())
            .await?
        {
            return Err(SettlementError::AlreadyProcessed);
        }
        Ok(outcome)
    }

    /// Pay-per-session invoice, created unpaid straight away: settlement
    /// skips the pending stage penalties go through.
    async fn issue_invoice(
        &self,
        session: &mut Session,
        training: &Training,
        student_id: ObjectId,
    ) -> Result<Invoice, SettlementError> {
        let student = self
            .clients
            .get_student(session, student_id)
            .await?
            .ok_or(SettlementError::StudentNotFound(student_id))?;
        let start_local = training.start_at.with_timezone(&chrono::Local);
        let invoice = Invoice::training(
            student.client_id,
            student.id,
            training.id,
            training.price,
            format!(
                "Training: {} on {}",
                training.name,
                start_local.format("%d.%m.%Y %H:%M")
            ),
            InvoiceStatus::Unpaid,
            Utc::now(),
        );
        Ok(self.invoices.create(session, invoice).await?)
    }
}

#[derive(Debug, Error)]
pub enum SettlementError {
    #[error("Training not found")]
    TrainingNotFound,
    #[error("Training is already processed")]
    AlreadyProcessed,
    #[error("Student not found:{0}")]
    StudentNotFound(ObjectId),
    #[error(transparent)]
    Subscription(#[from] SubscriptionError),
    #[error(transparent)]
    Invoice(#[from] InvoiceError),
    #[error("Common error:{0}")]
    Common(#[from] eyre::Error),
}

impl From<mongodb::error::Error> for SettlementError {
    fn from(err: mongodb::error::Error) -> Self {
        SettlementError::Common(err.into())
    }
}
