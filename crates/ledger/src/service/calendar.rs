use bson::oid::ObjectId;
use chrono::{NaiveDate, Utc};
use eyre::{Error, Result};
use log::{info, warn};
use model::{day::Day, session::Session, training::Training};
use serde::{Deserialize, Serialize};
use storage::training::TrainingStore;
use thiserror::Error;
use tx_macro::tx;

use super::{clients::Clients, schedule::Schedule};

/// Concrete trainings: weekly generation from templates, lookups by day and
/// attendance finalization.
#[derive(Clone)]
pub struct Calendar {
    trainings: TrainingStore,
    schedule: Schedule,
    clients: Clients,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct WeekGeneration {
    pub monday: NaiveDate,
    pub created: Vec<ObjectId>,
    pub students_enrolled: u32,
    pub students_skipped: u32,
}

impl Calendar {
    pub fn new(trainings: TrainingStore, schedule: Schedule, clients: Clients) -> Self {
        Calendar {
            trainings,
            schedule,
            clients,
        }
    }

    pub async fn get(
        &self,
        session: &mut Session,
        id: ObjectId,
    ) -> Result<Option<Training>, Error> {
        self.trainings.get(session, id).await
    }

    pub async fn find_by_day(
        &self,
        session: &mut Session,
        day: Day,
    ) -> Result<Vec<Training>, Error> {
        self.trainings
            .find_in_range(session, day.start(), day.end())
            .await
    }

    /// Builds next week's trainings from the active templates. One training
    /// per template and date; a second run over the same week finds the
    /// existing instances and creates nothing. Students above capacity are
    /// reported, not enrolled.
    #[tx]
    pub async fn generate_next_week(
        &self,
        session: &mut Session,
    ) -> Result<WeekGeneration, GenerationError> {
        let monday = Day::today().next_week_monday();
        let templates = self.schedule.active_templates(session).await?;
        info!(
            "Generating trainings for the week of {} from {} templates",
            monday.date(),
            templates.len()
        );

        let mut generation = WeekGeneration {
            monday: monday.date(),
            created: Vec::new(),
            students_enrolled: 0,
            students_skipped: 0,
        };
        for template in templates {
            let date = template.date_in_week(monday.date());
            let day = Day::new(date);
            if self
                .trainings
                .exists_for_template(session, template.id, day.start(), day.end())
                .await?
            {
                info!("Training for template {} on {} already exists", template.id, date);
                continue;
            }

            let training_type = self
                .schedule
                .training_type(session, template.training_type_id)
                .await?
                .ok_or(GenerationError::TrainingTypeNotFound(
                    template.training_type_id,
                ))?;
            if !training_type.is_active {
                continue;
            }

            let start_at = day.at(template.start_time);
            let mut training = Training::from_template(&template, &training_type, start_at);
            for student in template.eligible_students(date) {
                if training.enroll(student.student_id) {
                    generation.students_enrolled += 1;
                } else {
                    warn!(
                        "No capacity in {} on {}: student {} skipped",
                        training_type.name, date, student.student_id
                    );
                    generation.students_skipped += 1;
                }
            }
            self.trainings.insert(session, &training).await?;
            generation.created.push(training.id);
        }

        info!(
            "Created {} trainings, enrolled {} students, skipped {}",
            generation.created.len(),
            generation.students_enrolled,
            generation.students_skipped
        );
        Ok(generation)
    }

    /// Manually adds a student to a training that still has room and has not
    /// been settled or cancelled.
    #[tx]
    pub async fn add_student(
        &self,
        session: &mut Session,
        training_id: ObjectId,
        student_id: ObjectId,
    ) -> Result<(), EnrollError> {
        let mut training = self
            .trainings
            .get(session, training_id)
            .await?
            .ok_or(EnrollError::TrainingNotFound)?;
        if training.is_cancelled() {
            return Err(EnrollError::TrainingCancelled);
        }
        if training.is_processed() {
            return Err(EnrollError::TrainingProcessed);
        }
        let student = self
            .clients
            .get_student(session, student_id)
            .await?
            .ok_or(EnrollError::StudentNotFound)?;
        if !student.is_active {
            return Err(EnrollError::StudentInactive);
        }
        if training.enrollment(student_id).is_some() {
            return Err(EnrollError::AlreadyEnrolled);
        }
        if !training.enroll(student_id) {
            return Err(EnrollError::NoCapacity);
        }
        let enrollment = training
            .students
            .last()
            .cloned()
            .ok_or_else(|| eyre::eyre!("Enrollment just added is missing"))?;
        self.trainings
            .push_enrollment(session, training.id, &enrollment)
            .await?;
        Ok(())
    }

    /// Flips today's Registered enrollments to Present with a timestamp.
    /// Attendance only; no financial side effects here.
    #[tx]
    pub async fn finalize_attendance(&self, session: &mut Session, day: Day) -> Result<u32> {
        let now = Utc::now();
        let mut updated = 0;
        for training in self.find_by_day(session, day).await? {
            if training.is_cancelled() {
                continue;
            }
            for mut enrollment in training.students {
                if enrollment.mark_present(now) {
                    self.trainings
                        .update_enrollment(session, training.id, &enrollment)
                        .await?;
                    updated += 1;
                }
            }
        }
        Ok(updated)
    }
}

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("Training type not found:{0}")]
    TrainingTypeNotFound(ObjectId),
    #[error("Common error:{0}")]
    Common(#[from] eyre::Error),
}

impl From<mongodb::error::Error> for GenerationError {
    fn from(err: mongodb::error::Error) -> Self {
        GenerationError::Common(err.into())
    }
}

#[derive(Debug, Error)]
pub enum EnrollError {
    #[error("Training not found")]
    TrainingNotFound,
    #[error("Training is cancelled")]
    TrainingCancelled,
    #[error("Training is already processed")]
    TrainingProcessed,
    #[error("Student not found")]
    StudentNotFound,
    #[error("Student is not active")]
    StudentInactive,
    #[error("Student already enrolled")]
    AlreadyEnrolled,
    #[error("No capacity left")]
    NoCapacity,
    #[error("Common error:{0}")]
    Common(#[from] eyre::Error),
}

impl From<mongodb::error::Error> for EnrollError {
    fn from(err: mongodb::error::Error) -> Self {
        EnrollError::Common(err.into())
    }
}
