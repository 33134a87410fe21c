use bson::oid::ObjectId;
use eyre::{Error, Result};
use model::{session::Session, template::TrainingTemplate, training_type::TrainingType};
use storage::{template::TemplateStore, training_type::TrainingTypeStore};

/// Template/schedule provider boundary: recurring templates and the training
/// types they reference.
#[derive(Clone)]
pub struct Schedule {
    templates: TemplateStore,
    training_types: TrainingTypeStore,
}

impl Schedule {
    pub fn new(templates: TemplateStore, training_types: TrainingTypeStore) -> Self {
        Schedule {
            templates,
            training_types,
        }
    }

    pub async fn active_templates(
        &self,
        session: &mut Session,
    ) -> Result<Vec<TrainingTemplate>, Error> {
        self.templates.find_active(session).await
    }

    pub async fn training_type(
        &self,
        session: &mut Session,
        id: ObjectId,
    ) -> Result<Option<TrainingType>, Error> {
        self.training_types.get(session, id).await
    }

    pub async fn create_training_type(
        &self,
        session: &mut Session,
        training_type: TrainingType,
    ) -> Result<TrainingType> {
        self.training_types
            .insert(session, training_type.clone())
            .await?;
        Ok(training_type)
    }

    pub async fn create_template(
        &self,
        session: &mut Session,
        template: TrainingTemplate,
    ) -> Result<TrainingTemplate> {
        self.templates.insert(session, template.clone()).await?;
        Ok(template)
    }
}
