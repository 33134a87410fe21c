use std::sync::Arc;

use bson::{doc, oid::ObjectId};
use eyre::Error;
use model::{session::Session, template::TrainingTemplate};
use mongodb::Collection;

use crate::session::Db;

const COLLECTION: &str = "training_templates";

#[derive(Clone)]
pub struct TemplateStore {
    collection: Arc<Collection<TrainingTemplate>>,
}

impl TemplateStore {
    pub(crate) fn new(db: &Db) -> Self {
        TemplateStore {
            collection: Arc::new(db.collection(COLLECTION)),
        }
    }

    pub async fn insert(
        &self,
        session: &mut Session,
        template: TrainingTemplate,
    ) -> Result<(), Error> {
        self.collection
            .insert_one(template)
            .session(&mut **session)
            .await?;
        Ok(())
    }

    pub async fn get(
        &self,
        session: &mut Session,
        id: ObjectId,
    ) -> Result<Option<TrainingTemplate>, Error> {
        Ok(self
            .collection
            .find_one(doc! { "_id": id })
            .session(&mut **session)
            .await?)
    }

    pub async fn find_active(
        &self,
        session: &mut Session,
    ) -> Result<Vec<TrainingTemplate>, Error> {
        let mut cursor = self
            .collection
            .find(doc! { "is_active": true })
            .session(&mut **session)
            .await?;
        let mut templates = Vec::new();
        while let Some(template) = cursor.next(&mut *session).await {
            templates.push(template?);
        }
        Ok(templates)
    }
}
