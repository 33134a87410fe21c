pub mod client;
pub mod invoice;
pub mod payment;
pub mod process;
pub mod session;
pub mod subscription;
pub mod template;
pub mod training;
pub mod training_type;

use eyre::Result;
use session::Db;

const DB_NAME: &str = "school_ledger_db";

#[derive(Clone)]
pub struct Storage {
    pub db: Db,
    pub clients: client::ClientStore,
    pub students: client::StudentStore,
    pub training_types: training_type::TrainingTypeStore,
    pub templates: template::TemplateStore,
    pub trainings: training::TrainingStore,
    pub subscriptions: subscription::SubscriptionsStore,
    pub student_subscriptions: subscription::StudentSubscriptionStore,
    pub invoices: invoice::InvoiceStore,
    pub payments: payment::PaymentStore,
    pub process_runs: process::ProcessRunStore,
}

impl Storage {
    pub async fn new(uri: &str) -> Result<Self> {
        let db = Db::new(uri, DB_NAME).await?;
        let clients = client::ClientStore::new(&db);
        let students = client::StudentStore::new(&db);
        let training_types = training_type::TrainingTypeStore::new(&db);
        let templates = template::TemplateStore::new(&db);
        let trainings = training::TrainingStore::new(&db).await?;
        let subscriptions = subscription::SubscriptionsStore::new(&db);
        let student_subscriptions = subscription::StudentSubscriptionStore::new(&db).await?;
        let invoices = invoice::InvoiceStore::new(&db).await?;
        let payments = payment::PaymentStore::new(&db);
        let process_runs = process::ProcessRunStore::new(&db).await?;

        Ok(Storage {
            db,
            clients,
            students,
            training_types,
            templates,
            trainings,
            subscriptions,
            student_subscriptions,
            invoices,
            payments,
            process_runs,
        })
    }
}
