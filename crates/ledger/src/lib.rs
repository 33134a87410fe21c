use storage::Storage;

use service::calendar::Calendar;
use service::cancellation::Cancellations;
use service::clients::Clients;
use service::history::History;
use service::invoices::Invoices;
use service::payments::Payments;
use service::schedule::Schedule;
use service::settlement::Settlement;
use service::subscriptions::Subscriptions;
use storage::session::Db;

pub mod process;
pub mod service;

/// Hours before training start inside which a cancellation carries a
/// penalty, for training types that do not set their own threshold.
pub const DEFAULT_SAFE_CANCELLATION_HOURS: u32 = 24;

#[derive(Debug, Clone, Copy)]
pub struct LedgerConfig {
    pub safe_cancellation_hours: u32,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        LedgerConfig {
            safe_cancellation_hours: DEFAULT_SAFE_CANCELLATION_HOURS,
        }
    }
}

#[derive(Clone)]
pub struct Ledger {
    pub db: Db,
    pub clients: Clients,
    pub schedule: Schedule,
    pub calendar: Calendar,
    pub subscriptions: Subscriptions,
    pub invoices: Invoices,
    pub payments: Payments,
    pub settlement: Settlement,
    pub cancellations: Cancellations,
    pub history: History,
}

impl Ledger {
    pub fn new(storage: Storage, config: LedgerConfig) -> Self {
        let clients = Clients::new(storage.clients, storage.students);
        let schedule = Schedule::new(storage.templates, storage.training_types);
        let invoices = Invoices::new(storage.invoices, clients.clone());
        let subscriptions = Subscriptions::new(
            storage.subscriptions,
            storage.student_subscriptions,
            clients.clone(),
            invoices.clone(),
        );
        let calendar = Calendar::new(storage.trainings.clone(), schedule.clone(), clients.clone());
        let settlement = Settlement::new(
            storage.trainings.clone(),
            subscriptions.clone(),
            invoices.clone(),
            clients.clone(),
        );
        let cancellations = Cancellations::new(
            storage.trainings,
            subscriptions.clone(),
            invoices.clone(),
            clients.clone(),
            config.safe_cancellation_hours,
        );
        let payments = Payments::new(storage.payments, invoices.clone(), clients.clone());
        let history = History::new(storage.process_runs);
        Ledger {
            db: storage.db,
            clients,
            schedule,
            calendar,
            subscriptions,
            invoices,
            payments,
            settlement,
            cancellations,
            history,
        }
    }
}
