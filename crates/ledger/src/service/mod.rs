pub mod calendar;
pub mod cancellation;
pub mod clients;
pub mod history;
pub mod invoices;
pub mod payments;
pub mod schedule;
pub mod settlement;
pub mod subscriptions;
