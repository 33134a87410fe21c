pub mod client;
pub mod day;
pub mod decimal;
pub mod invoice;
pub mod payment;
pub mod process;
pub mod session;
pub mod subscription;
pub mod template;
pub mod training;
pub mod training_type;
