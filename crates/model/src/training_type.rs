use bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

use crate::decimal::Decimal;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TrainingType {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub name: String,
    pub capacity: u32,
    pub price: Decimal,
    /// Hours before start inside which a cancellation becomes a penalty.
    /// `None` falls back to the system-wide default.
    #[serde(default)]
    pub safe_cancellation_hours: Option<u32>,
    pub is_active: bool,
}

impl TrainingType {
    pub fn new(
        name: String,
        capacity: u32,
        price: Decimal,
        safe_cancellation_hours: Option<u32>,
    ) -> Self {
        TrainingType {
            id: ObjectId::new(),
            name,
            capacity,
            price,
            safe_cancellation_hours,
            is_active: true,
        }
    }
}
