use bson::oid::ObjectId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::decimal::Decimal;

/// Money received from a client. Registration credits the balance and sweeps
/// unpaid invoices; cancellation reverses both.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Payment {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub client_id: ObjectId,
    pub amount: Decimal,
    #[serde(default)]
    pub description: Option<String>,
    pub registered_by: ObjectId,
    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub cancelled_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub cancelled_by: Option<ObjectId>,
    #[serde(default)]
    pub cancellation_reason: Option<String>,
}

impl Payment {
    pub fn new(
        client_id: ObjectId,
        amount: Decimal,
        registered_by: ObjectId,
        description: Option<String>,
        now: DateTime<Utc>,
    ) -> Payment {
        Payment {
            id: ObjectId::new(),
            client_id,
            amount,
            description,
            registered_by,
            created_at: now,
            cancelled_at: None,
            cancelled_by: None,
            cancellation_reason: None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled_at.is_some()
    }
}
