use bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

use crate::decimal::Decimal;

/// Paying client. The balance is the only spendable money in the system and
/// is mutated exclusively inside the transaction that justifies the change.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Client {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub name: String,
    pub phone: String,
    #[serde(default)]
    pub balance: Decimal,
    pub is_active: bool,
}

impl Client {
    pub fn new(name: String, phone: String) -> Client {
        Client {
            id: ObjectId::new(),
            name,
            phone,
            balance: Decimal::zero(),
            is_active: true,
        }
    }

    pub fn can_afford(&self, amount: Decimal) -> bool {
        self.balance >= amount
    }
}

/// A person attending trainings; bills go to the owning client.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Student {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub client_id: ObjectId,
    pub name: String,
    pub is_active: bool,
}

impl Student {
    pub fn new(client_id: ObjectId, name: String) -> Student {
        Student {
            id: ObjectId::new(),
            client_id,
            name,
            is_active: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_can_afford() {
        let mut client = Client::new("Ann".to_string(), "+100000".to_string());
        client.balance = Decimal::int(50);
        assert!(client.can_afford(Decimal::int(20)));
        assert!(client.can_afford(Decimal::int(50)));
        assert!(!client.can_afford(Decimal::int(51)));
    }
}
