use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The cart being submitted. Updates return a new cart.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Cart {
    pub fulfilment: Option<CartType>,
    pub items: Vec<Item>,
    pub summary: Option<Summary>,
    pub payment: Option<Payment>,
}

impl Cart {
    pub fn new(items: Vec<Item>) -> Self {
        Self {
            items,
            ..Self::default()
        }
    }

    pub fn with_fulfilment(self, fulfilment: CartType) -> Self {
        Self {
            fulfilment: Some(fulfilment),
            ..self
        }
    }

    pub fn with_summary(self, summary: Summary) -> Self {
        Self {
            summary: Some(summary),
            ..self
        }
    }

    pub fn with_payment(self, payment: Payment) -> Self {
        Self {
            payment: Some(payment),
            ..self
        }
    }

    pub fn item_count(&self) -> u32 {
        self.items.iter().map(|item| item.quantity).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub sku: String,
    pub quantity: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub item_count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub method: String,
}

/// How the order reaches the customer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CartType {
    Pickup { location: Location },
    Delivery { instructions: Instructions },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FulfilmentKind {
    Pickup,
    Delivery,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub address: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instructions {
    pub location: Location,
    pub instructions: String,
}

/// Proof of a submitted cart
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Receipt {
    pub order_id: Uuid,
    pub item_count: u32,
    pub fulfilment: Option<CartType>,
    pub issued_at: DateTime<Utc>,
}
