use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

/// Delivery details attached to an order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Delivery {
    pub name: String,
    pub phone: String,
    pub zip: String,
    pub city: String,
    pub address: String,
    pub region: String,
    pub email: String,
}

/// Payment details attached to an order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Payment {
    pub transaction: String,
    pub request_id: String,
    pub currency: String,
    pub provider: String,
    pub amount: i64,
    /// Unix timestamp, seconds
    pub payment_dt: i64,
    pub bank: String,
    pub delivery_cost: i64,
    pub goods_total: i64,
    pub custom_fee: i64,
}

/// A single line item of an order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Item {
    pub chrt_id: i64,
    pub track_number: String,
    pub price: i64,
    pub rid: String,
    pub name: String,
    pub sale: i64,
    pub size: String,
    pub total_price: i64,
    pub nm_id: i64,
    pub brand: String,
    pub status: i64,
}

/// The order aggregate: header, one delivery, one payment and ordered items.
///
/// `order_uid` is assigned by whoever produces the order and is the only key
/// used by the store and the cache. Missing JSON fields decode to their zero
/// value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Order {
    pub order_uid: String,
    pub track_number: String,
    pub entry: String,
    pub delivery: Delivery,
    pub payment: Payment,
    pub items: Vec<Item>,
    pub locale: String,
    pub internal_signature: String,
    pub customer_id: String,
    pub delivery_service: String,
    #[serde(rename = "shardkey")]
    pub shard_key: String,
    pub sm_id: i64,
    pub date_created: DateTime<Utc>,
    pub oof_shard: String,
}

impl Order {
    /// True when the order carries a usable key
    pub fn has_uid(&self) -> bool {
        !self.order_uid.trim().is_empty()
    }

    /// Check the invariants every newly created order must hold
    pub fn check_invariants(&self) -> Result<(), DomainError> {
        if !self.has_uid() {
            return Err(DomainError::ValidationError(
                "order_uid must not be empty".to_string(),
            ));
        }

        if self.items.is_empty() {
            return Err(DomainError::BusinessRuleViolation(
                "order must contain at least one item".to_string(),
            ));
        }

        let p = &self.payment;
        if p.amount < 0 || p.delivery_cost < 0 || p.goods_total < 0 || p.custom_fee < 0 {
            return Err(DomainError::BusinessRuleViolation(
                "payment amounts must be >= 0".to_string(),
            ));
        }

        for (idx, item) in self.items.iter().enumerate() {
            if item.price < 0 || item.sale < 0 || item.total_price < 0 {
                return Err(DomainError::BusinessRuleViolation(format!(
                    "item {} has a negative price, sale or total_price",
                    idx
                )));
            }
        }

        Ok(())
    }
}
