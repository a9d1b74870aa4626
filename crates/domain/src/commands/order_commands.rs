use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::aggregates::order::{Delivery, Item, Order, Payment};

/// Command to create a new order. The order_uid is generated on conversion.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateOrderCommand {
    #[validate(length(min = 1, message = "track_number is required"))]
    pub track_number: String,

    #[validate(length(min = 1, message = "entry is required"))]
    pub entry: String,

    #[validate(nested)]
    pub delivery: DeliveryDetails,

    #[validate(nested)]
    pub payment: PaymentDetails,

    #[validate(length(min = 1, message = "Order must have at least one item"), nested)]
    pub items: Vec<CreateOrderItem>,

    #[serde(default)]
    pub locale: String,

    #[serde(default)]
    pub internal_signature: String,

    #[validate(length(min = 1, message = "customer_id is required"))]
    pub customer_id: String,

    #[serde(default)]
    pub delivery_service: String,

    #[serde(default, rename = "shardkey")]
    pub shard_key: String,

    #[serde(default)]
    pub sm_id: i64,

    #[serde(default)]
    pub oof_shard: String,
}

/// Delivery details in the create order command
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct DeliveryDetails {
    #[validate(length(min = 1, message = "delivery.name is required"))]
    pub name: String,

    #[validate(length(min = 1, message = "delivery.phone is required"))]
    pub phone: String,

    #[validate(length(min = 1, message = "delivery.zip is required"))]
    pub zip: String,

    #[validate(length(min = 1, message = "delivery.city is required"))]
    pub city: String,

    #[validate(length(min = 1, message = "delivery.address is required"))]
    pub address: String,

    #[serde(default)]
    pub region: String,

    #[validate(email(message = "delivery.email must be a valid email"))]
    pub email: String,
}

/// Payment details in the create order command
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct PaymentDetails {
    #[validate(length(min = 1, message = "payment.transaction is required"))]
    pub transaction: String,

    #[serde(default)]
    pub request_id: String,

    #[validate(length(min = 1, message = "payment.currency is required"))]
    pub currency: String,

    #[validate(length(min = 1, message = "payment.provider is required"))]
    pub provider: String,

    #[validate(range(min = 1, message = "payment.amount must be >= 1"))]
    pub amount: i64,

    #[validate(range(min = 1, message = "payment.payment_dt must be > 0"))]
    pub payment_dt: i64,

    #[serde(default)]
    pub bank: String,

    #[serde(default)]
    #[validate(range(min = 0, message = "payment.delivery_cost must be >= 0"))]
    pub delivery_cost: i64,

    #[serde(default)]
    #[validate(range(min = 0, message = "payment.goods_total must be >= 0"))]
    pub goods_total: i64,

    #[serde(default)]
    #[validate(range(min = 0, message = "payment.custom_fee must be >= 0"))]
    pub custom_fee: i64,
}

/// Line item in the create and update order commands
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateOrderItem {
    #[validate(range(min = 1, message = "item.chrt_id is required"))]
    pub chrt_id: i64,

    #[validate(length(min = 1, message = "item.track_number is required"))]
    pub track_number: String,

    #[validate(range(min = 1, message = "item.price must be >= 1"))]
    pub price: i64,

    #[validate(length(min = 1, message = "item.rid is required"))]
    pub rid: String,

    #[validate(length(min = 1, message = "item.name is required"))]
    pub name: String,

    #[serde(default)]
    #[validate(range(min = 0, message = "item.sale must be >= 0"))]
    pub sale: i64,

    #[serde(default)]
    pub size: String,

    #[validate(range(min = 1, message = "item.total_price must be >= 1"))]
    pub total_price: i64,

    #[validate(range(min = 1, message = "item.nm_id is required"))]
    pub nm_id: i64,

    #[validate(length(min = 1, message = "item.brand is required"))]
    pub brand: String,

    #[validate(range(min = 1, message = "item.status is required"))]
    pub status: i64,
}

impl From<CreateOrderItem> for Item {
    fn from(item: CreateOrderItem) -> Self {
        Item {
            chrt_id: item.chrt_id,
            track_number: item.track_number,
            price: item.price,
            rid: item.rid,
            name: item.name,
            sale: item.sale,
            size: item.size,
            total_price: item.total_price,
            nm_id: item.nm_id,
            brand: item.brand,
            status: item.status,
        }
    }
}

impl CreateOrderCommand {
    /// Build the order aggregate, assigning a fresh order_uid and creation time
    pub fn into_order(self) -> Order {
        Order {
            order_uid: Uuid::new_v4().to_string(),
            track_number: self.track_number,
            entry: self.entry,
            delivery: Delivery {
                name: self.delivery.name,
                phone: self.delivery.phone,
                zip: self.delivery.zip,
                city: self.delivery.city,
                address: self.delivery.address,
                region: self.delivery.region,
                email: self.delivery.email,
            },
            payment: Payment {
                transaction: self.payment.transaction,
                request_id: self.payment.request_id,
                currency: self.payment.currency,
                provider: self.payment.provider,
                amount: self.payment.amount,
                payment_dt: self.payment.payment_dt,
                bank: self.payment.bank,
                delivery_cost: self.payment.delivery_cost,
                goods_total: self.payment.goods_total,
                custom_fee: self.payment.custom_fee,
            },
            items: self.items.into_iter().map(Item::from).collect(),
            locale: self.locale,
            internal_signature: self.internal_signature,
            customer_id: self.customer_id,
            delivery_service: self.delivery_service,
            shard_key: self.shard_key,
            sm_id: self.sm_id,
            date_created: Utc::now(),
            oof_shard: self.oof_shard,
        }
    }
}

/// Command to partially update an existing order.
///
/// Absent or empty fields leave the stored value untouched. A non-empty
/// `items` list replaces all items.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct UpdateOrderCommand {
    #[validate(length(min = 1, message = "order_uid is required"))]
    pub order_uid: String,
    pub track_number: Option<String>,
    pub entry: Option<String>,
    #[validate(nested)]
    pub delivery: Option<DeliveryPatch>,
    #[validate(nested)]
    pub payment: Option<PaymentPatch>,
    #[validate(nested)]
    pub items: Vec<CreateOrderItem>,
    pub locale: Option<String>,
    pub internal_signature: Option<String>,
    pub customer_id: Option<String>,
    pub delivery_service: Option<String>,
    #[serde(rename = "shardkey")]
    pub shard_key: Option<String>,
    pub sm_id: Option<i64>,
    pub oof_shard: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct DeliveryPatch {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub zip: Option<String>,
    pub city: Option<String>,
    pub address: Option<String>,
    pub region: Option<String>,
    #[validate(email(message = "delivery.email must be a valid email"))]
    pub email: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct PaymentPatch {
    pub transaction: Option<String>,
    pub request_id: Option<String>,
    pub currency: Option<String>,
    pub provider: Option<String>,
    #[validate(range(min = 1, message = "payment.amount must be >= 1 if provided"))]
    pub amount: Option<i64>,
    pub payment_dt: Option<i64>,
    pub bank: Option<String>,
    #[validate(range(min = 0, message = "payment.delivery_cost must be >= 0"))]
    pub delivery_cost: Option<i64>,
    #[validate(range(min = 0, message = "payment.goods_total must be >= 0"))]
    pub goods_total: Option<i64>,
    #[validate(range(min = 0, message = "payment.custom_fee must be >= 0"))]
    pub custom_fee: Option<i64>,
}

fn patch_str(target: &mut String, value: &Option<String>) {
    if let Some(v) = value {
        if !v.is_empty() {
            *target = v.clone();
        }
    }
}

fn patch_num(target: &mut i64, value: Option<i64>) {
    if let Some(v) = value {
        *target = v;
    }
}

impl UpdateOrderCommand {
    /// Apply the provided fields onto an existing order
    pub fn apply_to(&self, order: &mut Order) {
        patch_str(&mut order.track_number, &self.track_number);
        patch_str(&mut order.entry, &self.entry);
        patch_str(&mut order.locale, &self.locale);
        patch_str(&mut order.internal_signature, &self.internal_signature);
        patch_str(&mut order.customer_id, &self.customer_id);
        patch_str(&mut order.delivery_service, &self.delivery_service);
        patch_str(&mut order.shard_key, &self.shard_key);
        patch_str(&mut order.oof_shard, &self.oof_shard);
        if let Some(sm_id) = self.sm_id.filter(|v| *v != 0) {
            order.sm_id = sm_id;
        }

        if let Some(d) = &self.delivery {
            patch_str(&mut order.delivery.name, &d.name);
            patch_str(&mut order.delivery.phone, &d.phone);
            patch_str(&mut order.delivery.zip, &d.zip);
            patch_str(&mut order.delivery.city, &d.city);
            patch_str(&mut order.delivery.address, &d.address);
            patch_str(&mut order.delivery.region, &d.region);
            patch_str(&mut order.delivery.email, &d.email);
        }

        if let Some(p) = &self.payment {
            patch_str(&mut order.payment.transaction, &p.transaction);
            patch_str(&mut order.payment.request_id, &p.request_id);
            patch_str(&mut order.payment.currency, &p.currency);
            patch_str(&mut order.payment.provider, &p.provider);
            patch_str(&mut order.payment.bank, &p.bank);
            patch_num(&mut order.payment.amount, p.amount);
            patch_num(&mut order.payment.payment_dt, p.payment_dt.filter(|v| *v != 0));
            patch_num(&mut order.payment.delivery_cost, p.delivery_cost);
            patch_num(&mut order.payment.goods_total, p.goods_total);
            patch_num(&mut order.payment.custom_fee, p.custom_fee);
        }

        if !self.items.is_empty() {
            order.items = self.items.iter().cloned().map(Item::from).collect();
        }
    }
}

/// Command to delete an order
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct DeleteOrderCommand {
    #[validate(length(min = 1, message = "order_uid is required"))]
    pub order_uid: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregates::order::fixtures::sample_order;

    fn create_command() -> CreateOrderCommand {
        CreateOrderCommand {
            track_number: "WBILMTESTTRACK".to_string(),
            entry: "WBIL".to_string(),
            delivery: DeliveryDetails {
                name: "Test Testov".to_string(),
                phone: "+9720000000".to_string(),
                zip: "2639809".to_string(),
                city: "Kiryat Mozkin".to_string(),
                address: "Ploshad Mira 15".to_string(),
                region: "Kraiot".to_string(),
                email: "test@gmail.com".to_string(),
            },
            payment: PaymentDetails {
                transaction: "b563feb7b2b84b6test".to_string(),
                request_id: String::new(),
                currency: "USD".to_string(),
                provider: "wbpay".to_string(),
                amount: 1817,
                payment_dt: 1637907727,
                bank: "alpha".to_string(),
                delivery_cost: 1500,
                goods_total: 317,
                custom_fee: 0,
            },
            items: vec![CreateOrderItem {
                chrt_id: 9934930,
                track_number: "WBILMTESTTRACK".to_string(),
                price: 453,
                rid: "ab4219087a764ae0btest".to_string(),
                name: "Mascaras".to_string(),
                sale: 30,
                size: "0".to_string(),
                total_price: 317,
                nm_id: 2389212,
                brand: "Vivienne Sabo".to_string(),
                status: 202,
            }],
            locale: "en".to_string(),
            internal_signature: String::new(),
            customer_id: "test".to_string(),
            delivery_service: "meest".to_string(),
            shard_key: "9".to_string(),
            sm_id: 99,
            oof_shard: "1".to_string(),
        }
    }

    #[test]
    fn test_create_order_command_validation() {
        assert!(create_command().validate().is_ok());
    }

    #[test]
    fn test_create_order_command_empty_items_fails() {
        let mut cmd = create_command();
        cmd.items.clear();
        assert!(cmd.validate().is_err());
    }

    #[test]
    fn test_create_order_item_zero_price_fails() {
        let mut cmd = create_command();
        cmd.items[0].price = 0;
        assert!(cmd.validate().is_err());
    }

    #[test]
    fn test_create_order_negative_cost_fails() {
        let mut cmd = create_command();
        cmd.payment.custom_fee = -5;
        assert!(cmd.validate().is_err());
    }

    #[test]
    fn test_delivery_invalid_email_fails() {
        let mut cmd = create_command();
        cmd.delivery.email = "not-an-email".to_string();
        assert!(cmd.validate().is_err());
    }

    #[test]
    fn test_into_order_generates_uid() {
        let first = create_command().into_order();
        let second = create_command().into_order();

        assert!(first.has_uid());
        assert_ne!(first.order_uid, second.order_uid);
        assert_eq!(first.items.len(), 1);
        assert_eq!(first.payment.amount, 1817);
        assert!(first.check_invariants().is_ok());
    }

    #[test]
    fn test_update_command_requires_uid() {
        let cmd = UpdateOrderCommand::default();
        assert!(cmd.validate().is_err());
    }

    #[test]
    fn test_update_command_applies_only_provided_fields() {
        let mut order = sample_order("abc");
        let cmd = UpdateOrderCommand {
            order_uid: "abc".to_string(),
            track_number: Some("NEWTRACK".to_string()),
            entry: Some(String::new()),
            delivery: Some(DeliveryPatch {
                city: Some("Moscow".to_string()),
                ..Default::default()
            }),
            payment: Some(PaymentPatch {
                amount: Some(2000),
                ..Default::default()
            }),
            ..Default::default()
        };

        assert!(cmd.validate().is_ok());
        cmd.apply_to(&mut order);

        assert_eq!(order.track_number, "NEWTRACK");
        assert_eq!(order.entry, "WBIL");
        assert_eq!(order.delivery.city, "Moscow");
        assert_eq!(order.delivery.name, "Test Testov");
        assert_eq!(order.payment.amount, 2000);
        assert_eq!(order.payment.delivery_cost, 1500);
        assert_eq!(order.items.len(), 1);
    }

    #[test]
    fn test_update_command_replaces_items() {
        let mut order = sample_order("abc");
        let mut item = create_command().items.remove(0);
        item.name = "Lipstick".to_string();
        let cmd = UpdateOrderCommand {
            order_uid: "abc".to_string(),
            items: vec![item.clone(), item],
            ..Default::default()
        };

        cmd.apply_to(&mut order);
        assert_eq!(order.items.len(), 2);
        assert!(order.items.iter().all(|i| i.name == "Lipstick"));
    }

    #[test]
    fn test_update_command_rejects_zero_amount() {
        let cmd = UpdateOrderCommand {
            order_uid: "abc".to_string(),
            payment: Some(PaymentPatch {
                amount: Some(0),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert!(cmd.validate().is_err());
    }

    #[test]
    fn test_delete_order_command_empty_uid_fails() {
        let cmd = DeleteOrderCommand {
            order_uid: String::new(),
        };
        assert!(cmd.validate().is_err());
    }
}
