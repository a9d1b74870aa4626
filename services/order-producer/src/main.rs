use anyhow::{anyhow, Result};
use chrono::Utc;
use common::config::AppConfig;
use common::telemetry::{init_telemetry, shutdown_telemetry, TelemetryConfig};
use domain::{Delivery, Item, Order, Payment};
use messaging::EventPublisher;
use tracing::info;
use uuid::Uuid;

/// Publishes sample orders to the configured topic for manual end-to-end
/// checks. Pass a count as the first argument to send more than one.
#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    let config = AppConfig::from_env()?;
    init_telemetry(TelemetryConfig::from_app_config("order-producer", &config))?;

    let count: usize = match std::env::args().nth(1) {
        Some(raw) => raw
            .parse()
            .map_err(|e| anyhow!("invalid order count '{}': {}", raw, e))?,
        None => 1,
    };

    let publisher = EventPublisher::new(&config.kafka.brokers, config.kafka.topic.clone())?;

    let batch: Vec<(String, Order)> = (0..count)
        .map(|_| {
            let order = sample_order();
            (order.order_uid.clone(), order)
        })
        .collect();
    publisher.publish_batch(&batch).await?;

    for (uid, _) in &batch {
        info!(order_uid = %uid, topic = %publisher.topic(), "Produced test order");
    }

    shutdown_telemetry();
    Ok(())
}

fn sample_order() -> Order {
    let now = Utc::now();
    Order {
        order_uid: Uuid::new_v4().to_string(),
        track_number: "WBILMTESTTRACK".to_string(),
        entry: "WBIL".to_string(),
        delivery: Delivery {
            name: "Test Testov".to_string(),
            phone: "+9720000000".to_string(),
            zip: "2639809".to_string(),
            city: "Kiryat Mozkin".to_string(),
            address: "Ploshad Mira 15".to_string(),
            region: "Kraiot".to_string(),
            email: "test@gmail.com".to_string(),
        },
        payment: Payment {
            transaction: Uuid::new_v4().to_string(),
            request_id: String::new(),
            currency: "USD".to_string(),
            provider: "wbpay".to_string(),
            amount: 1817,
            payment_dt: now.timestamp(),
            bank: "alpha".to_string(),
            delivery_cost: 1500,
            goods_total: 317,
            custom_fee: 0,
        },
        items: vec![Item {
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
        date_created: now,
        oof_shard: "1".to_string(),
    }
}
