use std::collections::HashMap;
use std::future::Future;
use std::time::Instant;

use async_trait::async_trait;
use common::metrics;
use domain::{Delivery, Item, Order, Payment};
use sqlx::postgres::PgRow;
use sqlx::{PgConnection, PgPool, Row};
use tracing::{debug, info, warn};

use super::{InsertOutcome, OrderStore, StoreError};

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS orders (
        id BIGSERIAL PRIMARY KEY,
        order_uid TEXT NOT NULL UNIQUE,
        track_number TEXT NOT NULL DEFAULT '',
        entry TEXT NOT NULL DEFAULT '',
        locale TEXT NOT NULL DEFAULT '',
        internal_signature TEXT NOT NULL DEFAULT '',
        customer_id TEXT NOT NULL DEFAULT '',
        delivery_service TEXT NOT NULL DEFAULT '',
        shardkey TEXT NOT NULL DEFAULT '',
        sm_id BIGINT NOT NULL DEFAULT 0,
        date_created TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        oof_shard TEXT NOT NULL DEFAULT '',
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS deliveries (
        order_id BIGINT PRIMARY KEY REFERENCES orders(id) ON DELETE CASCADE,
        name TEXT NOT NULL DEFAULT '',
        phone TEXT NOT NULL DEFAULT '',
        zip TEXT NOT NULL DEFAULT '',
        city TEXT NOT NULL DEFAULT '',
        address TEXT NOT NULL DEFAULT '',
        region TEXT NOT NULL DEFAULT '',
        email TEXT NOT NULL DEFAULT ''
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS payments (
        order_id BIGINT PRIMARY KEY REFERENCES orders(id) ON DELETE CASCADE,
        transaction TEXT NOT NULL DEFAULT '',
        request_id TEXT NOT NULL DEFAULT '',
        currency TEXT NOT NULL DEFAULT '',
        provider TEXT NOT NULL DEFAULT '',
        amount BIGINT NOT NULL DEFAULT 0,
        payment_dt BIGINT NOT NULL DEFAULT 0,
        bank TEXT NOT NULL DEFAULT '',
        delivery_cost BIGINT NOT NULL DEFAULT 0,
        goods_total BIGINT NOT NULL DEFAULT 0,
        custom_fee BIGINT NOT NULL DEFAULT 0
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS items (
        id BIGSERIAL PRIMARY KEY,
        order_id BIGINT NOT NULL REFERENCES orders(id) ON DELETE CASCADE,
        position INTEGER NOT NULL,
        chrt_id BIGINT NOT NULL DEFAULT 0,
        track_number TEXT NOT NULL DEFAULT '',
        price BIGINT NOT NULL DEFAULT 0,
        rid TEXT NOT NULL DEFAULT '',
        name TEXT NOT NULL DEFAULT '',
        sale BIGINT NOT NULL DEFAULT 0,
        size TEXT NOT NULL DEFAULT '',
        total_price BIGINT NOT NULL DEFAULT 0,
        nm_id BIGINT NOT NULL DEFAULT 0,
        brand TEXT NOT NULL DEFAULT '',
        status BIGINT NOT NULL DEFAULT 0
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_items_order_position ON items (order_id, position)",
];

const SELECT_ORDERS: &str = r#"
    SELECT
        o.id, o.order_uid, o.track_number, o.entry, o.locale,
        o.internal_signature, o.customer_id, o.delivery_service, o.shardkey,
        o.sm_id, o.date_created, o.oof_shard,
        d.name AS d_name, d.phone AS d_phone, d.zip AS d_zip, d.city AS d_city,
        d.address AS d_address, d.region AS d_region, d.email AS d_email,
        p.transaction AS p_transaction, p.request_id AS p_request_id,
        p.currency AS p_currency, p.provider AS p_provider, p.amount AS p_amount,
        p.payment_dt AS p_payment_dt, p.bank AS p_bank,
        p.delivery_cost AS p_delivery_cost, p.goods_total AS p_goods_total,
        p.custom_fee AS p_custom_fee
    FROM orders o
    JOIN deliveries d ON d.order_id = o.id
    JOIN payments p ON p.order_id = o.id
"#;

const SELECT_ITEMS: &str = r#"
    SELECT order_id, chrt_id, track_number, price, rid, name, sale, size,
           total_price, nm_id, brand, status
    FROM items
    WHERE order_id = ANY($1)
    ORDER BY order_id, position
"#;

const INSERT_ORDER: &str = r#"
    INSERT INTO orders (
        order_uid, track_number, entry, locale, internal_signature,
        customer_id, delivery_service, shardkey, sm_id, date_created, oof_shard
    )
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
    RETURNING id
"#;

const INSERT_ORDER_IF_ABSENT: &str = r#"
    INSERT INTO orders (
        order_uid, track_number, entry, locale, internal_signature,
        customer_id, delivery_service, shardkey, sm_id, date_created, oof_shard
    )
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
    ON CONFLICT (order_uid) DO NOTHING
    RETURNING id
"#;

/// PostgreSQL implementation of the order store
pub struct PostgresOrderStore {
    pool: PgPool,
}

impl PostgresOrderStore {
    /// Create a new PostgreSQL order store
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get the database pool (useful for testing)
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create the order tables if they do not exist yet
    pub async fn migrate(&self) -> Result<(), StoreError> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        info!("Order schema is up to date");
        Ok(())
    }

    async fn load_items(
        &self,
        order_ids: &[i64],
    ) -> Result<HashMap<i64, Vec<Item>>, StoreError> {
        let rows = sqlx::query(SELECT_ITEMS)
            .bind(order_ids)
            .fetch_all(&self.pool)
            .await?;

        let mut items: HashMap<i64, Vec<Item>> = HashMap::new();
        for row in &rows {
            let order_id: i64 = row.try_get("order_id")?;
            items.entry(order_id).or_default().push(item_from_row(row)?);
        }
        Ok(items)
    }
}

async fn timed<T, F>(operation: &str, fut: F) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, StoreError>>,
{
    let start = Instant::now();
    let result = fut.await;
    metrics::record_store_operation(operation, result.is_ok(), start.elapsed().as_secs_f64());
    result
}

fn order_from_row(row: &PgRow) -> Result<(i64, Order), sqlx::Error> {
    let order = Order {
        order_uid: row.try_get("order_uid")?,
        track_number: row.try_get("track_number")?,
        entry: row.try_get("entry")?,
        delivery: Delivery {
            name: row.try_get("d_name")?,
            phone: row.try_get("d_phone")?,
            zip: row.try_get("d_zip")?,
            city: row.try_get("d_city")?,
            address: row.try_get("d_address")?,
            region: row.try_get("d_region")?,
            email: row.try_get("d_email")?,
        },
        payment: Payment {
            transaction: row.try_get("p_transaction")?,
            request_id: row.try_get("p_request_id")?,
            currency: row.try_get("p_currency")?,
            provider: row.try_get("p_provider")?,
            amount: row.try_get("p_amount")?,
            payment_dt: row.try_get("p_payment_dt")?,
            bank: row.try_get("p_bank")?,
            delivery_cost: row.try_get("p_delivery_cost")?,
            goods_total: row.try_get("p_goods_total")?,
            custom_fee: row.try_get("p_custom_fee")?,
        },
        items: Vec::new(),
        locale: row.try_get("locale")?,
        internal_signature: row.try_get("internal_signature")?,
        customer_id: row.try_get("customer_id")?,
        delivery_service: row.try_get("delivery_service")?,
        shard_key: row.try_get("shardkey")?,
        sm_id: row.try_get("sm_id")?,
        date_created: row.try_get("date_created")?,
        oof_shard: row.try_get("oof_shard")?,
    };
    Ok((row.try_get("id")?, order))
}

fn item_from_row(row: &PgRow) -> Result<Item, sqlx::Error> {
    Ok(Item {
        chrt_id: row.try_get("chrt_id")?,
        track_number: row.try_get("track_number")?,
        price: row.try_get("price")?,
        rid: row.try_get("rid")?,
        name: row.try_get("name")?,
        sale: row.try_get("sale")?,
        size: row.try_get("size")?,
        total_price: row.try_get("total_price")?,
        nm_id: row.try_get("nm_id")?,
        brand: row.try_get("brand")?,
        status: row.try_get("status")?,
    })
}

fn map_unique_violation(err: sqlx::Error, order_uid: &str) -> StoreError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            StoreError::Duplicate(order_uid.to_string())
        }
        _ => StoreError::DatabaseError(err),
    }
}

async fn insert_header(
    conn: &mut PgConnection,
    sql: &str,
    order: &Order,
) -> Result<Option<i64>, sqlx::Error> {
    sqlx::query_scalar(sql)
        .bind(&order.order_uid)
        .bind(&order.track_number)
        .bind(&order.entry)
        .bind(&order.locale)
        .bind(&order.internal_signature)
        .bind(&order.customer_id)
        .bind(&order.delivery_service)
        .bind(&order.shard_key)
        .bind(order.sm_id)
        .bind(order.date_created)
        .bind(&order.oof_shard)
        .fetch_optional(&mut *conn)
        .await
}

async fn insert_children(
    conn: &mut PgConnection,
    order_id: i64,
    order: &Order,
) -> Result<(), sqlx::Error> {
    let d = &order.delivery;
    sqlx::query(
        r#"
        INSERT INTO deliveries (order_id, name, phone, zip, city, address, region, email)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        "#,
    )
    .bind(order_id)
    .bind(&d.name)
    .bind(&d.phone)
    .bind(&d.zip)
    .bind(&d.city)
    .bind(&d.address)
    .bind(&d.region)
    .bind(&d.email)
    .execute(&mut *conn)
    .await?;

    let p = &order.payment;
    sqlx::query(
        r#"
        INSERT INTO payments (
            order_id, transaction, request_id, currency, provider, amount,
            payment_dt, bank, delivery_cost, goods_total, custom_fee
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        "#,
    )
    .bind(order_id)
    .bind(&p.transaction)
    .bind(&p.request_id)
    .bind(&p.currency)
    .bind(&p.provider)
    .bind(p.amount)
    .bind(p.payment_dt)
    .bind(&p.bank)
    .bind(p.delivery_cost)
    .bind(p.goods_total)
    .bind(p.custom_fee)
    .execute(&mut *conn)
    .await?;

    for (position, item) in order.items.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO items (
                order_id, position, chrt_id, track_number, price, rid, name,
                sale, size, total_price, nm_id, brand, status
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(order_id)
        .bind(position as i32)
        .bind(item.chrt_id)
        .bind(&item.track_number)
        .bind(item.price)
        .bind(&item.rid)
        .bind(&item.name)
        .bind(item.sale)
        .bind(&item.size)
        .bind(item.total_price)
        .bind(item.nm_id)
        .bind(&item.brand)
        .bind(item.status)
        .execute(&mut *conn)
        .await?;
    }

    debug!(
        "Inserted delivery, payment and {} items for order row {}",
        order.items.len(),
        order_id
    );
    Ok(())
}

impl PostgresOrderStore {
    async fn create_inner(&self, order: &Order) -> Result<String, StoreError> {
        let mut tx = self.pool.begin().await?;

        let order_id = insert_header(&mut tx, INSERT_ORDER, order)
            .await
            .map_err(|e| map_unique_violation(e, &order.order_uid))?
            .ok_or_else(|| StoreError::Duplicate(order.order_uid.clone()))?;
        insert_children(&mut tx, order_id, order).await?;

        tx.commit().await?;
        info!(order_uid = %order.order_uid, "Order created");
        Ok(order.order_uid.clone())
    }

    async fn find_by_uid_inner(&self, order_uid: &str) -> Result<Option<Order>, StoreError> {
        let sql = format!("{} WHERE o.order_uid = $1", SELECT_ORDERS);
        let row = sqlx::query(&sql)
            .bind(order_uid)
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            debug!(order_uid = %order_uid, "Order not found in store");
            return Ok(None);
        };

        let (id, mut order) = order_from_row(&row)?;
        let mut items = self.load_items(&[id]).await?;
        order.items = items.remove(&id).unwrap_or_default();
        Ok(Some(order))
    }

    async fn list_all_inner(&self) -> Result<Vec<Order>, StoreError> {
        let sql = format!("{} ORDER BY o.id", SELECT_ORDERS);
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;

        let mut orders = Vec::with_capacity(rows.len());
        for row in &rows {
            orders.push(order_from_row(row)?);
        }

        let ids: Vec<i64> = orders.iter().map(|(id, _)| *id).collect();
        let mut items = self.load_items(&ids).await?;

        let orders: Vec<Order> = orders
            .into_iter()
            .map(|(id, mut order)| {
                order.items = items.remove(&id).unwrap_or_default();
                order
            })
            .collect();

        debug!("Loaded {} orders from store", orders.len());
        Ok(orders)
    }

    async fn update_inner(&self, order: &Order) -> Result<String, StoreError> {
        let mut tx = self.pool.begin().await?;

        let order_id: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE orders
            SET track_number = $2, entry = $3, locale = $4,
                internal_signature = $5, customer_id = $6,
                delivery_service = $7, shardkey = $8, sm_id = $9,
                date_created = $10, oof_shard = $11, updated_at = NOW()
            WHERE order_uid = $1
            RETURNING id
            "#,
        )
        .bind(&order.order_uid)
        .bind(&order.track_number)
        .bind(&order.entry)
        .bind(&order.locale)
        .bind(&order.internal_signature)
        .bind(&order.customer_id)
        .bind(&order.delivery_service)
        .bind(&order.shard_key)
        .bind(order.sm_id)
        .bind(order.date_created)
        .bind(&order.oof_shard)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(order_id) = order_id else {
            return Err(StoreError::NotFound(order.order_uid.clone()));
        };

        for table in ["deliveries", "payments", "items"] {
            let sql = format!("DELETE FROM {} WHERE order_id = $1", table);
            sqlx::query(&sql).bind(order_id).execute(&mut *tx).await?;
        }
        insert_children(&mut tx, order_id, order).await?;

        tx.commit().await?;
        info!(order_uid = %order.order_uid, "Order updated");
        Ok(order.order_uid.clone())
    }

    async fn delete_inner(&self, order_uid: &str) -> Result<String, StoreError> {
        let result = sqlx::query("DELETE FROM orders WHERE order_uid = $1")
            .bind(order_uid)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            debug!(order_uid = %order_uid, "Delete matched no rows");
        } else {
            info!(order_uid = %order_uid, "Order deleted");
        }
        Ok(order_uid.to_string())
    }

    async fn insert_if_absent_inner(&self, order: &Order) -> Result<InsertOutcome, StoreError> {
        let mut tx = self.pool.begin().await?;

        let existing: Option<i64> =
            sqlx::query_scalar("SELECT id FROM orders WHERE order_uid = $1")
                .bind(&order.order_uid)
                .fetch_optional(&mut *tx)
                .await?;

        if existing.is_some() {
            tx.commit().await?;
            debug!(order_uid = %order.order_uid, "Order already stored, skipping");
            return Ok(InsertOutcome::AlreadyExists);
        }

        // The unique index on order_uid settles a race with a concurrent
        // delivery of the same order: the loser inserts nothing.
        let inserted = insert_header(&mut tx, INSERT_ORDER_IF_ABSENT, order).await?;
        let Some(order_id) = inserted else {
            tx.rollback().await?;
            warn!(
                order_uid = %order.order_uid,
                "Concurrent insert won the race, skipping"
            );
            return Ok(InsertOutcome::AlreadyExists);
        };

        insert_children(&mut tx, order_id, order).await?;
        tx.commit().await?;

        info!(order_uid = %order.order_uid, "Order persisted from stream");
        Ok(InsertOutcome::Created)
    }
}

#[async_trait]
impl OrderStore for PostgresOrderStore {
    async fn create(&self, order: &Order) -> Result<String, StoreError> {
        timed("create", self.create_inner(order)).await
    }

    async fn find_by_uid(&self, order_uid: &str) -> Result<Option<Order>, StoreError> {
        timed("find_by_uid", self.find_by_uid_inner(order_uid)).await
    }

    async fn list_all(&self) -> Result<Vec<Order>, StoreError> {
        timed("list_all", self.list_all_inner()).await
    }

    async fn update(&self, order: &Order) -> Result<String, StoreError> {
        timed("update", self.update_inner(order)).await
    }

    async fn delete(&self, order_uid: &str) -> Result<String, StoreError> {
        timed("delete", self.delete_inner(order_uid)).await
    }

    async fn insert_if_absent(&self, order: &Order) -> Result<InsertOutcome, StoreError> {
        timed("insert_if_absent", self.insert_if_absent_inner(order)).await
    }
}
