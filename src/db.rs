use std::{path::Path, str::FromStr};

use anyhow::Context;
use rust_decimal::Decimal;
use sqlx::{Sqlite, migrate::Migrator, sqlite::SqlitePoolOptions};

use crate::checkout::{
    interaction_log::InteractionLog,
    order::{Order, OrderStatus, OrderStore},
    record::MetaKey,
};

static MIGRATOR: Migrator = sqlx::migrate!(); // defaults to "./migrations"

const MAX_CONNECTIONS: u32 = 5;

#[derive(Debug, Clone)]
pub struct Db(sqlx::Pool<Sqlite>);

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: i64,
    total: String,
    currency: String,
    status: String,
}

impl TryFrom<OrderRow> for Order {
    type Error = anyhow::Error;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            total: Decimal::from_str(&row.total)
                .with_context(|| format!("order {} has invalid total {}", row.id, row.total))?,
            currency: row.currency,
            status: row.status.parse()?,
        })
    }
}

impl Db {
    pub async fn connect() -> anyhow::Result<Self> {
        let database_url =
            std::env::var("DATABASE_URL").context("DATABASE_URL env is not defined")?;
        tracing::debug!(%database_url);
        let path = Path::new(
            database_url
                .strip_prefix("sqlite://")
                .context("database url must start with sqlite://")?,
        );
        {
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .context("create database directory")?;
            }
            tokio::fs::OpenOptions::new()
                .write(true)
                .truncate(false)
                .create(true)
                .open(path)
                .await
                .context("open database file")?;
        }
        Ok(Self::connect_with(&database_url, MAX_CONNECTIONS).await?)
    }

    /// Connects and runs migrations. In-memory databases need a single connection.
    pub async fn connect_with(database_url: &str, max_connections: u32) -> sqlx::Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        MIGRATOR.run(&pool).await?;
        Ok(Self(pool))
    }

    #[cfg(test)]
    pub async fn insert_order(&self, order: &Order) -> sqlx::Result<()> {
        sqlx::query("INSERT INTO orders (id, total, currency, status) VALUES (?, ?, ?, ?)")
            .bind(order.id)
            .bind(order.total.to_string())
            .bind(&order.currency)
            .bind(order.status.as_str())
            .execute(&self.0)
            .await?;
        Ok(())
    }

    #[cfg(test)]
    pub async fn add_cart_item(&self, order_id: i64, product: &str) -> sqlx::Result<()> {
        sqlx::query("INSERT INTO cart_items (order_id, product) VALUES (?, ?)")
            .bind(order_id)
            .bind(product)
            .execute(&self.0)
            .await?;
        Ok(())
    }

    #[cfg(test)]
    async fn count(&self, sql: &str, order_id: i64) -> sqlx::Result<i64> {
        sqlx::query_scalar(sql)
            .bind(order_id)
            .fetch_one(&self.0)
            .await
    }
}

#[async_trait::async_trait]
impl OrderStore for Db {
    async fn order(&self, order_id: i64) -> anyhow::Result<Option<Order>> {
        let row: Option<OrderRow> =
            sqlx::query_as("SELECT id, total, currency, status FROM orders WHERE id = ?")
                .bind(order_id)
                .fetch_optional(&self.0)
                .await?;
        row.map(Order::try_from).transpose()
    }

    async fn set_status(&self, order_id: i64, status: OrderStatus) -> anyhow::Result<()> {
        let result = sqlx::query("UPDATE orders SET status = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(order_id)
            .execute(&self.0)
            .await?;
        anyhow::ensure!(result.rows_affected() == 1, "order {order_id} does not exist");
        tracing::debug!(order_id, %status, "Updated order status");
        Ok(())
    }

    async fn add_note(&self, order_id: i64, note: &str) -> anyhow::Result<()> {
        sqlx::query("INSERT INTO order_notes (order_id, note) VALUES (?, ?)")
            .bind(order_id)
            .bind(note)
            .execute(&self.0)
            .await?;
        Ok(())
    }

    async fn meta(&self, order_id: i64, key: MetaKey) -> anyhow::Result<Option<String>> {
        let value =
            sqlx::query_scalar("SELECT value FROM order_meta WHERE order_id = ? AND key = ?")
                .bind(order_id)
                .bind(key.as_str())
                .fetch_optional(&self.0)
                .await?;
        Ok(value)
    }

    async fn set_meta(&self, order_id: i64, key: MetaKey, value: &str) -> anyhow::Result<()> {
        sqlx::query(
            "INSERT INTO order_meta (order_id, key, value) VALUES (?, ?, ?)
             ON CONFLICT (order_id, key) DO UPDATE SET value = excluded.value",
        )
        .bind(order_id)
        .bind(key.as_str())
        .bind(value)
        .execute(&self.0)
        .await?;
        Ok(())
    }

    async fn empty_cart(&self, order_id: i64) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM cart_items WHERE order_id = ?")
            .bind(order_id)
            .execute(&self.0)
            .await?;
        Ok(())
    }

    async fn record_interaction(
        &self,
        order_id: i64,
        log: &InteractionLog,
    ) -> anyhow::Result<()> {
        sqlx::query("INSERT INTO gateway_interactions (order_id, kind, log) VALUES (?, ?, ?)")
            .bind(order_id)
            .bind(&log.kind)
            .bind(log.to_json()?)
            .execute(&self.0)
            .await?;
        Ok(())
    }
}
