use std::{fmt::Display, str::FromStr};

use rust_decimal::Decimal;

use crate::checkout::{interaction_log::InteractionLog, record::MetaKey};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderStatus {
    Pending,
    OnHold,
    Processing,
    Completed,
    Failed,
    Cancelled,
    Refunded,
}

impl OrderStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::OnHold => "on-hold",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
            Self::Refunded => "refunded",
        }
    }

    /// The order has been paid and must not be processed again
    pub fn is_paid(self) -> bool {
        matches!(self, Self::Completed | Self::Processing)
    }
}

impl Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let status = match s {
            "pending" => Self::Pending,
            "on-hold" => Self::OnHold,
            "processing" => Self::Processing,
            "completed" => Self::Completed,
            "failed" => Self::Failed,
            "cancelled" => Self::Cancelled,
            "refunded" => Self::Refunded,
            other => anyhow::bail!("unknown order status: {other}"),
        };
        Ok(status)
    }
}

/// Order owned by the store, the payment flow only reads it and moves its status
#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub id: i64,
    pub total: Decimal,
    pub currency: String,
    pub status: OrderStatus,
}

/// Order side of the payment flow: orders, their notes and per-order metadata.
///
/// Every write is a single independent key write, callers must not rely on a
/// group of writes being atomic.
#[async_trait::async_trait]
pub trait OrderStore: Send + Sync {
    async fn order(&self, order_id: i64) -> anyhow::Result<Option<Order>>;

    async fn set_status(&self, order_id: i64, status: OrderStatus) -> anyhow::Result<()>;

    /// Appends to the order's audit log
    async fn add_note(&self, order_id: i64, note: &str) -> anyhow::Result<()>;

    async fn meta(&self, order_id: i64, key: MetaKey) -> anyhow::Result<Option<String>>;

    async fn set_meta(&self, order_id: i64, key: MetaKey, value: &str) -> anyhow::Result<()>;

    async fn empty_cart(&self, order_id: i64) -> anyhow::Result<()>;

    async fn record_interaction(&self, order_id: i64, log: &InteractionLog) -> anyhow::Result<()>;
}

#[cfg(test)]
pub mod memory {
    use std::{
        collections::HashMap,
        sync::{Arc, Mutex},
    };

    use super::{Order, OrderStatus, OrderStore};
    use crate::checkout::{interaction_log::InteractionLog, record::MetaKey};

    #[derive(Debug, Default)]
    struct Inner {
        orders: HashMap<i64, Order>,
        notes: HashMap<i64, Vec<String>>,
        meta: HashMap<(i64, MetaKey), String>,
        emptied_carts: Vec<i64>,
        interactions: Vec<(i64, String)>,
    }

    /// In-memory store, clones share state
    #[derive(Debug, Clone, Default)]
    pub struct MemoryStore(Arc<Mutex<Inner>>);

    impl MemoryStore {
        pub fn with_order(order: Order) -> Self {
            let store = Self::default();
            store.0.lock().unwrap().orders.insert(order.id, order);
            store
        }

        pub fn status(&self, order_id: i64) -> OrderStatus {
            self.0.lock().unwrap().orders[&order_id].status
        }

        pub fn notes(&self, order_id: i64) -> Vec<String> {
            let inner = self.0.lock().unwrap();
            inner.notes.get(&order_id).cloned().unwrap_or_default()
        }

        pub fn meta_value(&self, order_id: i64, key: MetaKey) -> Option<String> {
            self.0.lock().unwrap().meta.get(&(order_id, key)).cloned()
        }

        pub fn put_meta(&self, order_id: i64, key: MetaKey, value: &str) {
            let mut inner = self.0.lock().unwrap();
            inner.meta.insert((order_id, key), value.to_string());
        }

        pub fn cart_emptied(&self, order_id: i64) -> bool {
            self.0.lock().unwrap().emptied_carts.contains(&order_id)
        }

        pub fn interaction_kinds(&self) -> Vec<String> {
            let inner = self.0.lock().unwrap();
            inner.interactions.iter().map(|(_, k)| k.clone()).collect()
        }
    }

    #[async_trait::async_trait]
    impl OrderStore for MemoryStore {
        async fn order(&self, order_id: i64) -> anyhow::Result<Option<Order>> {
            Ok(self.0.lock().unwrap().orders.get(&order_id).cloned())
        }

        async fn set_status(&self, order_id: i64, status: OrderStatus) -> anyhow::Result<()> {
            let mut inner = self.0.lock().unwrap();
            let order = inner
                .orders
                .get_mut(&order_id)
                .ok_or_else(|| anyhow::anyhow!("order {order_id} does not exist"))?;
            order.status = status;
            Ok(())
        }

        async fn add_note(&self, order_id: i64, note: &str) -> anyhow::Result<()> {
            let mut inner = self.0.lock().unwrap();
            inner
                .notes
                .entry(order_id)
                .or_default()
                .push(note.to_string());
            Ok(())
        }

        async fn meta(&self, order_id: i64, key: MetaKey) -> anyhow::Result<Option<String>> {
            Ok(self.meta_value(order_id, key))
        }

        async fn set_meta(&self, order_id: i64, key: MetaKey, value: &str) -> anyhow::Result<()> {
            self.put_meta(order_id, key, value);
            Ok(())
        }

        async fn empty_cart(&self, order_id: i64) -> anyhow::Result<()> {
            self.0.lock().unwrap().emptied_carts.push(order_id);
            Ok(())
        }

        async fn record_interaction(
            &self,
            order_id: i64,
            log: &InteractionLog,
        ) -> anyhow::Result<()> {
            let mut inner = self.0.lock().unwrap();
            inner.interactions.push((order_id, log.kind.clone()));
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::OrderStatus;

    #[test]
    fn status_text_round_trips() {
        for status in [
            OrderStatus::Pending,
            OrderStatus::OnHold,
            OrderStatus::Processing,
            OrderStatus::Completed,
            OrderStatus::Failed,
            OrderStatus::Cancelled,
            OrderStatus::Refunded,
        ] {
            assert_eq!(status.as_str().parse::<OrderStatus>().unwrap(), status);
        }
        assert!("shipped".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn only_completed_and_processing_are_paid() {
        assert!(OrderStatus::Completed.is_paid());
        assert!(OrderStatus::Processing.is_paid());
        assert!(!OrderStatus::Failed.is_paid());
        assert!(!OrderStatus::Pending.is_paid());
    }
}
