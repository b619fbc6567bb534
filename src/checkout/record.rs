use crate::{
    checkout::order::OrderStore,
    gateway::{status::TransactionStatus, transaction::VerifyTransactionResponse},
};

/// Order metadata keys owned by the payment flow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetaKey {
    TransactionId,
    TransactionStatus,
    TrackId,
    TransactionOrderId,
    TransactionAmount,
    PaymentCardNo,
    PaymentCardHash,
    PaymentDate,
}

impl MetaKey {
    pub const ALL: [MetaKey; 8] = [
        MetaKey::TransactionId,
        MetaKey::TransactionStatus,
        MetaKey::TrackId,
        MetaKey::TransactionOrderId,
        MetaKey::TransactionAmount,
        MetaKey::PaymentCardNo,
        MetaKey::PaymentCardHash,
        MetaKey::PaymentDate,
    ];

    /// Storage key, namespaced so it can live next to other plugins' metadata
    pub fn as_str(self) -> &'static str {
        match self {
            Self::TransactionId => "negin_transaction_id",
            Self::TransactionStatus => "negin_transaction_status",
            Self::TrackId => "negin_track_id",
            Self::TransactionOrderId => "negin_transaction_order_id",
            Self::TransactionAmount => "negin_transaction_amount",
            Self::PaymentCardNo => "negin_payment_card_no",
            Self::PaymentCardHash => "negin_payment_card_hash",
            Self::PaymentDate => "negin_payment_date",
        }
    }
}

/// Typed view over the transaction metadata of one order
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TransactionRecord {
    /// Gateway transaction id, set to the tracking code when the transaction is created
    pub transaction_id: Option<String>,
    pub tracking_code: Option<String>,
    /// Local status code, see [TransactionStatus]
    pub status: Option<u16>,
    pub order_id: Option<String>,
    pub amount: Option<u64>,
    pub card_number_masked: Option<String>,
    pub card_number_hash: Option<String>,
    pub payment_date: Option<String>,
}

impl TransactionRecord {
    /// Record written right after the gateway accepted a new transaction
    pub fn created(tracking_code: &str) -> Self {
        Self {
            transaction_id: Some(tracking_code.to_string()),
            status: Some(TransactionStatus::Tokenized.code()),
            ..Default::default()
        }
    }

    /// Full record of a transaction confirmed by the verify call
    pub fn verified(response: &VerifyTransactionResponse) -> Self {
        let payment = response.payment.clone().unwrap_or_default();
        Self {
            transaction_id: response.id.clone(),
            tracking_code: response.tracking_code.clone(),
            status: Some(TransactionStatus::Confirmed.code()),
            order_id: response.order_id.clone(),
            amount: response.amount,
            card_number_masked: payment.card_number_masked,
            card_number_hash: payment.card_number_hash,
            payment_date: payment.date,
        }
    }

    /// Key-value form, absent fields are left out so they never clear stored values
    pub fn to_meta(&self) -> Vec<(MetaKey, String)> {
        let fields = [
            (MetaKey::TransactionId, self.transaction_id.clone()),
            (MetaKey::TransactionStatus, self.status.map(|s| s.to_string())),
            (MetaKey::TrackId, self.tracking_code.clone()),
            (MetaKey::TransactionOrderId, self.order_id.clone()),
            (MetaKey::TransactionAmount, self.amount.map(|a| a.to_string())),
            (MetaKey::PaymentCardNo, self.card_number_masked.clone()),
            (MetaKey::PaymentCardHash, self.card_number_hash.clone()),
            (MetaKey::PaymentDate, self.payment_date.clone()),
        ];
        fields
            .into_iter()
            .filter_map(|(key, value)| value.map(|value| (key, value)))
            .collect()
    }

    pub fn from_meta(pairs: impl IntoIterator<Item = (MetaKey, String)>) -> Self {
        let mut record = Self::default();
        for (key, value) in pairs {
            match key {
                MetaKey::TransactionId => record.transaction_id = Some(value),
                MetaKey::TransactionStatus => record.status = value.parse().ok(),
                MetaKey::TrackId => record.tracking_code = Some(value),
                MetaKey::TransactionOrderId => record.order_id = Some(value),
                MetaKey::TransactionAmount => record.amount = value.parse().ok(),
                MetaKey::PaymentCardNo => record.card_number_masked = Some(value),
                MetaKey::PaymentCardHash => record.card_number_hash = Some(value),
                MetaKey::PaymentDate => record.payment_date = Some(value),
            }
        }
        record
    }

    pub async fn load(store: &impl OrderStore, order_id: i64) -> anyhow::Result<Self> {
        let mut pairs = Vec::with_capacity(MetaKey::ALL.len());
        for key in MetaKey::ALL {
            if let Some(value) = store.meta(order_id, key).await? {
                pairs.push((key, value));
            }
        }
        Ok(Self::from_meta(pairs))
    }

    pub async fn save(&self, store: &impl OrderStore, order_id: i64) -> anyhow::Result<()> {
        for (key, value) in self.to_meta() {
            store.set_meta(order_id, key, &value).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::{MetaKey, TransactionRecord};
    use crate::{
        checkout::order::{Order, OrderStatus, memory::MemoryStore},
        gateway::transaction::{PaymentDetails, VerifyTransactionResponse},
    };

    #[test]
    fn absent_fields_are_not_written() {
        let record = TransactionRecord::created("TRK-1");
        assert_eq!(
            record.to_meta(),
            vec![
                (MetaKey::TransactionId, "TRK-1".to_string()),
                (MetaKey::TransactionStatus, "1".to_string()),
            ]
        );
    }

    #[test]
    fn verified_record_projects_payment_fields() {
        let response = VerifyTransactionResponse {
            status: Some(true),
            tracking_code: Some("TRK-1".into()),
            id: Some("TRK-1".into()),
            order_id: Some("42".into()),
            amount: Some(1_000_000),
            payment: Some(PaymentDetails {
                card_number_masked: Some("603799******7890".into()),
                card_number_hash: Some("c0ffee".into()),
                date: Some("2024-01-01 10:00:00".into()),
            }),
            ..Default::default()
        };
        let record = TransactionRecord::verified(&response);
        assert_eq!(record.status, Some(3));
        assert_eq!(record.amount, Some(1_000_000));
        assert_eq!(record.card_number_hash.as_deref(), Some("c0ffee"));
        assert_eq!(TransactionRecord::from_meta(record.to_meta()), record);
    }

    #[test]
    fn garbage_numbers_read_as_absent() {
        let record = TransactionRecord::from_meta([
            (MetaKey::TransactionStatus, "true".to_string()),
            (MetaKey::TransactionAmount, "12a".to_string()),
        ]);
        assert_eq!(record, TransactionRecord::default());
    }

    #[tokio::test]
    async fn saves_and_loads_through_store() {
        let store = MemoryStore::with_order(Order {
            id: 42,
            total: dec!(100000),
            currency: "IRT".into(),
            status: OrderStatus::Pending,
        });
        let record = TransactionRecord::created("TRK-1");
        record.save(&store, 42).await.unwrap();

        assert_eq!(store.meta_value(42, MetaKey::TransactionId).as_deref(), Some("TRK-1"));
        assert_eq!(TransactionRecord::load(&store, 42).await.unwrap(), record);
    }
}
