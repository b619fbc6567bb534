use serde::{Deserialize, Serialize};

use crate::gateway::error::Rejection;

/// Body of the create transaction call
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRequest {
    pub order_id: i64,
    pub merchant_id: String,
    /// Amount in rials
    pub amount: u64,
    pub callback_url: String,
    pub description: String,
}

/// Body of the verify transaction call
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyRequest<'a> {
    pub merchant_id: &'a str,
    pub tracking_code: &'a str,
}

#[derive(Debug, Default, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CreateTransactionResponse {
    #[serde(default, deserialize_with = "lenient::flag")]
    pub status: Option<bool>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub tracking_code: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub payment_url: Option<String>,
    #[serde(default, rename = "error_code", deserialize_with = "lenient::text")]
    pub error_code: Option<String>,
    #[serde(default, rename = "error_message", deserialize_with = "lenient::text")]
    pub error_message: Option<String>,
}

impl CreateTransactionResponse {
    /// Error reported inside a 200 response: a falsy status or any error field
    pub fn embedded_rejection(&self) -> Option<Rejection> {
        let failed = self.status != Some(true)
            || self.error_code.is_some()
            || self.error_message.is_some();
        failed.then(|| Rejection {
            http_status: 200,
            error_code: self.error_code.clone(),
            error_message: self.error_message.clone(),
        })
    }
}

#[derive(Debug, Default, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VerifyTransactionResponse {
    #[serde(default, deserialize_with = "lenient::flag")]
    pub status: Option<bool>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub tracking_code: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub order_id: Option<String>,
    #[serde(default, deserialize_with = "lenient::amount")]
    pub amount: Option<u64>,
    #[serde(default)]
    pub payment: Option<PaymentDetails>,
    #[serde(default, rename = "error_code", deserialize_with = "lenient::text")]
    pub error_code: Option<String>,
    #[serde(default, rename = "error_message", deserialize_with = "lenient::text")]
    pub error_message: Option<String>,
}

impl VerifyTransactionResponse {
    /// Error fields reported inside a 200 response. A falsy status alone is
    /// not a rejection, the caller treats it as an unsuccessful payment.
    pub fn embedded_rejection(&self) -> Option<Rejection> {
        let failed = self.error_code.is_some() || self.error_message.is_some();
        failed.then(|| Rejection {
            http_status: 200,
            error_code: self.error_code.clone(),
            error_message: self.error_message.clone(),
        })
    }
}

#[derive(Debug, Default, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PaymentDetails {
    #[serde(default, deserialize_with = "lenient::text")]
    pub card_number_masked: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub card_number_hash: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub date: Option<String>,
}

/// Error fields of a non-200 body
#[derive(Debug, Default, Deserialize)]
pub struct ErrorBody {
    #[serde(default, deserialize_with = "lenient::text")]
    pub error_code: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub error_message: Option<String>,
}

/// The gateway is loose about json types: numbers arrive as strings and the
/// other way around. Empty values are treated as absent.
mod lenient {
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    pub fn text<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
        let value = Option::<Value>::deserialize(d)?;
        Ok(match value {
            Some(Value::String(s)) => Some(s.trim().to_string()).filter(|s| !s.is_empty()),
            Some(Value::Number(n)) => Some(n.to_string()),
            Some(Value::Bool(b)) => Some(b.to_string()),
            _ => None,
        })
    }

    pub fn flag<'de, D: Deserializer<'de>>(d: D) -> Result<Option<bool>, D::Error> {
        let value = Option::<Value>::deserialize(d)?;
        Ok(match value {
            Some(Value::Bool(b)) => Some(b),
            Some(Value::Number(n)) => Some(n.as_f64() == Some(1.0)),
            Some(Value::String(s)) => match s.trim().to_lowercase().as_str() {
                "" => None,
                "1" | "true" => Some(true),
                _ => Some(false),
            },
            _ => None,
        })
    }

    pub fn amount<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u64>, D::Error> {
        let value = Option::<Value>::deserialize(d)?;
        let amount = match value {
            Some(Value::Number(n)) => n.as_u64().or_else(|| {
                n.as_f64()
                    .filter(|f| f.fract() == 0.0 && *f >= 0.0 && *f <= u64::MAX as f64)
                    .map(|f| f as u64)
            }),
            Some(Value::String(s)) => s.trim().parse().ok(),
            _ => None,
        };
        Ok(amount.filter(|amount| *amount != 0))
    }
}
