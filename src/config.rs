use std::str::FromStr;

use anyhow::Context;

use crate::{checkout::order::OrderStatus, gateway::NeginGateway};

const DEFAULT_SUCCESS_MESSAGE: &str = "Your payment was successful. Tracking code: {track_id}";
const DEFAULT_FAILED_MESSAGE: &str =
    "Your payment was not completed. Please try again or contact the store administrator.";

/// Order status applied after a verified payment
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TargetOrderStatus {
    #[default]
    Completed,
    Processing,
}

impl FromStr for TargetOrderStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "completed" => Ok(Self::Completed),
            "processing" => Ok(Self::Processing),
            other => Err(anyhow::anyhow!("unknown order status: {other}")),
        }
    }
}

impl From<TargetOrderStatus> for OrderStatus {
    fn from(value: TargetOrderStatus) -> Self {
        match value {
            TargetOrderStatus::Completed => OrderStatus::Completed,
            TargetOrderStatus::Processing => OrderStatus::Processing,
        }
    }
}

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub auth_token: String,
    pub merchant_id: String,
    pub target_order_status: TargetOrderStatus,
    /// Supports `{track_id}` and `{order_id}` placeholders
    pub success_message: String,
    /// Supports `{track_id}` and `{order_id}` placeholders
    pub failed_message: String,
    pub payment_endpoint: String,
    pub verify_endpoint: String,
    /// Public base url of this service, the gateway sends shoppers back here
    pub callback_base_url: String,
    /// Where shoppers land after a failed payment
    pub checkout_url: String,
    /// Where shoppers land after a successful payment, supports `{order_id}`
    pub order_received_url: String,
}

impl GatewayConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads the configuration through `lookup`, empty values count as missing
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let required = |key: &str| get(key).with_context(|| format!("{key} env is not defined"));

        let target_order_status = match get("NEGIN_ORDER_STATUS") {
            Some(raw) => raw.parse().unwrap_or_else(|e| {
                tracing::warn!("Falling back to completed order status: {e}");
                TargetOrderStatus::default()
            }),
            None => TargetOrderStatus::default(),
        };

        Ok(Self {
            auth_token: required("NEGIN_AUTH_TOKEN")?,
            merchant_id: required("NEGIN_MERCHANT_ID")?,
            target_order_status,
            success_message: get("NEGIN_SUCCESS_MESSAGE")
                .unwrap_or_else(|| DEFAULT_SUCCESS_MESSAGE.to_string()),
            failed_message: get("NEGIN_FAILED_MESSAGE")
                .unwrap_or_else(|| DEFAULT_FAILED_MESSAGE.to_string()),
            payment_endpoint: get("NEGIN_PAYMENT_ENDPOINT")
                .unwrap_or_else(|| NeginGateway::PAYMENT_ENDPOINT.to_string()),
            verify_endpoint: get("NEGIN_VERIFY_ENDPOINT")
                .unwrap_or_else(|| NeginGateway::VERIFY_ENDPOINT.to_string()),
            callback_base_url: absolute_url(required("CALLBACK_URL")?)
                .context("CALLBACK_URL must be an absolute url")?
                .trim_end_matches('/')
                .to_string(),
            checkout_url: required("CHECKOUT_URL")?,
            order_received_url: required("ORDER_RECEIVED_URL")?,
        })
    }

    pub fn success_notice(&self, track_id: Option<&str>, order_id: i64) -> String {
        render(&self.success_message, track_id, order_id)
    }

    pub fn failed_notice(&self, track_id: Option<&str>, order_id: i64) -> String {
        render(&self.failed_message, track_id, order_id)
    }

    pub fn order_received_url(&self, order_id: i64) -> String {
        self.order_received_url
            .replace("{order_id}", &order_id.to_string())
    }
}

/// The gateway sends shoppers back to this address, so it cannot be relative
fn absolute_url(raw: String) -> anyhow::Result<String> {
    let url = reqwest::Url::parse(&raw)?;
    anyhow::ensure!(!url.cannot_be_a_base(), "{raw} has no host");
    Ok(raw)
}

fn render(template: &str, track_id: Option<&str>, order_id: i64) -> String {
    template
        .replace("{track_id}", track_id.unwrap_or_default())
        .replace("{order_id}", &order_id.to_string())
}
