use std::time::Duration;

use axum::http::HeaderMap;
use reqwest::StatusCode;
use serde::{Serialize, de::DeserializeOwned};

use crate::{
    checkout::interaction_log::InteractionSpan,
    config::GatewayConfig,
    gateway::{
        auth::authenticated_headers,
        error::{GatewayError, Rejection},
        transaction::{
            CreateTransactionResponse, ErrorBody, TransactionRequest, VerifyRequest,
            VerifyTransactionResponse,
        },
    },
};

/// Order total to gateway amount conversion
pub mod amount;
mod auth;
pub mod error;
/// Card data and secret masking for logs
pub mod mask;
/// Callback status codes and their messages
pub mod status;
/// Gateway request and response bodies
pub mod transaction;

pub type Result<T> = std::result::Result<T, GatewayError>;

/// Total tries for a call whose connection fails. There is no delay between tries.
pub const RETRY_ATTEMPTS: usize = 4;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Outbound side of the payment flow
#[async_trait::async_trait]
pub trait Gateway: Send + Sync {
    async fn create_transaction(
        &self,
        request: &TransactionRequest,
        span: &mut InteractionSpan,
    ) -> Result<CreateTransactionResponse>;

    async fn verify_transaction(
        &self,
        merchant_id: &str,
        tracking_code: &str,
        span: &mut InteractionSpan,
    ) -> Result<VerifyTransactionResponse>;
}

#[derive(Debug, Clone)]
pub struct NeginGateway {
    client: reqwest::Client,
    auth_token: String,
    payment_endpoint: String,
    verify_endpoint: String,
}

impl NeginGateway {
    pub const PAYMENT_ENDPOINT: &str = "https://api.neginpardakht.ir/v1/transaction/request";
    pub const VERIFY_ENDPOINT: &str = "https://api.neginpardakht.ir/v1/transaction/verify";

    pub fn new(
        auth_token: impl Into<String>,
        payment_endpoint: impl Into<String>,
        verify_endpoint: impl Into<String>,
    ) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            auth_token: auth_token.into(),
            payment_endpoint: payment_endpoint.into(),
            verify_endpoint: verify_endpoint.into(),
        })
    }

    pub fn from_config(config: &GatewayConfig) -> reqwest::Result<Self> {
        Self::new(
            config.auth_token.clone(),
            config.payment_endpoint.clone(),
            config.verify_endpoint.clone(),
        )
    }

    /// Posts a json body, retrying only when the connection itself fails.
    /// Non-200 answers come back as [GatewayError::GatewayResponse] right away.
    async fn post<B, T>(&self, url: &str, body: &B, span: &mut InteractionSpan) -> Result<T>
    where
        B: Serialize + Sync + ?Sized,
        T: DeserializeOwned,
    {
        let headers = authenticated_headers(&self.auth_token)?;
        let secured_request = mask::secure_serializable(body);
        tracing::debug!(%url, data = %secured_request, "Gateway API request");
        span.set_request(url.to_string(), secured_request);

        let (status, text) = loop {
            span.record_attempt();
            let attempt = span.attempts();
            match self.send(url, body, headers.clone()).await {
                Ok(reply) => break reply,
                Err(e) if attempt < RETRY_ATTEMPTS => {
                    tracing::warn!(attempt, %url, "Gateway API request failed, retrying: {e}");
                }
                Err(e) => {
                    tracing::error!(attempt, %url, "Gateway API request failed: {e}");
                    span.set_error(&e);
                    return Err(GatewayError::Transport {
                        attempts: attempt,
                        source: e,
                    });
                }
            }
        };
        span.set_response_status(status.as_u16());

        let response = serde_json::from_str::<serde_json::Value>(&text);
        if let Ok(value) = &response {
            let secured_response = mask::secure_value(value);
            tracing::debug!(data = %secured_response, %status, "Gateway API response");
            span.set_response(secured_response);
        }

        if status != StatusCode::OK {
            let body = response
                .ok()
                .and_then(|value| serde_json::from_value::<ErrorBody>(value).ok())
                .unwrap_or_default();
            let rejection = Rejection {
                http_status: status.as_u16(),
                error_code: body.error_code,
                error_message: body.error_message,
            };
            tracing::warn!(%url, %rejection, "Gateway API rejected request");
            span.set_error(&rejection);
            return Err(rejection.into());
        }

        let response = response.inspect_err(|e| {
            tracing::warn!(%url, "Gateway API response is not json: {e}");
            span.set_error(e);
        })?;
        Ok(serde_json::from_value(response)?)
    }

    async fn send<B>(
        &self,
        url: &str,
        body: &B,
        headers: HeaderMap,
    ) -> reqwest::Result<(StatusCode, String)>
    where
        B: Serialize + Sync + ?Sized,
    {
        let res = self
            .client
            .post(url)
            .json(body)
            .headers(headers)
            .send()
            .await?;
        let status = res.status();
        let text = res.text().await?;
        Ok((status, text))
    }
}

#[async_trait::async_trait]
impl Gateway for NeginGateway {
    async fn create_transaction(
        &self,
        request: &TransactionRequest,
        span: &mut InteractionSpan,
    ) -> Result<CreateTransactionResponse> {
        self.post(&self.payment_endpoint, request, span).await
    }

    async fn verify_transaction(
        &self,
        merchant_id: &str,
        tracking_code: &str,
        span: &mut InteractionSpan,
    ) -> Result<VerifyTransactionResponse> {
        let request = VerifyRequest {
            merchant_id,
            tracking_code,
        };
        self.post(&self.verify_endpoint, &request, span).await
    }
}
