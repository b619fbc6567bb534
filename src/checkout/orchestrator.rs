use std::sync::Arc;

use tracing::instrument;

use crate::{
    checkout::{
        Initiation, Notice, Operation, PaymentError, ReturnOutcome, TransactionState,
        callback::CallbackPayload,
        interaction_log::InteractionSpan,
        order::{Order, OrderStatus, OrderStore},
        record::{MetaKey, TransactionRecord},
    },
    config::GatewayConfig,
    gateway::{
        Gateway, amount,
        error::Rejection,
        status::{StatusMessage, TransactionStatus},
        transaction::{TransactionRequest, VerifyTransactionResponse},
    },
};

pub const METHOD_ID: &str = "negin";

const INVALID_ORDER_NOTICE: &str = "No order was found with this id. Please try again and contact the store administrator if the problem persists.";

/// Drives a payment from transaction creation to the verified return callback
#[derive(Debug, Clone)]
pub struct Orchestrator<S, G> {
    store: S,
    gateway: G,
    config: Arc<GatewayConfig>,
}

impl<S: OrderStore, G: Gateway> Orchestrator<S, G> {
    pub fn new(store: S, gateway: G, config: Arc<GatewayConfig>) -> Self {
        Self {
            store,
            gateway,
            config,
        }
    }

    /// Unique return address of an order
    pub fn callback_url(&self, order_id: i64) -> String {
        format!(
            "{}/payments/{METHOD_ID}/callback?order_id={order_id}",
            self.config.callback_base_url
        )
    }

    /// Creates a gateway transaction for the order and returns where to send the shopper
    #[instrument(skip(self))]
    pub async fn initiate(&self, order_id: i64) -> Result<Initiation, PaymentError> {
        let order = self
            .store
            .order(order_id)
            .await?
            .ok_or(PaymentError::UnknownOrder(order_id))?;
        if order.status.is_paid() {
            return Err(PaymentError::AlreadyPaid(order_id));
        }
        tracing::info!(state = ?TransactionState::Initiated, "Starting payment");

        match self.create_transaction(&order).await {
            Ok(initiation) => Ok(initiation),
            Err(PaymentError::Store(e)) => Err(PaymentError::Store(e)),
            Err(e) => {
                tracing::error!("Failed to create a transaction: {e}");
                self.store.add_note(order_id, &e.to_string()).await?;
                Err(e)
            }
        }
    }

    async fn create_transaction(&self, order: &Order) -> Result<Initiation, PaymentError> {
        let amount = amount::normalize(order.total, &order.currency);
        if amount == 0 {
            return Err(PaymentError::UnsupportedCurrency(order.currency.clone()));
        }
        let request = TransactionRequest {
            order_id: order.id,
            merchant_id: self.config.merchant_id.clone(),
            amount,
            callback_url: self.callback_url(order.id),
            description: format!("Order number #{}", order.id),
        };

        let mut span = InteractionSpan::enter();
        let result = self.gateway.create_transaction(&request, &mut span).await;
        self.record_interaction(order.id, span, "create_transaction").await;
        let response = result.map_err(|e| PaymentError::gateway(Operation::Create, e))?;

        if let Some(rejection) = response.embedded_rejection() {
            return Err(PaymentError::GatewayRejected {
                operation: Operation::Create,
                rejection,
            });
        }
        let (Some(tracking_code), Some(redirect_url)) =
            (response.tracking_code, response.payment_url)
        else {
            return Err(PaymentError::GatewayRejected {
                operation: Operation::Create,
                rejection: Rejection {
                    http_status: 200,
                    error_code: None,
                    error_message: Some("response has no tracking code or payment url".into()),
                },
            });
        };

        TransactionRecord::created(&tracking_code)
            .save(&self.store, order.id)
            .await?;
        self.store.set_status(order.id, OrderStatus::Pending).await?;
        self.store
            .add_note(order.id, &format!("transaction id: {tracking_code}"))
            .await?;
        tracing::info!(%tracking_code, state = ?TransactionState::AwaitingReturn, "Created transaction");

        Ok(Initiation {
            order_id: order.id,
            state: TransactionState::AwaitingReturn,
            tracking_code,
            redirect_url,
        })
    }

    /// Settles the order the shopper returned for. Business failures come back as a
    /// failed outcome, `Err` is reserved for order store failures.
    #[instrument(skip_all)]
    pub async fn handle_return(
        &self,
        payload: CallbackPayload,
    ) -> Result<ReturnOutcome, PaymentError> {
        let payload = payload.sanitized();
        let order = match self.resolve(&payload).await {
            Ok(order) => order,
            Err(e @ PaymentError::InvalidCallback(_)) => {
                tracing::warn!("Rejected payment callback: {e}");
                let notice = format!("{INVALID_ORDER_NOTICE} {}", StatusMessage(None));
                return Ok(ReturnOutcome {
                    order_id: None,
                    state: TransactionState::Failed,
                    notice: Notice::error(notice),
                    redirect_url: self.config.checkout_url.clone(),
                });
            }
            Err(e) => return Err(e),
        };

        if order.status.is_paid() {
            tracing::info!(order_id = order.id, "Order is already paid, skipping callback");
            let record = TransactionRecord::load(&self.store, order.id).await?;
            return Ok(self.completed(order.id, record.tracking_code.as_deref()));
        }
        if order.status == OrderStatus::Failed {
            tracing::info!(order_id = order.id, "Order has already failed, skipping callback");
            let record = TransactionRecord::load(&self.store, order.id).await?;
            let notice = self
                .config
                .failed_notice(record.tracking_code.as_deref(), order.id);
            return Ok(self.failed(order.id, notice));
        }

        match self.settle(&order, &payload).await {
            Ok(outcome) => Ok(outcome),
            Err(PaymentError::Store(e)) => Err(PaymentError::Store(e)),
            Err(e) => self.reject(&order, e).await,
        }
    }

    async fn resolve(&self, payload: &CallbackPayload) -> Result<Order, PaymentError> {
        if payload.id.is_none() {
            return Err(PaymentError::InvalidCallback("missing transaction id"));
        }
        let order_id = payload
            .order_id
            .as_deref()
            .ok_or(PaymentError::InvalidCallback("missing order id"))?
            .parse::<i64>()
            .map_err(|_| PaymentError::InvalidCallback("order id is not a number"))?;
        self.store
            .order(order_id)
            .await?
            .ok_or(PaymentError::InvalidCallback("order does not exist"))
    }

    async fn settle(
        &self,
        order: &Order,
        payload: &CallbackPayload,
    ) -> Result<ReturnOutcome, PaymentError> {
        let status = payload.status.as_deref().and_then(TransactionStatus::parse);
        let presented_id = payload.id.clone().unwrap_or_default();

        TransactionRecord {
            status: status.map(TransactionStatus::code),
            tracking_code: payload.tracking_code.clone(),
            order_id: payload.order_id.clone(),
            ..Default::default()
        }
        .save(&self.store, order.id)
        .await?;
        self.store
            .add_note(
                order.id,
                &format!(
                    "Gateway callback: status {}, tracking code {}, transaction id {presented_id}",
                    payload.status.as_deref().unwrap_or("<none>"),
                    payload.tracking_code.as_deref().unwrap_or("<none>"),
                ),
            )
            .await?;

        if status != Some(TransactionStatus::PAID) {
            return Err(PaymentError::Declined(status));
        }

        let expected_id = match self.store.meta(order.id, MetaKey::TransactionId).await? {
            Some(id) if id == presented_id => id,
            expected => {
                return Err(PaymentError::DoubleSpendMismatch {
                    expected,
                    presented: presented_id,
                });
            }
        };

        let Some(tracking_code) = payload.tracking_code.as_deref() else {
            return Err(PaymentError::VerificationFailed("callback has no tracking code"));
        };
        if tracking_code != expected_id {
            return Err(PaymentError::DoubleSpendMismatch {
                expected: Some(expected_id),
                presented: tracking_code.to_string(),
            });
        }

        tracing::info!(order_id = order.id, state = ?TransactionState::Verifying, "Verifying transaction");
        let mut span = InteractionSpan::enter();
        let result = self
            .gateway
            .verify_transaction(&self.config.merchant_id, &expected_id, &mut span)
            .await;
        self.record_interaction(order.id, span, "verify_transaction").await;
        let verification = result.map_err(|e| PaymentError::gateway(Operation::Verify, e))?;
        self.store
            .add_note(order.id, &verification_note(&verification))
            .await?;

        if let Some(rejection) = verification.embedded_rejection() {
            return Err(PaymentError::GatewayRejected {
                operation: Operation::Verify,
                rejection,
            });
        }
        if verification.status != Some(true) {
            return Err(PaymentError::VerificationFailed(
                "gateway reports the payment as unsuccessful",
            ));
        }
        let Some(verified_code) = verification.tracking_code.as_deref() else {
            return Err(PaymentError::VerificationFailed("verification has no tracking code"));
        };
        if verified_code != expected_id {
            return Err(PaymentError::DoubleSpendMismatch {
                expected: Some(expected_id),
                presented: verified_code.to_string(),
            });
        }
        if verification
            .order_id
            .as_deref()
            .is_some_and(|id| id != order.id.to_string())
        {
            return Err(PaymentError::VerificationFailed(
                "verified transaction belongs to another order",
            ));
        }
        let expected_amount = amount::normalize(order.total, &order.currency);
        if verification.amount != Some(expected_amount) {
            return Err(PaymentError::AmountMismatch {
                expected: expected_amount,
                reported: verification.amount,
            });
        }

        TransactionRecord::verified(&verification)
            .save(&self.store, order.id)
            .await?;
        let target = OrderStatus::from(self.config.target_order_status);
        self.store.set_status(order.id, target).await?;
        self.store
            .add_note(
                order.id,
                &format!(
                    "Payment completed, transaction id: {}",
                    verification.id.as_deref().unwrap_or("<none>")
                ),
            )
            .await?;
        self.store.empty_cart(order.id).await?;
        tracing::info!(order_id = order.id, state = ?TransactionState::Completed, status = %target, "Payment verified");

        Ok(self.completed(order.id, verification.tracking_code.as_deref()))
    }

    /// Terminal failure: audit note, order status and the shopper notice
    async fn reject(
        &self,
        order: &Order,
        error: PaymentError,
    ) -> Result<ReturnOutcome, PaymentError> {
        tracing::warn!(order_id = order.id, state = ?TransactionState::Failed, "Payment failed: {error}");
        if error.fails_order() {
            self.store.set_status(order.id, OrderStatus::Failed).await?;
        }
        self.store.add_note(order.id, &error.to_string()).await?;

        let track_id = self.store.meta(order.id, MetaKey::TrackId).await?;
        let failed_notice = self.config.failed_notice(track_id.as_deref(), order.id);
        let notice = match &error {
            PaymentError::GatewayRejected { rejection, .. } => {
                rejection.notice().unwrap_or(failed_notice)
            }
            PaymentError::TransportFailure { source, .. } => format!("{failed_notice} {source}"),
            PaymentError::Declined(status) => format!("{failed_notice} {}", StatusMessage(*status)),
            _ => failed_notice,
        };
        Ok(self.failed(order.id, notice))
    }

    fn completed(&self, order_id: i64, track_id: Option<&str>) -> ReturnOutcome {
        ReturnOutcome {
            order_id: Some(order_id),
            state: TransactionState::Completed,
            notice: Notice::success(self.config.success_notice(track_id, order_id)),
            redirect_url: self.config.order_received_url(order_id),
        }
    }

    fn failed(&self, order_id: i64, notice: String) -> ReturnOutcome {
        ReturnOutcome {
            order_id: Some(order_id),
            state: TransactionState::Failed,
            notice: Notice::error(notice),
            redirect_url: self.config.checkout_url.clone(),
        }
    }

    async fn record_interaction(&self, order_id: i64, span: InteractionSpan, kind: &str) {
        let log = span.interaction_log(kind);
        if let Err(e) = self.store.record_interaction(order_id, &log).await {
            tracing::error!(order_id, "Failed to record gateway interaction: {e}");
        }
    }
}

fn verification_note(verification: &VerifyTransactionResponse) -> String {
    let payment = verification.payment.clone().unwrap_or_default();
    format!(
        "Transaction payment status: {}, tracking code: {}, payer card number: {}, payer hashed card number: {}",
        verification
            .status
            .map_or_else(|| "<none>".to_string(), |s| s.to_string()),
        verification.tracking_code.as_deref().unwrap_or("<none>"),
        payment.card_number_masked.as_deref().unwrap_or("<none>"),
        payment.card_number_hash.as_deref().unwrap_or("<none>"),
    )
}
