use std::fmt::Display;

use serde::Serialize;

use crate::gateway::{
    error::{GatewayError, Rejection},
    status::{StatusMessage, TransactionStatus},
};

pub mod api;
/// Shopper return callback payload
pub mod callback;
pub mod interaction_log;
pub mod order;
pub mod orchestrator;
pub mod record;
/// Payment methods the host can look up by id
pub mod registry;

/// Payment transaction lifecycle. `Completed` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionState {
    Initiated,
    AwaitingReturn,
    Verifying,
    Completed,
    Failed,
}

/// Gateway call a failure happened in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Create,
    Verify,
}

impl Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Create => f.write_str("creating"),
            Self::Verify => f.write_str("verifying"),
        }
    }
}

#[derive(Debug)]
pub enum PaymentError {
    UnknownOrder(i64),
    AlreadyPaid(i64),
    UnsupportedCurrency(String),
    /// The gateway could not be reached, retries included
    TransportFailure {
        operation: Operation,
        source: GatewayError,
    },
    GatewayRejected {
        operation: Operation,
        rejection: Rejection,
    },
    MalformedResponse {
        operation: Operation,
        source: serde_json::Error,
    },
    InvalidCallback(&'static str),
    /// Callback status is not the gateway's paid code
    Declined(Option<TransactionStatus>),
    DoubleSpendMismatch {
        expected: Option<String>,
        presented: String,
    },
    AmountMismatch {
        expected: u64,
        reported: Option<u64>,
    },
    VerificationFailed(&'static str),
    Store(anyhow::Error),
}

impl PaymentError {
    pub fn gateway(operation: Operation, error: GatewayError) -> Self {
        match error {
            GatewayError::GatewayResponse(rejection) => Self::GatewayRejected {
                operation,
                rejection,
            },
            GatewayError::GatewayDeserialization(source) => Self::MalformedResponse {
                operation,
                source,
            },
            source => Self::TransportFailure { operation, source },
        }
    }

    /// Whether the error moves the order to `failed`. Failures before the
    /// shopper paid, transport failures and store failures leave it as is.
    pub fn fails_order(&self) -> bool {
        match self {
            Self::GatewayRejected { operation, .. } | Self::MalformedResponse { operation, .. } => {
                *operation == Operation::Verify
            }
            Self::Declined(_)
            | Self::DoubleSpendMismatch { .. }
            | Self::AmountMismatch { .. }
            | Self::VerificationFailed(_) => true,
            Self::UnknownOrder(_)
            | Self::AlreadyPaid(_)
            | Self::UnsupportedCurrency(_)
            | Self::TransportFailure { .. }
            | Self::InvalidCallback(_)
            | Self::Store(_) => false,
        }
    }
}

impl From<anyhow::Error> for PaymentError {
    fn from(value: anyhow::Error) -> Self {
        Self::Store(value)
    }
}

impl std::error::Error for PaymentError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::TransportFailure { source, .. } => Some(source),
            Self::MalformedResponse { source, .. } => Some(source),
            Self::Store(e) => Some(&**e),
            _ => None,
        }
    }
}

impl Display for PaymentError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownOrder(id) => write!(f, "order {id} does not exist"),
            Self::AlreadyPaid(id) => write!(f, "order {id} is already paid"),
            Self::UnsupportedCurrency(currency) => {
                write!(f, "selected currency is not supported: {currency}")
            }
            Self::TransportFailure { operation, source } => {
                write!(f, "gateway is unreachable while {operation} the transaction: {source}")
            }
            Self::GatewayRejected {
                operation,
                rejection,
            } => write!(
                f,
                "an error occurred while {operation} the transaction, {rejection}"
            ),
            Self::MalformedResponse { operation, source } => write!(
                f,
                "gateway sent a malformed response while {operation} the transaction: {source}"
            ),
            Self::InvalidCallback(reason) => write!(f, "invalid payment callback: {reason}"),
            Self::Declined(status) => {
                write!(f, "payment was not completed: {}", StatusMessage(*status))
            }
            Self::DoubleSpendMismatch {
                expected,
                presented,
            } => write!(
                f,
                "callback transaction id {presented} does not match the stored transaction id {}",
                expected.as_deref().unwrap_or("<none>")
            ),
            Self::AmountMismatch { expected, reported } => match reported {
                Some(reported) => write!(
                    f,
                    "error in transaction status or inconsistency with payment gateway information: expected amount {expected}, gateway reported {reported}"
                ),
                None => write!(
                    f,
                    "error in transaction status or inconsistency with payment gateway information: expected amount {expected}, gateway reported none"
                ),
            },
            Self::VerificationFailed(reason) => write!(
                f,
                "error in transaction status or inconsistency with payment gateway information: {reason}"
            ),
            Self::Store(e) => write!(f, "order store error: {e}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeKind {
    Success,
    Error,
}

/// Message shown to the shopper after the redirect
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub kind: NoticeKind,
    pub text: String,
}

impl Notice {
    pub fn success(text: String) -> Self {
        Self {
            kind: NoticeKind::Success,
            text,
        }
    }

    pub fn error(text: String) -> Self {
        Self {
            kind: NoticeKind::Error,
            text,
        }
    }
}

/// Successful start of a payment, the shopper must be sent to `redirect_url`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Initiation {
    pub order_id: i64,
    pub state: TransactionState,
    pub tracking_code: String,
    pub redirect_url: String,
}

/// Result of handling a return callback
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReturnOutcome {
    pub order_id: Option<i64>,
    pub state: TransactionState,
    pub notice: Notice,
    pub redirect_url: String,
}

impl ReturnOutcome {
    /// Redirect target with the outcome and notice appended to the query string.
    /// Relative targets keep their form.
    pub fn location(&self) -> String {
        let mut pairs = match self.state {
            TransactionState::Completed => {
                vec![("wc_status", "success"), ("payment_status", "success")]
            }
            _ => vec![("payment_status", "failed")],
        };
        pairs.push(("notice", self.notice.text.as_str()));

        if let Ok(mut url) = reqwest::Url::parse(&self.redirect_url) {
            url.query_pairs_mut().extend_pairs(pairs);
            return url.into();
        }
        let query = match serde_urlencoded::to_string(&pairs) {
            Ok(query) => query,
            Err(e) => {
                tracing::error!("Failed to encode redirect query: {e}");
                return self.redirect_url.clone();
            }
        };
        let (target, fragment) = match self.redirect_url.split_once('#') {
            Some((target, fragment)) => (target, Some(fragment)),
            None => (self.redirect_url.as_str(), None),
        };
        let separator = if target.contains('?') { "&" } else { "?" };
        match fragment {
            Some(fragment) => format!("{target}{separator}{query}#{fragment}"),
            None => format!("{target}{separator}{query}"),
        }
    }
}
