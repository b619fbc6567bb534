use std::fmt::Display;

/// Code reported for statuses missing from the table
pub const UNEXPECTED_STATUS_CODE: u16 = 1000;

/// Transaction status codes reported by the gateway on the return callback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionStatus {
    Pending,
    Tokenized,
    Succeeded,
    Confirmed,
    Refunded,
    Settled,
    CancelledByUser,
    Expired,
    NotPerformed,
}

impl TransactionStatus {
    /// Status the gateway reports for a paid transaction
    pub const PAID: Self = Self::Succeeded;

    pub fn from_code(code: u16) -> Option<Self> {
        let status = match code {
            0 => Self::Pending,
            1 => Self::Tokenized,
            2 => Self::Succeeded,
            3 => Self::Confirmed,
            4 => Self::Refunded,
            5 => Self::Settled,
            7 => Self::CancelledByUser,
            8 => Self::Expired,
            9 => Self::NotPerformed,
            _ => return None,
        };
        Some(status)
    }

    /// Parses untrusted callback text, anything that is not a known code is `None`
    pub fn parse(raw: &str) -> Option<Self> {
        raw.trim().parse().ok().and_then(Self::from_code)
    }

    pub fn code(self) -> u16 {
        match self {
            Self::Pending => 0,
            Self::Tokenized => 1,
            Self::Succeeded => 2,
            Self::Confirmed => 3,
            Self::Refunded => 4,
            Self::Settled => 5,
            Self::CancelledByUser => 7,
            Self::Expired => 8,
            Self::NotPerformed => 9,
        }
    }

    fn description(self) -> &'static str {
        match self {
            Self::Pending => "The transaction is waiting for payment",
            Self::Tokenized => "The transaction has been tokenized",
            Self::Succeeded => "The transaction was completed successfully",
            Self::Confirmed => "The transaction has been confirmed",
            Self::Refunded => "The transaction amount has been refunded",
            Self::Settled => "The transaction has been settled",
            Self::CancelledByUser => "The transaction was cancelled by the user",
            Self::Expired => "The transaction has expired",
            Self::NotPerformed => "The transaction was not performed",
        }
    }
}

/// Human readable message for a status, unmapped or absent statuses fall back
/// to the generic unexpected error entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusMessage(pub Option<TransactionStatus>);

impl Display for StatusMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.0 {
            Some(status) => write!(f, "{} (code: {})", status.description(), status.code()),
            None => write!(f, "Unexpected error! (code: {UNEXPECTED_STATUS_CODE})"),
        }
    }
}
