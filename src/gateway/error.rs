use std::fmt::Display;

use axum::http::header::InvalidHeaderValue;

/// Structured failure reported by the gateway itself, either through a non-200
/// status or through an error code embedded in a 200 response.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct Rejection {
    pub http_status: u16,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
}

impl Rejection {
    /// Text shown to the shopper, only available when the gateway sent both parts
    pub fn notice(&self) -> Option<String> {
        match (&self.error_code, &self.error_message) {
            (Some(code), Some(message)) => Some(format!("{message} (error code: {code})")),
            _ => None,
        }
    }
}

impl Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "error status: {}", self.http_status)?;
        if let Some(code) = &self.error_code {
            write!(f, ", error code: {code}")?;
        }
        if let Some(message) = &self.error_message {
            write!(f, ", error message: {message}")?;
        }
        Ok(())
    }
}

#[derive(Debug)]
pub enum GatewayError {
    /// Connection level failure that survived every retry attempt
    Transport {
        attempts: usize,
        source: reqwest::Error,
    },
    GatewayResponse(Rejection),
    GatewayDeserialization(serde_json::Error),
    InvalidAuthToken(InvalidHeaderValue),
}

impl From<Rejection> for GatewayError {
    fn from(value: Rejection) -> Self {
        Self::GatewayResponse(value)
    }
}

impl From<serde_json::Error> for GatewayError {
    fn from(value: serde_json::Error) -> Self {
        Self::GatewayDeserialization(value)
    }
}

impl From<InvalidHeaderValue> for GatewayError {
    fn from(value: InvalidHeaderValue) -> Self {
        Self::InvalidAuthToken(value)
    }
}

impl std::error::Error for GatewayError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            GatewayError::Transport { source, .. } => Some(source),
            GatewayError::GatewayResponse(_) => None,
            GatewayError::GatewayDeserialization(e) => Some(e),
            GatewayError::InvalidAuthToken(e) => Some(e),
        }
    }
}

impl Display for GatewayError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GatewayError::Transport { attempts, source } => {
                write!(f, "http request error after {attempts} attempts: {source}")
            }
            GatewayError::GatewayResponse(rejection) => write!(f, "gateway response: {rejection}"),
            GatewayError::GatewayDeserialization(e) => {
                write!(f, "gateway response deserialization: {e}")
            }
            GatewayError::InvalidAuthToken(e) => write!(f, "invalid auth token header: {e}"),
        }
    }
}
