use std::time::Instant;

use serde::Serialize;
use time::OffsetDateTime;

#[derive(Debug, Clone, Serialize)]
struct Request {
    url: String,
    params: serde_json::Value,
}

/// Audit entry of a single gateway call. Request and response are stored masked.
#[derive(Debug, Clone, Serialize)]
pub struct InteractionLog {
    gateway: String,
    request: Option<Request>,
    status: Option<u16>,
    response: Option<serde_json::Value>,
    error: Option<String>,
    attempts: usize,
    pub kind: String,
    #[serde(with = "time::serde::rfc3339")]
    created_at: time::OffsetDateTime,
    duration: f32,
}

impl InteractionLog {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

#[derive(Debug)]
pub struct InteractionSpan {
    created: Instant,
    request: Option<Request>,
    response: Option<serde_json::Value>,
    response_status: Option<u16>,
    error: Option<String>,
    attempts: usize,
}

impl InteractionSpan {
    pub fn enter() -> Self {
        Self {
            created: Instant::now(),
            request: None,
            response: None,
            response_status: None,
            error: None,
            attempts: 0,
        }
    }

    pub fn set_request(&mut self, url: String, params: serde_json::Value) {
        self.request = Some(Request { url, params });
    }

    pub fn set_response(&mut self, res: serde_json::Value) {
        self.response = Some(res);
    }

    pub fn set_response_status(&mut self, status: u16) {
        self.response_status = Some(status);
    }

    pub fn set_error(&mut self, error: impl ToString) {
        self.error = Some(error.to_string());
    }

    pub fn record_attempt(&mut self) {
        self.attempts += 1;
    }

    pub fn attempts(&self) -> usize {
        self.attempts
    }

    pub fn interaction_log(self, kind: &str) -> InteractionLog {
        let created_at = OffsetDateTime::now_utc();
        InteractionLog {
            gateway: "neginpardakht".into(),
            request: self.request,
            status: self.response_status,
            response: self.response,
            error: self.error,
            attempts: self.attempts,
            kind: kind.into(),
            created_at,
            duration: self.created.elapsed().as_secs_f32(),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::InteractionSpan;

    #[test]
    fn log_keeps_request_and_outcome() {
        let mut span = InteractionSpan::enter();
        span.set_request("https://gw.test/verify".into(), json!({ "trackingCode": "T" }));
        span.record_attempt();
        span.record_attempt();
        span.set_response_status(200);
        span.set_response(json!({ "status": true }));

        let log = span.interaction_log("verify");
        let value = serde_json::from_str::<serde_json::Value>(&log.to_json().unwrap()).unwrap();
        assert_eq!(value["kind"], "verify");
        assert_eq!(value["attempts"], 2);
        assert_eq!(value["status"], 200);
        assert_eq!(value["request"]["url"], "https://gw.test/verify");
        assert_eq!(value["response"]["status"], true);
        assert!(value["error"].is_null());
    }
}
