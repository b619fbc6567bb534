use axum::{
    extract::{Form, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect},
    routing::{get, post},
};
use serde::Serialize;
use tracing::instrument;

use crate::{
    checkout::{
        Initiation, PaymentError, ReturnOutcome,
        callback::CallbackPayload,
        registry::{MethodInfo, PaymentMethod, PaymentMethods},
    },
    gateway::mask,
    state::AppState,
};

pub type Result<T> = std::result::Result<T, ApiError>;

#[instrument(skip_all, fields(method = %method, order_id = order_id))]
pub async fn pay(
    State(methods): State<PaymentMethods>,
    Path((method, order_id)): Path<(String, i64)>,
) -> Result<ApiResponse<Initiation>> {
    let method = lookup(&methods, &method)?;
    match method.initiate(order_id).await {
        Ok(initiation) => {
            tracing::info!(tracking_code = %initiation.tracking_code, "Created payment");
            Ok(ApiResponse::new(initiation))
        }
        Err(e) => {
            tracing::error!("Failed to create a payment: {e}");
            Err(e.into())
        }
    }
}

#[instrument(skip_all, fields(method = %method))]
pub async fn callback_query(
    State(methods): State<PaymentMethods>,
    Path(method): Path<String>,
    Query(payload): Query<CallbackPayload>,
) -> Result<Redirect> {
    handle_return(&methods, &method, payload).await
}

#[instrument(skip_all, fields(method = %method))]
pub async fn callback_form(
    State(methods): State<PaymentMethods>,
    Path(method): Path<String>,
    Form(payload): Form<CallbackPayload>,
) -> Result<Redirect> {
    handle_return(&methods, &method, payload).await
}

async fn handle_return(
    methods: &PaymentMethods,
    method: &str,
    payload: CallbackPayload,
) -> Result<Redirect> {
    let method = lookup(methods, method)?;
    tracing::debug!(payload = ?payload, "Payment callback");
    let outcome: ReturnOutcome = method.handle_return(payload).await.map_err(|e| {
        tracing::error!("Failed to handle payment callback: {e}");
        ApiError::from(e)
    })?;
    tracing::info!(order_id = ?outcome.order_id, state = ?outcome.state, "Handled payment callback");
    Ok(Redirect::to(&outcome.location()))
}

pub async fn list_methods(State(methods): State<PaymentMethods>) -> ApiResponse<MethodList> {
    ApiResponse::new(MethodList {
        methods: methods.list(),
    })
}

pub async fn health() -> &'static str {
    "ok"
}

fn lookup(methods: &PaymentMethods, id: &str) -> Result<std::sync::Arc<dyn PaymentMethod>> {
    methods.get(id).ok_or_else(|| ApiError {
        status: StatusCode::NOT_FOUND,
        error: format!("unknown payment method: {id}"),
    })
}

#[derive(Debug, Serialize)]
pub struct MethodList {
    methods: Vec<MethodInfo>,
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    result: bool,
    #[serde(flatten)]
    data: T,
}

impl<T> ApiResponse<T> {
    pub fn new(data: T) -> Self {
        Self { result: true, data }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> axum::response::Response {
        match serde_json::to_value(self) {
            Ok(value) => {
                tracing::debug!(data = %mask::secure_value(&value), "API response payload");
                axum::Json(value).into_response()
            }
            Err(e) => ApiError {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                error: e.to_string(),
            }
            .into_response(),
        }
    }
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    error: String,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    result: bool,
    error: &'a str,
}

impl From<PaymentError> for ApiError {
    fn from(value: PaymentError) -> Self {
        let status = match &value {
            PaymentError::UnknownOrder(_) => StatusCode::NOT_FOUND,
            PaymentError::AlreadyPaid(_) => StatusCode::CONFLICT,
            PaymentError::UnsupportedCurrency(_) => StatusCode::UNPROCESSABLE_ENTITY,
            PaymentError::TransportFailure { .. }
            | PaymentError::GatewayRejected { .. }
            | PaymentError::MalformedResponse { .. } => StatusCode::BAD_GATEWAY,
            PaymentError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        };
        Self {
            status,
            error: value.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let body = ErrorBody {
            result: false,
            error: &self.error,
        };
        tracing::debug!(data = %mask::secure_serializable(&body), "API error response payload");
        (self.status, axum::Json(body)).into_response()
    }
}

pub fn router() -> axum::Router<AppState> {
    axum::Router::new()
        .route("/health", get(health))
        .route("/payments", get(list_methods))
        .route("/payments/{method}/orders/{order_id}", post(pay))
        .route(
            "/payments/{method}/callback",
            get(callback_query).post(callback_form),
        )
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use axum::{
        body::Body,
        http::{Request, StatusCode, header},
    };
    use tower::ServiceExt;

    use crate::{
        checkout::{
            Initiation, Notice, PaymentError, ReturnOutcome, TransactionState,
            callback::CallbackPayload,
            registry::{PaymentMethod, PaymentMethods},
        },
        state::AppState,
    };

    #[derive(Default)]
    struct Recorder {
        payloads: Mutex<Vec<CallbackPayload>>,
    }

    #[async_trait::async_trait]
    impl PaymentMethod for Recorder {
        fn id(&self) -> &'static str {
            "negin"
        }

        fn title(&self) -> &str {
            "NeginPardakht"
        }

        fn description(&self) -> &str {
            "test"
        }

        async fn initiate(&self, order_id: i64) -> Result<Initiation, PaymentError> {
            match order_id {
                42 => Ok(Initiation {
                    order_id,
                    state: TransactionState::AwaitingReturn,
                    tracking_code: "TRK-1".into(),
                    redirect_url: "https://pay.test/TRK-1".into(),
                }),
                13 => Err(PaymentError::AlreadyPaid(order_id)),
                _ => Err(PaymentError::UnknownOrder(order_id)),
            }
        }

        async fn handle_return(
            &self,
            payload: CallbackPayload,
        ) -> Result<ReturnOutcome, PaymentError> {
            self.payloads.lock().unwrap().push(payload);
            Ok(ReturnOutcome {
                order_id: Some(42),
                state: TransactionState::Completed,
                notice: Notice::success("Paid".into()),
                redirect_url: "https://shop.test/received/42".into(),
            })
        }
    }

    fn app(recorder: Arc<Recorder>) -> axum::Router {
        let mut methods = PaymentMethods::default();
        methods.register(recorder);
        super::router().with_state(AppState { methods })
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn post(uri: &str) -> Request<Body> {
        Request::post(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn pay_returns_redirect_target() {
        let response = app(Arc::default())
            .oneshot(post("/payments/negin/orders/42"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_json(response).await,
            serde_json::json!({
                "result": true,
                "order_id": 42,
                "state": "awaiting_return",
                "tracking_code": "TRK-1",
                "redirect_url": "https://pay.test/TRK-1",
            })
        );
    }

    #[tokio::test]
    async fn pay_errors_use_error_envelope() {
        let response = app(Arc::default())
            .oneshot(post("/payments/negin/orders/13"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert_eq!(
            body_json(response).await,
            serde_json::json!({"result": false, "error": "order 13 is already paid"})
        );

        let response = app(Arc::default())
            .oneshot(post("/payments/negin/orders/7"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn unknown_method_is_not_found() {
        let response = app(Arc::default())
            .oneshot(post("/payments/paypal/orders/42"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(response).await["error"], "unknown payment method: paypal");
    }

    #[tokio::test]
    async fn query_callback_redirects_with_outcome() {
        let recorder = Arc::new(Recorder::default());
        let response = app(recorder.clone())
            .oneshot(
                Request::get(
                    "/payments/negin/callback?order_id=42&status=2&trackingCode=TRK-1&id=TRK-1&orderId=42",
                )
                .body(Body::empty())
                .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            response.headers()[header::LOCATION],
            "https://shop.test/received/42?wc_status=success&payment_status=success&notice=Paid"
        );

        let payloads = recorder.payloads.lock().unwrap();
        assert_eq!(payloads[0].status.as_deref(), Some("2"));
        assert_eq!(payloads[0].order_id.as_deref(), Some("42"));
    }

    #[tokio::test]
    async fn form_callback_is_accepted() {
        let recorder = Arc::new(Recorder::default());
        let response = app(recorder.clone())
            .oneshot(
                Request::post("/payments/negin/callback")
                    .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                    .body(Body::from("status=9&trackingCode=TRK-1&id=TRK-1&orderId=42"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        let payloads = recorder.payloads.lock().unwrap();
        assert_eq!(payloads[0].status.as_deref(), Some("9"));
        assert_eq!(payloads[0].tracking_code.as_deref(), Some("TRK-1"));
    }

    #[tokio::test]
    async fn lists_methods_and_reports_health() {
        let response = app(Arc::default())
            .oneshot(Request::get("/payments").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let body = body_json(response).await;
        assert_eq!(body["methods"][0]["id"], "negin");

        let response = app(Arc::default())
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
