use crate::checkout::registry::PaymentMethods;

#[derive(Debug, Clone, axum::extract::FromRef)]
pub struct AppState {
    pub methods: PaymentMethods,
}

impl AppState {
    pub fn new(methods: PaymentMethods) -> Self {
        Self { methods }
    }
}
