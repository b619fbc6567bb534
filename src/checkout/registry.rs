use std::{collections::HashMap, sync::Arc};

use crate::{
    checkout::{
        Initiation, PaymentError, ReturnOutcome,
        callback::CallbackPayload,
        orchestrator::{METHOD_ID, Orchestrator},
        order::OrderStore,
    },
    gateway::Gateway,
};

#[async_trait::async_trait]
pub trait PaymentMethod: Send + Sync {
    /// Stable id used in routes
    fn id(&self) -> &'static str;

    fn title(&self) -> &str;

    fn description(&self) -> &str;

    async fn initiate(&self, order_id: i64) -> Result<Initiation, PaymentError>;

    async fn handle_return(&self, payload: CallbackPayload) -> Result<ReturnOutcome, PaymentError>;
}

#[async_trait::async_trait]
impl<S, G> PaymentMethod for Orchestrator<S, G>
where
    S: OrderStore + 'static,
    G: Gateway + 'static,
{
    fn id(&self) -> &'static str {
        METHOD_ID
    }

    fn title(&self) -> &str {
        "NeginPardakht"
    }

    fn description(&self) -> &str {
        "Secure payment through the NeginPardakht gateway"
    }

    async fn initiate(&self, order_id: i64) -> Result<Initiation, PaymentError> {
        Orchestrator::initiate(self, order_id).await
    }

    async fn handle_return(
        &self,
        payload: CallbackPayload,
    ) -> Result<ReturnOutcome, PaymentError> {
        Orchestrator::handle_return(self, payload).await
    }
}

#[derive(Debug, serde::Serialize)]
pub struct MethodInfo {
    pub id: &'static str,
    pub title: String,
    pub description: String,
}

/// Payment methods offered at checkout, keyed by id
#[derive(Clone, Default)]
pub struct PaymentMethods {
    methods: HashMap<&'static str, Arc<dyn PaymentMethod>>,
}

impl PaymentMethods {
    pub fn register(&mut self, method: Arc<dyn PaymentMethod>) {
        let id = method.id();
        if self.methods.insert(id, method).is_some() {
            tracing::warn!(id, "Replaced already registered payment method");
        } else {
            tracing::info!(id, "Registered payment method");
        }
    }

    pub fn get(&self, id: &str) -> Option<Arc<dyn PaymentMethod>> {
        self.methods.get(id).cloned()
    }

    pub fn list(&self) -> Vec<MethodInfo> {
        let mut methods: Vec<_> = self
            .methods
            .values()
            .map(|method| MethodInfo {
                id: method.id(),
                title: method.title().to_string(),
                description: method.description().to_string(),
            })
            .collect();
        methods.sort_by_key(|method| method.id);
        methods
    }
}

impl std::fmt::Debug for PaymentMethods {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.methods.keys()).finish()
    }
}
