//! HTTP boundary

pub mod health;
pub mod payments;
pub mod transactions;
pub mod webhooks;

use crate::config::Config;
use crate::database::TransactionRepository;
use crate::error::AppResult;
use crate::payments::providers::{AbacatePayProvider, PagSeguroProvider, PagarmeProvider};
use crate::payments::PaymentDispatcher;
use crate::webhooks::{WebhookProcessor, WebhookVerifier};
use axum::{
    routing::{get, post},
    Router,
};
use http::HeaderName;
use std::sync::Arc;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

const REQUEST_ID_HEADER: &str = "x-request-id";

/// Shared handler state, cheap to clone
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub dispatcher: PaymentDispatcher,
    pub abacatepay: Arc<AbacatePayProvider>,
    pub transactions: Arc<TransactionRepository>,
    pub webhooks: Arc<WebhookProcessor>,
}

impl AppState {
    /// Build every gateway adapter from the resolved configuration
    pub fn from_config(config: Config) -> AppResult<Self> {
        let defaults = config.gateways.clone();

        let abacatepay = Arc::new(AbacatePayProvider::new(
            config.abacatepay.clone(),
            defaults.clone(),
        )?);
        let pagarme = Arc::new(PagarmeProvider::new(config.pagarme.clone(), defaults.clone())?);
        let pagseguro = Arc::new(PagSeguroProvider::new(config.pagseguro.clone(), defaults)?);

        let dispatcher = PaymentDispatcher::new()
            .register(abacatepay.clone())
            .register(pagarme)
            .register(pagseguro);

        let transactions = Arc::new(TransactionRepository::new());
        let webhooks = Arc::new(WebhookProcessor::new(
            WebhookVerifier::new(&config.webhook),
            transactions.clone(),
        ));

        Ok(Self {
            config: Arc::new(config),
            dispatcher,
            abacatepay,
            transactions,
            webhooks,
        })
    }
}

pub fn router(state: AppState) -> Router {
    let request_id = HeaderName::from_static(REQUEST_ID_HEADER);

    Router::new()
        .route("/health", get(health::health_check))
        .route("/api/payments/process", post(payments::process_payment))
        .route("/api/payments/simulate", post(payments::simulate_payment))
        .route("/api/transactions", get(transactions::list_transactions))
        .route(
            "/api/webhooks/abacatepay",
            post(webhooks::receive_abacatepay).get(webhooks::describe_abacatepay),
        )
        .layer(PropagateRequestIdLayer::new(request_id.clone()))
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::new(request_id, MakeRequestUuid))
        .with_state(state)
}
