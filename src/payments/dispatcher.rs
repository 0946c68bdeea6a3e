//! Routes a payment request to the provider registered for its gateway

use crate::payments::traits::PaymentProvider;
use crate::payments::types::{PaymentRequest, PaymentResponse, Provider};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

/// Lookup table of provider implementations keyed by gateway id
#[derive(Clone, Default)]
pub struct PaymentDispatcher {
    providers: HashMap<Provider, Arc<dyn PaymentProvider>>,
}

impl PaymentDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider under the id it reports. Replaces any previous
    /// registration for the same id.
    pub fn register(mut self, provider: Arc<dyn PaymentProvider>) -> Self {
        self.providers.insert(provider.provider(), provider);
        self
    }

    pub fn supports(&self, provider: &Provider) -> bool {
        self.providers.contains_key(provider)
    }

    /// Route the request; never fails.
    pub async fn dispatch(&self, request: &PaymentRequest) -> PaymentResponse {
        let Some(provider) = self.providers.get(&request.provider) else {
            return Self::unavailable(&request.provider);
        };

        let response = provider.process(request).await;

        match &response.data {
            Some(data) if response.success && !data.details.has_artifact() => {
                warn!(
                    provider = %request.provider,
                    transaction_id = %data.transaction_id,
                    method = %data.method(),
                    "gateway reported success without a payment artifact"
                );
                PaymentResponse::failure_with_data(
                    "O provedor não retornou os dados para pagamento",
                    data.clone(),
                )
            }
            _ => {
                info!(
                    provider = %request.provider,
                    success = response.success,
                    transaction_id = response.transaction_id().unwrap_or("-"),
                    "payment dispatched"
                );
                response
            }
        }
    }

    fn unavailable(provider: &Provider) -> PaymentResponse {
        let message = match provider {
            Provider::Unknown(name) => format!("Provedor desconhecido: {}", name),
            known => format!("Provedor {} ainda não implementado", known.display_name()),
        };
        warn!(%provider, "{}", message);
        PaymentResponse::failure(message)
    }
}
