use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::api::AppState;
use crate::config::GatewayMode;

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub environment: String,
    pub gateways: GatewayModes,
    pub webhook_signature_check: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GatewayModes {
    pub abacatepay: GatewayMode,
    pub pagarme: GatewayMode,
    pub pagseguro: GatewayMode,
}

pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let config = &state.config;

    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        environment: config.server.environment.clone(),
        gateways: GatewayModes {
            abacatepay: config.abacatepay.mode,
            pagarme: config.pagarme.mode,
            pagseguro: config.pagseguro.mode,
        },
        webhook_signature_check: config.webhook.public_key.is_some(),
    })
}
