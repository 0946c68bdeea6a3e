use axum::{
    body::Bytes,
    extract::{Query, State},
    http::HeaderMap,
    Json,
};
use serde::Deserialize;

use crate::api::AppState;
use crate::error::AppResult;
use crate::webhooks::{WebhookAck, WebhookCapabilities, WebhookProcessor};

const SIGNATURE_HEADER: &str = "x-webhook-signature";

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookQuery {
    pub webhook_secret: Option<String>,
}

/// `POST /api/webhooks/abacatepay`
///
/// The body is taken as raw bytes so the signature covers exactly what the
/// gateway sent.
pub async fn receive_abacatepay(
    State(state): State<AppState>,
    Query(query): Query<WebhookQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<Json<WebhookAck>> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());

    let ack = state
        .webhooks
        .handle(query.webhook_secret.as_deref(), signature, &body)
        .await?;

    Ok(Json(ack))
}

/// `GET /api/webhooks/abacatepay`
pub async fn describe_abacatepay() -> Json<WebhookCapabilities> {
    Json(WebhookProcessor::capabilities())
}
