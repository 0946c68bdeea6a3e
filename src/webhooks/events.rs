//! AbacatePay webhook event payloads

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum WebhookEventKind {
    BillingPaid,
    WithdrawDone,
    WithdrawFailed,
    Other(String),
}

impl WebhookEventKind {
    /// Event names with a dedicated handler
    pub const SUPPORTED: [&'static str; 3] = ["billing.paid", "withdraw.done", "withdraw.failed"];

    pub fn as_str(&self) -> &str {
        match self {
            WebhookEventKind::BillingPaid => "billing.paid",
            WebhookEventKind::WithdrawDone => "withdraw.done",
            WebhookEventKind::WithdrawFailed => "withdraw.failed",
            WebhookEventKind::Other(name) => name,
        }
    }
}

impl From<String> for WebhookEventKind {
    fn from(value: String) -> Self {
        match value.as_str() {
            "billing.paid" => WebhookEventKind::BillingPaid,
            "withdraw.done" => WebhookEventKind::WithdrawDone,
            "withdraw.failed" => WebhookEventKind::WithdrawFailed,
            _ => WebhookEventKind::Other(value),
        }
    }
}

impl From<WebhookEventKind> for String {
    fn from(value: WebhookEventKind) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for WebhookEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Envelope of every AbacatePay notification
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookEvent {
    pub id: String,
    #[serde(default)]
    pub dev_mode: bool,
    pub event: WebhookEventKind,
    #[serde(default)]
    pub data: Value,
}

/// Event data decoded according to the event kind
#[derive(Debug, Clone)]
pub enum EventPayload {
    BillingPaid(BillingPaidData),
    WithdrawDone(WithdrawData),
    WithdrawFailed(WithdrawData),
    Unknown(String),
}

impl WebhookEvent {
    pub fn payload(&self) -> Result<EventPayload, serde_json::Error> {
        let payload = match &self.event {
            WebhookEventKind::BillingPaid => {
                EventPayload::BillingPaid(serde_json::from_value(self.data.clone())?)
            }
            WebhookEventKind::WithdrawDone => {
                EventPayload::WithdrawDone(serde_json::from_value(self.data.clone())?)
            }
            WebhookEventKind::WithdrawFailed => {
                EventPayload::WithdrawFailed(serde_json::from_value(self.data.clone())?)
            }
            WebhookEventKind::Other(name) => EventPayload::Unknown(name.clone()),
        };
        Ok(payload)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BillingPaidData {
    pub amount: u64,
    #[serde(default)]
    pub fee: u64,
    /// "PIX" or "CARD"
    pub method: String,
    #[serde(default)]
    pub billing: Option<BillingRef>,
    #[serde(default)]
    pub pix_qr_code: Option<PixQrCodeRef>,
}

impl BillingPaidData {
    /// Id of the charge this event settles, as stored by the payment flow
    pub fn transaction_id(&self) -> Option<&str> {
        self.pix_qr_code
            .as_ref()
            .map(|pix| pix.id.as_str())
            .or_else(|| self.billing.as_ref().map(|b| b.id.as_str()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BillingRef {
    pub id: String,
    #[serde(default)]
    pub products: Vec<BillingProduct>,
    #[serde(default)]
    pub customer: Option<BillingCustomer>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BillingProduct {
    pub id: String,
    #[serde(default)]
    pub external_id: Option<String>,
    #[serde(default)]
    pub quantity: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BillingCustomer {
    pub id: String,
    #[serde(default)]
    pub metadata: CustomerMetadata,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerMetadata {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub cellphone: Option<String>,
    #[serde(default)]
    pub tax_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PixQrCodeRef {
    pub id: String,
    #[serde(default)]
    pub amount: Option<u64>,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawData {
    pub id: String,
    /// "COMPLETE" or "CANCELLED"
    pub status: String,
    pub amount: u64,
    #[serde(default)]
    pub platform_fee: u64,
    #[serde(default)]
    pub receipt_url: Option<String>,
}

/// Centavos formatted as reais for log lines
pub(crate) fn format_brl(centavos: u64) -> String {
    format!("R$ {}.{:02}", centavos / 100, centavos % 100)
}
