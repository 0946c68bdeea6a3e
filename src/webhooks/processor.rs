//! Webhook verification and event routing

use crate::database::TransactionRepository;
use crate::error::{AppError, AppResult};
use crate::payments::types::PaymentStatus;
use crate::webhooks::events::{
    format_brl, BillingPaidData, EventPayload, WebhookEvent, WebhookEventKind, WithdrawData,
};
use crate::webhooks::verifier::WebhookVerifier;
use serde::Serialize;
use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use tracing::{error, info, warn};

/// Delivery acknowledgement returned to the gateway
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookAck {
    pub received: bool,
    pub event_id: String,
}

/// Static descriptor served on GET for health checks
#[derive(Debug, Clone, Serialize)]
pub struct WebhookCapabilities {
    pub status: &'static str,
    pub message: &'static str,
    pub events: Vec<&'static str>,
}

/// Event ids remembered for redelivery detection
const MAX_REMEMBERED_EVENTS: usize = 10_000;

/// Bounded set of seen event ids; the oldest id is forgotten first
#[derive(Debug)]
struct SeenEvents {
    ids: HashSet<String>,
    order: VecDeque<String>,
    capacity: usize,
}

impl SeenEvents {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            ids: HashSet::with_capacity(capacity),
            order: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// True the first time an id is seen
    fn insert(&mut self, id: &str) -> bool {
        if self.ids.contains(id) {
            return false;
        }
        if self.order.len() >= self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.ids.remove(&oldest);
            }
        }
        self.ids.insert(id.to_string());
        self.order.push_back(id.to_string());
        true
    }
}

pub struct WebhookProcessor {
    verifier: WebhookVerifier,
    transactions: Arc<TransactionRepository>,
    processed: Mutex<SeenEvents>,
}

impl WebhookProcessor {
    pub fn new(verifier: WebhookVerifier, transactions: Arc<TransactionRepository>) -> Self {
        Self {
            verifier,
            transactions,
            processed: Mutex::new(SeenEvents::with_capacity(MAX_REMEMBERED_EVENTS)),
        }
    }

    pub fn capabilities() -> WebhookCapabilities {
        WebhookCapabilities {
            status: "ok",
            message: "AbacatePay webhook endpoint ativo",
            events: WebhookEventKind::SUPPORTED.to_vec(),
        }
    }

    /// Authenticate, parse and route one delivery
    ///
    /// Handlers never fail the delivery: once the request is authentic and
    /// well formed the event is acknowledged.
    pub async fn handle(
        &self,
        secret: Option<&str>,
        signature: Option<&str>,
        body: &[u8],
    ) -> AppResult<WebhookAck> {
        self.verifier.check_secret(secret)?;
        self.verifier.verify_signature(body, signature)?;

        let event: WebhookEvent = serde_json::from_slice(body).map_err(|e| {
            warn!(error = %e, "webhook body is not a valid event");
            AppError::validation("Invalid webhook payload")
        })?;

        info!(
            event_id = %event.id,
            event = %event.event,
            dev_mode = event.dev_mode,
            "webhook received"
        );

        let ack = WebhookAck {
            received: true,
            event_id: event.id.clone(),
        };

        if !self.mark_processed(&event.id) {
            info!(event_id = %event.id, "duplicate webhook delivery acknowledged");
            return Ok(ack);
        }

        match event.payload() {
            Ok(EventPayload::BillingPaid(data)) => self.on_billing_paid(&event.id, &data).await,
            Ok(EventPayload::WithdrawDone(data)) => on_withdraw_done(&event.id, &data),
            Ok(EventPayload::WithdrawFailed(data)) => on_withdraw_failed(&event.id, &data),
            Ok(EventPayload::Unknown(name)) => {
                warn!(event_id = %event.id, event = %name, "unknown webhook event");
            }
            Err(e) => {
                error!(event_id = %event.id, event = %event.event, error = %e, "webhook data does not match event kind");
            }
        }

        Ok(ack)
    }

    /// True the first time an event id is seen
    fn mark_processed(&self, event_id: &str) -> bool {
        match self.processed.lock() {
            Ok(mut seen) => seen.insert(event_id),
            Err(poisoned) => poisoned.into_inner().insert(event_id),
        }
    }

    async fn on_billing_paid(&self, event_id: &str, data: &BillingPaidData) {
        info!(
            event_id,
            amount = %format_brl(data.amount),
            fee = %format_brl(data.fee),
            method = %data.method,
            billing_id = data.billing.as_ref().map(|b| b.id.as_str()),
            pix_qr_code_id = data.pix_qr_code.as_ref().map(|p| p.id.as_str()),
            "payment confirmed"
        );

        if let Some(customer) = data.billing.as_ref().and_then(|b| b.customer.as_ref()) {
            info!(
                event_id,
                customer_id = %customer.id,
                customer_name = customer.metadata.name.as_deref(),
                "paying customer"
            );
        }

        let Some(transaction_id) = data.transaction_id() else {
            warn!(event_id, "billing.paid without charge identifiers");
            return;
        };

        match self
            .transactions
            .update_status(transaction_id, PaymentStatus::Paid)
            .await
        {
            Ok(_) => info!(event_id, transaction_id, "transaction marked as paid"),
            Err(e) if e.is_not_found() || e.is_invalid_transition() => {
                warn!(event_id, transaction_id, error = %e, "transaction not updated")
            }
            Err(e) => error!(event_id, transaction_id, error = %e, "transaction update failed"),
        }
    }
}

fn on_withdraw_done(event_id: &str, data: &WithdrawData) {
    info!(
        event_id,
        withdraw_id = %data.id,
        amount = %format_brl(data.amount),
        fee = %format_brl(data.platform_fee),
        receipt_url = data.receipt_url.as_deref(),
        "withdraw completed"
    );
}

fn on_withdraw_failed(event_id: &str, data: &WithdrawData) {
    warn!(event_id, withdraw_id = %data.id, status = %data.status, "withdraw failed");
}
