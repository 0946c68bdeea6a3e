//! Payment provider trait definitions
//!
//! Defines the common interface that all payment providers must implement.

use crate::config::GatewayMode;
use crate::payments::types::{PaymentRequest, PaymentResponse, PaymentStatus, Provider};
use async_trait::async_trait;

/// Trait for payment provider implementations
///
/// Every gateway adapter (AbacatePay, Pagar.me, PagSeguro) implements this
/// trait and is registered with the dispatcher under its [`Provider`] id.
/// Implementations hold no per-request state and can be called concurrently.
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Identifier the dispatcher routes on
    fn provider(&self) -> Provider;

    /// Mode resolved at startup
    fn mode(&self) -> GatewayMode;

    /// Map a raw gateway status onto the canonical status. Total: unknown
    /// values map to [`PaymentStatus::Pending`].
    fn normalize_status(&self, raw: &str) -> PaymentStatus;

    /// Process one payment attempt
    ///
    /// Never fails: validation problems, declines and integration errors all
    /// come back as a response with `success == false`.
    async fn process(&self, request: &PaymentRequest) -> PaymentResponse;
}
