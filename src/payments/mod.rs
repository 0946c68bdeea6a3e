//! Payment provider integration module
//!
//! This module provides a unified interface for Brazilian payment gateways
//! (AbacatePay, Pagar.me, PagSeguro) covering credit card, boleto and Pix.

pub mod dispatcher;
pub mod gateway_client;
pub mod providers;
pub mod simulation;
pub mod status;
pub mod traits;
pub mod types;

pub use dispatcher::PaymentDispatcher;
pub use traits::PaymentProvider;
pub use types::{PaymentMethod, PaymentRequest, PaymentResponse, PaymentStatus, Provider};
