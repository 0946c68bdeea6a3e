//! Unified adapter layer for Brazilian payment gateways
//!
//! AbacatePay, Pagar.me and PagSeguro behind one request/response contract,
//! with status normalization, an in-memory transaction store and verified
//! AbacatePay webhooks.

pub mod api;
pub mod config;
pub mod database;
pub mod error;
pub mod payments;
pub mod webhooks;
