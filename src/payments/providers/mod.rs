//! Payment provider implementations
//!
//! Concrete implementations of the PaymentProvider trait for each Brazilian gateway.

pub mod abacatepay;
pub mod pagarme;
pub mod pagseguro;

pub use abacatepay::{AbacatePayProvider, SimulationOutcome};
pub use pagarme::PagarmeProvider;
pub use pagseguro::PagSeguroProvider;
