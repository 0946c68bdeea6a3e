//! AbacatePay webhook handling

pub mod events;
pub mod processor;
pub mod verifier;

pub use events::{WebhookEvent, WebhookEventKind};
pub use processor::{WebhookAck, WebhookCapabilities, WebhookProcessor};
pub use verifier::WebhookVerifier;
