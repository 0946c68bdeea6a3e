//! Gateway status vocabularies mapped onto [`PaymentStatus`]
//!
//! Each gateway owns one table. Lookups are total: anything a table does not
//! know maps to `pending` so a transaction is never lost to an unmapped status.

use crate::payments::types::PaymentStatus;
use tracing::warn;

/// Lookup table from one gateway's raw statuses to the canonical enumeration
#[derive(Debug)]
pub struct StatusNormalizer {
    provider: &'static str,
    table: &'static [(&'static str, PaymentStatus)],
}

impl StatusNormalizer {
    pub fn normalize(&self, raw: &str) -> PaymentStatus {
        match self.lookup(raw) {
            Some(status) => status,
            None => {
                warn!(
                    provider = self.provider,
                    raw_status = raw,
                    "unmapped gateway status, defaulting to pending"
                );
                PaymentStatus::Pending
            }
        }
    }

    /// Exact-match lookup without the pending fallback
    pub fn lookup(&self, raw: &str) -> Option<PaymentStatus> {
        self.table
            .iter()
            .find(|(key, _)| *key == raw)
            .map(|(_, status)| *status)
    }

    pub fn keys(&self) -> impl Iterator<Item = &'static str> {
        self.table.iter().map(|(key, _)| *key)
    }
}

pub const ABACATEPAY: StatusNormalizer = StatusNormalizer {
    provider: "abacatepay",
    table: &[
        ("PENDING", PaymentStatus::Pending),
        ("EXPIRED", PaymentStatus::Failed),
        ("CANCELLED", PaymentStatus::Cancelled),
        ("PAID", PaymentStatus::Paid),
        ("REFUNDED", PaymentStatus::Refunded),
    ],
};

/// Pagar.me v5 order, charge and transaction statuses
pub const PAGARME: StatusNormalizer = StatusNormalizer {
    provider: "pagarme",
    table: &[
        ("pending", PaymentStatus::Pending),
        ("waiting_payment", PaymentStatus::Pending),
        ("generated", PaymentStatus::Pending),
        ("processing", PaymentStatus::Processing),
        ("authorized_pending_capture", PaymentStatus::Processing),
        ("partial_capture", PaymentStatus::Processing),
        ("underpaid", PaymentStatus::Processing),
        ("paid", PaymentStatus::Paid),
        ("captured", PaymentStatus::Paid),
        ("overpaid", PaymentStatus::Paid),
        ("failed", PaymentStatus::Failed),
        ("not_authorized", PaymentStatus::Failed),
        ("with_error", PaymentStatus::Failed),
        ("refunded", PaymentStatus::Refunded),
        ("chargedback", PaymentStatus::Refunded),
        ("canceled", PaymentStatus::Cancelled),
        ("voided", PaymentStatus::Cancelled),
    ],
};

pub const PAGSEGURO: StatusNormalizer = StatusNormalizer {
    provider: "pagseguro",
    table: &[
        ("WAITING", PaymentStatus::Pending),
        ("IN_ANALYSIS", PaymentStatus::Processing),
        ("AUTHORIZED", PaymentStatus::Processing),
        ("PAID", PaymentStatus::Paid),
        ("AVAILABLE", PaymentStatus::Paid),
        ("DISPUTE", PaymentStatus::Processing),
        ("REFUNDED", PaymentStatus::Refunded),
        ("CANCELED", PaymentStatus::Cancelled),
        ("DECLINED", PaymentStatus::Failed),
    ],
};
