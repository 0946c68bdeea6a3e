//! Payment provider types and data structures
//!
//! Canonical request/response types shared by every gateway adapter.

use crate::error::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Payment gateway identifier
///
/// Deserializes from any string: unrecognised names become [`Provider::Unknown`]
/// so the dispatcher can answer them instead of rejecting the payload.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Provider {
    AbacatePay,
    Pagarme,
    PagSeguro,
    Stripe,
    MercadoPago,
    Unknown(String),
}

impl Provider {
    pub fn as_str(&self) -> &str {
        match self {
            Provider::AbacatePay => "abacatepay",
            Provider::Pagarme => "pagarme",
            Provider::PagSeguro => "pagseguro",
            Provider::Stripe => "stripe",
            Provider::MercadoPago => "mercadopago",
            Provider::Unknown(name) => name,
        }
    }

    /// Human-readable gateway name used in user-facing messages
    pub fn display_name(&self) -> &str {
        match self {
            Provider::AbacatePay => "AbacatePay",
            Provider::Pagarme => "Pagar.me",
            Provider::PagSeguro => "PagSeguro",
            Provider::Stripe => "Stripe",
            Provider::MercadoPago => "Mercado Pago",
            Provider::Unknown(name) => name,
        }
    }
}

impl From<String> for Provider {
    fn from(value: String) -> Self {
        match value.as_str() {
            "abacatepay" => Provider::AbacatePay,
            "pagarme" => Provider::Pagarme,
            "pagseguro" => Provider::PagSeguro,
            "stripe" => Provider::Stripe,
            "mercadopago" => Provider::MercadoPago,
            _ => Provider::Unknown(value),
        }
    }
}

impl From<Provider> for String {
    fn from(value: Provider) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    CreditCard,
    Boleto,
    Pix,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::CreditCard => "credit_card",
            PaymentMethod::Boleto => "boleto",
            PaymentMethod::Pix => "pix",
        }
    }
}

impl FromStr for PaymentMethod {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "credit_card" => Ok(PaymentMethod::CreditCard),
            "boleto" => Ok(PaymentMethod::Boleto),
            "pix" => Ok(PaymentMethod::Pix),
            other => Err(AppError::validation(format!(
                "Método de pagamento não suportado: {}",
                other
            ))),
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical payment status every gateway vocabulary is normalized into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Processing,
    Paid,
    Failed,
    Refunded,
    Cancelled,
}

impl PaymentStatus {
    pub const ALL: [PaymentStatus; 6] = [
        PaymentStatus::Pending,
        PaymentStatus::Processing,
        PaymentStatus::Paid,
        PaymentStatus::Failed,
        PaymentStatus::Refunded,
        PaymentStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Processing => "processing",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Refunded => "refunded",
            PaymentStatus::Cancelled => "cancelled",
        }
    }

    /// Whether a stored transaction may move from `self` to `next`.
    ///
    /// Failed, refunded and cancelled are terminal; a paid transaction can
    /// only be refunded.
    pub fn can_transition_to(&self, next: PaymentStatus) -> bool {
        use PaymentStatus::*;

        match (self, next) {
            (Pending, Pending) => false,
            (Pending, _) => true,
            (Processing, Paid | Failed | Cancelled) => true,
            (Paid, Refunded) => true,
            _ => false,
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentType {
    #[default]
    Cpf,
    Cnpj,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub document: String,
    #[serde(default)]
    pub document_type: DocumentType,
}

impl Customer {
    /// CPF/CNPJ without formatting punctuation, as gateways expect it
    pub fn document_digits(&self) -> String {
        digits_only(&self.document)
    }

    /// True when name, e-mail and document are all filled in
    pub fn is_complete(&self) -> bool {
        !self.name.trim().is_empty()
            && self.email.as_deref().is_some_and(|e| !e.trim().is_empty())
            && !self.document_digits().is_empty()
    }
}

/// Card data as typed by the payer; strings keep leading zeros intact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditCard {
    pub number: String,
    pub holder_name: String,
    pub exp_month: String,
    pub exp_year: String,
    pub cvv: String,
}

impl CreditCard {
    pub fn number_digits(&self) -> String {
        digits_only(&self.number)
    }

    pub fn last_digits(&self) -> String {
        let digits = self.number_digits();
        let start = digits.len().saturating_sub(4);
        digits[start..].to_string()
    }

    /// Expiry month as a number in 1..=12
    pub fn exp_month_numeric(&self) -> Option<u32> {
        self.exp_month
            .trim()
            .parse::<u32>()
            .ok()
            .filter(|m| (1..=12).contains(m))
    }

    /// Expiry year as a four-digit number; two-digit years are read as 20YY
    pub fn exp_year_numeric(&self) -> Option<u32> {
        let year = self.exp_year.trim();
        let value = year.parse::<u32>().ok()?;
        match year.len() {
            2 => Some(2000 + value),
            4 => Some(value),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CardBrand {
    Visa,
    Mastercard,
    Amex,
    Discover,
    Unknown,
}

impl CardBrand {
    /// Brand guess from the leading digit; cosmetic only
    pub fn from_number(number: &str) -> Self {
        match digits_only(number).chars().next() {
            Some('4') => CardBrand::Visa,
            Some('5') => CardBrand::Mastercard,
            Some('3') => CardBrand::Amex,
            Some('6') => CardBrand::Discover,
            _ => CardBrand::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CardBrand::Visa => "visa",
            CardBrand::Mastercard => "mastercard",
            CardBrand::Amex => "amex",
            CardBrand::Discover => "discover",
            CardBrand::Unknown => "unknown",
        }
    }
}

/// Longest Pix expiration accepted from callers (30 days)
pub const MAX_PIX_EXPIRATION_SECS: u64 = 30 * 24 * 60 * 60;

pub const INVALID_PIX_EXPIRATION: &str = "Tempo de expiração do Pix inválido";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixOptions {
    /// Seconds until the Pix charge expires
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<u64>,
}

/// Payment submission exactly as received at the HTTP boundary
///
/// Every field is optional so presence checks produce a descriptive message
/// instead of a deserialization error.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PaymentSubmission {
    pub provider: Option<Provider>,
    pub method: Option<String>,
    pub amount: Option<i64>,
    pub customer: Option<Customer>,
    pub card: Option<CreditCard>,
    pub installments: Option<u32>,
    pub pix: Option<PixOptions>,
}

impl PaymentSubmission {
    /// Validate boundary-level fields and build a [`PaymentRequest`]
    pub fn into_request(self) -> AppResult<PaymentRequest> {
        let (Some(provider), Some(method), Some(amount)) = (self.provider, self.method, self.amount)
        else {
            return Err(AppError::validation(
                "Campos obrigatórios ausentes: provider, method, amount",
            ));
        };

        if amount <= 0 {
            return Err(AppError::validation(
                "O valor do pagamento deve ser maior que zero",
            ));
        }

        let method: PaymentMethod = method.parse()?;

        if self.installments == Some(0) {
            return Err(AppError::validation("Número de parcelas inválido"));
        }

        let expires_in = self.pix.as_ref().and_then(|p| p.expires_in);
        if expires_in.is_some_and(|secs| secs > MAX_PIX_EXPIRATION_SECS) {
            return Err(AppError::validation(INVALID_PIX_EXPIRATION));
        }

        Ok(PaymentRequest {
            provider,
            method,
            amount: amount as u64,
            customer: self.customer,
            card: self.card,
            installments: self.installments,
            pix: self.pix,
        })
    }
}

/// Payment request for a single dispatch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRequest {
    pub provider: Provider,
    pub method: PaymentMethod,
    /// Amount in centavos, always > 0
    pub amount: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer: Option<Customer>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub card: Option<CreditCard>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub installments: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pix: Option<PixOptions>,
}

impl PaymentRequest {
    pub fn pix_expires_in(&self, default_secs: u64) -> u64 {
        self.pix
            .as_ref()
            .and_then(|p| p.expires_in)
            .filter(|secs| *secs > 0)
            .unwrap_or(default_secs)
    }
}

/// Canonical response returned by every provider client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentResponse {
    pub success: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<PaymentData>,
}

impl PaymentResponse {
    pub fn success(message: impl Into<String>, data: PaymentData) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Some(data),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: None,
        }
    }

    pub fn failure_with_data(message: impl Into<String>, data: PaymentData) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: Some(data),
        }
    }

    pub fn transaction_id(&self) -> Option<&str> {
        self.data.as_ref().map(|d| d.transaction_id.as_str())
    }
}

/// Structured payload of a payment response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentData {
    pub transaction_id: String,
    pub status: PaymentStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<u64>,
    #[serde(flatten)]
    pub details: MethodDetails,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub test_mode: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub simulated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_response: Option<serde_json::Value>,
}

impl PaymentData {
    pub fn new(
        transaction_id: impl Into<String>,
        status: PaymentStatus,
        details: MethodDetails,
    ) -> Self {
        Self {
            transaction_id: transaction_id.into(),
            status,
            amount: None,
            details,
            test_mode: false,
            simulated: false,
            provider_response: None,
        }
    }

    pub fn with_amount(mut self, amount: u64) -> Self {
        self.amount = Some(amount);
        self
    }

    pub fn with_provider_response(mut self, response: serde_json::Value) -> Self {
        self.provider_response = Some(response);
        self
    }

    pub fn in_test_mode(mut self) -> Self {
        self.test_mode = true;
        self
    }

    pub fn method(&self) -> PaymentMethod {
        self.details.method()
    }
}

/// Method-specific artifacts, tagged by payment method
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum MethodDetails {
    CreditCard(CardDetails),
    Boleto(BoletoDetails),
    Pix(PixDetails),
}

impl MethodDetails {
    pub fn method(&self) -> PaymentMethod {
        match self {
            MethodDetails::CreditCard(_) => PaymentMethod::CreditCard,
            MethodDetails::Boleto(_) => PaymentMethod::Boleto,
            MethodDetails::Pix(_) => PaymentMethod::Pix,
        }
    }

    /// Whether the payer received something to pay with
    pub fn has_artifact(&self) -> bool {
        match self {
            MethodDetails::CreditCard(_) => true,
            MethodDetails::Boleto(b) => b.boleto_url.is_some() || b.boleto_barcode.is_some(),
            MethodDetails::Pix(p) => {
                p.pix_code.is_some() || p.pix_qr_code.is_some() || p.payment_url.is_some()
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardDetails {
    /// Hosted checkout page, for gateways that collect card data themselves
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub installments: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub card_last_digits: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub card_brand: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dev_mode: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoletoDetails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boleto_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boleto_barcode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub charge_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixDetails {
    /// Copy-and-paste EMV payload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pix_code: Option<String>,
    /// QR code PNG, base64 without data-URI prefix
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pix_qr_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_url: Option<String>,
}

pub(crate) fn digits_only(value: &str) -> String {
    value.chars().filter(|c| c.is_ascii_digit()).collect()
}
