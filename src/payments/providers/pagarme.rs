//! Pagar.me payment provider implementation
//!
//! Live mode talks to the Core API v5 orders endpoint. Every method creates a
//! single-charge order and the artifacts of its last transaction are lifted
//! into the canonical response.

use crate::config::{GatewayDefaults, GatewayMode, PagarmeConfig};
use crate::error::{AppError, AppResult, ExternalError};
use crate::payments::gateway_client::{GatewayAuth, GatewayClient};
use crate::payments::simulation;
use crate::payments::status::PAGARME;
use crate::payments::traits::PaymentProvider;
use crate::payments::types::{
    BoletoDetails, CardBrand, CardDetails, CreditCard, Customer, DocumentType, MethodDetails,
    PaymentData, PaymentMethod, PaymentRequest, PaymentResponse, PaymentStatus, PixDetails,
    Provider, INVALID_PIX_EXPIRATION,
};
use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{error, info, warn};
use uuid::Uuid;

const PROVIDER_NAME: &str = "Pagar.me";
const ORDERS_PATH: &str = "/core/v5/orders";
const DEFAULT_PIX_EXPIRATION_SECS: u64 = 3600;
const BOLETO_DUE_DAYS: i64 = 3;

/// Pagar.me payment provider
pub struct PagarmeProvider {
    config: PagarmeConfig,
    defaults: GatewayDefaults,
    client: Option<GatewayClient>,
}

impl PagarmeProvider {
    pub fn new(config: PagarmeConfig, defaults: GatewayDefaults) -> AppResult<Self> {
        let client = match (&config.mode, &config.secret_key) {
            (GatewayMode::Live, Some(secret)) => Some(GatewayClient::new(
                PROVIDER_NAME,
                &config.base_url,
                GatewayAuth::Basic(secret.clone()),
                defaults.request_timeout,
            )?),
            _ => None,
        };

        Ok(Self {
            config,
            defaults,
            client,
        })
    }

    fn client(&self) -> AppResult<&GatewayClient> {
        self.client.as_ref().ok_or_else(|| {
            AppError::internal("Pagar.me client requested while running in simulated mode")
        })
    }

    async fn create_order(
        &self,
        request: &PaymentRequest,
        checked: &Checked<'_>,
    ) -> AppResult<PaymentResponse> {
        let payload = order_payload(request, checked)?;
        let reply = self.client()?.post_json(ORDERS_PATH, &payload).await?;

        if !reply.is_success() {
            let message = reply
                .json_value()
                .as_ref()
                .and_then(api_error_message)
                .unwrap_or_else(|| format!("Erro na API: {}", reply.status.as_u16()));
            return Ok(PaymentResponse::failure(message));
        }

        let raw: Value = reply.json(PROVIDER_NAME)?;
        let order: PagarmeOrder = serde_json::from_value(raw.clone()).map_err(|e| {
            AppError::from(ExternalError::InvalidResponse {
                provider: PROVIDER_NAME.to_string(),
                message: e.to_string(),
            })
        })?;

        let charge = order.charges.first();
        let raw_status = charge.map_or(order.status.as_str(), |c| c.status.as_str());
        let status = self.normalize_status(raw_status);
        let last = charge.and_then(|c| c.last_transaction.as_ref());

        info!(
            transaction_id = %order.id,
            raw_status,
            %status,
            "Pagar.me order created"
        );

        let details = match checked {
            Checked::Card(card) => MethodDetails::CreditCard(CardDetails {
                installments: Some(request.installments.unwrap_or(1)),
                card_last_digits: Some(card.last_digits()),
                card_brand: Some(CardBrand::from_number(&card.number).as_str().to_string()),
                ..Default::default()
            }),
            Checked::Boleto(_) => MethodDetails::Boleto(BoletoDetails {
                boleto_url: last.and_then(|t| t.url.clone().or_else(|| t.pdf.clone())),
                boleto_barcode: last.and_then(|t| t.line.clone().or_else(|| t.barcode.clone())),
                due_date: last.and_then(|t| t.due_at.clone()),
                charge_id: charge.map(|c| c.id.clone()),
            }),
            Checked::Pix(_) => {
                let pix_qr_code = match last.and_then(|t| t.qr_code_url.as_deref()) {
                    Some(url) => self.fetch_qr_image(url).await,
                    None => None,
                };
                MethodDetails::Pix(PixDetails {
                    pix_code: last.and_then(|t| t.qr_code.clone()),
                    pix_qr_code,
                    expires_at: last.and_then(|t| t.expires_at.clone()),
                    payment_url: None,
                })
            }
        };

        let data = PaymentData::new(&order.id, status, details)
            .with_amount(order.amount.unwrap_or(request.amount))
            .with_provider_response(raw);

        if status == PaymentStatus::Failed {
            return Ok(PaymentResponse::failure_with_data(
                "Pagamento recusado pela operadora do cartão",
                data,
            ));
        }

        let message = match request.method {
            PaymentMethod::CreditCard if status == PaymentStatus::Paid => {
                "Pagamento aprovado com sucesso!"
            }
            PaymentMethod::CreditCard => "Pagamento em processamento",
            PaymentMethod::Boleto => "Boleto gerado com sucesso!",
            PaymentMethod::Pix => "QR Code Pix gerado com sucesso!",
        };

        Ok(PaymentResponse::success(message, data))
    }

    async fn fetch_qr_image(&self, url: &str) -> Option<String> {
        let client = self.client.as_ref()?;
        match client.fetch_base64(url).await {
            Ok(encoded) => Some(encoded),
            Err(e) => {
                warn!(%url, error = %e, "could not inline Pix QR code image");
                None
            }
        }
    }

    async fn simulated(&self, request: &PaymentRequest, checked: &Checked<'_>) -> PaymentResponse {
        simulation::latency(self.defaults.simulated_latency).await;

        let transaction_id = simulation::transaction_id("trx_");

        match checked {
            Checked::Card(card) => PaymentResponse::success(
                "Pagamento aprovado com sucesso!",
                PaymentData::new(
                    &transaction_id,
                    PaymentStatus::Paid,
                    MethodDetails::CreditCard(CardDetails {
                        installments: Some(request.installments.unwrap_or(1)),
                        card_last_digits: Some(card.last_digits()),
                        card_brand: Some(CardBrand::from_number(&card.number).as_str().to_string()),
                        ..Default::default()
                    }),
                )
                .with_amount(request.amount)
                .in_test_mode(),
            ),
            Checked::Boleto(_) => {
                let due = Utc::now() + ChronoDuration::days(BOLETO_DUE_DAYS);
                PaymentResponse::success(
                    "Boleto gerado com sucesso!",
                    PaymentData::new(
                        &transaction_id,
                        PaymentStatus::Pending,
                        MethodDetails::Boleto(BoletoDetails {
                            boleto_url: Some(format!(
                                "https://sandbox.pagar.me/boleto/{}",
                                transaction_id
                            )),
                            boleto_barcode: Some(simulation::boleto_barcode()),
                            due_date: Some(due.to_rfc3339()),
                            charge_id: None,
                        }),
                    )
                    .with_amount(request.amount)
                    .in_test_mode(),
                )
            }
            Checked::Pix(_) => {
                let expires_in = request.pix_expires_in(DEFAULT_PIX_EXPIRATION_SECS);
                let Some(expires_at) = i64::try_from(expires_in)
                    .ok()
                    .and_then(ChronoDuration::try_seconds)
                    .and_then(|ttl| Utc::now().checked_add_signed(ttl))
                else {
                    warn!(expires_in, "Pix expiration out of range");
                    return PaymentResponse::failure(INVALID_PIX_EXPIRATION);
                };
                PaymentResponse::success(
                    "QR Code Pix gerado com sucesso!",
                    PaymentData::new(
                        &transaction_id,
                        PaymentStatus::Pending,
                        MethodDetails::Pix(PixDetails {
                            pix_code: Some(simulation::pix_code()),
                            pix_qr_code: Some(simulation::PLACEHOLDER_QR_PNG.to_string()),
                            expires_at: Some(expires_at.to_rfc3339()),
                            payment_url: None,
                        }),
                    )
                    .with_amount(request.amount)
                    .in_test_mode(),
                )
            }
        }
    }
}

/// Request data that passed the per-method checks
enum Checked<'a> {
    Card(&'a CreditCard),
    Boleto(&'a Customer),
    Pix(&'a Customer),
}

impl Checked<'_> {
    fn customer(&self) -> Option<&Customer> {
        match self {
            Checked::Card(_) => None,
            Checked::Boleto(customer) | Checked::Pix(customer) => Some(customer),
        }
    }
}

fn check(request: &PaymentRequest) -> AppResult<Checked<'_>> {
    match request.method {
        PaymentMethod::CreditCard => {
            let card = request
                .card
                .as_ref()
                .ok_or_else(|| AppError::validation("Dados do cartão não fornecidos"))?;
            let digits = card.number_digits().len();
            if !(13..=19).contains(&digits) {
                return Err(AppError::validation("Número do cartão inválido"));
            }
            Ok(Checked::Card(card))
        }
        PaymentMethod::Boleto => request
            .customer
            .as_ref()
            .map(Checked::Boleto)
            .ok_or_else(|| AppError::validation("Dados do cliente não fornecidos")),
        PaymentMethod::Pix => request
            .customer
            .as_ref()
            .map(Checked::Pix)
            .ok_or_else(|| AppError::validation("Dados do cliente não fornecidos")),
    }
}

fn order_payload(request: &PaymentRequest, checked: &Checked<'_>) -> AppResult<Value> {
    let payment = match checked {
        Checked::Card(card) => {
            let (Some(exp_month), Some(exp_year)) =
                (card.exp_month_numeric(), card.exp_year_numeric())
            else {
                return Err(AppError::validation("Validade do cartão inválida"));
            };
            json!({
                "payment_method": "credit_card",
                "credit_card": {
                    "installments": request.installments.unwrap_or(1),
                    "statement_descriptor": "BRPAY",
                    "card": {
                        "number": card.number_digits(),
                        "holder_name": card.holder_name,
                        "exp_month": exp_month,
                        "exp_year": exp_year,
                        "cvv": card.cvv,
                    }
                }
            })
        }
        Checked::Boleto(_) => {
            let due = Utc::now() + ChronoDuration::days(BOLETO_DUE_DAYS);
            json!({
                "payment_method": "boleto",
                "boleto": {
                    "instructions": "Não receber após o vencimento",
                    "due_at": due.to_rfc3339(),
                    "document_number": Utc::now().timestamp_millis().to_string(),
                    "type": "DM",
                }
            })
        }
        Checked::Pix(_) => json!({
            "payment_method": "pix",
            "pix": {
                "expires_in": request.pix_expires_in(DEFAULT_PIX_EXPIRATION_SECS),
            }
        }),
    };

    Ok(json!({
        "code": format!("order-{}", Uuid::new_v4().simple()),
        "items": [{
            "amount": request.amount,
            "description": format!("Pagamento via {}", request.method),
            "quantity": 1,
            "code": "brpay-item",
        }],
        "customer": customer_payload(checked.customer().or(request.customer.as_ref())),
        "payments": [payment],
    }))
}

fn customer_payload(customer: Option<&Customer>) -> Value {
    let Some(customer) = customer else {
        return json!({
            "name": "Cliente",
            "email": "cliente@email.com",
            "type": "individual",
        });
    };

    let (kind, document_type) = match customer.document_type {
        DocumentType::Cpf => ("individual", "CPF"),
        DocumentType::Cnpj => ("company", "CNPJ"),
    };

    json!({
        "name": customer.name,
        "email": customer.email.as_deref().unwrap_or("cliente@email.com"),
        "document": customer.document_digits(),
        "document_type": document_type,
        "type": kind,
        "phones": {
            "mobile_phone": {
                "country_code": "55",
                "area_code": "11",
                "number": "999999999",
            }
        },
    })
}

fn api_error_message(body: &Value) -> Option<String> {
    if let Some(message) = body.get("message").and_then(Value::as_str) {
        return Some(message.to_string());
    }
    body.get("errors")
        .and_then(Value::as_object)
        .and_then(|errors| errors.values().next())
        .and_then(|messages| messages.get(0))
        .and_then(Value::as_str)
        .map(str::to_string)
}

#[async_trait]
impl PaymentProvider for PagarmeProvider {
    fn provider(&self) -> Provider {
        Provider::Pagarme
    }

    fn mode(&self) -> GatewayMode {
        self.config.mode
    }

    fn normalize_status(&self, raw: &str) -> PaymentStatus {
        PAGARME.normalize(raw)
    }

    async fn process(&self, request: &PaymentRequest) -> PaymentResponse {
        info!(
            method = %request.method,
            amount = request.amount,
            mode = ?self.config.mode,
            "processing Pagar.me payment"
        );

        let checked = match check(request) {
            Ok(checked) => checked,
            Err(e) => return PaymentResponse::failure(e.to_string()),
        };

        if self.config.mode == GatewayMode::Simulated {
            return self.simulated(request, &checked).await;
        }

        self.create_order(request, &checked)
            .await
            .unwrap_or_else(|e| {
                error!(method = %request.method, error = %e, "Pagar.me payment failed");
                PaymentResponse::failure(e.to_string())
            })
    }
}

#[derive(Debug, Deserialize)]
struct PagarmeOrder {
    id: String,
    status: String,
    #[serde(default)]
    amount: Option<u64>,
    #[serde(default)]
    charges: Vec<PagarmeCharge>,
}

#[derive(Debug, Deserialize)]
struct PagarmeCharge {
    id: String,
    status: String,
    #[serde(default)]
    last_transaction: Option<PagarmeTransaction>,
}

#[derive(Debug, Deserialize)]
struct PagarmeTransaction {
    #[serde(default)]
    qr_code: Option<String>,
    #[serde(default)]
    qr_code_url: Option<String>,
    #[serde(default)]
    expires_at: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    pdf: Option<String>,
    #[serde(default)]
    line: Option<String>,
    #[serde(default)]
    barcode: Option<String>,
    #[serde(default)]
    due_at: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payments::types::PixOptions;
    use std::time::Duration;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn defaults() -> GatewayDefaults {
        GatewayDefaults {
            app_url: "http://localhost:3000".to_string(),
            request_timeout: Duration::from_secs(5),
            simulated_latency: Duration::ZERO,
        }
    }

    fn simulated_provider() -> PagarmeProvider {
        PagarmeProvider::new(
            PagarmeConfig {
                secret_key: None,
                base_url: "http://unused".to_string(),
                mode: GatewayMode::Simulated,
            },
            defaults(),
        )
        .unwrap()
    }

    fn live_provider(base_url: &str) -> PagarmeProvider {
        PagarmeProvider::new(
            PagarmeConfig {
                secret_key: Some("sk_test_abc".to_string()),
                base_url: base_url.to_string(),
                mode: GatewayMode::Live,
            },
            defaults(),
        )
        .unwrap()
    }

    fn ana() -> Customer {
        Customer {
            name: "Ana".to_string(),
            email: Some("ana@example.com".to_string()),
            document: "123.456.789-00".to_string(),
            document_type: DocumentType::Cpf,
        }
    }

    fn card(number: &str) -> CreditCard {
        CreditCard {
            number: number.to_string(),
            holder_name: "ANA SILVA".to_string(),
            exp_month: "07".to_string(),
            exp_year: "29".to_string(),
            cvv: "123".to_string(),
        }
    }

    fn request(method: PaymentMethod) -> PaymentRequest {
        PaymentRequest {
            provider: Provider::Pagarme,
            method,
            amount: 5000,
            customer: None,
            card: None,
            installments: None,
            pix: None,
        }
    }

    #[tokio::test]
    async fn test_simulated_pix_example() {
        let mut req = request(PaymentMethod::Pix);
        req.customer = Some(Customer {
            email: None,
            document: "12345678900".to_string(),
            ..ana()
        });

        let response = simulated_provider().process(&req).await;

        assert!(response.success);
        let data = response.data.unwrap();
        assert_eq!(data.status, PaymentStatus::Pending);
        assert!(data.test_mode);
        assert!(data.transaction_id.starts_with("trx_"));
        match data.details {
            MethodDetails::Pix(pix) => {
                assert!(!pix.pix_code.unwrap().is_empty());
                assert!(pix.pix_qr_code.is_some());
            }
            other => panic!("unexpected details: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_simulated_pix_out_of_range_expiration_fails() {
        let provider = simulated_provider();

        for expires_in in [10_000_000_000_000, u64::MAX] {
            let mut req = request(PaymentMethod::Pix);
            req.customer = Some(ana());
            req.pix = Some(PixOptions {
                expires_in: Some(expires_in),
            });

            let response = provider.process(&req).await;

            assert!(!response.success);
            assert_eq!(response.message, INVALID_PIX_EXPIRATION);
        }
    }

    #[tokio::test]
    async fn test_card_checks() {
        let provider = simulated_provider();

        let response = provider.process(&request(PaymentMethod::CreditCard)).await;
        assert_eq!(response.message, "Dados do cartão não fornecidos");

        let mut req = request(PaymentMethod::CreditCard);
        req.card = Some(card("4111 1111"));
        let response = provider.process(&req).await;
        assert!(!response.success);
        assert_eq!(response.message, "Número do cartão inválido");
    }

    #[tokio::test]
    async fn test_simulated_card_is_approved() {
        let mut req = request(PaymentMethod::CreditCard);
        req.card = Some(card("5500 0000 0000 0004"));
        req.installments = Some(3);

        let response = simulated_provider().process(&req).await;

        assert!(response.success);
        let data = response.data.unwrap();
        assert_eq!(data.status, PaymentStatus::Paid);
        match data.details {
            MethodDetails::CreditCard(details) => {
                assert_eq!(details.installments, Some(3));
                assert_eq!(details.card_last_digits.as_deref(), Some("0004"));
                assert_eq!(details.card_brand.as_deref(), Some("mastercard"));
            }
            other => panic!("unexpected details: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_boleto_and_pix_require_customer() {
        let provider = simulated_provider();
        for method in [PaymentMethod::Boleto, PaymentMethod::Pix] {
            let response = provider.process(&request(method)).await;
            assert!(!response.success);
            assert_eq!(response.message, "Dados do cliente não fornecidos");
        }
    }

    #[tokio::test]
    async fn test_simulated_boleto() {
        let mut req = request(PaymentMethod::Boleto);
        req.customer = Some(ana());

        let data = simulated_provider().process(&req).await.data.unwrap();
        match data.details {
            MethodDetails::Boleto(boleto) => {
                assert_eq!(
                    boleto.boleto_url,
                    Some(format!("https://sandbox.pagar.me/boleto/{}", data.transaction_id))
                );
                assert_eq!(boleto.boleto_barcode.unwrap().len(), 47);
                assert!(boleto.due_date.is_some());
            }
            other => panic!("unexpected details: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_live_pix_order() {
        let server = MockServer::start().await;
        let qr_url = format!("{}/qr/or_123.png", server.uri());

        Mock::given(method("POST"))
            .and(path(ORDERS_PATH))
            .and(header("authorization", "Basic c2tfdGVzdF9hYmM6"))
            .and(body_partial_json(json!({
                "customer": { "document": "12345678900", "type": "individual", "document_type": "CPF" },
                "payments": [{ "payment_method": "pix", "pix": { "expires_in": 3600 } }]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "or_123",
                "status": "pending",
                "amount": 5000,
                "charges": [{
                    "id": "ch_1",
                    "status": "pending",
                    "last_transaction": {
                        "qr_code": "00020101021226820014br.gov.bcb.pix",
                        "qr_code_url": qr_url,
                        "expires_at": "2026-10-20T12:00:00Z"
                    }
                }]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/qr/or_123.png"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1u8, 2, 3]))
            .mount(&server)
            .await;

        let mut req = request(PaymentMethod::Pix);
        req.customer = Some(ana());
        let response = live_provider(&server.uri()).process(&req).await;

        assert!(response.success, "{}", response.message);
        let data = response.data.unwrap();
        assert_eq!(data.transaction_id, "or_123");
        assert_eq!(data.status, PaymentStatus::Pending);
        assert!(!data.test_mode);
        match data.details {
            MethodDetails::Pix(pix) => {
                assert_eq!(pix.pix_code.as_deref(), Some("00020101021226820014br.gov.bcb.pix"));
                assert_eq!(pix.pix_qr_code.as_deref(), Some("AQID"));
            }
            other => panic!("unexpected details: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_live_qr_fetch_failure_keeps_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(ORDERS_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "or_456",
                "status": "pending",
                "charges": [{
                    "id": "ch_2",
                    "status": "pending",
                    "last_transaction": {
                        "qr_code": "000201",
                        "qr_code_url": format!("{}/missing.png", server.uri())
                    }
                }]
            })))
            .mount(&server)
            .await;

        let mut req = request(PaymentMethod::Pix);
        req.customer = Some(ana());
        let response = live_provider(&server.uri()).process(&req).await;

        assert!(response.success);
        match response.data.unwrap().details {
            MethodDetails::Pix(pix) => assert!(pix.pix_qr_code.is_none()),
            other => panic!("unexpected details: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_live_declined_card() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(ORDERS_PATH))
            .and(body_partial_json(json!({
                "payments": [{
                    "payment_method": "credit_card",
                    "credit_card": { "card": { "exp_month": 7, "exp_year": 2029 } }
                }]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "or_789",
                "status": "failed",
                "charges": [{ "id": "ch_3", "status": "failed" }]
            })))
            .mount(&server)
            .await;

        let mut req = request(PaymentMethod::CreditCard);
        req.card = Some(card("4000000000000002"));
        let response = live_provider(&server.uri()).process(&req).await;

        assert!(!response.success);
        assert_eq!(response.message, "Pagamento recusado pela operadora do cartão");
        assert_eq!(response.data.unwrap().status, PaymentStatus::Failed);
    }

    #[tokio::test]
    async fn test_live_api_error_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(ORDERS_PATH))
            .respond_with(ResponseTemplate::new(422).set_body_json(json!({
                "message": "The request is invalid.",
                "errors": { "customer.document": ["invalid"] }
            })))
            .mount(&server)
            .await;

        let mut req = request(PaymentMethod::Boleto);
        req.customer = Some(ana());
        let response = live_provider(&server.uri()).process(&req).await;

        assert!(!response.success);
        assert_eq!(response.message, "The request is invalid.");
    }

    #[test]
    fn test_invalid_expiry_is_rejected_before_sending() {
        let mut req = request(PaymentMethod::CreditCard);
        let mut bad = card("4111111111111111");
        bad.exp_month = "13".to_string();
        req.card = Some(bad);
        let checked = check(&req).unwrap();
        let err = order_payload(&req, &checked).unwrap_err();
        assert_eq!(err.to_string(), "Validade do cartão inválida");
    }
}
