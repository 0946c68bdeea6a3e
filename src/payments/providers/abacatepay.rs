//! AbacatePay payment provider implementation
//!
//! Pix through the `pixQrCode` API and card through a hosted billing page.
//! Boleto is not offered by AbacatePay.

use crate::config::{AbacatePayConfig, GatewayDefaults, GatewayMode};
use crate::error::{AppError, AppResult, ExternalError};
use crate::payments::gateway_client::{GatewayAuth, GatewayClient};
use crate::payments::simulation;
use crate::payments::status::ABACATEPAY;
use crate::payments::traits::PaymentProvider;
use crate::payments::types::{
    CardDetails, MethodDetails, PaymentData, PaymentMethod, PaymentRequest, PaymentResponse,
    PaymentStatus, PixDetails, Provider,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{error, info, warn};

const PROVIDER_NAME: &str = "AbacatePay";
const DATA_URI_PREFIX: &str = "data:image/png;base64,";
const DEFAULT_PIX_EXPIRATION_SECS: u64 = 3600;
const PLACEHOLDER_CELLPHONE: &str = "+5511999999999";

/// Result of the sandbox "simulate payment" operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationOutcome {
    pub success: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl SimulationOutcome {
    fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: None,
        }
    }
}

/// AbacatePay payment provider
pub struct AbacatePayProvider {
    config: AbacatePayConfig,
    defaults: GatewayDefaults,
    client: Option<GatewayClient>,
}

impl AbacatePayProvider {
    pub fn new(config: AbacatePayConfig, defaults: GatewayDefaults) -> AppResult<Self> {
        let client = match (&config.mode, &config.api_key) {
            (GatewayMode::Live, Some(key)) => Some(GatewayClient::new(
                PROVIDER_NAME,
                &config.base_url,
                GatewayAuth::Bearer(key.clone()),
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
            AppError::internal("AbacatePay client requested while running in simulated mode")
        })
    }

    /// Mark a dev-mode Pix charge as paid through the sandbox simulation API
    pub async fn simulate_pix_payment(&self, pix_qr_code_id: &str) -> SimulationOutcome {
        if self.config.mode == GatewayMode::Simulated {
            info!(transaction_id = pix_qr_code_id, "simulating Pix payment locally");
            return SimulationOutcome {
                success: true,
                message: "Pagamento simulado com sucesso! (MODO TESTE)".to_string(),
                data: Some(json!({
                    "data": {
                        "id": pix_qr_code_id,
                        "status": "PAID",
                        "devMode": true,
                    }
                })),
            };
        }

        match self.request_simulation(pix_qr_code_id).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(transaction_id = pix_qr_code_id, error = %e, "AbacatePay simulation failed");
                SimulationOutcome::failed(e.to_string())
            }
        }
    }

    async fn request_simulation(&self, pix_qr_code_id: &str) -> AppResult<SimulationOutcome> {
        let reply = self
            .client()?
            .post_json_with_query(
                "/v1/pixQrCode/simulate-payment",
                &[("id", pix_qr_code_id)],
                &json!({ "metadata": {} }),
            )
            .await?;

        if !reply.is_success() {
            return Ok(SimulationOutcome::failed(format!(
                "Erro ao simular pagamento: {}",
                reply.body
            )));
        }

        let data: Value = reply.json(PROVIDER_NAME)?;
        Ok(SimulationOutcome {
            success: true,
            message: "Pagamento simulado com sucesso!".to_string(),
            data: Some(data),
        })
    }

    async fn create_pix(&self, request: &PaymentRequest) -> AppResult<PaymentResponse> {
        let mut payload = json!({
            "amount": request.amount,
            "expiresIn": request.pix_expires_in(DEFAULT_PIX_EXPIRATION_SECS),
            "description": format!(
                "Pagamento - {}",
                request.customer.as_ref().map(|c| c.name.as_str()).unwrap_or("Cliente")
            ),
        });

        // The API rejects partial customers, so send all or nothing
        if let Some(customer) = request.customer.as_ref().filter(|c| c.is_complete()) {
            payload["customer"] = json!({
                "name": customer.name,
                "email": customer.email,
                "cellphone": PLACEHOLDER_CELLPHONE,
                "taxId": customer.document_digits(),
            });
        }

        let reply = self
            .client()?
            .post_json("/v1/pixQrCode/create", &payload)
            .await?;

        if !reply.is_success() {
            return Ok(PaymentResponse::failure(format!(
                "Erro ao criar QR Code PIX: {}",
                reply.body
            )));
        }

        let raw = extract_data(reply.json(PROVIDER_NAME)?)?;
        let pix: AbacatePixQrCode = parse(&raw)?;

        info!(
            transaction_id = %pix.id,
            status = %pix.status,
            dev_mode = pix.dev_mode,
            "AbacatePay Pix QR code created"
        );

        let details = PixDetails {
            pix_code: pix.br_code.clone(),
            pix_qr_code: pix.br_code_base64.as_deref().map(strip_data_uri),
            expires_at: pix.expires_at.clone(),
            payment_url: None,
        };
        let amount = pix.amount.unwrap_or(request.amount);

        if pix.dev_mode && self.config.auto_simulate {
            info!(transaction_id = %pix.id, "dev mode detected, simulating payment");
            let outcome = self.simulate_pix_payment(&pix.id).await;

            if outcome.success {
                let mut data =
                    PaymentData::new(&pix.id, PaymentStatus::Paid, MethodDetails::Pix(details))
                        .with_amount(amount);
                data.simulated = true;
                data.provider_response = outcome.data;
                return Ok(PaymentResponse::success(
                    "Pagamento PIX simulado com sucesso! (Dev Mode)",
                    data,
                ));
            }

            warn!(
                transaction_id = %pix.id,
                message = %outcome.message,
                "automatic simulation failed, returning pending charge"
            );
        }

        let data = PaymentData::new(
            &pix.id,
            self.normalize_status(&pix.status),
            MethodDetails::Pix(details),
        )
        .with_amount(amount)
        .with_provider_response(raw);

        Ok(PaymentResponse::success("QR Code PIX criado com sucesso!", data))
    }

    async fn create_card_billing(&self, request: &PaymentRequest) -> AppResult<PaymentResponse> {
        let app_url = &self.defaults.app_url;
        let customer = request.customer.as_ref();
        let payload = json!({
            "frequency": "ONE_TIME",
            "methods": ["CARD"],
            "products": [{
                "externalId": format!("prod-{}", chrono::Utc::now().timestamp_millis()),
                "name": "Pagamento de teste",
                "quantity": 1,
                "price": request.amount,
            }],
            "returnUrl": app_url,
            "completionUrl": format!("{}/transactions", app_url),
            "customer": {
                "name": customer.map(|c| c.name.as_str()).unwrap_or("Cliente Teste"),
                "email": customer.and_then(|c| c.email.as_deref()).unwrap_or("cliente@teste.com"),
                "cellphone": PLACEHOLDER_CELLPHONE,
                "taxId": customer
                    .map(|c| c.document_digits())
                    .filter(|d| !d.is_empty())
                    .unwrap_or_else(|| "00000000000".to_string()),
            },
        });

        let reply = self.client()?.post_json("/v1/billing/create", &payload).await?;

        if !reply.is_success() {
            error!(status = %reply.status, body = %reply.body, "AbacatePay card billing rejected");
            let reason = if reply.status == reqwest::StatusCode::BAD_REQUEST {
                "método em beta, contate o suporte".to_string()
            } else {
                reply.body.clone()
            };
            return Ok(PaymentResponse::failure(format!(
                "Cartão não disponível: {}",
                reason
            )));
        }

        let envelope: Value = reply.json(PROVIDER_NAME)?;
        if let Some(err) = envelope.get("error").filter(|e| !e.is_null()) {
            let message = err
                .as_str()
                .map(str::to_string)
                .unwrap_or_else(|| err.to_string());
            return Ok(PaymentResponse::failure(message));
        }

        let Ok(raw) = extract_data(envelope) else {
            return Ok(PaymentResponse::failure("Erro ao criar cobrança com cartão"));
        };
        let billing: AbacateBilling = parse(&raw)?;

        info!(transaction_id = %billing.id, status = %billing.status, "AbacatePay billing created");

        let details = CardDetails {
            payment_url: billing.url.clone(),
            dev_mode: Some(billing.dev_mode),
            ..Default::default()
        };
        let data = PaymentData::new(
            &billing.id,
            self.normalize_status(&billing.status),
            MethodDetails::CreditCard(details),
        )
        .with_amount(billing.amount.unwrap_or(request.amount))
        .with_provider_response(raw);

        Ok(PaymentResponse::success(
            "Cobrança criada! Clique no botão para pagar.",
            data,
        ))
    }

    async fn simulated(&self, request: &PaymentRequest) -> PaymentResponse {
        warn!("AbacatePay in simulated mode, configure ABACATEPAY_API_KEY to use the real API");
        simulation::latency(self.defaults.simulated_latency).await;

        let transaction_id = simulation::transaction_id("test_");
        let payment_url = format!("https://abacatepay.com/pay/{}", transaction_id);

        match request.method {
            PaymentMethod::Pix => PaymentResponse::success(
                "Cobrança Pix criada! (MODO TESTE)",
                PaymentData::new(
                    &transaction_id,
                    PaymentStatus::Pending,
                    MethodDetails::Pix(PixDetails {
                        pix_code: Some(simulation::fixed_pix_code("abacate-test-key")),
                        payment_url: Some(payment_url),
                        ..Default::default()
                    }),
                )
                .with_amount(request.amount)
                .in_test_mode(),
            ),
            PaymentMethod::CreditCard => PaymentResponse::success(
                "Cobrança criada! (MODO TESTE)",
                PaymentData::new(
                    &transaction_id,
                    PaymentStatus::Pending,
                    MethodDetails::CreditCard(CardDetails {
                        payment_url: Some(payment_url),
                        ..Default::default()
                    }),
                )
                .with_amount(request.amount)
                .in_test_mode(),
            ),
            PaymentMethod::Boleto => {
                PaymentResponse::failure("Boleto não disponível no AbacatePay (MODO TESTE)")
            }
        }
    }
}

#[async_trait]
impl PaymentProvider for AbacatePayProvider {
    fn provider(&self) -> Provider {
        Provider::AbacatePay
    }

    fn mode(&self) -> GatewayMode {
        self.config.mode
    }

    fn normalize_status(&self, raw: &str) -> PaymentStatus {
        ABACATEPAY.normalize(raw)
    }

    async fn process(&self, request: &PaymentRequest) -> PaymentResponse {
        info!(
            method = %request.method,
            amount = request.amount,
            mode = ?self.config.mode,
            "processing AbacatePay payment"
        );

        if self.config.mode == GatewayMode::Simulated {
            return self.simulated(request).await;
        }

        let result = match request.method {
            PaymentMethod::Pix => self.create_pix(request).await,
            PaymentMethod::CreditCard => self.create_card_billing(request).await,
            PaymentMethod::Boleto => Ok(PaymentResponse::failure(
                "Boleto ainda não disponível no AbacatePay",
            )),
        };

        result.unwrap_or_else(|e| {
            error!(method = %request.method, error = %e, "AbacatePay payment failed");
            PaymentResponse::failure(e.to_string())
        })
    }
}

/// AbacatePay wraps every payload as `{ "data": ..., "error": ... }`
fn extract_data(envelope: Value) -> AppResult<Value> {
    match envelope {
        Value::Object(mut map) => match map.remove("data") {
            Some(data) if !data.is_null() => Ok(data),
            _ => Err(invalid_response("response without data")),
        },
        _ => Err(invalid_response("response is not an object")),
    }
}

fn parse<T: for<'de> Deserialize<'de>>(raw: &Value) -> AppResult<T> {
    serde_json::from_value(raw.clone()).map_err(|e| invalid_response(e.to_string()))
}

fn invalid_response(message: impl Into<String>) -> AppError {
    AppError::external(ExternalError::InvalidResponse {
        provider: PROVIDER_NAME.to_string(),
        message: message.into(),
    })
}

fn strip_data_uri(value: &str) -> String {
    value.strip_prefix(DATA_URI_PREFIX).unwrap_or(value).to_string()
}

// Pix QR code object
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AbacatePixQrCode {
    id: String,
    #[serde(default)]
    amount: Option<u64>,
    status: String,
    #[serde(default)]
    dev_mode: bool,
    #[serde(default)]
    br_code: Option<String>,
    #[serde(default)]
    br_code_base64: Option<String>,
    #[serde(default)]
    expires_at: Option<String>,
}

// Billing object
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AbacateBilling {
    id: String,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    amount: Option<u64>,
    status: String,
    #[serde(default)]
    dev_mode: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payments::types::Customer;
    use std::time::Duration;
    use wiremock::matchers::{body_partial_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn defaults() -> GatewayDefaults {
        GatewayDefaults {
            app_url: "http://localhost:3000".to_string(),
            request_timeout: Duration::from_secs(5),
            simulated_latency: Duration::ZERO,
        }
    }

    fn live_provider(base_url: &str, auto_simulate: bool) -> AbacatePayProvider {
        AbacatePayProvider::new(
            AbacatePayConfig {
                api_key: Some("abc_dev_key".to_string()),
                base_url: base_url.to_string(),
                mode: GatewayMode::Live,
                auto_simulate,
            },
            defaults(),
        )
        .unwrap()
    }

    fn simulated_provider() -> AbacatePayProvider {
        AbacatePayProvider::new(
            AbacatePayConfig {
                api_key: None,
                base_url: "http://unused".to_string(),
                mode: GatewayMode::Simulated,
                auto_simulate: true,
            },
            defaults(),
        )
        .unwrap()
    }

    fn request(method: PaymentMethod) -> PaymentRequest {
        PaymentRequest {
            provider: Provider::AbacatePay,
            method,
            amount: 2500,
            customer: Some(Customer {
                name: "Ana".to_string(),
                email: Some("ana@example.com".to_string()),
                document: "123.456.789-00".to_string(),
                document_type: Default::default(),
            }),
            card: None,
            installments: None,
            pix: None,
        }
    }

    #[tokio::test]
    async fn test_simulated_pix() {
        let response = simulated_provider().process(&request(PaymentMethod::Pix)).await;
        assert!(response.success);
        let data = response.data.unwrap();
        assert!(data.test_mode);
        assert!(data.transaction_id.starts_with("test_"));
        assert_eq!(data.status, PaymentStatus::Pending);
        match data.details {
            MethodDetails::Pix(pix) => assert!(pix.pix_code.unwrap().contains("abacate-test-key")),
            other => panic!("unexpected details: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_simulated_boleto_is_unsupported() {
        let response = simulated_provider()
            .process(&request(PaymentMethod::Boleto))
            .await;
        assert!(!response.success);
    }

    #[tokio::test]
    async fn test_live_pix_with_auto_simulation() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/pixQrCode/create"))
            .and(header("authorization", "Bearer abc_dev_key"))
            .and(body_partial_json(json!({
                "amount": 2500,
                "expiresIn": 3600,
                "customer": { "taxId": "12345678900" }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": {
                    "id": "pix_char_123",
                    "amount": 2500,
                    "status": "PENDING",
                    "devMode": true,
                    "brCode": "00020101021226950014br.gov.bcb.pix",
                    "brCodeBase64": "data:image/png;base64,iVBORw0KGgo=",
                    "expiresAt": "2026-10-20T12:00:00.000Z"
                },
                "error": null
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/pixQrCode/simulate-payment"))
            .and(query_param("id", "pix_char_123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": { "id": "pix_char_123", "status": "PAID" },
                "error": null
            })))
            .expect(1)
            .mount(&server)
            .await;

        let response = live_provider(&server.uri(), true)
            .process(&request(PaymentMethod::Pix))
            .await;

        assert!(response.success, "{}", response.message);
        let data = response.data.unwrap();
        assert_eq!(data.transaction_id, "pix_char_123");
        assert_eq!(data.status, PaymentStatus::Paid);
        assert!(data.simulated);
        match data.details {
            MethodDetails::Pix(pix) => assert_eq!(pix.pix_qr_code.as_deref(), Some("iVBORw0KGgo=")),
            other => panic!("unexpected details: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_live_pix_without_auto_simulation_stays_pending() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/pixQrCode/create"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": {
                    "id": "pix_char_456",
                    "status": "PENDING",
                    "devMode": true,
                    "brCode": "000201"
                }
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/pixQrCode/simulate-payment"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let response = live_provider(&server.uri(), false)
            .process(&request(PaymentMethod::Pix))
            .await;

        let data = response.data.unwrap();
        assert_eq!(data.status, PaymentStatus::Pending);
        assert!(!data.simulated);
        assert_eq!(data.amount, Some(2500));
    }

    #[tokio::test]
    async fn test_live_error_status_is_a_business_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/billing/create"))
            .respond_with(ResponseTemplate::new(400).set_body_string("beta"))
            .mount(&server)
            .await;

        let response = live_provider(&server.uri(), true)
            .process(&request(PaymentMethod::CreditCard))
            .await;

        assert!(!response.success);
        assert_eq!(
            response.message,
            "Cartão não disponível: método em beta, contate o suporte"
        );
    }

    #[tokio::test]
    async fn test_live_card_billing() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/billing/create"))
            .and(body_partial_json(json!({
                "frequency": "ONE_TIME",
                "methods": ["CARD"],
                "completionUrl": "http://localhost:3000/transactions"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": {
                    "id": "bill_123",
                    "url": "https://abacatepay.com/pay/bill_123",
                    "amount": 2500,
                    "status": "PENDING",
                    "devMode": true
                },
                "error": null
            })))
            .mount(&server)
            .await;

        let response = live_provider(&server.uri(), true)
            .process(&request(PaymentMethod::CreditCard))
            .await;

        assert!(response.success);
        let data = response.data.unwrap();
        assert_eq!(data.transaction_id, "bill_123");
        match data.details {
            MethodDetails::CreditCard(card) => assert_eq!(
                card.payment_url.as_deref(),
                Some("https://abacatepay.com/pay/bill_123")
            ),
            other => panic!("unexpected details: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unreachable_gateway_is_caught() {
        let provider = live_provider("http://127.0.0.1:9", true);
        let response = provider.process(&request(PaymentMethod::Pix)).await;
        assert!(!response.success);
        assert!(response.data.is_none());
    }

    #[tokio::test]
    async fn test_simulate_in_simulated_mode() {
        let outcome = simulated_provider().simulate_pix_payment("test_abc").await;
        assert!(outcome.success);
        assert_eq!(outcome.data.unwrap()["data"]["status"], "PAID");
    }
}
