//! PagSeguro payment provider implementation

use crate::config::{GatewayDefaults, GatewayMode, PagSeguroConfig};
use crate::error::{AppError, AppResult, ExternalError};
use crate::payments::gateway_client::{GatewayAuth, GatewayClient};
use crate::payments::simulation;
use crate::payments::status::PAGSEGURO;
use crate::payments::traits::PaymentProvider;
use crate::payments::types::{
    BoletoDetails, CardDetails, Customer, MethodDetails, PaymentData, PaymentMethod,
    PaymentRequest, PaymentResponse, PaymentStatus, PixDetails, Provider,
};
use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{error, info, warn};

const PROVIDER_NAME: &str = "PagSeguro";
const PIX_EXPIRATION_HOURS: i64 = 24;
const BOLETO_DUE_DAYS: i64 = 3;

const CARD_REQUIRES_ENCRYPTION: &str = "Cartão de crédito no PagSeguro requer encriptação via SDK do frontend. Use o checkout transparente ou o link de pagamento.";

/// PagSeguro payment provider
pub struct PagSeguroProvider {
    config: PagSeguroConfig,
    defaults: GatewayDefaults,
    client: Option<GatewayClient>,
}

impl PagSeguroProvider {
    pub fn new(config: PagSeguroConfig, defaults: GatewayDefaults) -> AppResult<Self> {
        let client = match (&config.mode, &config.token) {
            (GatewayMode::Live, Some(token)) => Some(GatewayClient::new(
                PROVIDER_NAME,
                &config.base_url,
                GatewayAuth::Bearer(token.clone()),
                defaults.request_timeout,
            )?),
            _ => None,
        };

        if config.mode.is_live() {
            info!(sandbox = config.sandbox, base_url = %config.base_url, "PagSeguro client ready");
        }

        Ok(Self {
            config,
            defaults,
            client,
        })
    }

    fn client(&self) -> AppResult<&GatewayClient> {
        self.client.as_ref().ok_or_else(|| {
            AppError::internal("PagSeguro client requested while running in simulated mode")
        })
    }

    fn notification_url(&self) -> String {
        format!("{}/api/webhooks/pagseguro", self.defaults.app_url)
    }

    /// Send an order and return the parsed body, or the business failure
    async fn send_order(&self, payload: &Value) -> AppResult<Result<(Value, PagSeguroOrder), String>> {
        let reply = self.client()?.post_json("/orders", payload).await?;

        if !reply.is_success() {
            let body = reply.json_value();
            error!(status = %reply.status, "PagSeguro API error");
            let message = body
                .as_ref()
                .and_then(api_error_message)
                .unwrap_or_else(|| format!("Erro na API: {}", reply.status.as_u16()));
            return Ok(Err(message));
        }

        let raw: Value = reply.json(PROVIDER_NAME)?;
        let order = serde_json::from_value(raw.clone()).map_err(|e| {
            AppError::from(ExternalError::InvalidResponse {
                provider: PROVIDER_NAME.to_string(),
                message: e.to_string(),
            })
        })?;

        Ok(Ok((raw, order)))
    }

    fn order_status(&self, order: &PagSeguroOrder) -> PaymentStatus {
        order
            .charges
            .first()
            .map(|charge| self.normalize_status(&charge.status))
            .unwrap_or(PaymentStatus::Pending)
    }

    async fn create_pix(
        &self,
        request: &PaymentRequest,
        customer: &Customer,
    ) -> AppResult<PaymentResponse> {
        let expiration = Utc::now() + ChronoDuration::hours(PIX_EXPIRATION_HOURS);
        let payload = json!({
            "reference_id": format!("order-{}", Utc::now().timestamp_millis()),
            "customer": customer_payload(customer),
            "items": [{
                "name": "Pagamento via PIX",
                "quantity": 1,
                "unit_amount": request.amount,
            }],
            "qr_codes": [{
                "amount": { "value": request.amount },
                "expiration_date": expiration.to_rfc3339(),
            }],
            "notification_urls": [self.notification_url()],
        });

        let (raw, order) = match self.send_order(&payload).await? {
            Ok(parsed) => parsed,
            Err(message) => return Ok(PaymentResponse::failure(message)),
        };

        let qr_code = order.qr_codes.first();
        let image_link = qr_code.and_then(|qr| qr.links.iter().find(|l| l.rel == "QRCODE.PNG"));

        let pix_qr_code = match image_link {
            Some(link) => match self.client()?.fetch_base64(&link.href).await {
                Ok(encoded) => Some(encoded),
                Err(e) => {
                    warn!(url = %link.href, error = %e, "could not inline Pix QR code image");
                    None
                }
            },
            None => None,
        };

        info!(transaction_id = %order.id, "PagSeguro Pix order created");

        let data = PaymentData::new(
            &order.id,
            self.order_status(&order),
            MethodDetails::Pix(PixDetails {
                pix_code: qr_code.and_then(|qr| qr.text.clone()),
                pix_qr_code,
                expires_at: qr_code.and_then(|qr| qr.expiration_date.clone()),
                payment_url: None,
            }),
        )
        .with_amount(request.amount)
        .with_provider_response(raw);

        Ok(PaymentResponse::success("QR Code PIX gerado com sucesso!", data))
    }

    async fn create_boleto(
        &self,
        request: &PaymentRequest,
        customer: &Customer,
    ) -> AppResult<PaymentResponse> {
        let now = Utc::now();
        let due = now + ChronoDuration::days(BOLETO_DUE_DAYS);
        let tax_id = tax_id(customer);

        let payload = json!({
            "reference_id": format!("order-{}", now.timestamp_millis()),
            "customer": customer_payload(customer),
            "items": [{
                "name": "Pagamento via Boleto",
                "quantity": 1,
                "unit_amount": request.amount,
            }],
            "charges": [{
                "reference_id": format!("charge-{}", now.timestamp_millis()),
                "description": "Pagamento via Boleto",
                "amount": { "value": request.amount, "currency": "BRL" },
                "payment_method": {
                    "type": "BOLETO",
                    "boleto": {
                        "due_date": due.format("%Y-%m-%d").to_string(),
                        "instruction_lines": {
                            "line_1": "Pagamento processado via PagSeguro",
                            "line_2": "Não receber após o vencimento",
                        },
                        "holder": {
                            "name": customer.name,
                            "tax_id": tax_id,
                            "email": customer.email.as_deref().unwrap_or("cliente@email.com"),
                            "address": {
                                "street": "Rua Exemplo",
                                "number": "123",
                                "locality": "Centro",
                                "city": "São Paulo",
                                "region_code": "SP",
                                "country": "BRA",
                                "postal_code": "01310100",
                            },
                        },
                    },
                },
            }],
            "notification_urls": [self.notification_url()],
        });

        let (raw, order) = match self.send_order(&payload).await? {
            Ok(parsed) => parsed,
            Err(message) => return Ok(PaymentResponse::failure(message)),
        };

        let charge = order.charges.first();
        let boleto_url = order
            .links
            .iter()
            .find(|l| l.rel == "PAY")
            .or_else(|| {
                charge.and_then(|c| {
                    c.links
                        .iter()
                        .find(|l| l.media.as_deref() == Some("application/pdf"))
                })
            })
            .map(|l| l.href.clone());
        let boleto_barcode = charge
            .and_then(|c| c.payment_method.as_ref())
            .and_then(|m| m.boleto.as_ref())
            .and_then(|b| b.formatted_barcode.clone().or_else(|| b.barcode.clone()));

        info!(transaction_id = %order.id, "PagSeguro boleto order created");

        let data = PaymentData::new(
            &order.id,
            self.order_status(&order),
            MethodDetails::Boleto(BoletoDetails {
                boleto_url,
                boleto_barcode,
                due_date: Some(due.to_rfc3339()),
                charge_id: charge.map(|c| c.id.clone()),
            }),
        )
        .with_amount(request.amount)
        .with_provider_response(raw);

        Ok(PaymentResponse::success("Boleto gerado com sucesso!", data))
    }

    async fn simulated(&self, request: &PaymentRequest) -> PaymentResponse {
        warn!("PagSeguro in simulated mode, configure PAGSEGURO_TOKEN to use the real API");
        simulation::latency(self.defaults.simulated_latency).await;

        let transaction_id = simulation::transaction_id("test_ps_");

        let (message, status, details) = match request.method {
            PaymentMethod::Pix => (
                "QR Code PIX gerado! (MODO TESTE)",
                PaymentStatus::Pending,
                MethodDetails::Pix(PixDetails {
                    pix_code: Some(simulation::fixed_pix_code("pagseguro-test-key")),
                    ..Default::default()
                }),
            ),
            PaymentMethod::CreditCard => (
                "Pagamento aprovado! (MODO TESTE)",
                PaymentStatus::Paid,
                MethodDetails::CreditCard(CardDetails {
                    installments: Some(request.installments.unwrap_or(1)),
                    card_last_digits: request.card.as_ref().map(|c| c.last_digits()),
                    ..Default::default()
                }),
            ),
            PaymentMethod::Boleto => (
                "Boleto gerado! (MODO TESTE)",
                PaymentStatus::Pending,
                MethodDetails::Boleto(BoletoDetails {
                    boleto_url: Some(format!(
                        "https://sandbox.pagseguro.uol.com.br/boleto/{}",
                        transaction_id
                    )),
                    ..Default::default()
                }),
            ),
        };

        PaymentResponse::success(
            message,
            PaymentData::new(&transaction_id, status, details)
                .with_amount(request.amount)
                .in_test_mode(),
        )
    }
}

#[async_trait]
impl PaymentProvider for PagSeguroProvider {
    fn provider(&self) -> Provider {
        Provider::PagSeguro
    }

    fn mode(&self) -> GatewayMode {
        self.config.mode
    }

    fn normalize_status(&self, raw: &str) -> PaymentStatus {
        PAGSEGURO.normalize(raw)
    }

    async fn process(&self, request: &PaymentRequest) -> PaymentResponse {
        info!(
            method = %request.method,
            amount = request.amount,
            mode = ?self.config.mode,
            "processing PagSeguro payment"
        );

        let customer = match request.method {
            PaymentMethod::CreditCard => {
                if request.card.is_none() {
                    return PaymentResponse::failure("Dados do cartão não fornecidos");
                }
                None
            }
            PaymentMethod::Boleto | PaymentMethod::Pix => match request.customer.as_ref() {
                Some(customer) => Some(customer),
                None => return PaymentResponse::failure("Dados do cliente não fornecidos"),
            },
        };

        if self.config.mode == GatewayMode::Simulated {
            return self.simulated(request).await;
        }

        let result = match (request.method, customer) {
            (PaymentMethod::Pix, Some(customer)) => self.create_pix(request, customer).await,
            (PaymentMethod::Boleto, Some(customer)) => self.create_boleto(request, customer).await,
            _ => Ok(PaymentResponse::failure(CARD_REQUIRES_ENCRYPTION)),
        };

        result.unwrap_or_else(|e| {
            error!(method = %request.method, error = %e, "PagSeguro payment failed");
            PaymentResponse::failure(e.to_string())
        })
    }
}

fn tax_id(customer: &Customer) -> String {
    let digits = customer.document_digits();
    if digits.is_empty() {
        "00000000000".to_string()
    } else {
        digits
    }
}

fn customer_payload(customer: &Customer) -> Value {
    json!({
        "name": customer.name,
        "email": customer.email.as_deref().unwrap_or("cliente@email.com"),
        "tax_id": tax_id(customer),
        "phones": [{
            "country": "55",
            "area": "11",
            "number": "999999999",
            "type": "MOBILE",
        }],
    })
}

fn api_error_message(body: &Value) -> Option<String> {
    body.pointer("/error_messages/0/description")
        .and_then(Value::as_str)
        .or_else(|| body.get("message").and_then(Value::as_str))
        .map(str::to_string)
}

#[derive(Debug, Deserialize)]
struct PagSeguroOrder {
    id: String,
    #[serde(default)]
    qr_codes: Vec<PagSeguroQrCode>,
    #[serde(default)]
    charges: Vec<PagSeguroCharge>,
    #[serde(default)]
    links: Vec<PagSeguroLink>,
}

#[derive(Debug, Deserialize)]
struct PagSeguroQrCode {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    expiration_date: Option<String>,
    #[serde(default)]
    links: Vec<PagSeguroLink>,
}

#[derive(Debug, Deserialize)]
struct PagSeguroCharge {
    id: String,
    status: String,
    #[serde(default)]
    payment_method: Option<PagSeguroPaymentMethod>,
    #[serde(default)]
    links: Vec<PagSeguroLink>,
}

#[derive(Debug, Deserialize)]
struct PagSeguroPaymentMethod {
    #[serde(default)]
    boleto: Option<PagSeguroBoleto>,
}

#[derive(Debug, Deserialize)]
struct PagSeguroBoleto {
    #[serde(default)]
    barcode: Option<String>,
    #[serde(default)]
    formatted_barcode: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PagSeguroLink {
    rel: String,
    href: String,
    #[serde(default)]
    media: Option<String>,
}
