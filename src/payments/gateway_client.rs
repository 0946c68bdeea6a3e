//! Outbound HTTP plumbing shared by the gateway adapters
//!
//! One attempt per call, bounded by the configured timeout. Non-2xx answers are
//! returned to the caller as a [`GatewayReply`] because they are business
//! outcomes; only transport problems become errors.

use crate::error::{AppError, AppResult, ExternalError, InfrastructureError};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::{Client, RequestBuilder, StatusCode, Url};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, warn};

#[derive(Clone)]
pub enum GatewayAuth {
    Bearer(String),
    /// HTTP basic auth with the secret as user name and an empty password
    Basic(String),
}

/// Raw gateway answer
#[derive(Debug, Clone)]
pub struct GatewayReply {
    pub status: StatusCode,
    pub body: String,
}

impl GatewayReply {
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    pub fn json<T: DeserializeOwned>(&self, provider: &str) -> AppResult<T> {
        serde_json::from_str(&self.body).map_err(|e| {
            AppError::external(ExternalError::InvalidResponse {
                provider: provider.to_string(),
                message: e.to_string(),
            })
        })
    }

    /// Body as JSON when it parses, for digging error messages out of it
    pub fn json_value(&self) -> Option<serde_json::Value> {
        serde_json::from_str(&self.body).ok()
    }
}

#[derive(Clone)]
pub struct GatewayClient {
    provider: &'static str,
    http: Client,
    base_url: String,
    auth: GatewayAuth,
    request_timeout: Duration,
}

impl GatewayClient {
    pub fn new(
        provider: &'static str,
        base_url: &str,
        auth: GatewayAuth,
        request_timeout: Duration,
    ) -> AppResult<Self> {
        let http = Client::builder()
            .timeout(request_timeout)
            .user_agent(concat!("brpay-gateway/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| {
                AppError::from(InfrastructureError::Configuration {
                    message: format!("Failed to create HTTP client for {}: {}", provider, e),
                })
            })?;

        Ok(Self {
            provider,
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            auth,
            request_timeout,
        })
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Authenticated JSON POST to a path below the base URL
    pub async fn post_json(&self, path: &str, body: &serde_json::Value) -> AppResult<GatewayReply> {
        let url = self.url(path);
        debug!(provider = self.provider, %url, "sending gateway request");
        self.send(self.http.post(&url).json(body)).await
    }

    /// Authenticated JSON POST with query parameters
    pub async fn post_json_with_query(
        &self,
        path: &str,
        query: &[(&str, &str)],
        body: &serde_json::Value,
    ) -> AppResult<GatewayReply> {
        let url = Url::parse_with_params(&self.url(path), query).map_err(|e| {
            AppError::internal(format!("Invalid {} URL: {}", self.provider, e))
        })?;
        debug!(provider = self.provider, %url, "sending gateway request");
        self.send(self.http.post(url).json(body)).await
    }

    /// Download a binary artifact (QR code image) and return it base64-encoded.
    /// Artifact URLs are public, so no credentials are attached.
    pub async fn fetch_base64(&self, url: &str) -> AppResult<String> {
        let response = timeout(self.request_timeout, self.http.get(url).send())
            .await
            .map_err(|_| self.timeout_error())?
            .map_err(|e| self.network_error(e))?;

        let status = response.status();
        if !status.is_success() {
            warn!(provider = self.provider, %url, %status, "artifact download failed");
            return Err(AppError::external(ExternalError::PaymentProvider {
                provider: self.provider.to_string(),
                status: status.as_u16(),
                message: "artifact download failed".to_string(),
            }));
        }

        let bytes = timeout(self.request_timeout, response.bytes())
            .await
            .map_err(|_| self.timeout_error())?
            .map_err(|e| self.network_error(e))?;

        Ok(STANDARD.encode(&bytes))
    }

    async fn send(&self, request: RequestBuilder) -> AppResult<GatewayReply> {
        let request = match &self.auth {
            GatewayAuth::Bearer(token) => request.bearer_auth(token),
            GatewayAuth::Basic(secret) => request.basic_auth(secret, Some("")),
        };

        let exchange = async {
            let response = request.send().await?;
            let status = response.status();
            let body = response.text().await?;
            Ok::<_, reqwest::Error>(GatewayReply { status, body })
        };

        let reply = timeout(self.request_timeout, exchange)
            .await
            .map_err(|_| self.timeout_error())?
            .map_err(|e| self.network_error(e))?;

        if !reply.is_success() {
            warn!(
                provider = self.provider,
                status = %reply.status,
                "gateway answered with non-success status"
            );
        }

        Ok(reply)
    }

    fn timeout_error(&self) -> AppError {
        AppError::external(ExternalError::Timeout {
            provider: self.provider.to_string(),
            seconds: self.request_timeout.as_secs(),
        })
    }

    fn network_error(&self, err: reqwest::Error) -> AppError {
        if err.is_timeout() {
            return self.timeout_error();
        }
        AppError::external(ExternalError::Network {
            provider: self.provider.to_string(),
            message: err.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(base_url: &str, auth: GatewayAuth) -> GatewayClient {
        GatewayClient::new("TestPay", base_url, auth, Duration::from_secs(2)).unwrap()
    }

    #[tokio::test]
    async fn test_bearer_auth_and_non_success_reply() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/orders"))
            .and(header("authorization", "Bearer tok_123"))
            .respond_with(ResponseTemplate::new(422).set_body_json(json!({"message": "bad"})))
            .mount(&server)
            .await;

        let reply = client(&server.uri(), GatewayAuth::Bearer("tok_123".to_string()))
            .post_json("/orders", &json!({}))
            .await
            .unwrap();

        assert_eq!(reply.status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(!reply.is_success());
        assert_eq!(reply.json_value().unwrap()["message"], "bad");
    }

    #[tokio::test]
    async fn test_timeout_becomes_external_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
            .mount(&server)
            .await;

        let client = GatewayClient::new(
            "TestPay",
            &server.uri(),
            GatewayAuth::Bearer("t".to_string()),
            Duration::from_millis(200),
        )
        .unwrap();
        let err = client.post_json("/slow", &json!({})).await.unwrap_err();

        assert!(matches!(
            err.kind,
            crate::error::AppErrorKind::External(ExternalError::Timeout { .. })
        ));
    }

    #[tokio::test]
    async fn test_fetch_base64() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/qr.png"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1u8, 2, 3]))
            .mount(&server)
            .await;

        let client = client(&server.uri(), GatewayAuth::Basic("sk".to_string()));
        let encoded = client
            .fetch_base64(&format!("{}/qr.png", server.uri()))
            .await
            .unwrap();
        assert_eq!(encoded, "AQID");

        assert!(client
            .fetch_base64(&format!("{}/missing.png", server.uri()))
            .await
            .is_err());
    }
}
