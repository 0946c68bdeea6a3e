use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

/// Credential values that mean "not really configured"
const PLACEHOLDER_CREDENTIALS: [&str; 2] = ["test_key", "test_token"];

const PAGSEGURO_SANDBOX_URL: &str = "https://sandbox.api.pagseguro.com";
const PAGSEGURO_PRODUCTION_URL: &str = "https://api.pagseguro.com";

/// Whether a gateway adapter talks to the network or fabricates responses.
/// Resolved once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GatewayMode {
    Live,
    Simulated,
}

impl GatewayMode {
    pub fn is_live(&self) -> bool {
        matches!(self, GatewayMode::Live)
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub gateways: GatewayDefaults,
    pub abacatepay: AbacatePayConfig,
    pub pagarme: PagarmeConfig,
    pub pagseguro: PagSeguroConfig,
    pub webhook: WebhookConfig,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub environment: String,
}

/// Settings shared by every gateway adapter
#[derive(Debug, Clone)]
pub struct GatewayDefaults {
    /// Public base URL used for return, completion and notification URLs
    pub app_url: String,
    pub request_timeout: Duration,
    pub simulated_latency: Duration,
}

#[derive(Debug, Clone)]
pub struct AbacatePayConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub mode: GatewayMode,
    /// Immediately simulate payment of Pix charges created in dev mode
    pub auto_simulate: bool,
}

#[derive(Debug, Clone)]
pub struct PagarmeConfig {
    pub secret_key: Option<String>,
    pub base_url: String,
    pub mode: GatewayMode,
}

#[derive(Debug, Clone)]
pub struct PagSeguroConfig {
    pub token: Option<String>,
    pub base_url: String,
    pub sandbox: bool,
    pub mode: GatewayMode,
}

/// Inbound webhook authentication. Both values unset means the endpoint
/// accepts unauthenticated events.
#[derive(Debug, Clone, Default)]
pub struct WebhookConfig {
    pub secret: Option<String>,
    pub public_key: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup. Empty values
    /// count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let server = ServerConfig {
            host: get("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: get("PORT")
                .unwrap_or_else(|| "3000".to_string())
                .parse()
                .context("PORT must be a valid number")?,
            environment: get("ENVIRONMENT").unwrap_or_else(|| "development".to_string()),
        };

        let gateways = GatewayDefaults {
            app_url: get("APP_URL")
                .unwrap_or_else(|| "http://localhost:3000".to_string())
                .trim_end_matches('/')
                .to_string(),
            request_timeout: Duration::from_secs(
                get("GATEWAY_TIMEOUT_SECS")
                    .unwrap_or_else(|| "10".to_string())
                    .parse()
                    .context("GATEWAY_TIMEOUT_SECS must be a valid number")?,
            ),
            simulated_latency: Duration::from_millis(
                get("SIMULATED_LATENCY_MS")
                    .unwrap_or_else(|| "1500".to_string())
                    .parse()
                    .context("SIMULATED_LATENCY_MS must be a valid number")?,
            ),
        };

        let abacatepay_key = get("ABACATEPAY_API_KEY");
        let abacatepay = AbacatePayConfig {
            mode: resolve_mode(
                "ABACATEPAY",
                get("ABACATEPAY_MODE").as_deref(),
                abacatepay_key.as_deref(),
            )?,
            api_key: abacatepay_key,
            base_url: get("ABACATEPAY_BASE_URL")
                .unwrap_or_else(|| "https://api.abacatepay.com".to_string()),
            auto_simulate: get("ABACATEPAY_AUTO_SIMULATE").as_deref() != Some("false"),
        };

        let pagarme_key = get("PAGARME_SECRET_KEY");
        let pagarme = PagarmeConfig {
            mode: resolve_mode(
                "PAGARME",
                get("PAGARME_MODE").as_deref(),
                pagarme_key.as_deref(),
            )?,
            secret_key: pagarme_key,
            base_url: get("PAGARME_BASE_URL").unwrap_or_else(|| "https://api.pagar.me".to_string()),
        };

        let pagseguro_token = get("PAGSEGURO_TOKEN");
        let sandbox = get("PAGSEGURO_SANDBOX").as_deref() == Some("true");
        let pagseguro = PagSeguroConfig {
            mode: resolve_mode(
                "PAGSEGURO",
                get("PAGSEGURO_MODE").as_deref(),
                pagseguro_token.as_deref(),
            )?,
            token: pagseguro_token,
            base_url: get("PAGSEGURO_BASE_URL").unwrap_or_else(|| {
                if sandbox {
                    PAGSEGURO_SANDBOX_URL.to_string()
                } else {
                    PAGSEGURO_PRODUCTION_URL.to_string()
                }
            }),
            sandbox,
        };

        let webhook = WebhookConfig {
            secret: get("ABACATEPAY_WEBHOOK_SECRET"),
            public_key: get("ABACATEPAY_PUBLIC_KEY"),
        };

        let config = Config {
            server,
            gateways,
            abacatepay,
            pagarme,
            pagseguro,
            webhook,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(anyhow!("PORT must be greater than 0"));
        }

        let valid_environments = ["development", "staging", "production"];
        if !valid_environments.contains(&self.server.environment.as_str()) {
            return Err(anyhow!(
                "Environment must be one of: {:?}, got {}",
                valid_environments,
                self.server.environment
            ));
        }

        if self.gateways.request_timeout.is_zero() {
            return Err(anyhow!("GATEWAY_TIMEOUT_SECS must be greater than 0"));
        }

        if self.gateways.app_url.is_empty() {
            return Err(anyhow!("APP_URL cannot be empty"));
        }

        for (name, url) in [
            ("ABACATEPAY_BASE_URL", &self.abacatepay.base_url),
            ("PAGARME_BASE_URL", &self.pagarme.base_url),
            ("PAGSEGURO_BASE_URL", &self.pagseguro.base_url),
        ] {
            if url.trim().is_empty() {
                return Err(anyhow!("{} cannot be empty", name));
            }
        }

        Ok(())
    }
}

fn is_real_credential(credential: Option<&str>) -> bool {
    credential.is_some_and(|c| !PLACEHOLDER_CREDENTIALS.contains(&c))
}

/// Decide a gateway's mode from its explicit `<PREFIX>_MODE` setting and
/// whether a usable credential is present.
fn resolve_mode(prefix: &str, explicit: Option<&str>, credential: Option<&str>) -> Result<GatewayMode> {
    match explicit {
        Some("simulated") => Ok(GatewayMode::Simulated),
        Some("live") => {
            if !is_real_credential(credential) {
                bail!("{}_MODE=live requires a real credential", prefix);
            }
            Ok(GatewayMode::Live)
        }
        Some(other) => bail!(
            "{}_MODE must be 'live' or 'simulated', got {}",
            prefix,
            other
        ),
        None if is_real_credential(credential) => Ok(GatewayMode::Live),
        None => Ok(GatewayMode::Simulated),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults_without_credentials_are_simulated() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.server.environment, "development");
        assert_eq!(config.gateways.request_timeout, Duration::from_secs(10));
        assert_eq!(config.abacatepay.mode, GatewayMode::Simulated);
        assert_eq!(config.pagarme.mode, GatewayMode::Simulated);
        assert_eq!(config.pagseguro.mode, GatewayMode::Simulated);
        assert!(config.abacatepay.auto_simulate);
        assert_eq!(config.pagseguro.base_url, PAGSEGURO_PRODUCTION_URL);
        assert!(config.webhook.public_key.is_none());
    }

    #[test]
    fn test_placeholder_credentials_stay_simulated() {
        let config = config_from(&[
            ("ABACATEPAY_API_KEY", "test_key"),
            ("PAGSEGURO_TOKEN", "test_token"),
        ])
        .unwrap();
        assert_eq!(config.abacatepay.mode, GatewayMode::Simulated);
        assert_eq!(config.pagseguro.mode, GatewayMode::Simulated);
    }

    #[test]
    fn test_real_credentials_go_live() {
        let config = config_from(&[
            ("ABACATEPAY_API_KEY", "abc_dev_123"),
            ("PAGARME_SECRET_KEY", "sk_test_123"),
            ("PAGSEGURO_TOKEN", "tok"),
            ("PAGSEGURO_SANDBOX", "true"),
        ])
        .unwrap();
        assert_eq!(config.abacatepay.mode, GatewayMode::Live);
        assert_eq!(config.pagarme.mode, GatewayMode::Live);
        assert_eq!(config.pagseguro.mode, GatewayMode::Live);
        assert_eq!(config.pagseguro.base_url, PAGSEGURO_SANDBOX_URL);
    }

    #[test]
    fn test_explicit_mode_overrides_credentials() {
        let config = config_from(&[
            ("PAGARME_SECRET_KEY", "sk_test_123"),
            ("PAGARME_MODE", "simulated"),
        ])
        .unwrap();
        assert_eq!(config.pagarme.mode, GatewayMode::Simulated);
    }

    #[test]
    fn test_live_mode_with_placeholder_fails() {
        assert!(config_from(&[
            ("ABACATEPAY_API_KEY", "test_key"),
            ("ABACATEPAY_MODE", "live"),
        ])
        .is_err());
        assert!(config_from(&[("PAGARME_MODE", "live")]).is_err());
        assert!(config_from(&[("PAGARME_MODE", "sometimes")]).is_err());
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        assert!(config_from(&[("ENVIRONMENT", "qa")]).is_err());
        assert!(config_from(&[("GATEWAY_TIMEOUT_SECS", "0")]).is_err());
        assert!(config_from(&[("PORT", "http")]).is_err());
    }

    #[test]
    fn test_auto_simulate_toggle() {
        let config = config_from(&[("ABACATEPAY_AUTO_SIMULATE", "false")]).unwrap();
        assert!(!config.abacatepay.auto_simulate);
    }
}
