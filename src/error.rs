//! Error types shared across the gateway harness
//!
//! Provider clients work with [`AppResult`] internally and turn every error into a
//! failed `PaymentResponse` at their boundary. The HTTP layer turns the remaining
//! errors into status codes through the `IntoResponse` implementation below.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Result type for fallible operations in this crate
pub type AppResult<T> = Result<T, AppError>;

/// Failures talking to an external payment gateway
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExternalError {
    /// Gateway answered with a non-2xx status
    #[error("{provider} respondeu com status {status}: {message}")]
    PaymentProvider {
        provider: String,
        status: u16,
        message: String,
    },

    #[error("{provider} não respondeu em {seconds} segundos")]
    Timeout { provider: String, seconds: u64 },

    #[error("Erro de conexão com o {provider}: {message}")]
    Network { provider: String, message: String },

    /// Gateway answered 2xx but the body could not be understood
    #[error("Resposta inválida do {provider}: {message}")]
    InvalidResponse { provider: String, message: String },
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum InfrastructureError {
    #[error("Configuration error: {message}")]
    Configuration { message: String },
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AppErrorKind {
    /// Missing or invalid input supplied by the caller
    #[error("{message}")]
    Validation { message: String },

    /// Webhook secret or signature mismatch
    #[error("{message}")]
    Unauthorized { message: String },

    #[error(transparent)]
    External(ExternalError),

    #[error(transparent)]
    Infrastructure(InfrastructureError),

    #[error("Internal error: {message}")]
    Internal { message: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppError {
    pub kind: AppErrorKind,
    pub context: Option<String>,
}

impl AppError {
    pub fn new(kind: AppErrorKind) -> Self {
        Self {
            kind,
            context: None,
        }
    }

    pub fn with_context<S: Into<String>>(mut self, context: S) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(AppErrorKind::Validation {
            message: message.into(),
        })
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(AppErrorKind::Unauthorized {
            message: message.into(),
        })
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(AppErrorKind::Internal {
            message: message.into(),
        })
    }

    pub fn external(error: ExternalError) -> Self {
        Self::new(AppErrorKind::External(error))
    }

    pub fn status_code(&self) -> StatusCode {
        match self.kind {
            AppErrorKind::Validation { .. } => StatusCode::BAD_REQUEST,
            AppErrorKind::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            AppErrorKind::External(_)
            | AppErrorKind::Infrastructure(_)
            | AppErrorKind::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message that is safe to hand back to an HTTP caller
    pub fn public_message(&self) -> String {
        match &self.kind {
            AppErrorKind::Validation { message } | AppErrorKind::Unauthorized { message } => {
                message.clone()
            }
            _ => "Internal server error".to_string(),
        }
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.context {
            Some(context) => write!(f, "{} ({})", self.kind, context),
            None => write!(f, "{}", self.kind),
        }
    }
}

impl std::error::Error for AppError {}

impl From<ExternalError> for AppError {
    fn from(err: ExternalError) -> Self {
        Self::external(err)
    }
}

impl From<InfrastructureError> for AppError {
    fn from(err: InfrastructureError) -> Self {
        Self::new(AppErrorKind::Infrastructure(err))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(error = %self, "request failed with internal error");
        }

        (status, Json(json!({ "error": self.public_message() }))).into_response()
    }
}
