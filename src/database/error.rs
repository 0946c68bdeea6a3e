use crate::error::AppError;
use crate::payments::types::PaymentStatus;
use std::fmt;

/// Transaction store error kinds
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseErrorKind {
    /// Record not found
    NotFound {
        entity: String,
        id: String,
    },
    /// Status change not allowed from the stored status
    InvalidTransition {
        id: String,
        from: PaymentStatus,
        to: PaymentStatus,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseError {
    pub kind: DatabaseErrorKind,
    pub context: Option<String>,
}

impl DatabaseError {
    pub fn new(kind: DatabaseErrorKind) -> Self {
        Self {
            kind,
            context: None,
        }
    }

    pub fn not_found(entity: &str, id: &str) -> Self {
        Self::new(DatabaseErrorKind::NotFound {
            entity: entity.to_string(),
            id: id.to_string(),
        })
    }

    pub fn with_context<S: Into<String>>(mut self, context: S) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self.kind, DatabaseErrorKind::NotFound { .. })
    }

    pub fn is_invalid_transition(&self) -> bool {
        matches!(self.kind, DatabaseErrorKind::InvalidTransition { .. })
    }
}

impl fmt::Display for DatabaseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = match &self.kind {
            DatabaseErrorKind::NotFound { entity, id } => {
                format!("{} with ID '{}' not found", entity, id)
            }
            DatabaseErrorKind::InvalidTransition { id, from, to } => {
                format!("Transaction '{}' cannot move from {} to {}", id, from, to)
            }
        };

        if let Some(context) = &self.context {
            write!(f, "{} ({})", message, context)
        } else {
            write!(f, "{}", message)
        }
    }
}

impl std::error::Error for DatabaseError {}

/// Store errors describe a bad request against existing data
impl From<DatabaseError> for AppError {
    fn from(err: DatabaseError) -> Self {
        AppError::validation(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_with_context() {
        let err = DatabaseError::not_found("Transaction", "trx_1").with_context("webhook");
        assert_eq!(err.to_string(), "Transaction with ID 'trx_1' not found (webhook)");
        assert!(err.is_not_found());
    }

    #[test]
    fn test_transition_error_maps_to_validation() {
        let err = DatabaseError::new(DatabaseErrorKind::InvalidTransition {
            id: "trx_1".to_string(),
            from: PaymentStatus::Paid,
            to: PaymentStatus::Pending,
        });
        assert!(err.is_invalid_transition());

        let app: AppError = err.into();
        assert_eq!(app.status_code(), axum::http::StatusCode::BAD_REQUEST);
        assert_eq!(app.public_message(), "Transaction 'trx_1' cannot move from paid to pending");
    }
}
