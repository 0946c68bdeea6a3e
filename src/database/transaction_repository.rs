use crate::database::error::{DatabaseError, DatabaseErrorKind};
use crate::database::repository::Repository;
use crate::payments::types::{
    Customer, PaymentMethod, PaymentRequest, PaymentResponse, PaymentStatus, Provider,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Transaction entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: String,
    pub provider: Provider,
    pub method: PaymentMethod,
    pub amount: u64,
    pub status: PaymentStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer: Option<Customer>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Canonical response data the record was created from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl Transaction {
    /// Build the record for a successful payment response. `None` when the
    /// response carries no transaction data.
    pub fn from_response(request: &PaymentRequest, response: &PaymentResponse) -> Option<Self> {
        let data = response.data.as_ref()?;
        let now = Utc::now();

        Some(Self {
            id: data.transaction_id.clone(),
            provider: request.provider.clone(),
            method: request.method,
            amount: request.amount,
            status: data.status,
            customer: request.customer.clone(),
            created_at: now,
            updated_at: now,
            metadata: serde_json::to_value(data).ok(),
        })
    }
}

/// In-memory transaction store, shared across requests
#[derive(Debug, Default)]
pub struct TransactionRepository {
    records: RwLock<Vec<Transaction>>,
}

impl TransactionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move a stored transaction to `status`, following the transition rules
    pub async fn update_status(
        &self,
        id: &str,
        status: PaymentStatus,
    ) -> Result<Transaction, DatabaseError> {
        let mut records = self.records.write().await;
        let record = records
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| DatabaseError::not_found("Transaction", id))?;

        if !record.status.can_transition_to(status) {
            return Err(DatabaseError::new(DatabaseErrorKind::InvalidTransition {
                id: id.to_string(),
                from: record.status,
                to: status,
            }));
        }

        info!(transaction_id = id, from = %record.status, to = %status, "transaction status updated");
        record.status = status;
        record.updated_at = Utc::now();
        Ok(record.clone())
    }

    pub async fn clear(&self) {
        self.records.write().await.clear();
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl Repository for TransactionRepository {
    type Entity = Transaction;

    async fn find_by_id(&self, id: &str) -> Result<Option<Transaction>, DatabaseError> {
        let records = self.records.read().await;
        Ok(records.iter().find(|t| t.id == id).cloned())
    }

    /// Newest first by creation time
    async fn find_all(&self) -> Result<Vec<Transaction>, DatabaseError> {
        let mut all = self.records.read().await.clone();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(all)
    }

    async fn save(&self, mut transaction: Transaction) -> Result<Transaction, DatabaseError> {
        let mut records = self.records.write().await;

        match records.iter_mut().find(|t| t.id == transaction.id) {
            Some(existing) => {
                transaction.created_at = existing.created_at;
                transaction.updated_at = Utc::now();
                debug!(transaction_id = %transaction.id, "replacing stored transaction");
                *existing = transaction.clone();
            }
            None => {
                debug!(transaction_id = %transaction.id, "storing new transaction");
                records.push(transaction.clone());
            }
        }

        Ok(transaction)
    }

    async fn delete(&self, id: &str) -> Result<bool, DatabaseError> {
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|t| t.id != id);
        Ok(records.len() != before)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn transaction(id: &str, status: PaymentStatus) -> Transaction {
        let now = Utc::now();
        Transaction {
            id: id.to_string(),
            provider: Provider::Pagarme,
            method: PaymentMethod::Pix,
            amount: 5000,
            status,
            customer: None,
            created_at: now,
            updated_at: now,
            metadata: None,
        }
    }

    #[tokio::test]
    async fn test_save_twice_keeps_one_record() {
        let repo = TransactionRepository::new();
        let first = repo
            .save(transaction("trx_1", PaymentStatus::Pending))
            .await
            .unwrap();
        repo.save(transaction("trx_1", PaymentStatus::Paid))
            .await
            .unwrap();

        let all = repo.find_all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].status, PaymentStatus::Paid);
        assert_eq!(all[0].created_at, first.created_at);
        assert!(all[0].updated_at >= first.updated_at);
    }

    #[tokio::test]
    async fn test_find_all_newest_first() {
        let repo = TransactionRepository::new();
        let mut older = transaction("old", PaymentStatus::Pending);
        older.created_at = Utc::now() - Duration::minutes(5);
        repo.save(older).await.unwrap();
        repo.save(transaction("new", PaymentStatus::Pending))
            .await
            .unwrap();

        let ids: Vec<String> = repo
            .find_all()
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.id)
            .collect();
        assert_eq!(ids, vec!["new", "old"]);
    }

    #[tokio::test]
    async fn test_update_status_follows_transitions() {
        let repo = TransactionRepository::new();
        repo.save(transaction("trx_1", PaymentStatus::Pending))
            .await
            .unwrap();

        let updated = repo
            .update_status("trx_1", PaymentStatus::Paid)
            .await
            .unwrap();
        assert_eq!(updated.status, PaymentStatus::Paid);

        let err = repo
            .update_status("trx_1", PaymentStatus::Pending)
            .await
            .unwrap_err();
        assert!(err.is_invalid_transition());

        let err = repo
            .update_status("missing", PaymentStatus::Paid)
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_delete_and_clear() {
        let repo = TransactionRepository::new();
        repo.save(transaction("a", PaymentStatus::Pending))
            .await
            .unwrap();
        repo.save(transaction("b", PaymentStatus::Pending))
            .await
            .unwrap();

        assert!(repo.delete("a").await.unwrap());
        assert!(!repo.delete("a").await.unwrap());
        assert!(!repo.exists("a").await.unwrap());
        assert!(repo.exists("b").await.unwrap());

        repo.clear().await;
        assert!(repo.is_empty().await);
    }
}
