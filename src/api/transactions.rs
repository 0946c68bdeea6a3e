use axum::{extract::State, Json};
use serde::Serialize;

use crate::api::AppState;
use crate::database::{Repository, Transaction};
use crate::error::{AppError, AppResult};

#[derive(Debug, Serialize)]
pub struct TransactionList {
    pub transactions: Vec<Transaction>,
}

/// `GET /api/transactions`, newest first
pub async fn list_transactions(State(state): State<AppState>) -> AppResult<Json<TransactionList>> {
    let transactions = state
        .transactions
        .find_all()
        .await
        .map_err(|e| AppError::from(e).with_context("listing transactions"))?;

    Ok(Json(TransactionList { transactions }))
}
