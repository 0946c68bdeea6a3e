use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use tracing::{error, info, warn};

use crate::api::AppState;
use crate::database::{Repository, Transaction};
use crate::payments::providers::SimulationOutcome;
use crate::payments::types::{PaymentResponse, PaymentStatus, PaymentSubmission};

/// `POST /api/payments/process`
///
/// 400 for boundary validation failures, 200 with the success flag for every
/// completed attempt.
pub async fn process_payment(
    State(state): State<AppState>,
    body: Result<Json<PaymentSubmission>, JsonRejection>,
) -> (StatusCode, Json<PaymentResponse>) {
    let Json(submission) = match body {
        Ok(body) => body,
        Err(rejection) => {
            warn!(error = %rejection, "rejected payment body");
            return bad_request("Corpo da requisição inválido");
        }
    };

    let request = match submission.into_request() {
        Ok(request) => request,
        Err(e) => return bad_request(e.public_message()),
    };

    let response = state.dispatcher.dispatch(&request).await;

    if response.success {
        if let Some(transaction) = Transaction::from_response(&request, &response) {
            if let Err(e) = state.transactions.save(transaction).await {
                error!(error = %e, "failed to store transaction");
                return (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(PaymentResponse::failure(
                        "Erro interno ao processar pagamento",
                    )),
                );
            }
        }
    }

    (StatusCode::OK, Json(response))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulateRequest {
    #[serde(default)]
    pub transaction_id: Option<String>,
}

/// `POST /api/payments/simulate`
pub async fn simulate_payment(
    State(state): State<AppState>,
    body: Result<Json<SimulateRequest>, JsonRejection>,
) -> (StatusCode, Json<SimulationOutcome>) {
    let transaction_id = body
        .ok()
        .and_then(|Json(body)| body.transaction_id)
        .filter(|id| !id.trim().is_empty());

    let Some(transaction_id) = transaction_id else {
        return (
            StatusCode::BAD_REQUEST,
            Json(SimulationOutcome {
                success: false,
                message: "transactionId é obrigatório".to_string(),
                data: None,
            }),
        );
    };

    let outcome = state.abacatepay.simulate_pix_payment(&transaction_id).await;
    if !outcome.success {
        return (StatusCode::BAD_REQUEST, Json(outcome));
    }

    match state
        .transactions
        .update_status(&transaction_id, PaymentStatus::Paid)
        .await
    {
        Ok(_) => info!(transaction_id = %transaction_id, "simulated payment recorded"),
        Err(e) => warn!(transaction_id = %transaction_id, error = %e, "simulated payment not recorded"),
    }

    (StatusCode::OK, Json(outcome))
}

fn bad_request(message: impl Into<String>) -> (StatusCode, Json<PaymentResponse>) {
    (
        StatusCode::BAD_REQUEST,
        Json(PaymentResponse::failure(message)),
    )
}
