//! Transaction routes: posting, history and lookup.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use serde_json::json;
use tally_core::ledger::ProposedTransaction;
use tally_shared::{
    AppError,
    types::{AccountId, TransactionId},
};
use tracing::info;

use crate::{AppState, error::ApiError};

/// Creates the transaction routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/accounts/{account_id}/transactions",
            get(list_account_transactions).post(post_transaction),
        )
        .route(
            "/transactions/{transaction_id}",
            get(get_transaction).delete(delete_transaction),
        )
}

async fn list_account_transactions(
    State(state): State<AppState>,
    Path(account_id): Path<AccountId>,
) -> Result<impl IntoResponse, ApiError> {
    let transactions = state.transactions().transactions_for_account(&account_id).await?;
    Ok(Json(json!({ "transactions": transactions })))
}

/// Posts a transaction on behalf of the account in the path.
///
/// The account must be one of the transaction's lines.
async fn post_transaction(
    State(state): State<AppState>,
    Path(account_id): Path<AccountId>,
    Json(payload): Json<ProposedTransaction>,
) -> Result<impl IntoResponse, ApiError> {
    // An empty transaction falls through to the engine's own error.
    if !payload.lines.is_empty()
        && !payload
            .lines
            .iter()
            .any(|line| line.account_id.trim() == account_id.as_str())
    {
        return Err(AppError::validation(
            "ACCOUNT_NOT_IN_TRANSACTION",
            format!("Transaction has no line for account {account_id}"),
        )
        .into());
    }

    let posted = state.transactions().post_transaction(payload).await?;

    info!(
        transaction_id = %posted.transaction.id,
        account_id = %account_id,
        lines = posted.transaction.lines.len(),
        "Transaction posted via API"
    );

    Ok((StatusCode::CREATED, Json(posted)))
}

async fn get_transaction(
    State(state): State<AppState>,
    Path(transaction_id): Path<TransactionId>,
) -> Result<impl IntoResponse, ApiError> {
    let posted = state.transactions().get_transaction(&transaction_id).await?;
    Ok(Json(posted))
}

async fn delete_transaction(
    State(state): State<AppState>,
    Path(transaction_id): Path<TransactionId>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .transactions()
        .soft_delete_transaction(&transaction_id)
        .await?;

    info!(transaction_id = %transaction_id, "Transaction deleted via API");

    Ok(StatusCode::NO_CONTENT)
}
