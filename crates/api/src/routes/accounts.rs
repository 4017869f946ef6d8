//! Account routes.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use serde::Deserialize;
use serde_json::json;
use tally_db::CreateAccountInput;
use tally_shared::{AppError, types::CustomerId};
use tracing::info;

use crate::{AppState, error::ApiError};

/// Creates the account routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/customers/{customer_id}/accounts",
            get(list_customer_accounts).post(create_account),
        )
        .route("/accounts/search", get(search_accounts))
}

/// Request body for opening an account.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAccountRequest {
    /// Display name.
    pub name: String,
    /// Free-form account type, e.g. `Checking`.
    #[serde(rename = "type")]
    pub account_type: String,
    /// Routing number; the configured default when absent.
    pub routing_number: Option<String>,
}

/// Query parameters for looking an account up by its bank coordinates.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchAccountsQuery {
    /// Account number.
    pub number: Option<String>,
    /// Routing number.
    pub routing_number: Option<String>,
    /// Account type, matched case-insensitively.
    #[serde(rename = "type")]
    pub account_type: Option<String>,
}

async fn create_account(
    State(state): State<AppState>,
    Path(customer_id): Path<CustomerId>,
    Json(payload): Json<CreateAccountRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let routing_number = payload
        .routing_number
        .filter(|r| !r.trim().is_empty())
        .unwrap_or_else(|| state.ledger.default_routing_number.clone());

    let account = state
        .accounts()
        .create_account(CreateAccountInput {
            customer_id,
            name: payload.name,
            account_type: payload.account_type,
            routing_number,
        })
        .await?;

    info!(
        account_id = %account.id,
        customer_id = %account.customer_id,
        "Account opened via API"
    );

    Ok((StatusCode::CREATED, Json(account)))
}

async fn list_customer_accounts(
    State(state): State<AppState>,
    Path(customer_id): Path<CustomerId>,
) -> Result<impl IntoResponse, ApiError> {
    let accounts = state.accounts().search_by_customer_id(&customer_id).await?;
    Ok(Json(json!({ "accounts": accounts })))
}

async fn search_accounts(
    State(state): State<AppState>,
    Query(query): Query<SearchAccountsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let number = required(query.number, "number")?;
    let routing_number = required(query.routing_number, "routingNumber")?;
    let account_type = required(query.account_type, "type")?;

    let account = state
        .accounts()
        .search_by_routing_number(&number, &routing_number, &account_type)
        .await?
        .ok_or_else(|| {
            AppError::not_found(
                "ACCOUNT_NOT_FOUND",
                format!("No {account_type} account {number} at routing number {routing_number}"),
            )
        })?;

    Ok(Json(account))
}

fn required(value: Option<String>, name: &'static str) -> Result<String, AppError> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| AppError::validation("MISSING_PARAMETER", format!("{name} is required")))
}
