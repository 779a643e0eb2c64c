use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{account::AccountService, auth::AuthService, utils};
use crate::{
    db::tx::TransactionLogStore,
    ledger::{PostingRequest, TransactionPoster},
    Error,
};

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateTransaction {
    pub transaction_type: String,
    pub amount: Decimal,
    pub description: Option<String>,
    pub transaction_date: DateTime<Utc>,
}

#[derive(Clone)]
pub struct TxState {
    pub auth: Arc<AuthService>,
    pub accounts: Arc<AccountService>,
    pub poster: Arc<TransactionPoster>,
    pub log: Arc<dyn TransactionLogStore>,
}

async fn create_transaction(
    headers: HeaderMap,
    State(state): State<TxState>,
    Path(account_id): Path<Uuid>,
    Json(body): Json<CreateTransaction>,
) -> Result<impl IntoResponse, Error> {
    tracing::info!("Starting transaction creation process");

    let owner = utils::validate_auth_token(&headers, &state.auth)?;
    // Ownership never changes, so checking it outside the posting unit is safe
    state.accounts.get_account(owner, account_id).await?;

    let transaction = state
        .poster
        .post(PostingRequest {
            account_id,
            transaction_type: body.transaction_type,
            amount: body.amount,
            description: body.description,
            transaction_date: body.transaction_date,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(transaction)))
}

// return all transactions of an account owned by the caller
async fn list_transactions(
    headers: HeaderMap,
    State(state): State<TxState>,
    Path(account_id): Path<Uuid>,
) -> Result<impl IntoResponse, Error> {
    let owner = utils::validate_auth_token(&headers, &state.auth)?;
    state.accounts.get_account(owner, account_id).await?;

    let transactions = state.log.list_transactions_by_account(account_id).await?;
    Ok(Json(transactions))
}

// return a single transaction, if its account belongs to the caller
async fn get_transaction(
    headers: HeaderMap,
    State(state): State<TxState>,
    Path(transaction_id): Path<Uuid>,
) -> Result<impl IntoResponse, Error> {
    let owner = utils::validate_auth_token(&headers, &state.auth)?;

    let transaction = state
        .log
        .get_transaction(transaction_id)
        .await?
        .ok_or(Error::NotFound("transaction"))?;
    state
        .accounts
        .get_account(owner, transaction.account_id)
        .await
        .map_err(|err| match err {
            Error::NotFound(_) => Error::NotFound("transaction"),
            err => err,
        })?;

    Ok(Json(transaction))
}

pub fn tx_routes(state: TxState) -> Router {
    Router::new()
        .route(
            "/accounts/:account_id/transactions",
            get(list_transactions).post(create_transaction),
        )
        .route("/transactions/:transaction_id", get(get_transaction))
        .with_state(state)
}
