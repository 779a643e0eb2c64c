use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;

use super::{auth::AuthService, utils::validate_auth_token};
use crate::{
    db::{
        account::{Account, AccountChanges, LedgerStore, NewAccount, ACCOUNT_NAME_MAX_CHARS},
        currency::CurrencyStore,
        fits_money_column, StoreError,
    },
    Error,
};

#[derive(Debug, Deserialize)]
pub struct CreateAccountRequest {
    pub account_name: String,
    #[serde(default)]
    pub balance: Decimal,
    pub currency_id: i32,
}

/// Account CRUD scoped to the authenticated owner.
///
/// Accounts belonging to somebody else are reported as not found, so a
/// foreign account id reveals nothing.
pub struct AccountService {
    ledger: Arc<dyn LedgerStore>,
    currencies: Arc<dyn CurrencyStore>,
}

impl AccountService {
    pub fn new(ledger: Arc<dyn LedgerStore>, currencies: Arc<dyn CurrencyStore>) -> Self {
        Self { ledger, currencies }
    }

    pub async fn create_account(
        &self,
        owner: i64,
        req: CreateAccountRequest,
    ) -> Result<Account, Error> {
        let account_name = validate_name(&req.account_name)?;
        validate_balance(req.balance)?;
        self.ensure_currency(req.currency_id).await?;

        let account = self
            .ledger
            .create_account(NewAccount {
                user_id: owner,
                account_name,
                balance: req.balance,
                currency_id: req.currency_id,
            })
            .await
            .map_err(currency_violation)?;
        tracing::info!("account {} created for user {}", account.id, owner);
        Ok(account)
    }

    pub async fn get_account(&self, owner: i64, id: Uuid) -> Result<Account, Error> {
        match self.ledger.get_account(id).await? {
            Some(account) if account.user_id == owner => Ok(account),
            _ => Err(Error::NotFound("account")),
        }
    }

    pub async fn list_accounts(&self, owner: i64) -> Result<Vec<Account>, Error> {
        Ok(self.ledger.list_accounts_by_owner(owner).await?)
    }

    pub async fn update_account(
        &self,
        owner: i64,
        id: Uuid,
        mut changes: AccountChanges,
    ) -> Result<Account, Error> {
        self.get_account(owner, id).await?;

        if let Some(name) = &changes.account_name {
            changes.account_name = Some(validate_name(name)?);
        }
        if let Some(balance) = changes.balance {
            validate_balance(balance)?;
        }
        if let Some(currency_id) = changes.currency_id {
            self.ensure_currency(currency_id).await?;
        }

        let account = self
            .ledger
            .update_account(id, changes)
            .await
            .map_err(currency_violation)?
            .ok_or(Error::NotFound("account"))?;
        tracing::info!("account {} updated", account.id);
        Ok(account)
    }

    pub async fn delete_account(&self, owner: i64, id: Uuid) -> Result<(), Error> {
        self.get_account(owner, id).await?;
        if !self.ledger.delete_account(id).await? {
            return Err(Error::NotFound("account"));
        }
        tracing::info!("account {} deleted", id);
        Ok(())
    }

    async fn ensure_currency(&self, currency_id: i32) -> Result<(), Error> {
        match self.currencies.get_currency(currency_id).await? {
            Some(_) => Ok(()),
            None => Err(Error::InvalidArgument(format!(
                "currency {currency_id} does not exist"
            ))),
        }
    }
}

fn validate_name(name: &str) -> Result<String, Error> {
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::InvalidArgument("account_name is required".to_string()));
    }
    if name.chars().count() > ACCOUNT_NAME_MAX_CHARS {
        return Err(Error::InvalidArgument(format!(
            "account_name is longer than {ACCOUNT_NAME_MAX_CHARS} characters"
        )));
    }
    Ok(name.to_string())
}

fn validate_balance(balance: Decimal) -> Result<(), Error> {
    if balance < Decimal::ZERO {
        return Err(Error::InvalidArgument(
            "balance cannot be negative".to_string(),
        ));
    }
    if !fits_money_column(balance) {
        return Err(Error::InvalidArgument(
            "balance must have at most 4 decimal places and 16 integer digits".to_string(),
        ));
    }
    Ok(())
}

// The currency may vanish between the check and the write.
fn currency_violation(err: StoreError) -> Error {
    match err {
        StoreError::ForeignKeyViolation(_) => {
            Error::InvalidArgument("currency does not exist".to_string())
        }
        err => Error::Store(err),
    }
}

async fn create_account(
    headers: HeaderMap,
    State((service, accounts)): State<(Arc<AuthService>, Arc<AccountService>)>,
    Json(req): Json<CreateAccountRequest>,
) -> Result<impl IntoResponse, Error> {
    let owner = validate_auth_token(&headers, &service)?;
    let account = accounts.create_account(owner, req).await?;
    Ok((StatusCode::CREATED, Json(account)))
}

async fn list_accounts(
    headers: HeaderMap,
    State((service, accounts)): State<(Arc<AuthService>, Arc<AccountService>)>,
) -> Result<impl IntoResponse, Error> {
    let owner = validate_auth_token(&headers, &service)?;
    Ok(Json(accounts.list_accounts(owner).await?))
}

async fn get_account(
    headers: HeaderMap,
    State((service, accounts)): State<(Arc<AuthService>, Arc<AccountService>)>,
    Path(account_id): Path<Uuid>,
) -> Result<impl IntoResponse, Error> {
    let owner = validate_auth_token(&headers, &service)?;
    Ok(Json(accounts.get_account(owner, account_id).await?))
}

async fn update_account(
    headers: HeaderMap,
    State((service, accounts)): State<(Arc<AuthService>, Arc<AccountService>)>,
    Path(account_id): Path<Uuid>,
    Json(changes): Json<AccountChanges>,
) -> Result<impl IntoResponse, Error> {
    let owner = validate_auth_token(&headers, &service)?;
    Ok(Json(
        accounts.update_account(owner, account_id, changes).await?,
    ))
}

async fn delete_account(
    headers: HeaderMap,
    State((service, accounts)): State<(Arc<AuthService>, Arc<AccountService>)>,
    Path(account_id): Path<Uuid>,
) -> Result<impl IntoResponse, Error> {
    let owner = validate_auth_token(&headers, &service)?;
    accounts.delete_account(owner, account_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub fn account_routes(service: Arc<AuthService>, accounts: Arc<AccountService>) -> Router {
    Router::new()
        .route("/accounts", get(list_accounts).post(create_account))
        .route(
            "/accounts/:account_id",
            get(get_account).put(update_account).delete(delete_account),
        )
        .with_state((service, accounts))
}
