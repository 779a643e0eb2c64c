//! Balance-affecting transaction posting.
//!
//! A posting reads the account under lock, checks the debit against the
//! current balance, and writes the new balance together with the transaction
//! record in one [`PostingUnit`]. Either both writes commit or neither does.
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::db::{
    fits_money_column,
    tx::{
        PostingStore, PostingUnit, Transaction, TransactionRecord, TransactionType,
        UnknownTransactionType,
    },
    StoreError,
};

/// Input of a single posting, as received from the caller.
#[derive(Debug, Clone)]
pub struct PostingRequest {
    pub account_id: Uuid,
    pub transaction_type: String,
    pub amount: Decimal,
    pub description: Option<String>,
    pub transaction_date: DateTime<Utc>,
}

#[derive(Debug, thiserror::Error)]
pub enum PostingError {
    #[error("account {0} not found")]
    NotFound(Uuid),

    #[error("{0}")]
    InvalidArgument(String),

    #[error("insufficient funds: balance {balance}, requested {requested}")]
    InsufficientFunds { balance: Decimal, requested: Decimal },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl TransactionType {
    /// Balance after applying `amount` of this type to `balance`.
    pub fn apply(self, balance: Decimal, amount: Decimal) -> Result<Decimal, PostingError> {
        match self {
            TransactionType::Credit => balance
                .checked_add(amount)
                .filter(|balance| fits_money_column(*balance))
                .ok_or_else(|| {
                    PostingError::InvalidArgument(
                        "amount overflows the account balance".to_string(),
                    )
                }),
            TransactionType::Debit if amount > balance => Err(PostingError::InsufficientFunds {
                balance,
                requested: amount,
            }),
            TransactionType::Debit => Ok(balance - amount),
        }
    }
}

pub struct TransactionPoster {
    store: Arc<dyn PostingStore>,
}

impl TransactionPoster {
    pub fn new(store: Arc<dyn PostingStore>) -> Self {
        Self { store }
    }

    /// Applies one credit or debit to an account and records it.
    ///
    /// Input is validated before the store is touched. Postings against the
    /// same account are serialized by the account lock held for the whole
    /// unit, so concurrent callers never compute from a stale balance.
    pub async fn post(&self, req: PostingRequest) -> Result<Transaction, PostingError> {
        let transaction_type: TransactionType = req
            .transaction_type
            .parse()
            .map_err(|err: UnknownTransactionType| PostingError::InvalidArgument(err.to_string()))?;
        if req.amount <= Decimal::ZERO {
            return Err(PostingError::InvalidArgument(
                "amount must be greater than zero".to_string(),
            ));
        }
        if !fits_money_column(req.amount) {
            return Err(PostingError::InvalidArgument(
                "amount must have at most 4 decimal places and 16 integer digits".to_string(),
            ));
        }

        // An early return drops the unit, which discards its writes.
        let mut unit = self.store.begin().await?;
        let transaction = Self::apply(unit.as_mut(), transaction_type, req).await?;
        unit.commit().await?;

        tracing::info!(
            transaction_id = %transaction.id,
            account_id = %transaction.account_id,
            transaction_type = %transaction.transaction_type,
            amount = %transaction.amount,
            balance_after = %transaction.balance_after,
            "posted transaction"
        );
        Ok(transaction)
    }

    async fn apply(
        unit: &mut dyn PostingUnit,
        transaction_type: TransactionType,
        req: PostingRequest,
    ) -> Result<Transaction, PostingError> {
        let account = unit
            .lock_account(req.account_id)
            .await?
            .ok_or(PostingError::NotFound(req.account_id))?;

        let balance_before = account.balance;
        let balance_after = match transaction_type.apply(balance_before, req.amount) {
            Ok(balance) => balance,
            Err(err) => {
                tracing::warn!(account_id = %account.id, "posting rejected: {err}");
                return Err(err);
            }
        };

        unit.set_balance(account.id, balance_after).await?;
        let transaction = unit
            .append_transaction(TransactionRecord {
                account_id: account.id,
                transaction_type,
                amount: req.amount,
                balance_before,
                balance_after,
                description: req.description,
                transaction_date: req.transaction_date,
            })
            .await?;
        Ok(transaction)
    }
}
