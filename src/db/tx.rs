use std::{fmt, str::FromStr};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool, Postgres};
use uuid::Uuid;

use super::{
    account::{Account, ACCOUNT_SELECT},
    StoreError,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub account_id: Uuid,
    pub transaction_type: TransactionType,
    pub amount: Decimal,
    pub balance_before: Decimal,
    pub balance_after: Decimal,
    pub description: Option<String>,
    pub transaction_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Credit,
    Debit,
}

impl TransactionType {
    pub fn as_str(self) -> &'static str {
        match self {
            TransactionType::Credit => "credit",
            TransactionType::Debit => "debit",
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, PartialEq, thiserror::Error)]
#[error("unknown transaction type \"{0}\", expected \"credit\" or \"debit\"")]
pub struct UnknownTransactionType(pub String);

impl FromStr for TransactionType {
    type Err = UnknownTransactionType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "credit" => Ok(TransactionType::Credit),
            "debit" => Ok(TransactionType::Debit),
            _ => Err(UnknownTransactionType(s.to_string())),
        }
    }
}

// Row shape as stored; the type column is plain text.
#[derive(FromRow)]
struct TransactionRow {
    id: Uuid,
    account_id: Uuid,
    transaction_type: String,
    amount: Decimal,
    balance_before: Decimal,
    balance_after: Decimal,
    description: Option<String>,
    transaction_date: DateTime<Utc>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<TransactionRow> for Transaction {
    type Error = sqlx::Error;

    fn try_from(row: TransactionRow) -> Result<Self, Self::Error> {
        let transaction_type = row
            .transaction_type
            .parse()
            .map_err(|err: UnknownTransactionType| sqlx::Error::Decode(Box::new(err)))?;
        Ok(Transaction {
            id: row.id,
            account_id: row.account_id,
            transaction_type,
            amount: row.amount,
            balance_before: row.balance_before,
            balance_after: row.balance_after,
            description: row.description,
            transaction_date: row.transaction_date,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Everything the poster decides about a transaction before it is stored.
/// The id and server timestamps are assigned on append.
#[derive(Debug, Clone)]
pub struct TransactionRecord {
    pub account_id: Uuid,
    pub transaction_type: TransactionType,
    pub amount: Decimal,
    pub balance_before: Decimal,
    pub balance_after: Decimal,
    pub description: Option<String>,
    pub transaction_date: DateTime<Utc>,
}

/// Read side of the transaction log.
#[async_trait]
pub trait TransactionLogStore: Send + Sync {
    async fn get_transaction(&self, id: Uuid) -> Result<Option<Transaction>, StoreError>;

    /// Newest `transaction_date` first.
    async fn list_transactions_by_account(
        &self,
        account_id: Uuid,
    ) -> Result<Vec<Transaction>, StoreError>;
}

/// Opens atomic units spanning one account row and the transaction log.
#[async_trait]
pub trait PostingStore: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn PostingUnit>, StoreError>;
}

/// All-or-nothing unit of work for a single posting.
///
/// Nothing written through the unit becomes visible until [`commit`]; a unit
/// dropped without commit discards every write.
///
/// [`commit`]: PostingUnit::commit
#[async_trait]
pub trait PostingUnit: Send {
    /// Reads the account and holds it exclusively until the unit ends.
    async fn lock_account(&mut self, id: Uuid) -> Result<Option<Account>, StoreError>;

    async fn set_balance(&mut self, id: Uuid, balance: Decimal) -> Result<(), StoreError>;

    async fn append_transaction(
        &mut self,
        record: TransactionRecord,
    ) -> Result<Transaction, StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;
}

const TRANSACTION_COLUMNS: &str = "id, account_id, transaction_type, amount, balance_before, \
     balance_after, description, transaction_date, created_at, updated_at";

pub struct TransactionRepository {
    pool: PgPool,
}

impl TransactionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TransactionLogStore for TransactionRepository {
    async fn get_transaction(&self, id: Uuid) -> Result<Option<Transaction>, StoreError> {
        let query = format!("SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE id = $1");
        let row = sqlx::query_as::<_, TransactionRow>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Transaction::try_from).transpose()?)
    }

    async fn list_transactions_by_account(
        &self,
        account_id: Uuid,
    ) -> Result<Vec<Transaction>, StoreError> {
        let query = format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE account_id = $1 \
             ORDER BY transaction_date DESC, created_at DESC"
        );
        let rows = sqlx::query_as::<_, TransactionRow>(&query)
            .bind(account_id)
            .fetch_all(&self.pool)
            .await?;
        let transactions = rows
            .into_iter()
            .map(Transaction::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(transactions)
    }
}

#[async_trait]
impl PostingStore for TransactionRepository {
    async fn begin(&self) -> Result<Box<dyn PostingUnit>, StoreError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgPostingUnit { tx }))
    }
}

/// A Postgres transaction. The account row lock taken by `lock_account`
/// serializes concurrent postings against the same account.
pub struct PgPostingUnit {
    tx: sqlx::Transaction<'static, Postgres>,
}

#[async_trait]
impl PostingUnit for PgPostingUnit {
    async fn lock_account(&mut self, id: Uuid) -> Result<Option<Account>, StoreError> {
        let query = format!("{ACCOUNT_SELECT} WHERE a.id = $1 FOR UPDATE OF a");
        let account = sqlx::query_as::<_, Account>(&query)
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(account)
    }

    async fn set_balance(&mut self, id: Uuid, balance: Decimal) -> Result<(), StoreError> {
        let result =
            sqlx::query("UPDATE accounts SET balance = $2, updated_at = NOW() WHERE id = $1")
                .bind(id)
                .bind(balance)
                .execute(&mut *self.tx)
                .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::Vanished(id.to_string()));
        }
        Ok(())
    }

    async fn append_transaction(
        &mut self,
        record: TransactionRecord,
    ) -> Result<Transaction, StoreError> {
        let query = format!(
            r#"
            INSERT INTO transactions (id, account_id, transaction_type, amount,
                balance_before, balance_after, description, transaction_date)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {TRANSACTION_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, TransactionRow>(&query)
            .bind(Uuid::new_v4())
            .bind(record.account_id)
            .bind(record.transaction_type.as_str())
            .bind(record.amount)
            .bind(record.balance_before)
            .bind(record.balance_after)
            .bind(record.description)
            .bind(record.transaction_date)
            .fetch_one(&mut *self.tx)
            .await?;
        Ok(Transaction::try_from(row)?)
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.commit().await?;
        Ok(())
    }
}
