use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use super::StoreError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Account {
    pub id: Uuid,
    pub user_id: i64,
    pub account_name: String,
    pub balance: Decimal,
    pub currency_id: i32,
    pub currency_code: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewAccount {
    pub user_id: i64,
    pub account_name: String,
    pub balance: Decimal,
    pub currency_id: i32,
}

/// Partial update of an account. `None` leaves the column untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AccountChanges {
    pub account_name: Option<String>,
    pub balance: Option<Decimal>,
    pub currency_id: Option<i32>,
}

/// The account table.
///
/// Balance changes caused by postings do not go through this trait; they are
/// made by a [`super::tx::PostingUnit`] so they share a database transaction
/// with the transaction log append.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn create_account(&self, account: NewAccount) -> Result<Account, StoreError>;

    async fn get_account(&self, id: Uuid) -> Result<Option<Account>, StoreError>;

    async fn list_accounts_by_owner(&self, user_id: i64) -> Result<Vec<Account>, StoreError>;

    async fn update_account(
        &self,
        id: Uuid,
        changes: AccountChanges,
    ) -> Result<Option<Account>, StoreError>;

    /// Returns false when no row matched.
    async fn delete_account(&self, id: Uuid) -> Result<bool, StoreError>;
}

/// Length limit of `accounts.account_name`, in characters.
pub const ACCOUNT_NAME_MAX_CHARS: usize = 128;

pub(crate) const ACCOUNT_SELECT: &str = r#"
    SELECT a.id, a.user_id, a.account_name, a.balance, a.currency_id,
           c.code AS currency_code, a.created_at, a.updated_at
    FROM accounts a
    INNER JOIN currencies c ON c.id = a.currency_id
"#;

pub struct AccountRepository {
    pool: PgPool,
}

impl AccountRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LedgerStore for AccountRepository {
    async fn create_account(&self, account: NewAccount) -> Result<Account, StoreError> {
        let created = sqlx::query_as::<_, Account>(
            r#"
            WITH a AS (
                INSERT INTO accounts (id, user_id, account_name, balance, currency_id)
                VALUES ($1, $2, $3, $4, $5)
                RETURNING *
            )
            SELECT a.id, a.user_id, a.account_name, a.balance, a.currency_id,
                   c.code AS currency_code, a.created_at, a.updated_at
            FROM a
            INNER JOIN currencies c ON c.id = a.currency_id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(account.user_id)
        .bind(&account.account_name)
        .bind(account.balance)
        .bind(account.currency_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(created)
    }

    async fn get_account(&self, id: Uuid) -> Result<Option<Account>, StoreError> {
        let query = format!("{ACCOUNT_SELECT} WHERE a.id = $1");
        let account = sqlx::query_as::<_, Account>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(account)
    }

    async fn list_accounts_by_owner(&self, user_id: i64) -> Result<Vec<Account>, StoreError> {
        let query = format!("{ACCOUNT_SELECT} WHERE a.user_id = $1 ORDER BY a.created_at");
        let accounts = sqlx::query_as::<_, Account>(&query)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(accounts)
    }

    async fn update_account(
        &self,
        id: Uuid,
        changes: AccountChanges,
    ) -> Result<Option<Account>, StoreError> {
        let account = sqlx::query_as::<_, Account>(
            r#"
            WITH a AS (
                UPDATE accounts
                SET account_name = COALESCE($2, account_name),
                    balance = COALESCE($3, balance),
                    currency_id = COALESCE($4, currency_id),
                    updated_at = NOW()
                WHERE id = $1
                RETURNING *
            )
            SELECT a.id, a.user_id, a.account_name, a.balance, a.currency_id,
                   c.code AS currency_code, a.created_at, a.updated_at
            FROM a
            INNER JOIN currencies c ON c.id = a.currency_id
            "#,
        )
        .bind(id)
        .bind(changes.account_name)
        .bind(changes.balance)
        .bind(changes.currency_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(account)
    }

    async fn delete_account(&self, id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM accounts WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
