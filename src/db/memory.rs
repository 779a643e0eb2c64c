//! In-memory implementation of every store trait, used by the test suites.
//!
//! Posting units take a per-account async mutex, which gives the same
//! serialization a `SELECT ... FOR UPDATE` gives in Postgres.
use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tokio::sync::OwnedMutexGuard;
use uuid::Uuid;

use super::{
    account::{Account, AccountChanges, LedgerStore, NewAccount},
    auth::RefreshTokenStore,
    currency::{Currency, CurrencyStore},
    tx::{PostingStore, PostingUnit, Transaction, TransactionLogStore, TransactionRecord},
    user::{NewUser, User, UserStore},
    StoreError,
};

#[derive(Default)]
struct State {
    currencies: Vec<Currency>,
    users: Vec<User>,
    refresh_tokens: HashMap<String, (i64, DateTime<Utc>)>,
    accounts: HashMap<Uuid, Account>,
    transactions: Vec<Transaction>,
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
    account_locks: Arc<Mutex<HashMap<Uuid, Arc<tokio::sync::Mutex<()>>>>>,
    fail_appends: Arc<AtomicBool>,
}

impl MemoryStore {
    /// A store seeded with USD (1), EUR (2) and IDR (3).
    pub fn new() -> Self {
        let store = Self::default();
        let seeded = [("USD", "US Dollar"), ("EUR", "Euro"), ("IDR", "Indonesian Rupiah")];
        store.state.lock().unwrap().currencies = seeded
            .iter()
            .enumerate()
            .map(|(i, (code, name))| Currency {
                id: i as i32 + 1,
                code: code.to_string(),
                name: name.to_string(),
            })
            .collect();
        store
    }

    /// Makes every subsequent transaction append fail.
    pub fn fail_appends(&self, fail: bool) {
        self.fail_appends.store(fail, Ordering::SeqCst);
    }

    pub fn transaction_count(&self) -> usize {
        self.state.lock().unwrap().transactions.len()
    }

    pub fn balance_of(&self, id: Uuid) -> Option<Decimal> {
        self.state.lock().unwrap().accounts.get(&id).map(|a| a.balance)
    }

    fn account_lock(&self, id: Uuid) -> Arc<tokio::sync::Mutex<()>> {
        self.account_locks
            .lock()
            .unwrap()
            .entry(id)
            .or_default()
            .clone()
    }
}

#[async_trait]
impl CurrencyStore for MemoryStore {
    async fn list_currencies(&self) -> Result<Vec<Currency>, StoreError> {
        Ok(self.state.lock().unwrap().currencies.clone())
    }

    async fn get_currency(&self, id: i32) -> Result<Option<Currency>, StoreError> {
        let state = self.state.lock().unwrap();
        Ok(state.currencies.iter().find(|c| c.id == id).cloned())
    }

    async fn get_currency_by_code(&self, code: &str) -> Result<Option<Currency>, StoreError> {
        let state = self.state.lock().unwrap();
        Ok(state.currencies.iter().find(|c| c.code == code).cloned())
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn create_user(&self, user: NewUser) -> Result<User, StoreError> {
        let mut state = self.state.lock().unwrap();
        if state.users.iter().any(|u| u.username == user.username) {
            return Err(StoreError::UniqueViolation("users_username_key".to_string()));
        }
        if state.users.iter().any(|u| u.email == user.email) {
            return Err(StoreError::UniqueViolation("users_email_key".to_string()));
        }
        let now = Utc::now();
        let created = User {
            id: state.users.len() as i64 + 1,
            username: user.username,
            email: user.email,
            password_hash: user.password_hash,
            created_at: now,
            updated_at: now,
        };
        state.users.push(created.clone());
        Ok(created)
    }

    async fn find_user_by_id(&self, id: i64) -> Result<Option<User>, StoreError> {
        let state = self.state.lock().unwrap();
        Ok(state.users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let state = self.state.lock().unwrap();
        Ok(state.users.iter().find(|u| u.email == email).cloned())
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let state = self.state.lock().unwrap();
        Ok(state.users.iter().find(|u| u.username == username).cloned())
    }

    async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        Ok(self.state.lock().unwrap().users.clone())
    }
}

#[async_trait]
impl RefreshTokenStore for MemoryStore {
    async fn store_refresh_token(
        &self,
        user_id: i64,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut state = self.state.lock().unwrap();
        state
            .refresh_tokens
            .insert(token.to_string(), (user_id, expires_at));
        Ok(())
    }

    async fn consume_refresh_token(&self, token: &str) -> Result<Option<User>, StoreError> {
        let mut state = self.state.lock().unwrap();
        let user = match state.refresh_tokens.remove(token) {
            Some((user_id, expires_at)) if expires_at > Utc::now() => {
                state.users.iter().find(|u| u.id == user_id).cloned()
            }
            _ => None,
        };
        Ok(user)
    }

    async fn revoke_refresh_token(&self, token: &str) -> Result<bool, StoreError> {
        let mut state = self.state.lock().unwrap();
        Ok(state.refresh_tokens.remove(token).is_some())
    }
}

#[async_trait]
impl LedgerStore for MemoryStore {
    async fn create_account(&self, account: NewAccount) -> Result<Account, StoreError> {
        let mut state = self.state.lock().unwrap();
        let currency = state
            .currencies
            .iter()
            .find(|c| c.id == account.currency_id)
            .cloned()
            .ok_or_else(|| StoreError::ForeignKeyViolation("accounts_currency_id_fkey".into()))?;
        let now = Utc::now();
        let created = Account {
            id: Uuid::new_v4(),
            user_id: account.user_id,
            account_name: account.account_name,
            balance: account.balance,
            currency_id: currency.id,
            currency_code: currency.code,
            created_at: now,
            updated_at: now,
        };
        state.accounts.insert(created.id, created.clone());
        Ok(created)
    }

    async fn get_account(&self, id: Uuid) -> Result<Option<Account>, StoreError> {
        Ok(self.state.lock().unwrap().accounts.get(&id).cloned())
    }

    async fn list_accounts_by_owner(&self, user_id: i64) -> Result<Vec<Account>, StoreError> {
        let state = self.state.lock().unwrap();
        let mut accounts: Vec<Account> = state
            .accounts
            .values()
            .filter(|a| a.user_id == user_id)
            .cloned()
            .collect();
        accounts.sort_by_key(|a| a.created_at);
        Ok(accounts)
    }

    async fn update_account(
        &self,
        id: Uuid,
        changes: AccountChanges,
    ) -> Result<Option<Account>, StoreError> {
        // Waits for an in-flight posting, like an UPDATE waiting on the row lock
        let _guard = self.account_lock(id).lock_owned().await;
        let mut state = self.state.lock().unwrap();
        let currency = match changes.currency_id {
            Some(currency_id) => Some(
                state
                    .currencies
                    .iter()
                    .find(|c| c.id == currency_id)
                    .cloned()
                    .ok_or_else(|| {
                        StoreError::ForeignKeyViolation("accounts_currency_id_fkey".into())
                    })?,
            ),
            None => None,
        };
        let Some(account) = state.accounts.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(name) = changes.account_name {
            account.account_name = name;
        }
        if let Some(balance) = changes.balance {
            account.balance = balance;
        }
        if let Some(currency) = currency {
            account.currency_id = currency.id;
            account.currency_code = currency.code;
        }
        account.updated_at = Utc::now();
        Ok(Some(account.clone()))
    }

    async fn delete_account(&self, id: Uuid) -> Result<bool, StoreError> {
        let mut state = self.state.lock().unwrap();
        let removed = state.accounts.remove(&id).is_some();
        state.transactions.retain(|t| t.account_id != id);
        Ok(removed)
    }
}

#[async_trait]
impl TransactionLogStore for MemoryStore {
    async fn get_transaction(&self, id: Uuid) -> Result<Option<Transaction>, StoreError> {
        let state = self.state.lock().unwrap();
        Ok(state.transactions.iter().find(|t| t.id == id).cloned())
    }

    async fn list_transactions_by_account(
        &self,
        account_id: Uuid,
    ) -> Result<Vec<Transaction>, StoreError> {
        let state = self.state.lock().unwrap();
        let mut transactions: Vec<Transaction> = state
            .transactions
            .iter()
            .filter(|t| t.account_id == account_id)
            .cloned()
            .collect();
        transactions.sort_by(|a, b| {
            (b.transaction_date, b.created_at).cmp(&(a.transaction_date, a.created_at))
        });
        Ok(transactions)
    }
}

#[async_trait]
impl PostingStore for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn PostingUnit>, StoreError> {
        Ok(Box::new(MemoryPostingUnit {
            store: self.clone(),
            guard: None,
            balance: None,
            transaction: None,
        }))
    }
}

/// Writes are staged on the unit and applied together on commit.
struct MemoryPostingUnit {
    store: MemoryStore,
    guard: Option<OwnedMutexGuard<()>>,
    balance: Option<(Uuid, Decimal)>,
    transaction: Option<Transaction>,
}

#[async_trait]
impl PostingUnit for MemoryPostingUnit {
    async fn lock_account(&mut self, id: Uuid) -> Result<Option<Account>, StoreError> {
        let guard = self.store.account_lock(id).lock_owned().await;
        self.guard = Some(guard);
        let account = self.store.state.lock().unwrap().accounts.get(&id).cloned();
        // Widen the read-modify-write window so lost updates would show up.
        tokio::task::yield_now().await;
        Ok(account)
    }

    async fn set_balance(&mut self, id: Uuid, balance: Decimal) -> Result<(), StoreError> {
        self.balance = Some((id, balance));
        Ok(())
    }

    async fn append_transaction(
        &mut self,
        record: TransactionRecord,
    ) -> Result<Transaction, StoreError> {
        if self.store.fail_appends.load(Ordering::SeqCst) {
            return Err(StoreError::Vanished("transactions".to_string()));
        }
        let now = Utc::now();
        let transaction = Transaction {
            id: Uuid::new_v4(),
            account_id: record.account_id,
            transaction_type: record.transaction_type,
            amount: record.amount,
            balance_before: record.balance_before,
            balance_after: record.balance_after,
            description: record.description,
            transaction_date: record.transaction_date,
            created_at: now,
            updated_at: now,
        };
        self.transaction = Some(transaction.clone());
        Ok(transaction)
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let MemoryPostingUnit {
            store,
            guard: _guard,
            balance,
            transaction,
        } = *self;
        let mut state = store.state.lock().unwrap();
        if let Some((id, balance)) = balance {
            let account = state
                .accounts
                .get_mut(&id)
                .ok_or_else(|| StoreError::Vanished(id.to_string()))?;
            account.balance = balance;
            account.updated_at = Utc::now();
        }
        if let Some(transaction) = transaction {
            state.transactions.push(transaction);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use rust_decimal_macros::dec;

    use super::*;
    use crate::db::tx::TransactionType;

    async fn account(store: &MemoryStore, balance: Decimal) -> Account {
        store
            .create_account(NewAccount {
                user_id: 1,
                account_name: "Wallet".to_string(),
                balance,
                currency_id: 1,
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn same_day_transactions_list_newest_created_first() {
        let store = MemoryStore::new();
        let account = account(&store, dec!(10)).await;
        let date = Utc::now();
        {
            let mut state = store.state.lock().unwrap();
            for (offset, amount) in [(0, dec!(1)), (5, dec!(2)), (2, dec!(3))] {
                let created_at = date + Duration::seconds(offset);
                state.transactions.push(Transaction {
                    id: Uuid::new_v4(),
                    account_id: account.id,
                    transaction_type: TransactionType::Credit,
                    amount,
                    balance_before: dec!(10),
                    balance_after: dec!(10) + amount,
                    description: None,
                    transaction_date: date,
                    created_at,
                    updated_at: created_at,
                });
            }
        }

        let listed = store.list_transactions_by_account(account.id).await.unwrap();

        let amounts: Vec<Decimal> = listed.iter().map(|t| t.amount).collect();
        assert_eq!(amounts, vec![dec!(2), dec!(3), dec!(1)]);
    }

    #[tokio::test]
    async fn balance_edit_waits_for_inflight_posting() {
        let store = MemoryStore::new();
        let account_id = account(&store, dec!(100)).await.id;

        let mut unit = store.begin().await.unwrap();
        unit.lock_account(account_id).await.unwrap();
        unit.set_balance(account_id, dec!(60)).await.unwrap();

        let editor = {
            let store = store.clone();
            tokio::spawn(async move {
                let changes = AccountChanges {
                    balance: Some(dec!(500)),
                    ..Default::default()
                };
                store.update_account(account_id, changes).await
            })
        };
        tokio::task::yield_now().await;
        assert!(!editor.is_finished());

        unit.commit().await.unwrap();
        editor.await.unwrap().unwrap();

        assert_eq!(store.balance_of(account_id), Some(dec!(500)));
    }
}
