use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};

use super::StoreError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Currency {
    pub id: i32,
    pub code: String,
    pub name: String,
}

/// Read access to the seeded currency table.
#[async_trait]
pub trait CurrencyStore: Send + Sync {
    async fn list_currencies(&self) -> Result<Vec<Currency>, StoreError>;

    async fn get_currency(&self, id: i32) -> Result<Option<Currency>, StoreError>;

    /// Lookup by ISO code. Callers are expected to upper-case the code.
    async fn get_currency_by_code(&self, code: &str) -> Result<Option<Currency>, StoreError>;
}

pub struct CurrencyRepository {
    pool: PgPool,
}

impl CurrencyRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CurrencyStore for CurrencyRepository {
    async fn list_currencies(&self) -> Result<Vec<Currency>, StoreError> {
        let currencies = sqlx::query_as::<_, Currency>(
            "SELECT id, code, name FROM currencies ORDER BY code",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(currencies)
    }

    async fn get_currency(&self, id: i32) -> Result<Option<Currency>, StoreError> {
        let currency =
            sqlx::query_as::<_, Currency>("SELECT id, code, name FROM currencies WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(currency)
    }

    async fn get_currency_by_code(&self, code: &str) -> Result<Option<Currency>, StoreError> {
        let currency =
            sqlx::query_as::<_, Currency>("SELECT id, code, name FROM currencies WHERE code = $1")
                .bind(code)
                .fetch_optional(&self.pool)
                .await?;
        Ok(currency)
    }
}
