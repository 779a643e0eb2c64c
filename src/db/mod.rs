//! Persistence layer: one trait per store capability plus its Postgres
//! repository.
use rust_decimal::Decimal;
use sqlx::error::ErrorKind;

pub mod account;
pub mod auth;
pub mod currency;
pub mod tx;
pub mod user;

#[cfg(test)]
pub mod memory;

/// Fractional digits kept by the `NUMERIC(20, 4)` money columns.
pub const MONEY_SCALE: u32 = 4;

/// Whether `value` fits a `NUMERIC(20, 4)` column without rounding or
/// overflowing it.
pub fn fits_money_column(value: Decimal) -> bool {
    value.normalize().scale() <= MONEY_SCALE && value.abs() < Decimal::from(10_i64.pow(16))
}

/// Errors raised by the stores.
///
/// Constraint violations are classified here so that services can turn them
/// into domain errors without inspecting driver internals.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A unique constraint rejected the write. Holds the constraint name.
    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),

    /// A foreign key referenced a row that does not exist.
    #[error("foreign key constraint violated: {0}")]
    ForeignKeyViolation(String),

    /// A row that was locked for update disappeared before the write.
    #[error("row {0} vanished during the operation")]
    Vanished(String),

    /// Any other driver or connectivity failure.
    #[error("database error: {0}")]
    Database(sqlx::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            let constraint = db_err.constraint().unwrap_or_default().to_string();
            match db_err.kind() {
                ErrorKind::UniqueViolation => return StoreError::UniqueViolation(constraint),
                ErrorKind::ForeignKeyViolation => {
                    return StoreError::ForeignKeyViolation(constraint)
                }
                _ => {}
            }
        }
        StoreError::Database(err)
    }
}

impl StoreError {
    /// True when the violated unique constraint mentions `column`.
    pub fn violates_unique(&self, column: &str) -> bool {
        matches!(self, StoreError::UniqueViolation(name) if name.contains(column))
    }
}
