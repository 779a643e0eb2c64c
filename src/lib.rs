//! Personal finance backend: users, their accounts, and the transactions
//! that move account balances.
pub mod app;
pub mod config;
pub mod db;
pub mod error;
pub mod ledger;
pub mod rates;
pub mod routes;
pub mod telemetry;

pub use error::Error;
