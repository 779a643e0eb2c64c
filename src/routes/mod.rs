pub mod account;
pub mod auth;
pub mod currency;
pub mod tx;
pub mod user;
pub mod utils;
