use std::sync::Arc;

use axum::Router;
use tower_http::{compression::CompressionLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};

use crate::{
    db::{
        account::LedgerStore,
        auth::RefreshTokenStore,
        currency::CurrencyStore,
        tx::{PostingStore, TransactionLogStore},
        user::UserStore,
    },
    ledger::TransactionPoster,
    rates::RateLookup,
    routes::{
        account::{account_routes, AccountService},
        auth::{auth_routes, AuthService, TokenSettings},
        currency::{currency_routes, CurrencyService},
        tx::{tx_routes, TxState},
        user::{user_routes, UserService},
    },
};

const BODY_LIMIT: usize = 10 * 1024 * 1024;

/// Every storage port the handlers need.
#[derive(Clone)]
pub struct Stores {
    pub users: Arc<dyn UserStore>,
    pub refresh_tokens: Arc<dyn RefreshTokenStore>,
    pub ledger: Arc<dyn LedgerStore>,
    pub currencies: Arc<dyn CurrencyStore>,
    pub transactions: Arc<dyn TransactionLogStore>,
    pub posting: Arc<dyn PostingStore>,
}

pub fn build_router(stores: Stores, rates: Arc<dyn RateLookup>, tokens: TokenSettings) -> Router {
    let users = Arc::new(UserService::new(stores.users));
    let service = Arc::new(AuthService::new(users.clone(), stores.refresh_tokens, tokens));
    let accounts = Arc::new(AccountService::new(stores.ledger, stores.currencies.clone()));
    let currencies = Arc::new(CurrencyService::new(stores.currencies, rates));
    let poster = Arc::new(TransactionPoster::new(stores.posting));

    let api = Router::new()
        .merge(auth_routes(service.clone()))
        .merge(user_routes(service.clone(), users))
        .merge(account_routes(service.clone(), accounts.clone()))
        .merge(tx_routes(TxState {
            auth: service,
            accounts,
            poster,
            log: stores.transactions,
        }))
        .merge(currency_routes(currencies));

    Router::new()
        .nest("/v1", api)
        .layer(CompressionLayer::new().gzip(true))
        .layer(RequestBodyLimitLayer::new(BODY_LIMIT))
        .layer(TraceLayer::new_for_http())
}
