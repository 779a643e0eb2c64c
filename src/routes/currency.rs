use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use chrono::{SecondsFormat, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::{
    db::currency::{Currency, CurrencyStore},
    rates::{Rate, RateLookup},
    Error,
};

/// Rates are quoted against this currency unless the caller asks otherwise.
pub const DEFAULT_TARGET: &str = "IDR";

#[derive(Debug, Deserialize)]
pub struct RateQuery {
    pub target: Option<String>,
}

pub struct CurrencyService {
    store: Arc<dyn CurrencyStore>,
    rates: Arc<dyn RateLookup>,
}

impl CurrencyService {
    pub fn new(store: Arc<dyn CurrencyStore>, rates: Arc<dyn RateLookup>) -> Self {
        Self { store, rates }
    }

    pub async fn list_currencies(&self) -> Result<Vec<Currency>, Error> {
        Ok(self.store.list_currencies().await?)
    }

    pub async fn get_currency_by_code(&self, code: &str) -> Result<Currency, Error> {
        let code = normalize_code(code)?;
        self.store
            .get_currency_by_code(&code)
            .await?
            .ok_or(Error::NotFound("currency"))
    }

    /// Latest provider rate for `base` in `target`. Both must be supported
    /// currencies; a currency quoted in itself never reaches the provider.
    pub async fn latest_rate(&self, base: &str, target: &str) -> Result<Rate, Error> {
        let base = self.get_currency_by_code(base).await?;
        let target = self.get_currency_by_code(target).await?;

        if base.code == target.code {
            return Ok(Rate {
                base: base.code,
                target: target.code,
                mid: Decimal::ONE,
                unit: 1,
                timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            });
        }

        self.rates
            .latest_rate(&base.code, &target.code)
            .await
            .map_err(|err| Error::Upstream(err.to_string()))
    }
}

fn normalize_code(code: &str) -> Result<String, Error> {
    let code = code.trim();
    if code.len() != 3 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(Error::InvalidArgument(format!(
            "\"{code}\" is not a three letter currency code"
        )));
    }
    Ok(code.to_ascii_uppercase())
}

async fn list_currencies(
    State(service): State<Arc<CurrencyService>>,
) -> Result<impl IntoResponse, Error> {
    Ok(Json(service.list_currencies().await?))
}

async fn get_currency(
    State(service): State<Arc<CurrencyService>>,
    Path(code): Path<String>,
) -> Result<impl IntoResponse, Error> {
    Ok(Json(service.get_currency_by_code(&code).await?))
}

async fn get_rate(
    State(service): State<Arc<CurrencyService>>,
    Path(code): Path<String>,
    Query(query): Query<RateQuery>,
) -> Result<impl IntoResponse, Error> {
    let target = query.target.as_deref().unwrap_or(DEFAULT_TARGET);
    Ok(Json(service.latest_rate(&code, target).await?))
}

pub fn currency_routes(service: Arc<CurrencyService>) -> Router {
    Router::new()
        .route("/currencies", get(list_currencies))
        .route("/currencies/:code", get(get_currency))
        .route("/currencies/:code/rate", get(get_rate))
        .with_state(service)
}
