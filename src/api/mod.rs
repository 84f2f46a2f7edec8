pub mod auth;
pub mod futures;
pub mod portfolio;
pub mod routes;
pub mod tools;
pub mod ws;

use rust_decimal::Decimal;
use tracing::error;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use crate::types::asset::{AssetClass, normalize_symbol};

/// Normalized symbol or 400.
pub(crate) fn parse_symbol(raw: &str) -> ApiResult<String> {
    normalize_symbol(raw).ok_or_else(|| ApiError::BadRequest(format!("invalid symbol '{}'", raw)))
}

/// Use the client-supplied price when present, otherwise the live quote.
pub(crate) async fn resolve_price(
    state: &AppState,
    asset_class: AssetClass,
    symbol: &str,
    price: Option<Decimal>,
) -> ApiResult<Decimal> {
    match price {
        Some(p) if p <= Decimal::ZERO => {
            Err(ApiError::BadRequest("price must be greater than zero".to_string()))
        }
        Some(p) => Ok(p),
        None => Ok(state.prices.quote(asset_class, symbol).await?.price),
    }
}

/// The in-memory stores stay authoritative when a database write fails.
pub(crate) fn log_write_failure(result: Result<(), sqlx::Error>, what: &'static str) {
    if let Err(err) = result {
        error!(error = %err, what, "database write-through failed");
    }
}
