//! Profile, holdings, transactions, portfolio summary and watchlist handlers.

use std::collections::HashMap;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::api::auth::AuthUser;
use crate::api::{log_write_failure, parse_symbol, resolve_price};
use crate::error::{ApiError, ApiResult};
use crate::holdings;
use crate::persistence;
use crate::realtime::{ChangeAction, Channel, publish_row};
use crate::state::AppState;
use crate::types::asset::AssetClass;
use crate::types::holding::{Holding, PortfolioSummary};
use crate::types::profile::Profile;
use crate::types::quote::Quote;
use crate::types::transaction::Transaction;
use crate::types::watchlist::WatchlistItem;

const DEFAULT_TRANSACTION_LIMIT: usize = 50;
const MAX_TRANSACTION_LIMIT: usize = 500;
const MAX_DISPLAY_NAME_LEN: usize = 64;

/// GET /profile
pub async fn get_profile(
    State(state): State<AppState>,
    user: AuthUser,
) -> ApiResult<Json<Profile>> {
    state
        .profiles
        .read()
        .await
        .get(&user.user_id)
        .cloned()
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("profile not found".to_string()))
}

#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub display_name: Option<String>,
    pub base_currency: Option<String>,
}

/// PUT /profile. Blank display name clears it; base currency is a 3-letter
/// code.
pub async fn update_profile(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<UpdateProfileRequest>,
) -> ApiResult<Json<Profile>> {
    let base_currency = match req.base_currency {
        Some(code) => {
            let code = code.trim().to_uppercase();
            if code.len() != 3 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
                return Err(ApiError::BadRequest(
                    "base_currency must be a 3-letter code".to_string(),
                ));
            }
            Some(code)
        }
        None => None,
    };
    let display_name = match req.display_name {
        Some(name) if name.trim().chars().count() > MAX_DISPLAY_NAME_LEN => {
            return Err(ApiError::BadRequest(format!(
                "display_name must be at most {} characters",
                MAX_DISPLAY_NAME_LEN
            )));
        }
        Some(name) => Some(Some(name.trim().to_string()).filter(|n| !n.is_empty())),
        None => None,
    };

    let profile = {
        let mut profiles = state.profiles.write().await;
        let profile = profiles
            .get_mut(&user.user_id)
            .ok_or_else(|| ApiError::NotFound("profile not found".to_string()))?;
        if let Some(code) = base_currency {
            profile.base_currency = code;
        }
        if let Some(name) = display_name {
            profile.display_name = name;
        }
        profile.updated_at = Utc::now();
        profile.clone()
    };

    persist_profile(&state, &profile).await;
    publish_row(
        &state.realtime,
        Channel::Profiles,
        ChangeAction::Update,
        user.user_id,
        &profile,
    );
    Ok(Json(profile))
}

pub(crate) async fn persist_profile(state: &AppState, profile: &Profile) {
    if let Some(pool) = &state.db {
        let balance = state.futures.read().await.balance(profile.user_id);
        log_write_failure(
            persistence::upsert_profile(pool, profile, balance).await,
            "profile",
        );
    }
}

#[derive(Debug, Deserialize)]
pub struct HoldingsQuery {
    pub symbol: Option<String>,
}

/// GET /holdings?symbol=
pub async fn list_holdings(
    State(state): State<AppState>,
    user: AuthUser,
    Query(q): Query<HoldingsQuery>,
) -> ApiResult<Json<Vec<Holding>>> {
    let symbol = q.symbol.as_deref().map(parse_symbol).transpose()?;
    let list = state
        .portfolio
        .read()
        .await
        .holdings_for(user.user_id, symbol.as_deref());
    Ok(Json(list))
}

#[derive(Debug, Deserialize)]
pub struct BuyRequest {
    pub symbol: String,
    #[serde(default)]
    pub asset_class: AssetClass,
    pub quantity: Decimal,
    /// Fill price; the live quote when omitted.
    pub price: Option<Decimal>,
}

#[derive(Debug, Serialize)]
pub struct TradeResponse {
    pub holding: Option<Holding>,
    pub transaction: Transaction,
}

/// POST /holdings/buy
pub async fn buy(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<BuyRequest>,
) -> ApiResult<impl IntoResponse> {
    let symbol = parse_symbol(&req.symbol)?;
    if req.quantity <= Decimal::ZERO {
        return Err(holdings::HoldingError::InvalidQuantity.into());
    }
    let price = resolve_price(&state, req.asset_class, &symbol, req.price).await?;

    let (holding, transaction) = state.portfolio.write().await.record_buy(
        user.user_id,
        &symbol,
        req.asset_class,
        req.quantity,
        price,
    )?;
    info!(user_id = %user.user_id, %symbol, quantity = %req.quantity, %price, "buy recorded");

    if let Some(pool) = &state.db {
        log_write_failure(persistence::upsert_holding(pool, &holding).await, "holding");
        log_write_failure(
            persistence::insert_transaction(pool, &transaction).await,
            "transaction",
        );
    }
    publish_row(
        &state.realtime,
        Channel::Holdings,
        ChangeAction::Update,
        user.user_id,
        &holding,
    );
    publish_row(
        &state.realtime,
        Channel::Transactions,
        ChangeAction::Insert,
        user.user_id,
        &transaction,
    );

    Ok((
        StatusCode::CREATED,
        Json(TradeResponse {
            holding: Some(holding),
            transaction,
        }),
    ))
}

#[derive(Debug, Deserialize)]
pub struct SellRequest {
    pub symbol: String,
    pub quantity: Decimal,
    pub price: Option<Decimal>,
}

/// POST /holdings/sell
pub async fn sell(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<SellRequest>,
) -> ApiResult<impl IntoResponse> {
    let symbol = parse_symbol(&req.symbol)?;
    if req.quantity <= Decimal::ZERO {
        return Err(holdings::HoldingError::InvalidQuantity.into());
    }
    let asset_class = state
        .portfolio
        .read()
        .await
        .holdings_for(user.user_id, Some(&symbol))
        .first()
        .map(|h| h.asset_class)
        .ok_or_else(|| holdings::HoldingError::NotHeld(symbol.clone()))?;
    let price = resolve_price(&state, asset_class, &symbol, req.price).await?;

    let outcome = state
        .portfolio
        .write()
        .await
        .record_sell(user.user_id, &symbol, req.quantity, price)?;
    info!(user_id = %user.user_id, %symbol, quantity = %req.quantity, %price, "sell recorded");

    if let Some(pool) = &state.db {
        let result = match &outcome.holding {
            Some(h) => persistence::upsert_holding(pool, h).await,
            None => persistence::delete_holding(pool, user.user_id, &symbol).await,
        };
        log_write_failure(result, "holding");
        log_write_failure(
            persistence::insert_transaction(pool, &outcome.transaction).await,
            "transaction",
        );
    }
    match &outcome.holding {
        Some(h) => publish_row(
            &state.realtime,
            Channel::Holdings,
            ChangeAction::Update,
            user.user_id,
            h,
        ),
        None => publish_row(
            &state.realtime,
            Channel::Holdings,
            ChangeAction::Delete,
            user.user_id,
            &serde_json::json!({ "symbol": symbol }),
        ),
    }
    publish_row(
        &state.realtime,
        Channel::Transactions,
        ChangeAction::Insert,
        user.user_id,
        &outcome.transaction,
    );

    Ok(Json(TradeResponse {
        holding: outcome.holding,
        transaction: outcome.transaction,
    }))
}

/// DELETE /holdings/{symbol}
pub async fn remove_holding(
    State(state): State<AppState>,
    user: AuthUser,
    Path(symbol): Path<String>,
) -> ApiResult<StatusCode> {
    let symbol = parse_symbol(&symbol)?;
    state
        .portfolio
        .write()
        .await
        .remove_holding(user.user_id, &symbol)
        .ok_or_else(|| ApiError::NotFound(format!("no holding for {}", symbol)))?;

    if let Some(pool) = &state.db {
        log_write_failure(
            persistence::delete_holding(pool, user.user_id, &symbol).await,
            "holding",
        );
    }
    publish_row(
        &state.realtime,
        Channel::Holdings,
        ChangeAction::Delete,
        user.user_id,
        &serde_json::json!({ "symbol": symbol }),
    );
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct TransactionsQuery {
    pub limit: Option<usize>,
}

/// GET /transactions?limit=
pub async fn list_transactions(
    State(state): State<AppState>,
    user: AuthUser,
    Query(q): Query<TransactionsQuery>,
) -> ApiResult<Json<Vec<Transaction>>> {
    let limit = q
        .limit
        .unwrap_or(DEFAULT_TRANSACTION_LIMIT)
        .clamp(1, MAX_TRANSACTION_LIMIT);
    Ok(Json(
        state
            .portfolio
            .read()
            .await
            .transactions_for(user.user_id, limit),
    ))
}

/// GET /portfolio/summary
pub async fn summary(
    State(state): State<AppState>,
    user: AuthUser,
) -> ApiResult<Json<PortfolioSummary>> {
    let list = state.portfolio.read().await.holdings_for(user.user_id, None);
    let wanted: Vec<(AssetClass, String)> = list
        .iter()
        .map(|h| (h.asset_class, h.symbol.clone()))
        .collect();
    let prices: HashMap<String, Decimal> = state
        .prices
        .quotes(&wanted)
        .await
        .into_iter()
        .map(|((_, symbol), quote)| (symbol, quote.price))
        .collect();
    Ok(Json(holdings::portfolio_summary(&list, &prices)))
}

#[derive(Debug, Serialize)]
pub struct WatchlistEntry {
    #[serde(flatten)]
    pub item: WatchlistItem,
    pub quote: Option<Quote>,
}

/// GET /watchlist. Quotes come from the price cache and may be absent.
pub async fn list_watchlist(
    State(state): State<AppState>,
    user: AuthUser,
) -> ApiResult<Json<Vec<WatchlistEntry>>> {
    let items = state.watchlists.read().await.list(user.user_id);
    let mut out = Vec::with_capacity(items.len());
    for item in items {
        let quote = state.prices.cached(item.asset_class, &item.symbol).await;
        out.push(WatchlistEntry { item, quote });
    }
    Ok(Json(out))
}

#[derive(Debug, Deserialize)]
pub struct WatchlistRequest {
    pub symbol: String,
    #[serde(default)]
    pub asset_class: AssetClass,
}

/// POST /watchlist
pub async fn add_to_watchlist(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<WatchlistRequest>,
) -> ApiResult<impl IntoResponse> {
    let symbol = parse_symbol(&req.symbol)?;
    let item = state
        .watchlists
        .write()
        .await
        .add(user.user_id, &symbol, req.asset_class)
        .ok_or_else(|| ApiError::Conflict(format!("{} is already on the watchlist", symbol)))?;

    if let Some(pool) = &state.db {
        log_write_failure(
            persistence::insert_watchlist_item(pool, &item).await,
            "watchlist",
        );
    }
    publish_row(
        &state.realtime,
        Channel::Watchlist,
        ChangeAction::Insert,
        user.user_id,
        &item,
    );
    Ok((StatusCode::CREATED, Json(item)))
}

/// DELETE /watchlist/{symbol}
pub async fn remove_from_watchlist(
    State(state): State<AppState>,
    user: AuthUser,
    Path(symbol): Path<String>,
) -> ApiResult<StatusCode> {
    let symbol = parse_symbol(&symbol)?;
    let item = state
        .watchlists
        .write()
        .await
        .remove(user.user_id, &symbol)
        .ok_or_else(|| ApiError::NotFound(format!("{} is not on the watchlist", symbol)))?;

    if let Some(pool) = &state.db {
        log_write_failure(
            persistence::delete_watchlist_item(pool, user.user_id, &symbol).await,
            "watchlist",
        );
    }
    publish_row(
        &state.realtime,
        Channel::Watchlist,
        ChangeAction::Delete,
        user.user_id,
        &item,
    );
    Ok(StatusCode::NO_CONTENT)
}
