//! Paper futures trading handlers.

use std::collections::HashMap;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::api::auth::AuthUser;
use crate::api::{log_write_failure, parse_symbol, resolve_price};
use crate::error::{ApiError, ApiResult};
use crate::futures::FuturesError;
use crate::persistence;
use crate::realtime::{ChangeAction, Channel, publish_row};
use crate::state::AppState;
use crate::types::asset::AssetClass;
use crate::types::futures::{AccountSummary, FuturesPosition, PositionSide, PositionStatus};

#[derive(Debug, Deserialize)]
pub struct PositionsQuery {
    pub status: Option<String>,
}

/// GET /futures/positions?status=open|closed|liquidated
pub async fn list_positions(
    State(state): State<AppState>,
    user: AuthUser,
    Query(q): Query<PositionsQuery>,
) -> ApiResult<Json<Vec<FuturesPosition>>> {
    let status = match q.status.as_deref() {
        Some(s) => Some(
            PositionStatus::parse(s)
                .ok_or_else(|| ApiError::BadRequest(format!("unknown status '{}'", s)))?,
        ),
        None => None,
    };
    Ok(Json(
        state.futures.read().await.positions_for(user.user_id, status),
    ))
}

#[derive(Debug, Deserialize)]
pub struct OpenPositionRequest {
    pub symbol: String,
    pub side: PositionSide,
    pub quantity: Decimal,
    pub leverage: u32,
    /// Entry price; the live crypto quote when omitted.
    pub price: Option<Decimal>,
}

/// POST /futures/positions
pub async fn open_position(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<OpenPositionRequest>,
) -> ApiResult<impl IntoResponse> {
    let symbol = parse_symbol(&req.symbol)?;
    if req.quantity <= Decimal::ZERO {
        return Err(FuturesError::InvalidQuantity.into());
    }
    let price = resolve_price(&state, AssetClass::Crypto, &symbol, req.price).await?;

    let (outcome, balance) = {
        let mut book = state.futures.write().await;
        let outcome = book.open(
            user.user_id,
            &symbol,
            req.side,
            req.quantity,
            price,
            req.leverage,
        )?;
        (outcome, book.balance(user.user_id))
    };
    let position = outcome.position;
    info!(
        user_id = %user.user_id,
        position_id = %position.id,
        %symbol,
        side = position.side.as_str(),
        leverage = position.leverage,
        merged = outcome.merged,
        "futures position opened"
    );

    // Adding to an open position changes an existing row.
    let action = if outcome.merged {
        ChangeAction::Update
    } else {
        ChangeAction::Insert
    };
    persist_position(&state, user.user_id, &position, balance).await;
    publish_row(
        &state.realtime,
        Channel::Futures,
        action,
        user.user_id,
        &position,
    );
    Ok((StatusCode::CREATED, Json(position)))
}

#[derive(Debug, Default, Deserialize)]
pub struct ClosePositionRequest {
    pub price: Option<Decimal>,
    /// Partial close amount; the whole position when omitted.
    pub quantity: Option<Decimal>,
}

#[derive(Debug, Serialize)]
pub struct CloseResponse {
    pub position: FuturesPosition,
    pub realized_pnl: Decimal,
    pub credited: Decimal,
    pub balance: Decimal,
}

/// POST /futures/positions/{id}/close
pub async fn close_position(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    body: Option<Json<ClosePositionRequest>>,
) -> ApiResult<Json<CloseResponse>> {
    let req = body.map(|Json(r)| r).unwrap_or_default();
    let symbol = state
        .futures
        .read()
        .await
        .get(user.user_id, id)
        .map(|p| p.symbol)
        .ok_or(FuturesError::NotFound)?;
    let price = resolve_price(&state, AssetClass::Crypto, &symbol, req.price).await?;

    let (outcome, balance) = {
        let mut book = state.futures.write().await;
        let outcome = book.close(user.user_id, id, price, req.quantity)?;
        (outcome, book.balance(user.user_id))
    };
    info!(
        user_id = %user.user_id,
        position_id = %id,
        realized_pnl = %outcome.realized_pnl,
        status = outcome.position.status.as_str(),
        "futures position closed"
    );

    persist_position(&state, user.user_id, &outcome.position, balance).await;
    publish_row(
        &state.realtime,
        Channel::Futures,
        ChangeAction::Update,
        user.user_id,
        &outcome.position,
    );
    Ok(Json(CloseResponse {
        position: outcome.position,
        realized_pnl: outcome.realized_pnl,
        credited: outcome.credited,
        balance,
    }))
}

/// GET /futures/account
pub async fn account(
    State(state): State<AppState>,
    user: AuthUser,
) -> ApiResult<Json<AccountSummary>> {
    let marks = marks_for_user(&state, user.user_id).await;
    Ok(Json(
        state.futures.read().await.account_summary(user.user_id, &marks),
    ))
}

/// POST /futures/reset
pub async fn reset(
    State(state): State<AppState>,
    user: AuthUser,
) -> ApiResult<Json<AccountSummary>> {
    let (removed, summary) = {
        let mut book = state.futures.write().await;
        let removed = book.reset(user.user_id);
        (removed, book.account_summary(user.user_id, &HashMap::new()))
    };
    info!(user_id = %user.user_id, removed = removed.len(), "futures account reset");

    if let Some(pool) = &state.db {
        log_write_failure(
            persistence::delete_futures_positions_for_user(pool, user.user_id).await,
            "futures positions",
        );
        log_write_failure(
            persistence::update_paper_balance(pool, user.user_id, summary.balance).await,
            "paper balance",
        );
    }
    for id in removed {
        publish_row(
            &state.realtime,
            Channel::Futures,
            ChangeAction::Delete,
            user.user_id,
            &serde_json::json!({ "id": id }),
        );
    }
    Ok(Json(summary))
}

/// Live marks for the user's open position symbols. Missing quotes are left
/// out and count as zero unrealized P&L.
async fn marks_for_user(state: &AppState, user_id: Uuid) -> HashMap<String, Decimal> {
    let mut symbols: Vec<(AssetClass, String)> = state
        .futures
        .read()
        .await
        .positions_for(user_id, Some(PositionStatus::Open))
        .into_iter()
        .map(|p| (AssetClass::Crypto, p.symbol))
        .collect();
    symbols.sort_by(|a, b| a.1.cmp(&b.1));
    symbols.dedup();
    state
        .prices
        .quotes(&symbols)
        .await
        .into_iter()
        .map(|((_, symbol), quote)| (symbol, quote.price))
        .collect()
}

pub(crate) async fn persist_position(
    state: &AppState,
    user_id: Uuid,
    position: &FuturesPosition,
    balance: Decimal,
) {
    if let Some(pool) = &state.db {
        log_write_failure(
            persistence::upsert_futures_position(pool, position).await,
            "futures position",
        );
        log_write_failure(
            persistence::update_paper_balance(pool, user_id, balance).await,
            "paper balance",
        );
    }
}
