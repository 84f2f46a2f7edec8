//! Futures position persistence: upsert, delete on reset, list for hydration.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::types::futures::{FuturesPosition, PositionSide, PositionStatus};

/// Upsert a position. Every field except identity may change on update.
pub async fn upsert_futures_position(
    pool: &PgPool,
    position: &FuturesPosition,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO futures_positions (id, user_id, symbol, side, quantity, entry_price, leverage, margin, \
         liquidation_price, status, exit_price, realized_pnl, opened_at, closed_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14) \
         ON CONFLICT (id) DO UPDATE SET quantity = $5, entry_price = $6, margin = $8, liquidation_price = $9, \
         status = $10, exit_price = $11, realized_pnl = $12, closed_at = $14",
    )
    .bind(position.id)
    .bind(position.user_id)
    .bind(&position.symbol)
    .bind(position.side.as_str())
    .bind(position.quantity)
    .bind(position.entry_price)
    .bind(position.leverage as i32)
    .bind(position.margin)
    .bind(position.liquidation_price)
    .bind(position.status.as_str())
    .bind(position.exit_price)
    .bind(position.realized_pnl)
    .bind(position.opened_at)
    .bind(position.closed_at)
    .execute(pool)
    .await?;
    Ok(())
}

/// Delete all positions of a user (paper account reset).
pub async fn delete_futures_positions_for_user(
    pool: &PgPool,
    user_id: Uuid,
) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM futures_positions WHERE user_id = $1")
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(())
}

#[derive(Debug, FromRow)]
pub struct FuturesPositionRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub symbol: String,
    pub side: String,
    pub quantity: Decimal,
    pub entry_price: Decimal,
    pub leverage: i32,
    pub margin: Decimal,
    pub liquidation_price: Decimal,
    pub status: String,
    pub exit_price: Option<Decimal>,
    pub realized_pnl: Option<Decimal>,
    pub opened_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
}

/// Convert a row for hydration. Skips rows with unknown enums or
/// non-positive leverage.
pub fn futures_row_to_position(row: &FuturesPositionRow) -> Option<FuturesPosition> {
    let leverage = u32::try_from(row.leverage).ok().filter(|&l| l > 0)?;
    Some(FuturesPosition {
        id: row.id,
        user_id: row.user_id,
        symbol: row.symbol.clone(),
        side: PositionSide::parse(&row.side)?,
        quantity: row.quantity,
        entry_price: row.entry_price,
        leverage,
        margin: row.margin,
        liquidation_price: row.liquidation_price,
        status: PositionStatus::parse(&row.status)?,
        exit_price: row.exit_price,
        realized_pnl: row.realized_pnl,
        opened_at: row.opened_at,
        closed_at: row.closed_at,
    })
}

pub async fn list_futures_positions(pool: &PgPool) -> Result<Vec<FuturesPositionRow>, sqlx::Error> {
    let rows = sqlx::query_as::<_, FuturesPositionRow>(
        "SELECT id, user_id, symbol, side, quantity, entry_price, leverage, margin, liquidation_price, \
         status, exit_price, realized_pnl, opened_at, closed_at FROM futures_positions",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows)
}
