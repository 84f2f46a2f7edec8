//! Holding persistence: upsert, delete, list for hydration.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::types::asset::AssetClass;
use crate::types::holding::Holding;

/// Upsert a holding (insert or update on conflict).
pub async fn upsert_holding(pool: &PgPool, holding: &Holding) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO holdings (user_id, symbol, asset_class, quantity, average_price, updated_at) \
         VALUES ($1, $2, $3, $4, $5, $6) \
         ON CONFLICT (user_id, symbol) DO UPDATE SET quantity = $4, average_price = $5, updated_at = $6",
    )
    .bind(holding.user_id)
    .bind(&holding.symbol)
    .bind(holding.asset_class.as_str())
    .bind(holding.quantity)
    .bind(holding.average_price)
    .bind(holding.updated_at)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn delete_holding(pool: &PgPool, user_id: Uuid, symbol: &str) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM holdings WHERE user_id = $1 AND symbol = $2")
        .bind(user_id)
        .bind(symbol)
        .execute(pool)
        .await?;
    Ok(())
}

#[derive(Debug, FromRow)]
pub struct HoldingRow {
    pub user_id: Uuid,
    pub symbol: String,
    pub asset_class: String,
    pub quantity: Decimal,
    pub average_price: Decimal,
    pub updated_at: DateTime<Utc>,
}

/// Convert HoldingRow to Holding for hydration. Skips invalid rows.
pub fn holding_row_to_holding(row: &HoldingRow) -> Option<Holding> {
    let asset_class = AssetClass::parse(&row.asset_class)?;
    if row.quantity <= Decimal::ZERO {
        return None;
    }
    Some(Holding {
        user_id: row.user_id,
        symbol: row.symbol.clone(),
        asset_class,
        quantity: row.quantity,
        average_price: row.average_price,
        updated_at: row.updated_at,
    })
}

/// List all holdings for hydration.
pub async fn list_holdings(pool: &PgPool) -> Result<Vec<HoldingRow>, sqlx::Error> {
    let rows = sqlx::query_as::<_, HoldingRow>(
        "SELECT user_id, symbol, asset_class, quantity, average_price, updated_at FROM holdings",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows)
}
