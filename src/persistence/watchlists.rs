//! Watchlist persistence.

use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::types::asset::AssetClass;
use crate::types::watchlist::WatchlistItem;

pub async fn insert_watchlist_item(pool: &PgPool, item: &WatchlistItem) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO watchlists (user_id, symbol, asset_class, added_at) VALUES ($1, $2, $3, $4) \
         ON CONFLICT (user_id, symbol) DO NOTHING",
    )
    .bind(item.user_id)
    .bind(&item.symbol)
    .bind(item.asset_class.as_str())
    .bind(item.added_at)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn delete_watchlist_item(
    pool: &PgPool,
    user_id: Uuid,
    symbol: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM watchlists WHERE user_id = $1 AND symbol = $2")
        .bind(user_id)
        .bind(symbol)
        .execute(pool)
        .await?;
    Ok(())
}

#[derive(Debug, FromRow)]
pub struct WatchlistRow {
    pub user_id: Uuid,
    pub symbol: String,
    pub asset_class: String,
    pub added_at: DateTime<Utc>,
}

pub fn watchlist_row_to_item(row: &WatchlistRow) -> Option<WatchlistItem> {
    Some(WatchlistItem {
        user_id: row.user_id,
        symbol: row.symbol.clone(),
        asset_class: AssetClass::parse(&row.asset_class)?,
        added_at: row.added_at,
    })
}

/// List all watchlist rows for hydration, oldest first.
pub async fn list_watchlist_items(pool: &PgPool) -> Result<Vec<WatchlistRow>, sqlx::Error> {
    let rows = sqlx::query_as::<_, WatchlistRow>(
        "SELECT user_id, symbol, asset_class, added_at FROM watchlists ORDER BY added_at",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows)
}
