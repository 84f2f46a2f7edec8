//! Transaction persistence: insert on buy/sell, list for hydration.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::types::asset::AssetClass;
use crate::types::transaction::{TradeSide, Transaction};

#[derive(Debug, FromRow)]
pub struct TransactionRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub symbol: String,
    pub asset_class: String,
    pub side: String,
    pub quantity: Decimal,
    pub price: Decimal,
    pub total: Decimal,
    pub realized_pnl: Option<Decimal>,
    pub created_at: DateTime<Utc>,
}

pub fn transaction_row_to_transaction(row: &TransactionRow) -> Option<Transaction> {
    Some(Transaction {
        id: row.id,
        user_id: row.user_id,
        symbol: row.symbol.clone(),
        asset_class: AssetClass::parse(&row.asset_class)?,
        side: TradeSide::parse(&row.side)?,
        quantity: row.quantity,
        price: row.price,
        total: row.total,
        realized_pnl: row.realized_pnl,
        created_at: row.created_at,
    })
}

/// Insert a single transaction (call after each buy or sell).
pub async fn insert_transaction(pool: &PgPool, tx: &Transaction) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO transactions (id, user_id, symbol, asset_class, side, quantity, price, total, realized_pnl, created_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
    )
    .bind(tx.id)
    .bind(tx.user_id)
    .bind(&tx.symbol)
    .bind(tx.asset_class.as_str())
    .bind(tx.side.as_str())
    .bind(tx.quantity)
    .bind(tx.price)
    .bind(tx.total)
    .bind(tx.realized_pnl)
    .bind(tx.created_at)
    .execute(pool)
    .await?;
    Ok(())
}

/// List all transactions in chronological order, for hydration.
pub async fn list_transactions(pool: &PgPool) -> Result<Vec<TransactionRow>, sqlx::Error> {
    let rows = sqlx::query_as::<_, TransactionRow>(
        "SELECT id, user_id, symbol, asset_class, side, quantity, price, total, realized_pnl, created_at \
         FROM transactions ORDER BY created_at",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows)
}
