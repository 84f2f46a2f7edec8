use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::asset::AssetClass;

/// Holding per (user, symbol). Quantity is always positive; a holding sold
/// down to zero is removed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Holding {
    pub user_id: Uuid,
    pub symbol: String,
    pub asset_class: AssetClass,
    pub quantity: Decimal,
    pub average_price: Decimal,
    pub updated_at: DateTime<Utc>,
}

/// A holding marked to a price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HoldingValuation {
    pub symbol: String,
    pub asset_class: AssetClass,
    pub quantity: Decimal,
    pub average_price: Decimal,
    pub current_price: Decimal,
    pub market_value: Decimal,
    pub cost_basis: Decimal,
    pub unrealized_pnl: Decimal,
    pub pnl_percent: Decimal,
    /// True when no live quote was available and the holding is valued at cost.
    pub stale: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AllocationSlice {
    pub asset_class: AssetClass,
    pub market_value: Decimal,
    pub percent: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PortfolioSummary {
    pub holdings: Vec<HoldingValuation>,
    pub total_market_value: Decimal,
    pub total_cost_basis: Decimal,
    pub total_unrealized_pnl: Decimal,
    pub total_pnl_percent: Decimal,
    pub allocation: Vec<AllocationSlice>,
}
