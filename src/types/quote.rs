use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::asset::AssetClass;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    pub symbol: String,
    pub asset_class: AssetClass,
    pub price: Decimal,
    pub change_percent_24h: Option<Decimal>,
    /// Upstream that produced the quote: "binance", "coingecko" or "yahoo".
    pub source: String,
    pub fetched_at: DateTime<Utc>,
}
