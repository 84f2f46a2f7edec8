use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::asset::AssetClass;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchlistItem {
    pub user_id: Uuid,
    pub symbol: String,
    pub asset_class: AssetClass,
    pub added_at: DateTime<Utc>,
}
