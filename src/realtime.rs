//! Realtime channel: row-level change events and price ticks pushed to
//! WebSocket clients.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::warn;
use uuid::Uuid;

use crate::types::quote::Quote;

pub type RealtimeSender = broadcast::Sender<RealtimeEvent>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Profiles,
    Holdings,
    Watchlist,
    Transactions,
    Futures,
    Prices,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Profiles => "profiles",
            Channel::Holdings => "holdings",
            Channel::Watchlist => "watchlist",
            Channel::Transactions => "transactions",
            Channel::Futures => "futures",
            Channel::Prices => "prices",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeAction {
    Insert,
    Update,
    Delete,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RealtimeEvent {
    RowChange {
        table: Channel,
        action: ChangeAction,
        user_id: Uuid,
        record: serde_json::Value,
    },
    Price {
        quote: Quote,
    },
}

/// Serialize `record` and broadcast it as a row change. No receivers is not
/// an error.
pub fn publish_row<T: Serialize>(
    tx: &RealtimeSender,
    table: Channel,
    action: ChangeAction,
    user_id: Uuid,
    record: &T,
) {
    let record = match serde_json::to_value(record) {
        Ok(v) => v,
        Err(err) => {
            warn!(error = %err, table = table.as_str(), "failed to serialize realtime record");
            return;
        }
    };
    let _ = tx.send(RealtimeEvent::RowChange {
        table,
        action,
        user_id,
        record,
    });
}

pub fn publish_price(tx: &RealtimeSender, quote: Quote) {
    let _ = tx.send(RealtimeEvent::Price { quote });
}

/// What one connection has asked to receive.
#[derive(Debug, Clone)]
pub struct Subscriptions {
    user_id: Uuid,
    tables: HashSet<Channel>,
    symbols: HashSet<String>,
}

impl Subscriptions {
    pub fn new(user_id: Uuid) -> Self {
        Self {
            user_id,
            tables: HashSet::new(),
            symbols: HashSet::new(),
        }
    }

    /// The prices channel needs a symbol; table channels ignore it.
    pub fn subscribe(&mut self, channel: Channel, symbol: Option<&str>) -> Result<String, String> {
        match channel {
            Channel::Prices => {
                let symbol = symbol
                    .and_then(crate::types::asset::normalize_symbol)
                    .ok_or_else(|| "prices subscriptions require a symbol".to_string())?;
                self.symbols.insert(symbol.clone());
                Ok(format!("Subscribed to prices for {}", symbol))
            }
            table => {
                self.tables.insert(table);
                Ok(format!("Subscribed to {}", table.as_str()))
            }
        }
    }

    pub fn unsubscribe(&mut self, channel: Channel, symbol: Option<&str>) -> String {
        match channel {
            Channel::Prices => match symbol.and_then(crate::types::asset::normalize_symbol) {
                Some(symbol) => {
                    self.symbols.remove(&symbol);
                    format!("Unsubscribed from prices for {}", symbol)
                }
                None => {
                    self.symbols.clear();
                    "Unsubscribed from all prices".to_string()
                }
            },
            table => {
                self.tables.remove(&table);
                format!("Unsubscribed from {}", table.as_str())
            }
        }
    }

    /// Row changes go only to their owner; prices to anyone watching the
    /// symbol.
    pub fn wants(&self, event: &RealtimeEvent) -> bool {
        match event {
            RealtimeEvent::RowChange { table, user_id, .. } => {
                *user_id == self.user_id && self.tables.contains(table)
            }
            RealtimeEvent::Price { quote } => self.symbols.contains(&quote.symbol),
        }
    }
}
