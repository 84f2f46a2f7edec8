//! Per-user watchlists.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::types::asset::AssetClass;
use crate::types::watchlist::WatchlistItem;

pub type SharedWatchlists = Arc<RwLock<Watchlists>>;

/// Items per user in insertion order.
#[derive(Debug, Default)]
pub struct Watchlists {
    items: HashMap<Uuid, Vec<WatchlistItem>>,
}

impl Watchlists {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> SharedWatchlists {
        Arc::new(RwLock::new(Self::new()))
    }

    /// Returns `None` when the symbol is already watched.
    pub fn add(
        &mut self,
        user_id: Uuid,
        symbol: &str,
        asset_class: AssetClass,
    ) -> Option<WatchlistItem> {
        let list = self.items.entry(user_id).or_default();
        if list.iter().any(|i| i.symbol == symbol) {
            return None;
        }
        let item = WatchlistItem {
            user_id,
            symbol: symbol.to_string(),
            asset_class,
            added_at: Utc::now(),
        };
        list.push(item.clone());
        Some(item)
    }

    pub fn remove(&mut self, user_id: Uuid, symbol: &str) -> Option<WatchlistItem> {
        let list = self.items.get_mut(&user_id)?;
        let idx = list.iter().position(|i| i.symbol == symbol)?;
        Some(list.remove(idx))
    }

    pub fn list(&self, user_id: Uuid) -> Vec<WatchlistItem> {
        self.items.get(&user_id).cloned().unwrap_or_default()
    }

    /// Every (asset_class, symbol) watched by anyone.
    pub fn watched_symbols(&self) -> Vec<(AssetClass, String)> {
        let mut out: Vec<(AssetClass, String)> = self
            .items
            .values()
            .flatten()
            .map(|i| (i.asset_class, i.symbol.clone()))
            .collect();
        out.sort_by(|a, b| a.1.cmp(&b.1).then((a.0 as u8).cmp(&(b.0 as u8))));
        out.dedup();
        out
    }

    pub fn restore(&mut self, item: WatchlistItem) {
        self.items.entry(item.user_id).or_default().push(item);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_is_idempotent_per_user() {
        let mut w = Watchlists::new();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();

        assert!(w.add(alice, "BTC", AssetClass::Crypto).is_some());
        assert!(w.add(alice, "BTC", AssetClass::Crypto).is_none());
        assert!(w.add(bob, "BTC", AssetClass::Crypto).is_some());
        assert!(w.add(alice, "AAPL", AssetClass::Stock).is_some());

        let symbols: Vec<String> = w.list(alice).into_iter().map(|i| i.symbol).collect();
        assert_eq!(symbols, vec!["BTC", "AAPL"]);
        assert_eq!(w.watched_symbols().len(), 2);
    }

    #[test]
    fn remove_missing_returns_none() {
        let mut w = Watchlists::new();
        let user = Uuid::new_v4();
        assert!(w.remove(user, "ETH").is_none());
        w.add(user, "ETH", AssetClass::Crypto);
        assert_eq!(w.remove(user, "ETH").map(|i| i.symbol), Some("ETH".to_string()));
        assert!(w.list(user).is_empty());
    }
}
