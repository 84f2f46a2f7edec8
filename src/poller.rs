//! Background price poller: refreshes quotes for everything users hold,
//! watch or trade, pushes them to realtime subscribers, and runs the
//! futures liquidation sweep.

use std::collections::HashMap;
use std::time::Duration;

use rust_decimal::Decimal;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, info, warn};

use crate::api::log_write_failure;
use crate::persistence;
use crate::realtime::{ChangeAction, Channel, publish_price, publish_row};
use crate::state::AppState;
use crate::types::asset::AssetClass;
use crate::types::futures::FuturesPosition;

pub fn spawn_price_poller(state: AppState, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(interval_secs = every.as_secs(), "price poller started");
        loop {
            ticker.tick().await;
            poll_once(&state).await;
        }
    })
}

/// Every (asset_class, symbol) the poller should refresh.
pub async fn tracked_symbols(state: &AppState) -> Vec<(AssetClass, String)> {
    let mut symbols = state.portfolio.read().await.held_symbols();
    symbols.extend(state.watchlists.read().await.watched_symbols());
    symbols.extend(
        state
            .futures
            .read()
            .await
            .open_symbols()
            .into_iter()
            .map(|s| (AssetClass::Crypto, s)),
    );
    symbols.sort_by(|a, b| a.1.cmp(&b.1).then((a.0 as u8).cmp(&(b.0 as u8))));
    symbols.dedup();
    symbols
}

/// One poll cycle. Returns the positions liquidated in this cycle.
pub async fn poll_once(state: &AppState) -> Vec<FuturesPosition> {
    let symbols = tracked_symbols(state).await;
    if symbols.is_empty() {
        return Vec::new();
    }

    let quotes = state.prices.quotes(&symbols).await;
    debug!(requested = symbols.len(), fetched = quotes.len(), "price poll");

    // Futures are crypto-only; a stock sharing the ticker must not mark them.
    let mut marks: HashMap<String, Decimal> = HashMap::new();
    for ((asset_class, symbol), quote) in quotes {
        if asset_class == AssetClass::Crypto {
            marks.insert(symbol, quote.price);
        }
        publish_price(&state.realtime, quote);
    }

    let liquidated = state.futures.write().await.sweep_liquidations(&marks);
    for position in &liquidated {
        warn!(
            user_id = %position.user_id,
            position_id = %position.id,
            symbol = %position.symbol,
            mark = ?position.exit_price,
            liquidation_price = %position.liquidation_price,
            "futures position liquidated"
        );
        if let Some(pool) = &state.db {
            log_write_failure(
                persistence::upsert_futures_position(pool, position).await,
                "futures position",
            );
        }
        publish_row(
            &state.realtime,
            Channel::Futures,
            ChangeAction::Update,
            position.user_id,
            position,
        );
    }
    liquidated
}
