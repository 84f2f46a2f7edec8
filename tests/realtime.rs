//! Realtime fan-out: subscription filtering and the price poller.

mod common;

use chrono::Utc;
use common::test_app_state;
use finboard::poller::{poll_once, tracked_symbols};
use finboard::realtime::{
    ChangeAction, Channel, RealtimeEvent, Subscriptions, publish_price, publish_row,
};
use finboard::types::asset::AssetClass;
use finboard::types::futures::{PositionSide, PositionStatus};
use finboard::types::quote::Quote;
use rust_decimal_macros::dec;
use tokio::sync::broadcast;
use uuid::Uuid;

fn quote(symbol: &str) -> Quote {
    Quote {
        symbol: symbol.to_string(),
        asset_class: AssetClass::Crypto,
        price: dec!(1),
        change_percent_24h: None,
        source: "test".to_string(),
        fetched_at: Utc::now(),
    }
}

#[test]
fn row_changes_reach_only_subscribed_owner() {
    let owner = Uuid::new_v4();
    let mut subs = Subscriptions::new(owner);
    let event = RealtimeEvent::RowChange {
        table: Channel::Holdings,
        action: ChangeAction::Update,
        user_id: owner,
        record: serde_json::json!({ "symbol": "BTC" }),
    };
    assert!(!subs.wants(&event));

    assert_eq!(
        subs.subscribe(Channel::Holdings, None).unwrap(),
        "Subscribed to holdings"
    );
    assert!(subs.wants(&event));

    let mut stranger = Subscriptions::new(Uuid::new_v4());
    stranger.subscribe(Channel::Holdings, None).unwrap();
    assert!(!stranger.wants(&event));

    subs.unsubscribe(Channel::Holdings, None);
    assert!(!subs.wants(&event));
}

#[test]
fn price_subscriptions_need_a_symbol() {
    let mut subs = Subscriptions::new(Uuid::new_v4());
    assert!(subs.subscribe(Channel::Prices, None).is_err());
    assert_eq!(
        subs.subscribe(Channel::Prices, Some("btc")).unwrap(),
        "Subscribed to prices for BTC"
    );

    let btc = RealtimeEvent::Price { quote: quote("BTC") };
    let eth = RealtimeEvent::Price { quote: quote("ETH") };
    assert!(subs.wants(&btc));
    assert!(!subs.wants(&eth));

    assert_eq!(
        subs.unsubscribe(Channel::Prices, None),
        "Unsubscribed from all prices"
    );
    assert!(!subs.wants(&btc));
}

#[test]
fn events_serialize_with_type_tag() {
    let (tx, mut rx) = broadcast::channel(8);
    let user = Uuid::new_v4();
    publish_row(
        &tx,
        Channel::Watchlist,
        ChangeAction::Insert,
        user,
        &serde_json::json!({ "symbol": "SOL" }),
    );
    publish_price(&tx, quote("SOL"));

    let row = serde_json::to_value(rx.try_recv().unwrap()).unwrap();
    assert_eq!(row["type"], "row_change");
    assert_eq!(row["table"], "watchlist");
    assert_eq!(row["action"], "insert");
    assert_eq!(row["record"]["symbol"], "SOL");

    let price = serde_json::to_value(rx.try_recv().unwrap()).unwrap();
    assert_eq!(price["type"], "price");
    assert_eq!(price["quote"]["symbol"], "SOL");
}

#[tokio::test]
async fn poller_tracks_held_watched_and_futures_symbols() {
    let (state, _prices) = test_app_state();
    let user = Uuid::new_v4();
    state
        .portfolio
        .write()
        .await
        .record_buy(user, "AAPL", AssetClass::Stock, dec!(1), dec!(100))
        .unwrap();
    state
        .watchlists
        .write()
        .await
        .add(user, "ETH", AssetClass::Crypto);
    state
        .futures
        .write()
        .await
        .open(user, "BTC", PositionSide::Long, dec!(0.01), dec!(50000), 10)
        .unwrap()
        .position;
    state
        .watchlists
        .write()
        .await
        .add(Uuid::new_v4(), "BTC", AssetClass::Crypto);

    let symbols = tracked_symbols(&state).await;
    assert_eq!(
        symbols,
        vec![
            (AssetClass::Stock, "AAPL".to_string()),
            (AssetClass::Crypto, "BTC".to_string()),
            (AssetClass::Crypto, "ETH".to_string()),
        ]
    );
}

#[tokio::test]
async fn poll_once_publishes_prices_and_liquidates() {
    let (state, prices) = test_app_state();
    let user = Uuid::new_v4();
    let position = state
        .futures
        .write()
        .await
        .open(user, "BTC", PositionSide::Long, dec!(0.1), dec!(50000), 10)
        .unwrap()
        .position;
    prices.crypto.set("BTC", dec!(45000));
    let mut rx = state.realtime.subscribe();

    let liquidated = poll_once(&state).await;

    assert_eq!(liquidated.len(), 1);
    assert_eq!(liquidated[0].id, position.id);
    let stored = state.futures.read().await.get(user, position.id).unwrap();
    assert_eq!(stored.status, PositionStatus::Liquidated);

    match rx.try_recv().unwrap() {
        RealtimeEvent::Price { quote } => assert_eq!(quote.price, dec!(45000)),
        other => panic!("expected price event, got {:?}", other),
    }
    match rx.try_recv().unwrap() {
        RealtimeEvent::RowChange {
            table, user_id, ..
        } => {
            assert_eq!(table, Channel::Futures);
            assert_eq!(user_id, user);
        }
        other => panic!("expected row change, got {:?}", other),
    }

    // Nothing open any more: the next cycle has nothing to do.
    assert!(poll_once(&state).await.is_empty());
}

#[tokio::test]
async fn stock_with_same_ticker_does_not_hide_crypto_mark() {
    let (state, prices) = test_app_state();
    let trader = Uuid::new_v4();
    let position = state
        .futures
        .write()
        .await
        .open(trader, "ETH", PositionSide::Long, dec!(1), dec!(2000), 10)
        .unwrap()
        .position;
    state
        .watchlists
        .write()
        .await
        .add(Uuid::new_v4(), "ETH", AssetClass::Stock);
    prices.crypto.set("ETH", dec!(1000));
    prices.stocks.set("ETH", dec!(30));
    let mut rx = state.realtime.subscribe();

    let liquidated = poll_once(&state).await;

    assert_eq!(liquidated.len(), 1);
    assert_eq!(liquidated[0].id, position.id);
    assert_eq!(liquidated[0].exit_price, Some(dec!(1000)));

    let mut published = Vec::new();
    while let Ok(event) = rx.try_recv() {
        if let RealtimeEvent::Price { quote } = event {
            published.push((quote.asset_class, quote.price));
        }
    }
    published.sort_by_key(|(_, price)| *price);
    assert_eq!(
        published,
        vec![(AssetClass::Stock, dec!(30)), (AssetClass::Crypto, dec!(1000))]
    );
}
