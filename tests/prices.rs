//! Price clients against mock upstreams, plus routing, fallback and caching
//! in PriceService.

use std::sync::Arc;
use std::time::Duration;

use finboard::prices::{
    BinanceClient, CoinGeckoClient, PriceError, PriceService, PriceSource, YahooClient,
    coingecko_id,
};
use finboard::config::PriceConfig;
use finboard::types::asset::AssetClass;
use httpmock::prelude::*;
use rust_decimal_macros::dec;
use serde_json::json;

fn client() -> reqwest::Client {
    reqwest::Client::new()
}

#[test]
fn binance_pair_and_coingecko_ids() {
    assert_eq!(BinanceClient::pair_for("BTC"), "BTCUSDT");
    assert_eq!(BinanceClient::pair_for("ETHUSDT"), "ETHUSDT");
    assert_eq!(coingecko_id("BTC"), Some("bitcoin"));
    assert_eq!(coingecko_id("ETHUSDT"), Some("ethereum"));
    assert_eq!(coingecko_id("NOTACOIN"), None);
}

#[tokio::test]
async fn binance_parses_ticker() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/api/v3/ticker/24hr")
                .query_param("symbol", "BTCUSDT");
            then.status(200).json_body(json!({
                "symbol": "BTCUSDT",
                "lastPrice": "64000.50000000",
                "priceChangePercent": "-1.250"
            }));
        })
        .await;

    let quote = BinanceClient::new(client(), &server.base_url())
        .quote("BTC")
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(quote.symbol, "BTC");
    assert_eq!(quote.asset_class, AssetClass::Crypto);
    assert_eq!(quote.price, dec!(64000.5));
    assert_eq!(quote.change_percent_24h, Some(dec!(-1.25)));
    assert_eq!(quote.source, "binance");
}

#[tokio::test]
async fn binance_invalid_symbol_is_not_found() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/api/v3/ticker/24hr");
            then.status(400)
                .json_body(json!({ "code": -1121, "msg": "Invalid symbol." }));
        })
        .await;

    let err = BinanceClient::new(client(), &server.base_url())
        .quote("NOPE")
        .await
        .unwrap_err();
    assert!(matches!(err, PriceError::NotFound(s) if s == "NOPE"));
}

#[tokio::test]
async fn binance_server_error_is_upstream() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/api/v3/ticker/24hr");
            then.status(503);
        })
        .await;

    let err = BinanceClient::new(client(), &server.base_url())
        .quote("BTC")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        PriceError::Upstream {
            source_name: "binance",
            status: 503
        }
    ));
}

#[tokio::test]
async fn coingecko_parses_simple_price() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/api/v3/simple/price")
                .query_param("ids", "ethereum")
                .query_param("vs_currencies", "usd")
                .query_param("include_24hr_change", "true");
            then.status(200).json_body(json!({
                "ethereum": { "usd": 3000.5, "usd_24h_change": 2.5 }
            }));
        })
        .await;

    let quote = CoinGeckoClient::new(client(), &server.base_url())
        .quote("ETH")
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(quote.price, dec!(3000.5));
    assert_eq!(quote.change_percent_24h, Some(dec!(2.5)));
    assert_eq!(quote.source, "coingecko");
}

#[tokio::test]
async fn coingecko_unknown_symbol_skips_request() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET).path("/api/v3/simple/price");
            then.status(200).json_body(json!({}));
        })
        .await;

    let err = CoinGeckoClient::new(client(), &server.base_url())
        .quote("NOTACOIN")
        .await
        .unwrap_err();
    assert!(matches!(err, PriceError::NotFound(_)));
    assert_eq!(mock.hits_async().await, 0);
}

#[tokio::test]
async fn yahoo_parses_chart_meta() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/v8/finance/chart/AAPL")
                .query_param("interval", "1d")
                .query_param("range", "1d")
                .header_exists("user-agent");
            then.status(200).json_body(json!({
                "chart": {
                    "result": [{
                        "meta": {
                            "symbol": "AAPL",
                            "regularMarketPrice": 220.0,
                            "chartPreviousClose": 200.0
                        }
                    }],
                    "error": null
                }
            }));
        })
        .await;

    let quote = YahooClient::new(client(), &server.base_url())
        .quote("AAPL")
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(quote.asset_class, AssetClass::Stock);
    assert_eq!(quote.price, dec!(220));
    assert_eq!(quote.change_percent_24h, Some(dec!(10)));
    assert_eq!(quote.source, "yahoo");
}

#[tokio::test]
async fn yahoo_missing_symbol_is_not_found() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/v8/finance/chart/ZZZZ");
            then.status(404).json_body(json!({
                "chart": { "result": null, "error": { "code": "Not Found" } }
            }));
        })
        .await;

    let err = YahooClient::new(client(), &server.base_url())
        .quote("ZZZZ")
        .await
        .unwrap_err();
    assert!(matches!(err, PriceError::NotFound(_)));
}

fn service(server: &MockServer, ttl: Duration) -> PriceService {
    let base = server.base_url();
    PriceService::new(
        Arc::new(BinanceClient::new(client(), &base)),
        Some(Arc::new(CoinGeckoClient::new(client(), &base))),
        Arc::new(YahooClient::new(client(), &base)),
        ttl,
    )
}

#[tokio::test]
async fn crypto_falls_back_to_coingecko() {
    let server = MockServer::start_async().await;
    let binance = server
        .mock_async(|when, then| {
            when.method(GET).path("/api/v3/ticker/24hr");
            then.status(500);
        })
        .await;
    let gecko = server
        .mock_async(|when, then| {
            when.method(GET).path("/api/v3/simple/price");
            then.status(200)
                .json_body(json!({ "bitcoin": { "usd": 60000.0, "usd_24h_change": null } }));
        })
        .await;

    let quote = service(&server, Duration::from_secs(60))
        .quote(AssetClass::Crypto, "BTC")
        .await
        .unwrap();

    binance.assert_async().await;
    gecko.assert_async().await;
    assert_eq!(quote.source, "coingecko");
    assert_eq!(quote.price, dec!(60000));
    assert_eq!(quote.change_percent_24h, None);
}

#[tokio::test]
async fn stocks_route_to_yahoo_only() {
    let server = MockServer::start_async().await;
    let binance = server
        .mock_async(|when, then| {
            when.method(GET).path("/api/v3/ticker/24hr");
            then.status(200).json_body(json!({ "lastPrice": "1", "priceChangePercent": "0" }));
        })
        .await;
    let yahoo = server
        .mock_async(|when, then| {
            when.method(GET).path("/v8/finance/chart/MSFT");
            then.status(200).json_body(json!({
                "chart": { "result": [{ "meta": { "regularMarketPrice": 410.0 } }] }
            }));
        })
        .await;

    let quote = service(&server, Duration::from_secs(60))
        .quote(AssetClass::Stock, "MSFT")
        .await
        .unwrap();

    yahoo.assert_async().await;
    assert_eq!(binance.hits_async().await, 0);
    assert_eq!(quote.price, dec!(410));
    assert_eq!(quote.change_percent_24h, None);
}

#[tokio::test]
async fn quotes_are_cached_within_ttl() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET).path("/api/v3/ticker/24hr");
            then.status(200)
                .json_body(json!({ "lastPrice": "100.0", "priceChangePercent": "0.0" }));
        })
        .await;

    let svc = service(&server, Duration::from_secs(60));
    assert!(svc.cached(AssetClass::Crypto, "SOL").await.is_none());
    svc.quote(AssetClass::Crypto, "SOL").await.unwrap();
    svc.quote(AssetClass::Crypto, "SOL").await.unwrap();

    assert_eq!(mock.hits_async().await, 1);
    assert_eq!(
        svc.cached(AssetClass::Crypto, "SOL").await.map(|q| q.price),
        Some(dec!(100))
    );
}

#[tokio::test]
async fn quotes_skips_failures() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/api/v3/ticker/24hr")
                .query_param("symbol", "BTCUSDT");
            then.status(200)
                .json_body(json!({ "lastPrice": "50000", "priceChangePercent": "1" }));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/v8/finance/chart/NOPE");
            then.status(404);
        })
        .await;

    let out = service(&server, Duration::ZERO)
        .quotes(&[
            (AssetClass::Crypto, "BTC".to_string()),
            (AssetClass::Stock, "NOPE".to_string()),
        ])
        .await;

    assert_eq!(out.len(), 1);
    assert_eq!(
        out[&(AssetClass::Crypto, "BTC".to_string())].price,
        dec!(50000)
    );
}

#[tokio::test]
async fn configured_service_applies_request_timeout() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/v8/finance/chart/AAPL");
            then.status(200)
                .delay(Duration::from_secs(2))
                .json_body(json!({ "chart": { "result": null, "error": null } }));
        })
        .await;
    let config = PriceConfig {
        binance_base_url: server.base_url(),
        coingecko_base_url: server.base_url(),
        yahoo_base_url: server.base_url(),
        cache_ttl: Duration::ZERO,
        request_timeout: Duration::from_millis(200),
        ..PriceConfig::default()
    };

    let err = PriceService::from_config(&config)
        .unwrap()
        .quote(AssetClass::Stock, "AAPL")
        .await
        .unwrap_err();

    match err {
        PriceError::Request { source_name, error } => {
            assert_eq!(source_name, "yahoo");
            assert!(error.is_timeout());
        }
        other => panic!("expected timeout, got {:?}", other),
    }
}
