//! Shared fixtures: a fixed-price quote source and an app spawned on a
//! random port.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use finboard::api::routes::{AppState, app_router};
use finboard::prices::{PriceError, PriceService, PriceSource};
use finboard::types::asset::AssetClass;
use finboard::types::quote::Quote;
use rust_decimal::Decimal;

/// Quotes from a mutable in-memory table. Unknown symbols are NotFound.
#[derive(Clone, Default)]
pub struct StaticPrices {
    prices: Arc<Mutex<HashMap<String, Decimal>>>,
    asset_class: AssetClass,
}

impl StaticPrices {
    pub fn new(asset_class: AssetClass) -> Self {
        Self {
            prices: Arc::default(),
            asset_class,
        }
    }

    pub fn set(&self, symbol: &str, price: Decimal) {
        self.prices.lock().unwrap().insert(symbol.to_string(), price);
    }
}

#[async_trait]
impl PriceSource for StaticPrices {
    fn name(&self) -> &'static str {
        "static"
    }

    async fn quote(&self, symbol: &str) -> Result<Quote, PriceError> {
        let price = self
            .prices
            .lock()
            .unwrap()
            .get(symbol)
            .copied()
            .ok_or_else(|| PriceError::NotFound(symbol.to_string()))?;
        Ok(Quote {
            symbol: symbol.to_string(),
            asset_class: self.asset_class,
            price,
            change_percent_24h: None,
            source: "static".to_string(),
            fetched_at: Utc::now(),
        })
    }
}

pub struct TestPrices {
    pub crypto: StaticPrices,
    pub stocks: StaticPrices,
}

/// In-memory state with static price sources and no cache.
pub fn test_app_state() -> (AppState, TestPrices) {
    let crypto = StaticPrices::new(AssetClass::Crypto);
    let stocks = StaticPrices::new(AssetClass::Stock);
    let service = PriceService::new(
        Arc::new(crypto.clone()),
        None,
        Arc::new(stocks.clone()),
        Duration::ZERO,
    );
    let state = AppState::new(
        Arc::new(service),
        b"test-jwt-secret".to_vec(),
        Decimal::new(10_000, 0),
    );
    (state, TestPrices { crypto, stocks })
}

/// Spawn app on a random port and return (base_url, guard that keeps server running).
pub async fn spawn_app(state: AppState) -> (String, tokio::task::JoinHandle<()>) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let base_url = format!("http://{}", addr);
    let app = app_router(state);
    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (base_url, handle)
}

/// Register and log in, returning the bearer token.
pub async fn register_and_login(client: &reqwest::Client, base_url: &str, username: &str) -> String {
    let reg = client
        .post(format!("{}/auth/register", base_url))
        .json(&serde_json::json!({ "username": username, "password": "secret123" }))
        .send()
        .await
        .unwrap();
    assert_eq!(reg.status().as_u16(), 201);

    let login = client
        .post(format!("{}/auth/login", base_url))
        .json(&serde_json::json!({ "username": username, "password": "secret123" }))
        .send()
        .await
        .unwrap();
    assert_eq!(login.status().as_u16(), 200);
    let json: serde_json::Value = login.json().await.unwrap();
    json["token"].as_str().unwrap().to_string()
}
