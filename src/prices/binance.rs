use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, StatusCode};
use rust_decimal::Decimal;
use serde::Deserialize;

use super::{PriceError, PriceSource};
use crate::types::asset::AssetClass;
use crate::types::quote::Quote;

const SOURCE: &str = "binance";

/// Spot 24h ticker from the Binance public REST API.
pub struct BinanceClient {
    client: Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Ticker24h {
    last_price: Decimal,
    price_change_percent: Decimal,
}

impl BinanceClient {
    pub fn new(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// "BTC" and "BTCUSDT" both map to the USDT pair.
    pub fn pair_for(symbol: &str) -> String {
        if symbol.ends_with("USDT") && symbol.len() > 4 {
            symbol.to_string()
        } else {
            format!("{symbol}USDT")
        }
    }
}

#[async_trait]
impl PriceSource for BinanceClient {
    fn name(&self) -> &'static str {
        SOURCE
    }

    async fn quote(&self, symbol: &str) -> Result<Quote, PriceError> {
        let pair = Self::pair_for(symbol);
        let res = self
            .client
            .get(format!("{}/api/v3/ticker/24hr", self.base_url))
            .query(&[("symbol", pair.as_str())])
            .send()
            .await
            .map_err(|error| PriceError::Request {
                source_name: SOURCE,
                error,
            })?;

        // Binance answers 400 {"code":-1121,"msg":"Invalid symbol."}
        if res.status() == StatusCode::BAD_REQUEST {
            return Err(PriceError::NotFound(symbol.to_string()));
        }
        if !res.status().is_success() {
            return Err(PriceError::Upstream {
                source_name: SOURCE,
                status: res.status().as_u16(),
            });
        }

        let ticker: Ticker24h = res.json().await.map_err(|e| PriceError::Parse {
            source_name: SOURCE,
            message: e.to_string(),
        })?;

        Ok(Quote {
            symbol: symbol.to_string(),
            asset_class: AssetClass::Crypto,
            price: ticker.last_price,
            change_percent_24h: Some(ticker.price_change_percent),
            source: SOURCE.to_string(),
            fetched_at: Utc::now(),
        })
    }
}
