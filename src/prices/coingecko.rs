use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use serde::Deserialize;

use super::{PriceError, PriceSource};
use crate::types::asset::AssetClass;
use crate::types::quote::Quote;

const SOURCE: &str = "coingecko";

/// Map a ticker symbol to CoinGecko's asset id.
pub fn coingecko_id(symbol: &str) -> Option<&'static str> {
    let base = symbol.strip_suffix("USDT").filter(|b| !b.is_empty()).unwrap_or(symbol);
    match base {
        "BTC" => Some("bitcoin"),
        "ETH" => Some("ethereum"),
        "SOL" => Some("solana"),
        "BNB" => Some("binancecoin"),
        "XRP" => Some("ripple"),
        "ADA" => Some("cardano"),
        "DOGE" => Some("dogecoin"),
        "DOT" => Some("polkadot"),
        "AVAX" => Some("avalanche-2"),
        "MATIC" | "POL" => Some("matic-network"),
        "LINK" => Some("chainlink"),
        "LTC" => Some("litecoin"),
        "TRX" => Some("tron"),
        "SHIB" => Some("shiba-inu"),
        "USDT" => Some("tether"),
        "USDC" => Some("usd-coin"),
        _ => None,
    }
}

/// USD spot price via `/simple/price`.
pub struct CoinGeckoClient {
    client: Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct SimplePrice {
    usd: f64,
    usd_24h_change: Option<f64>,
}

impl CoinGeckoClient {
    pub fn new(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl PriceSource for CoinGeckoClient {
    fn name(&self) -> &'static str {
        SOURCE
    }

    async fn quote(&self, symbol: &str) -> Result<Quote, PriceError> {
        let id = coingecko_id(symbol).ok_or_else(|| PriceError::NotFound(symbol.to_string()))?;

        let res = self
            .client
            .get(format!("{}/api/v3/simple/price", self.base_url))
            .query(&[
                ("ids", id),
                ("vs_currencies", "usd"),
                ("include_24hr_change", "true"),
            ])
            .header("accept", "application/json")
            .send()
            .await
            .map_err(|error| PriceError::Request {
                source_name: SOURCE,
                error,
            })?;

        if !res.status().is_success() {
            return Err(PriceError::Upstream {
                source_name: SOURCE,
                status: res.status().as_u16(),
            });
        }

        // { "bitcoin": { "usd": 12345.6, "usd_24h_change": -1.2 } }
        let mut parsed: HashMap<String, SimplePrice> =
            res.json().await.map_err(|e| PriceError::Parse {
                source_name: SOURCE,
                message: e.to_string(),
            })?;
        let rec = parsed
            .remove(id)
            .ok_or_else(|| PriceError::NotFound(symbol.to_string()))?;

        let price = Decimal::from_f64(rec.usd).ok_or_else(|| PriceError::Parse {
            source_name: SOURCE,
            message: format!("price {} is not representable", rec.usd),
        })?;

        Ok(Quote {
            symbol: symbol.to_string(),
            asset_class: AssetClass::Crypto,
            price,
            change_percent_24h: rec
                .usd_24h_change
                .and_then(Decimal::from_f64)
                .map(|c| c.round_dp(2)),
            source: SOURCE.to_string(),
            fetched_at: Utc::now(),
        })
    }
}
