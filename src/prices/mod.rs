//! Price fetch from third-party market data APIs.
//!
//! Crypto symbols are priced from Binance with CoinGecko as fallback; stocks
//! and ETFs come from Yahoo Finance. Quotes are cached for a short TTL so a
//! dashboard refresh does not fan out to the upstreams on every request.

mod binance;
mod coingecko;
mod yahoo;

pub use binance::BinanceClient;
pub use coingecko::{CoinGeckoClient, coingecko_id};
pub use yahoo::YahooClient;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use rust_decimal::Decimal;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::config::PriceConfig;
use crate::types::asset::AssetClass;
use crate::types::quote::Quote;

#[derive(Debug, Error)]
pub enum PriceError {
    #[error("{source_name}: request failed: {error}")]
    Request {
        source_name: &'static str,
        error: reqwest::Error,
    },
    #[error("{source_name}: upstream returned status {status}")]
    Upstream {
        source_name: &'static str,
        status: u16,
    },
    #[error("{source_name}: unexpected response: {message}")]
    Parse {
        source_name: &'static str,
        message: String,
    },
    #[error("no price available for {0}")]
    NotFound(String),
}

/// A single upstream quote API.
#[async_trait]
pub trait PriceSource: Send + Sync {
    fn name(&self) -> &'static str;

    async fn quote(&self, symbol: &str) -> Result<Quote, PriceError>;
}

/// `(last - previous) / previous * 100`, rounded to 2dp.
pub(crate) fn change_percent(last: Decimal, previous: Decimal) -> Option<Decimal> {
    let ratio = last.checked_sub(previous)?.checked_div(previous)?;
    Some(ratio.checked_mul(Decimal::ONE_HUNDRED)?.round_dp(2))
}

/// A symbol is only unique within its asset class: `ETH` the coin and `ETH`
/// the stock ticker are different instruments.
pub type QuoteKey = (AssetClass, String);

pub struct PriceService {
    crypto_primary: Arc<dyn PriceSource>,
    crypto_fallback: Option<Arc<dyn PriceSource>>,
    stocks: Arc<dyn PriceSource>,
    cache: RwLock<HashMap<QuoteKey, (Quote, Instant)>>,
    ttl: Duration,
}

impl PriceService {
    pub fn new(
        crypto_primary: Arc<dyn PriceSource>,
        crypto_fallback: Option<Arc<dyn PriceSource>>,
        stocks: Arc<dyn PriceSource>,
        ttl: Duration,
    ) -> Self {
        Self {
            crypto_primary,
            crypto_fallback,
            stocks,
            cache: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    /// Binance + CoinGecko for crypto, Yahoo for stocks, at the configured
    /// base URLs. Fails if the HTTP client cannot be built with the
    /// configured timeout.
    pub fn from_config(config: &PriceConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self::new(
            Arc::new(BinanceClient::new(client.clone(), &config.binance_base_url)),
            Some(Arc::new(CoinGeckoClient::new(
                client.clone(),
                &config.coingecko_base_url,
            ))),
            Arc::new(YahooClient::new(client, &config.yahoo_base_url)),
            config.cache_ttl,
        ))
    }

    /// Latest quote for `symbol`, served from cache while fresh.
    pub async fn quote(&self, asset_class: AssetClass, symbol: &str) -> Result<Quote, PriceError> {
        let key = (asset_class, symbol.to_string());
        if let Some((quote, at)) = self.cache.read().await.get(&key) {
            if at.elapsed() < self.ttl {
                return Ok(quote.clone());
            }
        }

        let quote = self.fetch(asset_class, symbol).await?;
        self.cache
            .write()
            .await
            .insert(key, (quote.clone(), Instant::now()));
        Ok(quote)
    }

    /// Last cached quote regardless of age.
    pub async fn cached(&self, asset_class: AssetClass, symbol: &str) -> Option<Quote> {
        self.cache
            .read()
            .await
            .get(&(asset_class, symbol.to_string()))
            .map(|(q, _)| q.clone())
    }

    /// Quotes for many symbols keyed by (asset class, symbol). Failures are
    /// logged and skipped so one bad symbol does not blank the whole
    /// dashboard.
    pub async fn quotes(&self, symbols: &[QuoteKey]) -> HashMap<QuoteKey, Quote> {
        let mut out = HashMap::new();
        for (asset_class, symbol) in symbols {
            match self.quote(*asset_class, symbol).await {
                Ok(q) => {
                    out.insert((*asset_class, symbol.clone()), q);
                }
                Err(err) => warn!(
                    symbol = %symbol,
                    asset_class = asset_class.as_str(),
                    error = %err,
                    "price lookup failed"
                ),
            }
        }
        out
    }

    async fn fetch(&self, asset_class: AssetClass, symbol: &str) -> Result<Quote, PriceError> {
        match asset_class {
            AssetClass::Stock => self.stocks.quote(symbol).await,
            AssetClass::Crypto => match self.crypto_primary.quote(symbol).await {
                Ok(q) => Ok(q),
                Err(primary_err) => {
                    let Some(fallback) = &self.crypto_fallback else {
                        return Err(primary_err);
                    };
                    debug!(
                        symbol,
                        primary = self.crypto_primary.name(),
                        fallback = fallback.name(),
                        error = %primary_err,
                        "falling back to secondary crypto source"
                    );
                    fallback.quote(symbol).await
                }
            },
        }
    }
}
