use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::USER_AGENT;
use reqwest::{Client, StatusCode};
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use serde::Deserialize;

use super::{PriceError, PriceSource, change_percent};
use crate::types::asset::AssetClass;
use crate::types::quote::Quote;

const SOURCE: &str = "yahoo";

/// Regular-market price from the Yahoo Finance chart endpoint.
pub struct YahooClient {
    client: Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: Chart,
}

#[derive(Debug, Deserialize)]
struct Chart {
    result: Option<Vec<ChartResult>>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    meta: ChartMeta,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChartMeta {
    regular_market_price: Option<f64>,
    chart_previous_close: Option<f64>,
}

impl YahooClient {
    pub fn new(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl PriceSource for YahooClient {
    fn name(&self) -> &'static str {
        SOURCE
    }

    async fn quote(&self, symbol: &str) -> Result<Quote, PriceError> {
        let url = format!("{}/v8/finance/chart/{}", self.base_url, symbol);
        let res = self
            .client
            .get(url)
            .query(&[("interval", "1d"), ("range", "1d")])
            // Yahoo rejects requests without a browser-ish user agent.
            .header(USER_AGENT, "Mozilla/5.0 (compatible; finboard)")
            .send()
            .await
            .map_err(|error| PriceError::Request {
                source_name: SOURCE,
                error,
            })?;

        if res.status() == StatusCode::NOT_FOUND {
            return Err(PriceError::NotFound(symbol.to_string()));
        }
        if !res.status().is_success() {
            return Err(PriceError::Upstream {
                source_name: SOURCE,
                status: res.status().as_u16(),
            });
        }

        let body: ChartResponse = res.json().await.map_err(|e| PriceError::Parse {
            source_name: SOURCE,
            message: e.to_string(),
        })?;
        let meta = body
            .chart
            .result
            .and_then(|r| r.into_iter().next())
            .map(|r| r.meta)
            .ok_or_else(|| PriceError::NotFound(symbol.to_string()))?;

        let price = meta
            .regular_market_price
            .and_then(Decimal::from_f64)
            .ok_or_else(|| PriceError::Parse {
                source_name: SOURCE,
                message: "missing regularMarketPrice".to_string(),
            })?;
        let previous = meta.chart_previous_close.and_then(Decimal::from_f64);

        Ok(Quote {
            symbol: symbol.to_string(),
            asset_class: AssetClass::Stock,
            price,
            change_percent_24h: previous.and_then(|p| change_percent(price, p)),
            source: SOURCE.to_string(),
            fetched_at: Utc::now(),
        })
    }
}
