//! Runtime configuration read from the environment (and `.env` via dotenvy).

use std::env;
use std::net::SocketAddr;
use std::time::Duration;

use rust_decimal::Decimal;
use thiserror::Error;
use tracing::warn;

const DEV_JWT_SECRET: &str = "finboard-dev-secret-change-me";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{key} is required")]
    Missing { key: &'static str },
    #[error("{key} has invalid value '{value}'")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct PriceConfig {
    pub binance_base_url: String,
    pub coingecko_base_url: String,
    pub yahoo_base_url: String,
    pub cache_ttl: Duration,
    pub request_timeout: Duration,
    /// Zero disables the background poller.
    pub poll_interval: Duration,
}

impl Default for PriceConfig {
    fn default() -> Self {
        Self {
            binance_base_url: "https://api.binance.com".to_string(),
            coingecko_base_url: "https://api.coingecko.com".to_string(),
            yahoo_base_url: "https://query1.finance.yahoo.com".to_string(),
            cache_ttl: Duration::from_secs(15),
            request_timeout: Duration::from_secs(10),
            poll_interval: Duration::from_secs(30),
        }
    }
}

/// Login seeded from the environment, for demo deployments without a database.
#[derive(Debug, Clone)]
pub struct SeedUser {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: SocketAddr,
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub jwt_secret: Vec<u8>,
    pub initial_paper_balance: Decimal,
    pub prices: PriceConfig,
    pub seed_user: Option<SeedUser>,
}

fn var(key: &'static str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_var<T: std::str::FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match var(key) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value }),
        None => Ok(default),
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let bind_addr = parse_var("BIND_ADDR", SocketAddr::from(([0, 0, 0, 0], 3000)))?;

        let jwt_secret = match var("JWT_SECRET") {
            Some(secret) => secret.into_bytes(),
            None if cfg!(debug_assertions) => {
                warn!("JWT_SECRET not set, using development secret");
                DEV_JWT_SECRET.as_bytes().to_vec()
            }
            None => return Err(ConfigError::Missing { key: "JWT_SECRET" }),
        };

        let initial_paper_balance = parse_var("INITIAL_PAPER_BALANCE", Decimal::new(10_000, 0))?;
        if initial_paper_balance <= Decimal::ZERO {
            return Err(ConfigError::Invalid {
                key: "INITIAL_PAPER_BALANCE",
                value: initial_paper_balance.to_string(),
            });
        }

        let defaults = PriceConfig::default();
        let prices = PriceConfig {
            binance_base_url: var("BINANCE_BASE_URL").unwrap_or(defaults.binance_base_url),
            coingecko_base_url: var("COINGECKO_BASE_URL").unwrap_or(defaults.coingecko_base_url),
            yahoo_base_url: var("YAHOO_BASE_URL").unwrap_or(defaults.yahoo_base_url),
            cache_ttl: Duration::from_secs(parse_var("PRICE_CACHE_TTL_SECS", 15)?),
            request_timeout: defaults.request_timeout,
            poll_interval: Duration::from_secs(parse_var("PRICE_POLL_INTERVAL_SECS", 30)?),
        };

        let seed_user = match (var("SEED_USERNAME"), var("SEED_PASSWORD")) {
            (Some(username), Some(password)) => Some(SeedUser { username, password }),
            (Some(_), None) => return Err(ConfigError::Missing { key: "SEED_PASSWORD" }),
            _ => None,
        };

        Ok(Self {
            bind_addr,
            database_url: var("DATABASE_URL"),
            db_max_connections: parse_var("DATABASE_MAX_CONNECTIONS", 5)?,
            jwt_secret,
            initial_paper_balance,
            prices,
            seed_user,
        })
    }
}
