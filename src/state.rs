//! Shared application state and startup hydration from the database.

use std::collections::HashMap;
use std::sync::Arc;

use rust_decimal::Decimal;
use tokio::sync::{RwLock, broadcast};
use tracing::{info, warn};
use uuid::Uuid;

use crate::api::auth::{AuthUserCredential, hash_password};
use crate::config::SeedUser;
use crate::futures::{FuturesBook, SharedFutures};
use crate::holdings::{PortfolioBook, SharedPortfolio};
use crate::persistence::{self, PgPool};
use crate::prices::PriceService;
use crate::realtime::{RealtimeEvent, RealtimeSender};
use crate::types::profile::Profile;
use crate::watchlist::{SharedWatchlists, Watchlists};

/// Credentials keyed by lowercase username.
pub type UserStore = Arc<RwLock<HashMap<String, AuthUserCredential>>>;
pub type ProfileStore = Arc<RwLock<HashMap<Uuid, Profile>>>;

const REALTIME_CAPACITY: usize = 1024;

#[derive(Clone)]
pub struct AppState {
    pub portfolio: SharedPortfolio,
    pub watchlists: SharedWatchlists,
    pub futures: SharedFutures,
    pub profiles: ProfileStore,
    pub user_store: UserStore,
    pub prices: Arc<PriceService>,
    pub realtime: RealtimeSender,
    pub jwt_secret: Vec<u8>,
    /// `None` runs fully in memory.
    pub db: Option<PgPool>,
}

impl AppState {
    /// Empty stores; attach a pool with `with_db` and `hydrate` it.
    pub fn new(prices: Arc<PriceService>, jwt_secret: Vec<u8>, initial_balance: Decimal) -> Self {
        let (realtime, _) = broadcast::channel::<RealtimeEvent>(REALTIME_CAPACITY);
        Self {
            portfolio: PortfolioBook::shared(),
            watchlists: Watchlists::shared(),
            futures: FuturesBook::shared(initial_balance),
            profiles: Arc::new(RwLock::new(HashMap::new())),
            user_store: Arc::new(RwLock::new(HashMap::new())),
            prices,
            realtime,
            jwt_secret,
            db: None,
        }
    }

    pub fn with_db(mut self, pool: PgPool) -> Self {
        self.db = Some(pool);
        self
    }

    /// Load every table into the in-memory stores. Rows that fail to convert
    /// are skipped with a warning.
    pub async fn hydrate(&self) -> Result<(), sqlx::Error> {
        let Some(pool) = &self.db else {
            return Ok(());
        };

        let users = persistence::list_users(pool).await?;
        {
            let mut store = self.user_store.write().await;
            for row in &users {
                store.insert(
                    row.username.clone(),
                    AuthUserCredential {
                        user_id: row.id,
                        username: row.username.clone(),
                        password_hash: row.password_hash.clone(),
                    },
                );
            }
        }

        let profile_rows = persistence::list_profiles(pool).await?;
        {
            let mut profiles = self.profiles.write().await;
            let mut futures = self.futures.write().await;
            for row in &profile_rows {
                futures.restore_balance(row.user_id, row.paper_balance);
                profiles.insert(row.user_id, persistence::profile_row_to_profile(row));
            }
        }

        let holding_rows = persistence::list_holdings(pool).await?;
        let tx_rows = persistence::list_transactions(pool).await?;
        {
            let mut book = self.portfolio.write().await;
            for row in &holding_rows {
                match persistence::holding_row_to_holding(row) {
                    Some(h) => book.restore_holding(h),
                    None => warn!(user_id = %row.user_id, symbol = %row.symbol, "skipping invalid holding row"),
                }
            }
            for row in &tx_rows {
                match persistence::transaction_row_to_transaction(row) {
                    Some(t) => book.restore_transaction(t),
                    None => warn!(id = %row.id, "skipping invalid transaction row"),
                }
            }
        }

        let watch_rows = persistence::list_watchlist_items(pool).await?;
        {
            let mut lists = self.watchlists.write().await;
            for item in watch_rows.iter().filter_map(persistence::watchlist_row_to_item) {
                lists.restore(item);
            }
        }

        let position_rows = persistence::list_futures_positions(pool).await?;
        {
            let mut futures = self.futures.write().await;
            for row in &position_rows {
                match persistence::futures_row_to_position(row) {
                    Some(p) => futures.restore_position(p),
                    None => warn!(id = %row.id, "skipping invalid futures position row"),
                }
            }
        }

        info!(
            users = users.len(),
            holdings = holding_rows.len(),
            transactions = tx_rows.len(),
            watchlist = watch_rows.len(),
            futures_positions = position_rows.len(),
            "hydrated state from database"
        );
        Ok(())
    }

    /// Register the configured seed login if that username is free.
    pub async fn seed_user(&self, seed: &SeedUser) -> Result<(), String> {
        let username = seed.username.trim().to_lowercase();
        if self.user_store.read().await.contains_key(&username) {
            return Ok(());
        }
        let password_hash = hash_password(&seed.password).map_err(|e| e.to_string())?;
        let user_id = Uuid::new_v4();
        let profile = Profile::new(user_id, &username);
        if let Some(pool) = &self.db {
            let balance = self.futures.read().await.initial_balance();
            let inserted = persistence::insert_user(pool, user_id, &username, &password_hash)
                .await
                .map_err(|e| e.to_string())?;
            if !inserted {
                return Err(format!(
                    "username '{}' exists in the database but was not loaded",
                    username
                ));
            }
            persistence::upsert_profile(pool, &profile, balance)
                .await
                .map_err(|e| e.to_string())?;
        }
        self.user_store.write().await.insert(
            username.clone(),
            AuthUserCredential {
                user_id,
                username: username.clone(),
                password_hash,
            },
        );
        self.profiles.write().await.insert(user_id, profile);
        info!(%username, "seeded login");
        Ok(())
    }
}
