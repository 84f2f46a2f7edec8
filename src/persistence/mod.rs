//! Database layer: pool, migrations, and access for users, profiles,
//! holdings, watchlists, transactions, futures positions.

mod futures;
mod holdings;
mod pool;
mod profiles;
mod transactions;
mod users;
mod watchlists;

pub use futures::{
    delete_futures_positions_for_user, futures_row_to_position, list_futures_positions,
    upsert_futures_position, FuturesPositionRow,
};
pub use holdings::{
    delete_holding, holding_row_to_holding, list_holdings, upsert_holding, HoldingRow,
};
pub use pool::{create_pool_and_migrate, run_migrations};
pub use profiles::{
    list_profiles, profile_row_to_profile, update_paper_balance, upsert_profile, ProfileRow,
};
pub use sqlx::PgPool;
pub use transactions::{
    insert_transaction, list_transactions, transaction_row_to_transaction, TransactionRow,
};
pub use users::{insert_user, list_users, UserRow};
pub use watchlists::{
    delete_watchlist_item, insert_watchlist_item, list_watchlist_items, watchlist_row_to_item,
    WatchlistRow,
};
