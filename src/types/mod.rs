pub mod asset;
pub mod futures;
pub mod holding;
pub mod profile;
pub mod quote;
pub mod transaction;
pub mod watchlist;
