pub mod api;
pub mod calculators;
pub mod config;
pub mod error;
pub mod futures;
pub mod holdings;
pub mod persistence;
pub mod poller;
pub mod prices;
pub mod quiz;
pub mod realtime;
pub mod state;
pub mod telemetry;
pub mod types;
pub mod watchlist;
