use axum::{
    Router,
    routing::{delete, get, post},
};

use crate::api::{auth, futures, portfolio, tools, ws};

pub use crate::state::{AppState, ProfileStore, UserStore};

async fn health() -> &'static str {
    "healthy"
}

pub fn app_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route(
            "/profile",
            get(portfolio::get_profile).put(portfolio::update_profile),
        )
        .route("/holdings", get(portfolio::list_holdings))
        .route("/holdings/buy", post(portfolio::buy))
        .route("/holdings/sell", post(portfolio::sell))
        .route("/holdings/{symbol}", delete(portfolio::remove_holding))
        .route("/transactions", get(portfolio::list_transactions))
        .route("/portfolio/summary", get(portfolio::summary))
        .route(
            "/watchlist",
            get(portfolio::list_watchlist).post(portfolio::add_to_watchlist),
        )
        .route("/watchlist/{symbol}", delete(portfolio::remove_from_watchlist))
        .route(
            "/futures/positions",
            get(futures::list_positions).post(futures::open_position),
        )
        .route("/futures/positions/{id}/close", post(futures::close_position))
        .route("/futures/account", get(futures::account))
        .route("/futures/reset", post(futures::reset))
        .route("/prices/{symbol}", get(tools::price))
        .route(
            "/calculators/compound-interest",
            post(tools::compound_interest),
        )
        .route("/calculators/loan", post(tools::loan))
        .route("/calculators/savings-goal", post(tools::savings_goal))
        .route("/calculators/return", post(tools::investment_return))
        .route("/calculators/futures", post(tools::futures_calculator))
        .route("/quiz/questions", get(tools::quiz_questions))
        .route("/quiz/submit", post(tools::submit_quiz))
        .route("/ws", get(ws::ws_handler))
        .with_state(state)
}
