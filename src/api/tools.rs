//! Stateless endpoints: price lookup, calculators, and the risk quiz.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use chrono::Utc;
use serde::Deserialize;
use tracing::info;

use crate::api::auth::AuthUser;
use crate::api::parse_symbol;
use crate::api::portfolio::persist_profile;
use crate::calculators::{
    self, CompoundInterestInput, CompoundInterestResult, FuturesCalcInput, FuturesCalcResult,
    LoanInput, LoanResult, ReturnInput, ReturnResult, SavingsGoalInput, SavingsGoalResult,
};
use crate::error::{ApiError, ApiResult};
use crate::quiz::{self, Question, QuizResult};
use crate::realtime::{ChangeAction, Channel, publish_row};
use crate::state::AppState;
use crate::types::asset::AssetClass;
use crate::types::quote::Quote;

#[derive(Debug, Deserialize)]
pub struct PriceQuery {
    #[serde(default)]
    pub asset_class: AssetClass,
}

/// GET /prices/{symbol}?asset_class=crypto|stock
pub async fn price(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
    Query(q): Query<PriceQuery>,
) -> ApiResult<Json<Quote>> {
    let symbol = parse_symbol(&symbol)?;
    Ok(Json(state.prices.quote(q.asset_class, &symbol).await?))
}

pub async fn compound_interest(
    Json(input): Json<CompoundInterestInput>,
) -> ApiResult<Json<CompoundInterestResult>> {
    Ok(Json(calculators::compound_interest(&input)?))
}

pub async fn loan(Json(input): Json<LoanInput>) -> ApiResult<Json<LoanResult>> {
    Ok(Json(calculators::loan_payment(&input)?))
}

pub async fn savings_goal(
    Json(input): Json<SavingsGoalInput>,
) -> ApiResult<Json<SavingsGoalResult>> {
    Ok(Json(calculators::savings_goal(&input)?))
}

pub async fn investment_return(Json(input): Json<ReturnInput>) -> ApiResult<Json<ReturnResult>> {
    Ok(Json(calculators::investment_return(&input)?))
}

pub async fn futures_calculator(
    Json(input): Json<FuturesCalcInput>,
) -> ApiResult<Json<FuturesCalcResult>> {
    Ok(Json(calculators::futures_position(&input)?))
}

/// GET /quiz/questions
pub async fn quiz_questions() -> Json<Vec<Question>> {
    Json(quiz::questions())
}

#[derive(Debug, Deserialize)]
pub struct QuizSubmission {
    pub answers: Vec<usize>,
}

/// POST /quiz/submit. Scores the answers and stores the resulting risk
/// profile on the caller's profile.
pub async fn submit_quiz(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<QuizSubmission>,
) -> ApiResult<Json<QuizResult>> {
    let result = quiz::score(&req.answers)?;

    let profile = {
        let mut profiles = state.profiles.write().await;
        let profile = profiles
            .get_mut(&user.user_id)
            .ok_or_else(|| ApiError::NotFound("profile not found".to_string()))?;
        profile.risk_profile = Some(result.profile);
        profile.updated_at = Utc::now();
        profile.clone()
    };
    info!(user_id = %user.user_id, score = result.score, profile = result.profile.as_str(), "quiz scored");

    persist_profile(&state, &profile).await;
    publish_row(
        &state.realtime,
        Channel::Profiles,
        ChangeAction::Update,
        user.user_id,
        &profile,
    );
    Ok(Json(result))
}
