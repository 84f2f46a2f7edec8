//! Closed-form financial calculators. Stateless; inputs are validated and
//! outputs rounded to cents.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::futures::{self, FuturesError};
use crate::types::futures::PositionSide;

#[derive(Debug, Error, PartialEq)]
pub enum CalculatorError {
    #[error("{0} must be a finite, non-negative number")]
    Negative(&'static str),
    #[error("{0} must be greater than zero")]
    NotPositive(&'static str),
    #[error("{name} must be between {min} and {max}")]
    OutOfRange {
        name: &'static str,
        min: u32,
        max: u32,
    },
    #[error(transparent)]
    Futures(#[from] FuturesError),
}

fn non_negative(value: f64, name: &'static str) -> Result<f64, CalculatorError> {
    if !value.is_finite() || value < 0.0 {
        return Err(CalculatorError::Negative(name));
    }
    Ok(value)
}

fn positive(value: f64, name: &'static str) -> Result<f64, CalculatorError> {
    if !value.is_finite() || value <= 0.0 {
        return Err(CalculatorError::NotPositive(name));
    }
    Ok(value)
}

/// Longest horizon any calculator accepts.
pub const MAX_YEARS: u32 = 100;
/// Daily compounding at most.
pub const MAX_COMPOUNDS_PER_YEAR: u32 = 365;

fn within(value: u32, name: &'static str, min: u32, max: u32) -> Result<u32, CalculatorError> {
    if !(min..=max).contains(&value) {
        return Err(CalculatorError::OutOfRange { name, min, max });
    }
    Ok(value)
}

fn cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[derive(Debug, Clone, Deserialize)]
pub struct CompoundInterestInput {
    pub principal: f64,
    pub annual_rate_percent: f64,
    pub years: u32,
    #[serde(default = "default_compounds_per_year")]
    pub compounds_per_year: u32,
    #[serde(default)]
    pub monthly_contribution: f64,
}

fn default_compounds_per_year() -> u32 {
    12
}

#[derive(Debug, Clone, Serialize)]
pub struct YearRow {
    pub year: u32,
    pub balance: f64,
    pub contributions: f64,
    pub interest: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CompoundInterestResult {
    pub final_balance: f64,
    pub total_contributions: f64,
    pub total_interest: f64,
    pub yearly: Vec<YearRow>,
}

/// Balance after `years` with interest compounded `compounds_per_year` times
/// and the monthly contribution deposited at the end of each compounding
/// period (scaled to the period length).
pub fn compound_interest(
    input: &CompoundInterestInput,
) -> Result<CompoundInterestResult, CalculatorError> {
    let principal = non_negative(input.principal, "principal")?;
    let rate = non_negative(input.annual_rate_percent, "annual_rate_percent")? / 100.0;
    let contribution = non_negative(input.monthly_contribution, "monthly_contribution")?;
    let years = within(input.years, "years", 1, MAX_YEARS)?;
    let compounds = within(
        input.compounds_per_year,
        "compounds_per_year",
        1,
        MAX_COMPOUNDS_PER_YEAR,
    )?;

    let n = compounds as f64;
    let period_rate = rate / n;
    let per_period_deposit = contribution * 12.0 / n;

    let mut balance = principal;
    let mut contributed = principal;
    let mut yearly = Vec::with_capacity(years as usize);
    for year in 1..=years {
        for _ in 0..compounds {
            balance = balance * (1.0 + period_rate) + per_period_deposit;
            contributed += per_period_deposit;
        }
        yearly.push(YearRow {
            year,
            balance: cents(balance),
            contributions: cents(contributed),
            interest: cents(balance - contributed),
        });
    }

    Ok(CompoundInterestResult {
        final_balance: cents(balance),
        total_contributions: cents(contributed),
        total_interest: cents(balance - contributed),
        yearly,
    })
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoanInput {
    pub principal: f64,
    pub annual_rate_percent: f64,
    pub years: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoanResult {
    pub monthly_payment: f64,
    pub total_paid: f64,
    pub total_interest: f64,
    pub payments: u32,
}

/// Fixed monthly payment of a fully amortizing loan.
pub fn loan_payment(input: &LoanInput) -> Result<LoanResult, CalculatorError> {
    let principal = positive(input.principal, "principal")?;
    let rate = non_negative(input.annual_rate_percent, "annual_rate_percent")? / 100.0 / 12.0;
    let payments = within(input.years, "years", 1, MAX_YEARS)? * 12;
    let n = payments as f64;

    let monthly = if rate == 0.0 {
        principal / n
    } else {
        principal * rate / (1.0 - (1.0 + rate).powf(-n))
    };
    let total = monthly * n;
    Ok(LoanResult {
        monthly_payment: cents(monthly),
        total_paid: cents(total),
        total_interest: cents(total - principal),
        payments,
    })
}

#[derive(Debug, Clone, Deserialize)]
pub struct SavingsGoalInput {
    pub target: f64,
    #[serde(default)]
    pub current_savings: f64,
    pub annual_rate_percent: f64,
    pub years: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct SavingsGoalResult {
    pub monthly_saving: f64,
    pub total_contributions: f64,
    pub already_reached: bool,
}

/// Monthly deposit needed to grow `current_savings` to `target`, with
/// monthly compounding.
pub fn savings_goal(input: &SavingsGoalInput) -> Result<SavingsGoalResult, CalculatorError> {
    let target = positive(input.target, "target")?;
    let current = non_negative(input.current_savings, "current_savings")?;
    let rate = non_negative(input.annual_rate_percent, "annual_rate_percent")? / 100.0 / 12.0;
    let n = (within(input.years, "years", 1, MAX_YEARS)? * 12) as f64;
    let growth = (1.0 + rate).powf(n);
    let shortfall = target - current * growth;
    if shortfall <= 0.0 {
        return Ok(SavingsGoalResult {
            monthly_saving: 0.0,
            total_contributions: 0.0,
            already_reached: true,
        });
    }
    let monthly = if rate == 0.0 {
        shortfall / n
    } else {
        shortfall * rate / (growth - 1.0)
    };
    Ok(SavingsGoalResult {
        monthly_saving: cents(monthly),
        total_contributions: cents(monthly * n),
        already_reached: false,
    })
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReturnInput {
    pub initial_value: f64,
    pub final_value: f64,
    #[serde(default)]
    pub years: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReturnResult {
    pub gain: f64,
    pub roi_percent: f64,
    /// Only when `years` was supplied.
    pub cagr_percent: Option<f64>,
}

/// Simple ROI, plus CAGR when a holding period is given.
pub fn investment_return(input: &ReturnInput) -> Result<ReturnResult, CalculatorError> {
    let initial = positive(input.initial_value, "initial_value")?;
    let final_value = non_negative(input.final_value, "final_value")?;
    let cagr = match input.years {
        Some(years) => {
            let years = positive(years, "years")?;
            Some(cents(((final_value / initial).powf(1.0 / years) - 1.0) * 100.0))
        }
        None => None,
    };
    Ok(ReturnResult {
        gain: cents(final_value - initial),
        roi_percent: cents((final_value - initial) / initial * 100.0),
        cagr_percent: cagr,
    })
}

#[derive(Debug, Clone, Deserialize)]
pub struct FuturesCalcInput {
    pub side: PositionSide,
    pub entry_price: Decimal,
    pub exit_price: Decimal,
    pub quantity: Decimal,
    pub leverage: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct FuturesCalcResult {
    pub margin: Decimal,
    pub pnl: Decimal,
    pub roe_percent: Decimal,
    pub liquidation_price: Decimal,
    pub notional: Decimal,
}

/// What-if calculator for a single futures trade.
pub fn futures_position(input: &FuturesCalcInput) -> Result<FuturesCalcResult, CalculatorError> {
    futures::validate_order(input.quantity, input.entry_price, input.leverage)?;
    if input.exit_price <= Decimal::ZERO {
        return Err(FuturesError::InvalidPrice.into());
    }
    let notional = input
        .quantity
        .checked_mul(input.entry_price)
        .ok_or(FuturesError::Overflow)?;
    let margin = futures::initial_margin(input.quantity, input.entry_price, input.leverage)?;
    let pnl = futures::pnl_for(input.side, input.entry_price, input.exit_price, input.quantity)
        .ok_or(FuturesError::Overflow)?;
    Ok(FuturesCalcResult {
        margin: margin.round_dp(8),
        pnl: pnl.round_dp(8),
        roe_percent: crate::holdings::percent_of(pnl, margin),
        liquidation_price: futures::liquidation_price(
            input.side,
            input.entry_price,
            input.leverage,
        )?,
        notional,
    })
}
