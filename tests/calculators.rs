//! Financial calculators: known closed-form values and input validation.

use finboard::calculators::{
    CalculatorError, MAX_COMPOUNDS_PER_YEAR, MAX_YEARS, CompoundInterestInput, FuturesCalcInput, LoanInput, ReturnInput,
    SavingsGoalInput, compound_interest, futures_position, investment_return, loan_payment,
    savings_goal,
};
use finboard::futures::FuturesError;
use finboard::types::futures::PositionSide;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

#[test]
fn compound_interest_annual() {
    let out = compound_interest(&CompoundInterestInput {
        principal: 1000.0,
        annual_rate_percent: 10.0,
        years: 2,
        compounds_per_year: 1,
        monthly_contribution: 0.0,
    })
    .unwrap();

    assert_eq!(out.final_balance, 1210.0);
    assert_eq!(out.total_contributions, 1000.0);
    assert_eq!(out.total_interest, 210.0);
    assert_eq!(out.yearly.len(), 2);
    assert_eq!(out.yearly[0].year, 1);
    assert_eq!(out.yearly[0].balance, 1100.0);
    assert_eq!(out.yearly[0].interest, 100.0);
}

#[test]
fn compound_interest_contributions_without_rate() {
    let out = compound_interest(&CompoundInterestInput {
        principal: 1000.0,
        annual_rate_percent: 0.0,
        years: 2,
        compounds_per_year: 12,
        monthly_contribution: 100.0,
    })
    .unwrap();

    assert_eq!(out.final_balance, 3400.0);
    assert_eq!(out.total_contributions, 3400.0);
    assert_eq!(out.total_interest, 0.0);
}

#[test]
fn compound_interest_defaults_from_json() {
    let input: CompoundInterestInput = serde_json::from_value(serde_json::json!({
        "principal": 500.0,
        "annual_rate_percent": 0.0,
        "years": 1
    }))
    .unwrap();
    assert_eq!(input.compounds_per_year, 12);
    assert_eq!(input.monthly_contribution, 0.0);
}

#[test]
fn compound_interest_rejects_bad_input() {
    let base = CompoundInterestInput {
        principal: -1.0,
        annual_rate_percent: 5.0,
        years: 1,
        compounds_per_year: 12,
        monthly_contribution: 0.0,
    };
    assert_eq!(
        compound_interest(&base).unwrap_err(),
        CalculatorError::Negative("principal")
    );
    assert_eq!(
        compound_interest(&CompoundInterestInput {
            principal: 1.0,
            years: 0,
            ..base.clone()
        })
        .unwrap_err(),
        CalculatorError::OutOfRange {
            name: "years",
            min: 1,
            max: MAX_YEARS
        }
    );
    assert_eq!(
        compound_interest(&CompoundInterestInput {
            principal: 1.0,
            annual_rate_percent: f64::NAN,
            ..base
        })
        .unwrap_err(),
        CalculatorError::Negative("annual_rate_percent")
    );
}

#[test]
fn loan_payment_thirty_year_mortgage() {
    let out = loan_payment(&LoanInput {
        principal: 100_000.0,
        annual_rate_percent: 6.0,
        years: 30,
    })
    .unwrap();

    assert_eq!(out.monthly_payment, 599.55);
    assert_eq!(out.payments, 360);
    assert!((out.total_interest - 115_838.19).abs() < 0.05);
}

#[test]
fn loan_payment_zero_rate_is_linear() {
    let out = loan_payment(&LoanInput {
        principal: 12_000.0,
        annual_rate_percent: 0.0,
        years: 1,
    })
    .unwrap();
    assert_eq!(out.monthly_payment, 1000.0);
    assert_eq!(out.total_interest, 0.0);
}

#[test]
fn loan_payment_requires_principal() {
    assert_eq!(
        loan_payment(&LoanInput {
            principal: 0.0,
            annual_rate_percent: 5.0,
            years: 10,
        })
        .unwrap_err(),
        CalculatorError::NotPositive("principal")
    );
}

#[test]
fn savings_goal_monthly_amount() {
    let out = savings_goal(&SavingsGoalInput {
        target: 12_000.0,
        current_savings: 0.0,
        annual_rate_percent: 0.0,
        years: 1,
    })
    .unwrap();
    assert_eq!(out.monthly_saving, 1000.0);
    assert_eq!(out.total_contributions, 12_000.0);
    assert!(!out.already_reached);

    let with_interest = savings_goal(&SavingsGoalInput {
        target: 12_000.0,
        current_savings: 0.0,
        annual_rate_percent: 5.0,
        years: 1,
    })
    .unwrap();
    assert!(with_interest.monthly_saving < 1000.0);
}

#[test]
fn savings_goal_already_reached() {
    let out = savings_goal(&SavingsGoalInput {
        target: 10_000.0,
        current_savings: 20_000.0,
        annual_rate_percent: 3.0,
        years: 5,
    })
    .unwrap();
    assert!(out.already_reached);
    assert_eq!(out.monthly_saving, 0.0);
}

#[test]
fn investment_return_roi_and_cagr() {
    let out = investment_return(&ReturnInput {
        initial_value: 1000.0,
        final_value: 2000.0,
        years: Some(2.0),
    })
    .unwrap();
    assert_eq!(out.gain, 1000.0);
    assert_eq!(out.roi_percent, 100.0);
    assert_eq!(out.cagr_percent, Some(41.42));

    let loss = investment_return(&ReturnInput {
        initial_value: 1000.0,
        final_value: 750.0,
        years: None,
    })
    .unwrap();
    assert_eq!(loss.roi_percent, -25.0);
    assert_eq!(loss.cagr_percent, None);
}

#[test]
fn investment_return_rejects_zero_initial() {
    assert_eq!(
        investment_return(&ReturnInput {
            initial_value: 0.0,
            final_value: 10.0,
            years: None,
        })
        .unwrap_err(),
        CalculatorError::NotPositive("initial_value")
    );
}

#[test]
fn futures_calculator_long() {
    let out = futures_position(&FuturesCalcInput {
        side: PositionSide::Long,
        entry_price: dec!(50000),
        exit_price: dec!(52000),
        quantity: dec!(0.1),
        leverage: 10,
    })
    .unwrap();
    assert_eq!(out.notional, dec!(5000));
    assert_eq!(out.margin, dec!(500));
    assert_eq!(out.pnl, dec!(200));
    assert_eq!(out.roe_percent, dec!(40));
    assert_eq!(out.liquidation_price, dec!(45250));
}

#[test]
fn futures_calculator_validates_leverage() {
    let err = futures_position(&FuturesCalcInput {
        side: PositionSide::Short,
        entry_price: dec!(100),
        exit_price: dec!(90),
        quantity: dec!(1),
        leverage: 200,
    })
    .unwrap_err();
    assert_eq!(err, CalculatorError::Futures(FuturesError::InvalidLeverage));
}

#[test]
fn horizons_are_bounded() {
    let too_long = MAX_YEARS + 1;
    let years_err = CalculatorError::OutOfRange {
        name: "years",
        min: 1,
        max: MAX_YEARS,
    };

    assert_eq!(
        loan_payment(&LoanInput {
            principal: 1000.0,
            annual_rate_percent: 5.0,
            years: 400_000_000,
        })
        .unwrap_err(),
        years_err
    );
    assert_eq!(
        savings_goal(&SavingsGoalInput {
            target: 1000.0,
            current_savings: 0.0,
            annual_rate_percent: 5.0,
            years: u32::MAX,
        })
        .unwrap_err(),
        years_err
    );
    assert_eq!(
        compound_interest(&CompoundInterestInput {
            principal: 1000.0,
            annual_rate_percent: 5.0,
            years: too_long,
            compounds_per_year: 12,
            monthly_contribution: 0.0,
        })
        .unwrap_err(),
        years_err
    );
    assert_eq!(
        compound_interest(&CompoundInterestInput {
            principal: 1000.0,
            annual_rate_percent: 5.0,
            years: 10,
            compounds_per_year: u32::MAX,
            monthly_contribution: 0.0,
        })
        .unwrap_err(),
        CalculatorError::OutOfRange {
            name: "compounds_per_year",
            min: 1,
            max: MAX_COMPOUNDS_PER_YEAR,
        }
    );
}

#[test]
fn longest_horizon_still_computes() {
    let out = compound_interest(&CompoundInterestInput {
        principal: 1000.0,
        annual_rate_percent: 5.0,
        years: MAX_YEARS,
        compounds_per_year: MAX_COMPOUNDS_PER_YEAR,
        monthly_contribution: 100.0,
    })
    .unwrap();
    assert_eq!(out.yearly.len(), MAX_YEARS as usize);
    assert_eq!(
        loan_payment(&LoanInput {
            principal: 1000.0,
            annual_rate_percent: 5.0,
            years: MAX_YEARS,
        })
        .unwrap()
        .payments,
        1200
    );
}

#[test]
fn futures_calculator_rejects_overflowing_sizes() {
    let err = futures_position(&FuturesCalcInput {
        side: PositionSide::Long,
        entry_price: Decimal::MAX,
        exit_price: dec!(1),
        quantity: dec!(10),
        leverage: 10,
    })
    .unwrap_err();
    assert_eq!(err, CalculatorError::Futures(FuturesError::Overflow));
}
