//! Holding tracking: record_buy, record_sell, valuation and portfolio summary.
//! Testable without HTTP.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::types::asset::AssetClass;
use crate::types::holding::{AllocationSlice, Holding, HoldingValuation, PortfolioSummary};
use crate::types::transaction::{TradeSide, Transaction};

pub type SharedPortfolio = Arc<RwLock<PortfolioBook>>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum HoldingError {
    #[error("quantity must be greater than zero")]
    InvalidQuantity,
    #[error("price must be greater than zero")]
    InvalidPrice,
    #[error("no holding for {0}")]
    NotHeld(String),
    #[error("cannot sell {requested} {symbol}: only {held} held")]
    InsufficientQuantity {
        symbol: String,
        requested: Decimal,
        held: Decimal,
    },
    #[error("trade size is out of range")]
    Overflow,
}

/// Result of a sell: the remaining holding (`None` once fully sold) and the
/// ledger entry.
#[derive(Debug, Clone)]
pub struct SellOutcome {
    pub holding: Option<Holding>,
    pub transaction: Transaction,
}

/// Holdings keyed by (user, symbol) plus the per-user transaction ledger.
#[derive(Debug, Default)]
pub struct PortfolioBook {
    holdings: HashMap<(Uuid, String), Holding>,
    transactions: HashMap<Uuid, Vec<Transaction>>,
}

impl PortfolioBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> SharedPortfolio {
        Arc::new(RwLock::new(Self::new()))
    }

    /// Add to (or open) a holding. Average price is the quantity-weighted
    /// mean of the old basis and the fill.
    pub fn record_buy(
        &mut self,
        user_id: Uuid,
        symbol: &str,
        asset_class: AssetClass,
        quantity: Decimal,
        price: Decimal,
    ) -> Result<(Holding, Transaction), HoldingError> {
        validate_fill(quantity, price)?;
        let total = fill_total(quantity, price)?;
        let key = (user_id, symbol.to_string());
        let now = Utc::now();

        let holding = match self.holdings.get(&key) {
            Some(existing) => {
                let new_qty = existing
                    .quantity
                    .checked_add(quantity)
                    .ok_or(HoldingError::Overflow)?;
                let new_avg = fill_total(existing.quantity, existing.average_price)?
                    .checked_add(total)
                    .and_then(|basis| basis.checked_div(new_qty))
                    .ok_or(HoldingError::Overflow)?;
                Holding {
                    quantity: new_qty,
                    average_price: new_avg,
                    updated_at: now,
                    ..existing.clone()
                }
            }
            None => Holding {
                user_id,
                symbol: symbol.to_string(),
                asset_class,
                quantity,
                average_price: price,
                updated_at: now,
            },
        };
        self.holdings.insert(key, holding.clone());

        let transaction = Transaction {
            id: Uuid::new_v4(),
            user_id,
            symbol: symbol.to_string(),
            asset_class: holding.asset_class,
            side: TradeSide::Buy,
            quantity,
            price,
            total,
            realized_pnl: None,
            created_at: now,
        };
        self.push_transaction(transaction.clone());
        Ok((holding, transaction))
    }

    /// Reduce a holding. The average price of the remainder is unchanged;
    /// the holding is removed once its quantity reaches zero.
    pub fn record_sell(
        &mut self,
        user_id: Uuid,
        symbol: &str,
        quantity: Decimal,
        price: Decimal,
    ) -> Result<SellOutcome, HoldingError> {
        validate_fill(quantity, price)?;
        let total = fill_total(quantity, price)?;
        let key = (user_id, symbol.to_string());
        let existing = self
            .holdings
            .get(&key)
            .cloned()
            .ok_or_else(|| HoldingError::NotHeld(symbol.to_string()))?;

        if quantity > existing.quantity {
            return Err(HoldingError::InsufficientQuantity {
                symbol: symbol.to_string(),
                requested: quantity,
                held: existing.quantity,
            });
        }

        let realized_pnl = price
            .checked_sub(existing.average_price)
            .and_then(|per_unit| per_unit.checked_mul(quantity))
            .ok_or(HoldingError::Overflow)?;

        let now = Utc::now();
        let remaining = existing.quantity - quantity;
        let holding = if remaining.is_zero() {
            self.holdings.remove(&key);
            None
        } else {
            let updated = Holding {
                quantity: remaining,
                updated_at: now,
                ..existing.clone()
            };
            self.holdings.insert(key, updated.clone());
            Some(updated)
        };

        let transaction = Transaction {
            id: Uuid::new_v4(),
            user_id,
            symbol: symbol.to_string(),
            asset_class: existing.asset_class,
            side: TradeSide::Sell,
            quantity,
            price,
            total,
            realized_pnl: Some(realized_pnl),
            created_at: now,
        };
        self.push_transaction(transaction.clone());
        Ok(SellOutcome {
            holding,
            transaction,
        })
    }

    /// Drop a holding without recording a transaction.
    pub fn remove_holding(&mut self, user_id: Uuid, symbol: &str) -> Option<Holding> {
        self.holdings.remove(&(user_id, symbol.to_string()))
    }

    /// Holdings for a user sorted by symbol, optionally filtered.
    pub fn holdings_for(&self, user_id: Uuid, symbol_filter: Option<&str>) -> Vec<Holding> {
        let mut out: Vec<Holding> = self
            .holdings
            .iter()
            .filter(|((uid, sym), _)| *uid == user_id && symbol_filter.is_none_or(|s| sym == s))
            .map(|(_, h)| h.clone())
            .collect();
        out.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        out
    }

    /// Most recent first.
    pub fn transactions_for(&self, user_id: Uuid, limit: usize) -> Vec<Transaction> {
        self.transactions
            .get(&user_id)
            .map(|txs| txs.iter().rev().take(limit).cloned().collect())
            .unwrap_or_default()
    }

    /// Every (asset_class, symbol) held by anyone.
    pub fn held_symbols(&self) -> Vec<(AssetClass, String)> {
        let mut out: Vec<(AssetClass, String)> = self
            .holdings
            .values()
            .map(|h| (h.asset_class, h.symbol.clone()))
            .collect();
        out.sort_by(|a, b| a.1.cmp(&b.1).then((a.0 as u8).cmp(&(b.0 as u8))));
        out.dedup();
        out
    }

    /// Load a persisted holding (hydration).
    pub fn restore_holding(&mut self, holding: Holding) {
        self.holdings
            .insert((holding.user_id, holding.symbol.clone()), holding);
    }

    /// Load a persisted transaction (hydration). Callers restore in
    /// chronological order.
    pub fn restore_transaction(&mut self, transaction: Transaction) {
        self.push_transaction(transaction);
    }

    fn push_transaction(&mut self, transaction: Transaction) {
        self.transactions
            .entry(transaction.user_id)
            .or_default()
            .push(transaction);
    }
}

fn validate_fill(quantity: Decimal, price: Decimal) -> Result<(), HoldingError> {
    if quantity <= Decimal::ZERO {
        return Err(HoldingError::InvalidQuantity);
    }
    if price <= Decimal::ZERO {
        return Err(HoldingError::InvalidPrice);
    }
    Ok(())
}

fn fill_total(quantity: Decimal, price: Decimal) -> Result<Decimal, HoldingError> {
    quantity.checked_mul(price).ok_or(HoldingError::Overflow)
}

/// `part / whole * 100` rounded to 2dp. Zero when `whole` is zero or the
/// ratio is out of range.
pub fn percent_of(part: Decimal, whole: Decimal) -> Decimal {
    part.checked_div(whole)
        .and_then(|ratio| ratio.checked_mul(Decimal::ONE_HUNDRED))
        .map(|pct| pct.round_dp(2))
        .unwrap_or_default()
}

/// Mark a holding to `current_price`. Without a price the holding is valued
/// at cost and flagged stale.
pub fn valuate(holding: &Holding, current_price: Option<Decimal>) -> HoldingValuation {
    let stale = current_price.is_none();
    let price = current_price.unwrap_or(holding.average_price);
    // Quotes come from upstream; saturate rather than trust their magnitude.
    let market_value = price.saturating_mul(holding.quantity);
    let cost_basis = holding.average_price.saturating_mul(holding.quantity);
    let unrealized_pnl = market_value.saturating_sub(cost_basis);
    HoldingValuation {
        symbol: holding.symbol.clone(),
        asset_class: holding.asset_class,
        quantity: holding.quantity,
        average_price: holding.average_price,
        current_price: price,
        market_value,
        cost_basis,
        unrealized_pnl,
        pnl_percent: percent_of(unrealized_pnl, cost_basis),
        stale,
    }
}

/// Totals and allocation by asset class. `prices` is keyed by symbol.
pub fn portfolio_summary(
    holdings: &[Holding],
    prices: &HashMap<String, Decimal>,
) -> PortfolioSummary {
    let valuations: Vec<HoldingValuation> = holdings
        .iter()
        .map(|h| valuate(h, prices.get(&h.symbol).copied()))
        .collect();

    let total_market_value = valuations
        .iter()
        .fold(Decimal::ZERO, |acc, v| acc.saturating_add(v.market_value));
    let total_cost_basis = valuations
        .iter()
        .fold(Decimal::ZERO, |acc, v| acc.saturating_add(v.cost_basis));
    let total_unrealized_pnl = total_market_value.saturating_sub(total_cost_basis);

    let mut by_class: HashMap<AssetClass, Decimal> = HashMap::new();
    for v in &valuations {
        let slot = by_class.entry(v.asset_class).or_default();
        *slot = slot.saturating_add(v.market_value);
    }
    let mut allocation: Vec<AllocationSlice> = by_class
        .into_iter()
        .map(|(asset_class, market_value)| AllocationSlice {
            asset_class,
            market_value,
            percent: percent_of(market_value, total_market_value),
        })
        .collect();
    allocation.sort_by(|a, b| b.market_value.cmp(&a.market_value));

    PortfolioSummary {
        holdings: valuations,
        total_market_value,
        total_cost_basis,
        total_unrealized_pnl,
        total_pnl_percent: percent_of(total_unrealized_pnl, total_cost_basis),
        allocation,
    }
}
