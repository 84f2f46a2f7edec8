//! Paper-trading engine for leveraged crypto futures: open, close, mark,
//! liquidate. Balances are virtual USDT. Testable without HTTP.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::holdings::percent_of;
use crate::types::futures::{
    AccountSummary, FuturesPosition, PositionMark, PositionSide, PositionStatus,
};

pub type SharedFutures = Arc<RwLock<FuturesBook>>;

pub const MAX_LEVERAGE: u32 = 125;

/// Maintenance margin rate (0.5%).
pub fn maintenance_margin_rate() -> Decimal {
    Decimal::new(5, 3)
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FuturesError {
    #[error("quantity must be greater than zero")]
    InvalidQuantity,
    #[error("price must be greater than zero")]
    InvalidPrice,
    #[error("leverage must be between 1 and {MAX_LEVERAGE}")]
    InvalidLeverage,
    #[error("insufficient balance: margin {required} exceeds available {available}")]
    InsufficientBalance {
        required: Decimal,
        available: Decimal,
    },
    #[error("position not found")]
    NotFound,
    #[error("position is already {0}")]
    NotOpen(&'static str),
    #[error("close quantity exceeds position size {0}")]
    CloseExceedsPosition(Decimal),
    #[error("order size is out of range")]
    Overflow,
}

/// P&L of `quantity` units moved from `entry` to `exit`. `None` when the
/// result does not fit in a `Decimal`.
pub fn pnl_for(
    side: PositionSide,
    entry: Decimal,
    exit: Decimal,
    quantity: Decimal,
) -> Option<Decimal> {
    let move_per_unit = match side {
        PositionSide::Long => exit.checked_sub(entry)?,
        PositionSide::Short => entry.checked_sub(exit)?,
    };
    move_per_unit.checked_mul(quantity)
}

/// Unrealized P&L of an open position at `mark`.
pub fn unrealized_pnl(position: &FuturesPosition, mark: Decimal) -> Option<Decimal> {
    pnl_for(position.side, position.entry_price, mark, position.quantity)
}

/// Return on margin in percent, zero when the P&L is out of range.
pub fn roe_percent(position: &FuturesPosition, mark: Decimal) -> Decimal {
    unrealized_pnl(position, mark)
        .map(|pnl| percent_of(pnl, position.margin))
        .unwrap_or_default()
}

/// `quantity * price / leverage`.
pub fn initial_margin(
    quantity: Decimal,
    price: Decimal,
    leverage: u32,
) -> Result<Decimal, FuturesError> {
    quantity
        .checked_mul(price)
        .and_then(|notional| notional.checked_div(Decimal::from(leverage)))
        .ok_or(FuturesError::Overflow)
}

/// Price at which remaining margin falls to the maintenance requirement.
/// Long: `entry * (1 - 1/lev + mmr)`, short: `entry * (1 + 1/lev - mmr)`.
pub fn liquidation_price(
    side: PositionSide,
    entry: Decimal,
    leverage: u32,
) -> Result<Decimal, FuturesError> {
    let inverse = Decimal::ONE / Decimal::from(leverage.max(1));
    let mmr = maintenance_margin_rate();
    let factor = match side {
        PositionSide::Long => Decimal::ONE - inverse + mmr,
        PositionSide::Short => Decimal::ONE + inverse - mmr,
    };
    entry
        .checked_mul(factor)
        .map(|price| price.round_dp(8))
        .ok_or(FuturesError::Overflow)
}

pub fn should_liquidate(position: &FuturesPosition, mark: Decimal) -> bool {
    match position.side {
        PositionSide::Long => mark <= position.liquidation_price,
        PositionSide::Short => mark >= position.liquidation_price,
    }
}

pub fn validate_order(quantity: Decimal, price: Decimal, leverage: u32) -> Result<(), FuturesError> {
    if quantity <= Decimal::ZERO {
        return Err(FuturesError::InvalidQuantity);
    }
    if price <= Decimal::ZERO {
        return Err(FuturesError::InvalidPrice);
    }
    if leverage == 0 || leverage > MAX_LEVERAGE {
        return Err(FuturesError::InvalidLeverage);
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub struct OpenOutcome {
    pub position: FuturesPosition,
    /// The order was added to an existing open position.
    pub merged: bool,
}

#[derive(Debug, Clone)]
pub struct CloseOutcome {
    pub position: FuturesPosition,
    pub realized_pnl: Decimal,
    /// Credited back to the balance: released margin plus P&L, floored at zero.
    pub credited: Decimal,
}

pub struct FuturesBook {
    positions: HashMap<Uuid, FuturesPosition>,
    balances: HashMap<Uuid, Decimal>,
    initial_balance: Decimal,
}

impl FuturesBook {
    pub fn new(initial_balance: Decimal) -> Self {
        Self {
            positions: HashMap::new(),
            balances: HashMap::new(),
            initial_balance,
        }
    }

    pub fn shared(initial_balance: Decimal) -> SharedFutures {
        Arc::new(RwLock::new(Self::new(initial_balance)))
    }

    pub fn initial_balance(&self) -> Decimal {
        self.initial_balance
    }

    /// Available (unlocked) balance. Users start with the initial balance.
    pub fn balance(&self, user_id: Uuid) -> Decimal {
        self.balances
            .get(&user_id)
            .copied()
            .unwrap_or(self.initial_balance)
    }

    fn balance_mut(&mut self, user_id: Uuid) -> &mut Decimal {
        self.balances.entry(user_id).or_insert(self.initial_balance)
    }

    /// Open a position, or add to an open one with the same symbol, side and
    /// leverage (entry price becomes the quantity-weighted average).
    pub fn open(
        &mut self,
        user_id: Uuid,
        symbol: &str,
        side: PositionSide,
        quantity: Decimal,
        price: Decimal,
        leverage: u32,
    ) -> Result<OpenOutcome, FuturesError> {
        validate_order(quantity, price, leverage)?;
        let margin = initial_margin(quantity, price, leverage)?;
        let available = self.balance(user_id);
        if margin > available {
            return Err(FuturesError::InsufficientBalance {
                required: margin,
                available,
            });
        }

        let existing = self.positions.values_mut().find(|p| {
            p.is_open()
                && p.user_id == user_id
                && p.symbol == symbol
                && p.side == side
                && p.leverage == leverage
        });

        // Everything fallible runs before the balance or the position changes.
        let outcome = match existing {
            Some(pos) => {
                let new_qty = pos
                    .quantity
                    .checked_add(quantity)
                    .ok_or(FuturesError::Overflow)?;
                let entry_price = pos
                    .entry_price
                    .checked_mul(pos.quantity)
                    .zip(price.checked_mul(quantity))
                    .and_then(|(old, new)| old.checked_add(new))
                    .and_then(|weighted| weighted.checked_div(new_qty))
                    .ok_or(FuturesError::Overflow)?;
                let liq = liquidation_price(side, entry_price, leverage)?;
                let total_margin = pos
                    .margin
                    .checked_add(margin)
                    .ok_or(FuturesError::Overflow)?;
                pos.entry_price = entry_price;
                pos.quantity = new_qty;
                pos.margin = total_margin;
                pos.liquidation_price = liq;
                OpenOutcome {
                    position: pos.clone(),
                    merged: true,
                }
            }
            None => {
                let pos = FuturesPosition {
                    id: Uuid::new_v4(),
                    user_id,
                    symbol: symbol.to_string(),
                    side,
                    quantity,
                    entry_price: price,
                    leverage,
                    margin,
                    liquidation_price: liquidation_price(side, price, leverage)?,
                    status: PositionStatus::Open,
                    exit_price: None,
                    realized_pnl: None,
                    opened_at: Utc::now(),
                    closed_at: None,
                };
                self.positions.insert(pos.id, pos.clone());
                OpenOutcome {
                    position: pos,
                    merged: false,
                }
            }
        };
        *self.balance_mut(user_id) -= margin;
        Ok(outcome)
    }

    /// Close all of a position (`quantity = None`) or part of it at `price`.
    pub fn close(
        &mut self,
        user_id: Uuid,
        position_id: Uuid,
        price: Decimal,
        quantity: Option<Decimal>,
    ) -> Result<CloseOutcome, FuturesError> {
        if price <= Decimal::ZERO {
            return Err(FuturesError::InvalidPrice);
        }
        let pos = self
            .positions
            .get_mut(&position_id)
            .filter(|p| p.user_id == user_id)
            .ok_or(FuturesError::NotFound)?;
        if !pos.is_open() {
            return Err(FuturesError::NotOpen(pos.status.as_str()));
        }

        let close_qty = quantity.unwrap_or(pos.quantity);
        if close_qty <= Decimal::ZERO {
            return Err(FuturesError::InvalidQuantity);
        }
        if close_qty > pos.quantity {
            return Err(FuturesError::CloseExceedsPosition(pos.quantity));
        }

        let pnl = pnl_for(pos.side, pos.entry_price, price, close_qty)
            .ok_or(FuturesError::Overflow)?;
        let released = if close_qty == pos.quantity {
            pos.margin
        } else {
            pos.margin
                .checked_mul(close_qty)
                .and_then(|m| m.checked_div(pos.quantity))
                .ok_or(FuturesError::Overflow)?
        };
        let credited = released
            .checked_add(pnl)
            .ok_or(FuturesError::Overflow)?
            .max(Decimal::ZERO);
        let realized = pos
            .realized_pnl
            .unwrap_or_default()
            .checked_add(pnl)
            .ok_or(FuturesError::Overflow)?;
        let balance = self
            .balances
            .get(&user_id)
            .copied()
            .unwrap_or(self.initial_balance)
            .checked_add(credited)
            .ok_or(FuturesError::Overflow)?;

        pos.realized_pnl = Some(realized);
        if close_qty == pos.quantity {
            pos.status = PositionStatus::Closed;
            pos.exit_price = Some(price);
            pos.closed_at = Some(Utc::now());
        } else {
            pos.quantity -= close_qty;
            pos.margin -= released;
        }
        let position = pos.clone();
        self.balances.insert(user_id, balance);

        Ok(CloseOutcome {
            position,
            realized_pnl: pnl,
            credited,
        })
    }

    /// Liquidate every open position whose symbol's mark crossed its
    /// liquidation price. The margin is forfeited.
    pub fn sweep_liquidations(&mut self, marks: &HashMap<String, Decimal>) -> Vec<FuturesPosition> {
        let now = Utc::now();
        let mut liquidated = Vec::new();
        for pos in self.positions.values_mut().filter(|p| p.is_open()) {
            let Some(&mark) = marks.get(&pos.symbol) else {
                continue;
            };
            if should_liquidate(pos, mark) {
                pos.status = PositionStatus::Liquidated;
                pos.exit_price = Some(mark);
                pos.realized_pnl = Some(
                    pos.realized_pnl
                        .unwrap_or_default()
                        .saturating_sub(pos.margin),
                );
                pos.closed_at = Some(now);
                liquidated.push(pos.clone());
            }
        }
        liquidated
    }

    /// Wipe a user's positions and restore the initial balance. Returns the
    /// ids removed.
    pub fn reset(&mut self, user_id: Uuid) -> Vec<Uuid> {
        let ids: Vec<Uuid> = self
            .positions
            .values()
            .filter(|p| p.user_id == user_id)
            .map(|p| p.id)
            .collect();
        for id in &ids {
            self.positions.remove(id);
        }
        self.balances.insert(user_id, self.initial_balance);
        ids
    }

    /// Newest first, optionally filtered by status.
    pub fn positions_for(
        &self,
        user_id: Uuid,
        status: Option<PositionStatus>,
    ) -> Vec<FuturesPosition> {
        let mut out: Vec<FuturesPosition> = self
            .positions
            .values()
            .filter(|p| p.user_id == user_id && status.is_none_or(|s| p.status == s))
            .cloned()
            .collect();
        out.sort_by(|a, b| b.opened_at.cmp(&a.opened_at));
        out
    }

    pub fn get(&self, user_id: Uuid, position_id: Uuid) -> Option<FuturesPosition> {
        self.positions
            .get(&position_id)
            .filter(|p| p.user_id == user_id)
            .cloned()
    }

    /// Symbols with at least one open position.
    pub fn open_symbols(&self) -> Vec<String> {
        let mut out: Vec<String> = self
            .positions
            .values()
            .filter(|p| p.is_open())
            .map(|p| p.symbol.clone())
            .collect();
        out.sort();
        out.dedup();
        out
    }

    /// Balance, locked margin, and mark-to-market of open positions. Symbols
    /// missing from `marks` contribute zero unrealized P&L.
    pub fn account_summary(
        &self,
        user_id: Uuid,
        marks: &HashMap<String, Decimal>,
    ) -> AccountSummary {
        let positions: Vec<PositionMark> = self
            .positions_for(user_id, Some(PositionStatus::Open))
            .into_iter()
            .map(|p| {
                let mark = marks.get(&p.symbol).copied();
                let (pnl, roe) = match mark {
                    Some(m) => (
                        unrealized_pnl(&p, m).unwrap_or_default(),
                        roe_percent(&p, m),
                    ),
                    None => (Decimal::ZERO, Decimal::ZERO),
                };
                PositionMark {
                    position: p,
                    mark_price: mark,
                    unrealized_pnl: pnl,
                    roe_percent: roe,
                }
            })
            .collect();

        let balance = self.balance(user_id);
        let used_margin = positions
            .iter()
            .fold(Decimal::ZERO, |acc, m| acc.saturating_add(m.position.margin));
        let unrealized = positions
            .iter()
            .fold(Decimal::ZERO, |acc, m| acc.saturating_add(m.unrealized_pnl));
        AccountSummary {
            balance,
            used_margin,
            unrealized_pnl: unrealized,
            equity: balance.saturating_add(used_margin).saturating_add(unrealized),
            positions,
        }
    }

    pub fn restore_position(&mut self, position: FuturesPosition) {
        self.positions.insert(position.id, position);
    }

    pub fn restore_balance(&mut self, user_id: Uuid, balance: Decimal) {
        self.balances.insert(user_id, balance);
    }
}
