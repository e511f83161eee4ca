//! Fill simulation.
//!
//! Prices are adjusted for half the bid/ask spread on each side and trades
//! are charged a commission on entry and on exit.

use crate::domain::backtest::BacktestConfig;
use crate::domain::position::Direction;

/// Calculate commission: flat_fee + (trade_value * pct / 100).
pub fn calculate_commission(trade_value: f64, config: &BacktestConfig) -> f64 {
    config.commission_per_trade + (trade_value.abs() * config.commission_pct / 100.0)
}

/// Entry fill: a long buys at the ask (mid + spread/2), a short sells at the
/// bid (mid - spread/2).
pub fn apply_spread_entry(market_price: f64, direction: Direction, spread: f64) -> f64 {
    market_price + direction.sign() * spread / 2.0
}

/// Exit fill: a long sells at the bid, a short buys back at the ask.
pub fn apply_spread_exit(market_price: f64, direction: Direction, spread: f64) -> f64 {
    market_price - direction.sign() * spread / 2.0
}

/// Unrealized P&L of an open position valued at `price`.
pub fn mark_to_market(entry_price: f64, price: f64, direction: Direction, size: f64) -> f64 {
    (price - entry_price) * direction.sign() * size
}

/// An open position as the backtester tracks it.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct OpenPosition {
    pub direction: Direction,
    pub entry_index: usize,
    pub entry_price: f64,
    pub size: f64,
    pub entry_commission: f64,
}

/// Open a position of `size` units at `market_price` on bar `index`.
pub(crate) fn enter(
    direction: Direction,
    market_price: f64,
    index: usize,
    size: f64,
    config: &BacktestConfig,
) -> OpenPosition {
    let entry_price = apply_spread_entry(market_price, direction, config.spread);
    OpenPosition {
        direction,
        entry_index: index,
        entry_price,
        size,
        entry_commission: calculate_commission(entry_price * size, config),
    }
}

/// Close a position at `market_price`. Returns (exit price, realized P&L net
/// of both commissions).
pub(crate) fn exit(
    position: &OpenPosition,
    market_price: f64,
    config: &BacktestConfig,
) -> (f64, f64) {
    let exit_price = apply_spread_exit(market_price, position.direction, config.spread);
    let exit_commission = calculate_commission(exit_price * position.size, config);
    let gross = mark_to_market(position.entry_price, exit_price, position.direction, position.size);
    (exit_price, gross - position.entry_commission - exit_commission)
}
