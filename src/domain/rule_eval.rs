//! Rule evaluation over a causal window.
//!
//! A `CausalWindow` is the only view of the data a rule gets. It holds the
//! bars up to and including the current index and reads indicator values by
//! look-back offset, so there is no way to ask for a later bar.
//!
//! # Evaluation Semantics
//!
//! - Comparison rules: evaluated at the current bar; an undefined operand
//!   makes the comparison false
//! - `CROSS_ABOVE`/`CROSS_BELOW`/`BREAKOUT_*`: need the previous bar, false at
//!   index 0
//! - `AND`: Short-circuits on first `false`
//! - `OR`: Short-circuits on first `true`
//! - `CONSECUTIVE(rule, N)`: Child must be true for N consecutive bars ending at current
//! - `ANY_OF(rule, N)`: Child must be true at least once in the last N bars
//! - `HELD_FOR(N)`: a position is open and was opened at least N bars ago

use crate::domain::indicator::{IndicatorSet, IndicatorType, IndicatorValue};
use crate::domain::ohlcv::Bar;
use crate::domain::position::PositionState;
use crate::domain::rule::{IndicatorField, IndicatorRef, Operand, Rule};

const EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy)]
pub struct CausalWindow<'a> {
    bars: &'a [Bar],
    indicators: &'a IndicatorSet,
    position: PositionState,
}

impl<'a> CausalWindow<'a> {
    /// Window ending at `index`. Bars after `index` are cut off here.
    pub(crate) fn new(
        bars: &'a [Bar],
        indicators: &'a IndicatorSet,
        index: usize,
        position: PositionState,
    ) -> Self {
        CausalWindow {
            bars: &bars[..=index],
            indicators,
            position,
        }
    }

    pub fn index(&self) -> usize {
        self.bars.len() - 1
    }

    /// Bars `0..=index`.
    pub fn bars(&self) -> &'a [Bar] {
        self.bars
    }

    pub fn current(&self) -> &'a Bar {
        &self.bars[self.bars.len() - 1]
    }

    /// Bar `offset` steps back from the current one (0 = current).
    pub fn bar(&self, offset: usize) -> Option<&'a Bar> {
        let idx = self.index().checked_sub(offset)?;
        self.bars.get(idx)
    }

    pub fn position(&self) -> PositionState {
        self.position
    }

    pub fn bars_held(&self) -> Option<usize> {
        self.position.bars_held(self.index())
    }

    /// Indicator value `offset` bars back; `None` during warm-up or when the
    /// indicator was not computed for this run.
    pub fn indicator(
        &self,
        indicator: &IndicatorType,
        offset: usize,
    ) -> Option<&'a IndicatorValue> {
        let idx = self.index().checked_sub(offset)?;
        self.indicators.get(indicator)?.get(idx)
    }

    pub fn indicator_field(&self, ind_ref: &IndicatorRef, offset: usize) -> Option<f64> {
        let value = self.indicator(&ind_ref.indicator_type, offset)?;
        extract_field(value, ind_ref.field)
    }

    pub fn operand(&self, operand: &Operand, offset: usize) -> Option<f64> {
        let bar = self.bar(offset)?;
        match operand {
            Operand::Open => Some(bar.open),
            Operand::High => Some(bar.high),
            Operand::Low => Some(bar.low),
            Operand::Close => Some(bar.close),
            Operand::Volume => Some(bar.volume),
            Operand::Constant(v) => Some(*v),
            Operand::Indicator(ind_ref) => self.indicator_field(ind_ref, offset),
        }
    }

    /// The same window seen `back` bars earlier. Position state is kept, so
    /// `bars_held` is measured from the earlier index.
    pub fn shifted(&self, back: usize) -> Option<CausalWindow<'a>> {
        let len = self.bars.len().checked_sub(back)?;
        if len == 0 {
            return None;
        }
        Some(CausalWindow {
            bars: &self.bars[..len],
            indicators: self.indicators,
            position: self.position,
        })
    }
}

fn extract_field(value: &IndicatorValue, field: IndicatorField) -> Option<f64> {
    match (value, field) {
        (IndicatorValue::Simple(v), IndicatorField::Value) => Some(*v),
        (IndicatorValue::Macd { line, .. }, IndicatorField::MacdLine) => Some(*line),
        (IndicatorValue::Macd { signal, .. }, IndicatorField::MacdSignal) => Some(*signal),
        (IndicatorValue::Macd { histogram, .. }, IndicatorField::MacdHistogram) => {
            Some(*histogram)
        }
        (IndicatorValue::Stochastic { k, .. }, IndicatorField::StochasticK) => Some(*k),
        (IndicatorValue::Stochastic { d, .. }, IndicatorField::StochasticD) => Some(*d),
        (IndicatorValue::Bollinger { upper, .. }, IndicatorField::BollingerUpper) => Some(*upper),
        (IndicatorValue::Bollinger { middle, .. }, IndicatorField::BollingerMiddle) => {
            Some(*middle)
        }
        (IndicatorValue::Bollinger { lower, .. }, IndicatorField::BollingerLower) => Some(*lower),
        (IndicatorValue::Ichimoku { tenkan, .. }, IndicatorField::IchimokuTenkan) => Some(*tenkan),
        (IndicatorValue::Ichimoku { kijun, .. }, IndicatorField::IchimokuKijun) => Some(*kijun),
        (IndicatorValue::Ichimoku { senkou_a, .. }, IndicatorField::IchimokuSenkouA) => {
            Some(*senkou_a)
        }
        (IndicatorValue::Ichimoku { senkou_b, .. }, IndicatorField::IchimokuSenkouB) => {
            Some(*senkou_b)
        }
        _ => None,
    }
}

fn compare(
    window: &CausalWindow<'_>,
    left: &Operand,
    right: &Operand,
    offset: usize,
    op: impl Fn(f64, f64) -> bool,
) -> bool {
    match (window.operand(left, offset), window.operand(right, offset)) {
        (Some(l), Some(r)) => op(l, r),
        _ => false,
    }
}

fn inside_band(
    window: &CausalWindow<'_>,
    operand: &Operand,
    upper: &Operand,
    lower: &Operand,
    offset: usize,
) -> Option<bool> {
    let v = window.operand(operand, offset)?;
    let hi = window.operand(upper, offset)?;
    let lo = window.operand(lower, offset)?;
    Some(v >= lo && v <= hi)
}

pub fn evaluate(rule: &Rule, window: &CausalWindow<'_>) -> bool {
    match rule {
        Rule::CrossAbove { left, right } => {
            window.index() >= 1
                && compare(window, left, right, 0, |l, r| l > r)
                && compare(window, left, right, 1, |l, r| l <= r)
        }
        Rule::CrossBelow { left, right } => {
            window.index() >= 1
                && compare(window, left, right, 0, |l, r| l < r)
                && compare(window, left, right, 1, |l, r| l >= r)
        }
        Rule::Above { left, right } => compare(window, left, right, 0, |l, r| l > r),
        Rule::Below { left, right } => compare(window, left, right, 0, |l, r| l < r),
        Rule::Between {
            operand,
            lower,
            upper,
        } => window
            .operand(operand, 0)
            .is_some_and(|v| v >= *lower && v <= *upper),
        Rule::Equals { left, right } => {
            compare(window, left, right, 0, |l, r| (l - r).abs() < EPSILON)
        }
        Rule::BreakoutUpper {
            operand,
            upper,
            lower,
        } => {
            window.index() >= 1
                && compare(window, operand, upper, 0, |v, hi| v > hi)
                && inside_band(window, operand, upper, lower, 1) == Some(true)
        }
        Rule::BreakoutLower {
            operand,
            upper,
            lower,
        } => {
            window.index() >= 1
                && compare(window, operand, lower, 0, |v, lo| v < lo)
                && inside_band(window, operand, upper, lower, 1) == Some(true)
        }
        Rule::And(rules) => rules.iter().all(|r| evaluate(r, window)),
        Rule::Or(rules) => rules.iter().any(|r| evaluate(r, window)),
        Rule::Not(rule) => !evaluate(rule, window),
        Rule::Consecutive { rule, count } => {
            if *count == 0 || window.index() + 1 < *count {
                return false;
            }
            (0..*count).all(|back| {
                window
                    .shifted(back)
                    .is_some_and(|w| evaluate(rule, &w))
            })
        }
        Rule::AnyOf { rule, count } => (0..*count).any(|back| {
            window
                .shifted(back)
                .is_some_and(|w| evaluate(rule, &w))
        }),
        Rule::HeldFor(bars) => window.bars_held().is_some_and(|held| held >= *bars),
        Rule::Custom(custom) => custom.call(window),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::indicator::test_support::make_bars;
    use crate::domain::indicator::{IndicatorSet, PriceSource};
    use crate::domain::position::Direction;
    use crate::domain::rule::CustomRule;
    use crate::domain::timeseries::Timeseries;

    fn sma(period: usize) -> IndicatorType {
        IndicatorType::Sma {
            period,
            source: PriceSource::Close,
        }
    }

    fn sma_op(period: usize) -> Operand {
        Operand::Indicator(IndicatorRef::value(sma(period)))
    }

    fn setup(prices: &[f64], indicators: &[IndicatorType]) -> (Timeseries, IndicatorSet) {
        let ts = Timeseries::new("TEST", make_bars(prices)).unwrap();
        let set = IndicatorSet::compute(&ts, indicators);
        (ts, set)
    }

    fn eval_at(rule: &Rule, ts: &Timeseries, set: &IndicatorSet, idx: usize) -> bool {
        evaluate(rule, &CausalWindow::new(ts.bars(), set, idx, PositionState::Flat))
    }

    #[test]
    fn window_cannot_see_future_bars() {
        let (ts, set) = setup(&[1.0, 2.0, 3.0, 4.0], &[sma(1)]);
        let w = CausalWindow::new(ts.bars(), &set, 1, PositionState::Flat);
        assert_eq!(w.bars().len(), 2);
        assert_eq!(w.current().close, 2.0);
        assert_eq!(w.bar(1).unwrap().close, 1.0);
        assert!(w.bar(2).is_none());
        assert!(w.indicator(&sma(1), 2).is_none());
    }

    #[test]
    fn above_below_constant() {
        let (ts, set) = setup(&[10.0, 20.0], &[]);
        let above = Rule::Above {
            left: Operand::Close,
            right: Operand::Constant(15.0),
        };
        assert!(!eval_at(&above, &ts, &set, 0));
        assert!(eval_at(&above, &ts, &set, 1));
        let below = Rule::Below {
            left: Operand::Close,
            right: Operand::Constant(15.0),
        };
        assert!(eval_at(&below, &ts, &set, 0));
    }

    #[test]
    fn undefined_indicator_is_false() {
        let (ts, set) = setup(&[10.0, 20.0, 30.0], &[sma(3)]);
        let rule = Rule::Above {
            left: Operand::Close,
            right: sma_op(3),
        };
        assert!(!eval_at(&rule, &ts, &set, 1));
        let rule = Rule::Below {
            left: Operand::Close,
            right: sma_op(3),
        };
        assert!(!eval_at(&rule, &ts, &set, 1));
    }

    #[test]
    fn missing_indicator_is_false() {
        let (ts, set) = setup(&[10.0, 20.0], &[]);
        let rule = Rule::Above {
            left: Operand::Close,
            right: sma_op(1),
        };
        assert!(!eval_at(&rule, &ts, &set, 1));
    }

    #[test]
    fn cross_above_detects_transition() {
        // close vs constant 15: 10 -> 20 crosses at bar 1
        let (ts, set) = setup(&[10.0, 20.0, 25.0], &[]);
        let rule = Rule::CrossAbove {
            left: Operand::Close,
            right: Operand::Constant(15.0),
        };
        assert!(!eval_at(&rule, &ts, &set, 0));
        assert!(eval_at(&rule, &ts, &set, 1));
        assert!(!eval_at(&rule, &ts, &set, 2));
    }

    #[test]
    fn cross_below_detects_transition() {
        let (ts, set) = setup(&[20.0, 10.0], &[]);
        let rule = Rule::CrossBelow {
            left: Operand::Close,
            right: Operand::Constant(15.0),
        };
        assert!(eval_at(&rule, &ts, &set, 1));
    }

    #[test]
    fn cross_needs_defined_previous_value() {
        // SMA(2) undefined at bar 0, so no cross can be reported at bar 1
        let (ts, set) = setup(&[10.0, 20.0, 30.0], &[sma(2)]);
        let rule = Rule::CrossAbove {
            left: sma_op(2),
            right: Operand::Constant(5.0),
        };
        assert!(!eval_at(&rule, &ts, &set, 1));
    }

    #[test]
    fn between_inclusive() {
        let (ts, set) = setup(&[10.0, 15.0, 20.0, 21.0], &[]);
        let rule = Rule::Between {
            operand: Operand::Close,
            lower: 10.0,
            upper: 20.0,
        };
        assert!(eval_at(&rule, &ts, &set, 0));
        assert!(eval_at(&rule, &ts, &set, 2));
        assert!(!eval_at(&rule, &ts, &set, 3));
    }

    #[test]
    fn breakout_upper_requires_prior_inside() {
        let (ts, set) = setup(&[15.0, 25.0, 30.0], &[]);
        let rule = Rule::BreakoutUpper {
            operand: Operand::Close,
            upper: Operand::Constant(20.0),
            lower: Operand::Constant(10.0),
        };
        assert!(!eval_at(&rule, &ts, &set, 0));
        assert!(eval_at(&rule, &ts, &set, 1));
        // already outside on the previous bar
        assert!(!eval_at(&rule, &ts, &set, 2));
    }

    #[test]
    fn breakout_lower() {
        let (ts, set) = setup(&[15.0, 5.0], &[]);
        let rule = Rule::BreakoutLower {
            operand: Operand::Close,
            upper: Operand::Constant(20.0),
            lower: Operand::Constant(10.0),
        };
        assert!(eval_at(&rule, &ts, &set, 1));
    }

    #[test]
    fn and_or_not() {
        let (ts, set) = setup(&[15.0], &[]);
        let t = Rule::Above {
            left: Operand::Close,
            right: Operand::Constant(10.0),
        };
        let f = Rule::Above {
            left: Operand::Close,
            right: Operand::Constant(20.0),
        };
        assert!(!eval_at(&Rule::And(vec![t.clone(), f.clone()]), &ts, &set, 0));
        assert!(eval_at(&Rule::Or(vec![t.clone(), f.clone()]), &ts, &set, 0));
        assert!(eval_at(&Rule::Not(Box::new(f)), &ts, &set, 0));
    }

    #[test]
    fn consecutive_and_any_of_look_back_only() {
        let (ts, set) = setup(&[11.0, 12.0, 9.0, 13.0, 14.0], &[]);
        let up = Rule::Above {
            left: Operand::Close,
            right: Operand::Constant(10.0),
        };
        let consecutive = Rule::Consecutive {
            rule: Box::new(up.clone()),
            count: 2,
        };
        assert!(!eval_at(&consecutive, &ts, &set, 0));
        assert!(eval_at(&consecutive, &ts, &set, 1));
        assert!(!eval_at(&consecutive, &ts, &set, 3));
        assert!(eval_at(&consecutive, &ts, &set, 4));

        let down = Rule::Below {
            left: Operand::Close,
            right: Operand::Constant(10.0),
        };
        let any_of = Rule::AnyOf {
            rule: Box::new(down),
            count: 2,
        };
        assert!(!eval_at(&any_of, &ts, &set, 1));
        assert!(eval_at(&any_of, &ts, &set, 3));
        assert!(!eval_at(&any_of, &ts, &set, 4));
    }

    #[test]
    fn held_for_uses_position_state() {
        let (ts, set) = setup(&[1.0, 1.0, 1.0, 1.0], &[]);
        let rule = Rule::HeldFor(2);
        let long = PositionState::open(Direction::Long, 1);
        assert!(!evaluate(&rule, &CausalWindow::new(ts.bars(), &set, 2, long)));
        assert!(evaluate(&rule, &CausalWindow::new(ts.bars(), &set, 3, long)));
        assert!(!evaluate(
            &rule,
            &CausalWindow::new(ts.bars(), &set, 3, PositionState::Flat)
        ));
    }

    #[test]
    fn custom_rule_receives_window() {
        let (ts, set) = setup(&[1.0, 2.0, 3.0], &[]);
        let rising = Rule::Custom(CustomRule::new("rising", |w| {
            match (w.bar(0), w.bar(1)) {
                (Some(cur), Some(prev)) => cur.close > prev.close,
                _ => false,
            }
        }));
        assert!(!eval_at(&rising, &ts, &set, 0));
        assert!(eval_at(&rising, &ts, &set, 2));
    }

    #[test]
    fn multi_value_fields() {
        let macd = IndicatorType::Macd {
            fast: 2,
            slow: 3,
            signal: 2,
        };
        let prices: Vec<f64> = (0..8).map(|i| 1.0 + i as f64).collect();
        let (ts, set) = setup(&prices, &[macd.clone()]);
        let w = CausalWindow::new(ts.bars(), &set, 7, PositionState::Flat);
        let line = w.indicator_field(
            &IndicatorRef {
                indicator_type: macd.clone(),
                field: IndicatorField::MacdLine,
            },
            0,
        );
        assert!(line.is_some_and(|v| v > 0.0));
        let wrong = w.indicator_field(
            &IndicatorRef {
                indicator_type: macd,
                field: IndicatorField::StochasticK,
            },
            0,
        );
        assert!(wrong.is_none());
    }

    #[test]
    fn ichimoku_fields() {
        let cloud = IndicatorType::Ichimoku {
            tenkan: 2,
            kijun: 3,
            senkou_b: 4,
        };
        let prices: Vec<f64> = (1..=20).map(f64::from).collect();
        let (ts, set) = setup(&prices, &[cloud.clone()]);
        let w = CausalWindow::new(ts.bars(), &set, 19, PositionState::Flat);
        let field = |field: IndicatorField| {
            w.indicator_field(
                &IndicatorRef {
                    indicator_type: cloud.clone(),
                    field,
                },
                0,
            )
        };
        assert_eq!(field(IndicatorField::IchimokuTenkan), Some(19.5));
        assert_eq!(field(IndicatorField::IchimokuKijun), Some(19.0));
        assert_eq!(field(IndicatorField::IchimokuSenkouA), Some(16.25));
        // mid(4) as of bar 16: (17 + 14) / 2
        assert_eq!(field(IndicatorField::IchimokuSenkouB), Some(15.5));
        assert_eq!(field(IndicatorField::Value), None);
    }
}
