//! Position state and closed trades.

use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    /// +1 for long, -1 for short.
    pub fn sign(&self) -> f64 {
        match self {
            Direction::Long => 1.0,
            Direction::Short => -1.0,
        }
    }
}

/// Position held by the single simulated account.
///
/// `since` is the index of the bar whose signal opened the position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PositionState {
    #[default]
    Flat,
    Long { since: usize },
    Short { since: usize },
}

impl PositionState {
    pub fn open(direction: Direction, since: usize) -> Self {
        match direction {
            Direction::Long => PositionState::Long { since },
            Direction::Short => PositionState::Short { since },
        }
    }

    pub fn direction(&self) -> Option<Direction> {
        match self {
            PositionState::Flat => None,
            PositionState::Long { .. } => Some(Direction::Long),
            PositionState::Short { .. } => Some(Direction::Short),
        }
    }

    pub fn is_flat(&self) -> bool {
        matches!(self, PositionState::Flat)
    }

    /// Bars elapsed since the opening signal, as seen from bar `index`.
    /// `None` when flat or when `index` precedes the opening signal.
    pub fn bars_held(&self, index: usize) -> Option<usize> {
        match self {
            PositionState::Flat => None,
            PositionState::Long { since } | PositionState::Short { since } => {
                index.checked_sub(*since)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TradeOutcome {
    Normal,
    /// Still open when the series ended; closed at the last close.
    ForcedClose,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExitReason {
    Rule,
    StopLoss,
    EndOfData,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trade {
    pub entry_index: usize,
    pub exit_index: usize,
    pub entry_time: DateTime<Utc>,
    pub exit_time: DateTime<Utc>,
    pub direction: Direction,
    pub entry_price: f64,
    pub exit_price: f64,
    pub size: f64,
    pub pnl: f64,
    pub outcome: TradeOutcome,
    pub exit_reason: ExitReason,
}

impl Trade {
    pub fn is_forced_close(&self) -> bool {
        self.outcome == TradeOutcome::ForcedClose
    }

    pub fn bars_held(&self) -> usize {
        self.exit_index - self.entry_index
    }
}
