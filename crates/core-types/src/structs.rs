use crate::enums::TradeDirection;
use crate::timeframe::Timeframe;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;

/// A single timestamped price observation, as appended by the ingestion
/// collaborator. The engine only ever reads these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Tick {
    pub symbol: String,
    pub price: f64,
    pub volume: f64,
    pub ts: DateTime<Utc>,
}

/// A fixed-interval aggregation of ticks: the close is the last price seen
/// in the interval, volume is the sum. Bars are derived and recomputable;
/// they are cached in memory per processing cycle, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub symbol: String,
    pub timeframe: Timeframe,
    /// Interval start, aligned to the timeframe boundary.
    pub ts: DateTime<Utc>,
    pub close: f64,
    pub volume: f64,
}

/// A configured (dependent, independent) symbol pairing. `y` is regressed
/// on `x` when estimating the hedge ratio.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SymbolPair {
    pub y: String,
    pub x: String,
}

impl fmt::Display for SymbolPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.y, self.x)
    }
}

/// One row of pair analytics at one bar timestamp.
///
/// `None` fields mean "not enough history for this window at this point",
/// never a computation failure. Rows are append-only and unique on
/// `(pair_y, pair_x, timeframe, ts)`; reprocessing an overlapping range must
/// not rewrite them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct AnalyticsRecord {
    pub pair_y: String,
    pub pair_x: String,
    pub timeframe: String,
    pub ts: DateTime<Utc>,
    pub hedge_ratio: Option<f64>,
    pub spread: Option<f64>,
    pub zscore: Option<f64>,
    pub correlation: Option<f64>,
    pub volatility: Option<f64>,
    pub adf_pvalue: Option<f64>,
    pub is_stationary: Option<bool>,
}

/// A closed round trip produced by the backtest simulator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeEvent {
    pub direction: TradeDirection,
    pub entry_ts: DateTime<Utc>,
    pub exit_ts: DateTime<Utc>,
    pub entry_spread: f64,
    pub exit_spread: f64,
    pub pnl: f64,
    /// `pnl / |entry_spread| * 100`; absent when the entry spread was zero.
    pub return_pct: Option<f64>,
}
