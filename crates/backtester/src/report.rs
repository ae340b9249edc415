use core_types::{TradeDirection, TradeEvent};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A position still open when the record series ended. Reported instead of
/// being force-closed, unless the run was configured to close at the final
/// point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OpenPosition {
    pub direction: TradeDirection,
    pub entry_ts: DateTime<Utc>,
    pub entry_spread: f64,
    /// Marked against the final computable spread; absent when the series
    /// never produced one after entry.
    pub unrealized_pnl: Option<f64>,
}

/// The aggregated result of one simulator run.
///
/// This struct is the final output of the `Backtester` and the data
/// transfer object for backtest results on the CLI surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestReport {
    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    /// Sum of realized trade pnl, in spread units.
    pub total_pnl: f64,
    pub win_rate_pct: Option<f64>,
    pub average_pnl: Option<f64>,
    /// Mean of per-trade returns relative to entry spread; skips trades
    /// whose entry spread was zero.
    pub average_return_pct: Option<f64>,
    pub max_pnl: Option<f64>,
    pub min_pnl: Option<f64>,
    #[serde(with = "humantime_serde")]
    pub average_holding_period: Duration,
    pub open_position: Option<OpenPosition>,
    pub trades: Vec<TradeEvent>,
}

impl BacktestReport {
    /// Aggregates a closed-trade log and an optional tail position into the
    /// summary metrics.
    pub fn from_trades(trades: Vec<TradeEvent>, open_position: Option<OpenPosition>) -> Self {
        let total_trades = trades.len();
        let winning_trades = trades.iter().filter(|t| t.pnl > 0.0).count();
        let losing_trades = total_trades - winning_trades;
        let total_pnl: f64 = trades.iter().map(|t| t.pnl).sum();

        let (win_rate_pct, average_pnl) = if total_trades > 0 {
            (
                Some(winning_trades as f64 / total_trades as f64 * 100.0),
                Some(total_pnl / total_trades as f64),
            )
        } else {
            (None, None)
        };

        let returns: Vec<f64> = trades.iter().filter_map(|t| t.return_pct).collect();
        let average_return_pct = if returns.is_empty() {
            None
        } else {
            Some(returns.iter().sum::<f64>() / returns.len() as f64)
        };

        let max_pnl = trades.iter().map(|t| t.pnl).fold(None, |acc: Option<f64>, p| {
            Some(acc.map_or(p, |a| a.max(p)))
        });
        let min_pnl = trades.iter().map(|t| t.pnl).fold(None, |acc: Option<f64>, p| {
            Some(acc.map_or(p, |a| a.min(p)))
        });

        let average_holding_period = if total_trades > 0 {
            let total_secs: i64 = trades
                .iter()
                .map(|t| (t.exit_ts - t.entry_ts).num_seconds())
                .sum();
            Duration::from_secs((total_secs / total_trades as i64).max(0) as u64)
        } else {
            Duration::ZERO
        };

        Self {
            total_trades,
            winning_trades,
            losing_trades,
            total_pnl,
            win_rate_pct,
            average_pnl,
            average_return_pct,
            max_pnl,
            min_pnl,
            average_holding_period,
            open_position,
            trades,
        }
    }
}
