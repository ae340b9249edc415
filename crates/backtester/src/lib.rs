//! # Pairflow Backtest Simulator
//!
//! Replays a persisted z-score series through a threshold-based
//! mean-reversion strategy: short the spread when the z-score stretches
//! above the entry threshold, long when it stretches below, flatten when it
//! reverts inside the exit threshold.
//!
//! The simulator is a pure state machine: `step(state, record)` consumes
//! one observation at a time in timestamp order, never looks ahead, and
//! has no I/O, which makes any run deterministically replayable without
//! the orchestrator or the store. Records whose z-score or spread is null
//! are skipped without a transition; null means "not computable here",
//! never zero.

use chrono::{DateTime, Utc};
use core_types::{AnalyticsRecord, Position, TradeDirection, TradeEvent};
use tracing::debug;

pub mod error;
pub mod report;

pub use error::BacktestError;
pub use report::{BacktestReport, OpenPosition};

/// Entry/exit thresholds and end-of-series policy for one simulator run.
#[derive(Debug, Clone, Copy)]
pub struct BacktestParams {
    /// Enter when `|z|` exceeds this (default 2.0).
    pub entry_threshold: f64,
    /// Exit when `|z|` falls inside this (default 0.5).
    pub exit_threshold: f64,
    /// Force-close an open position at the final observation instead of
    /// reporting it as unrealized.
    pub close_at_end: bool,
}

impl Default for BacktestParams {
    fn default() -> Self {
        Self {
            entry_threshold: 2.0,
            exit_threshold: 0.5,
            close_at_end: false,
        }
    }
}

/// An open spread position. Absence of one is the Flat state.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Open {
    direction: TradeDirection,
    entry_spread: f64,
    entry_ts: DateTime<Utc>,
}

/// Transient per-run state, created at backtest start and folded over the
/// record series.
#[derive(Debug, Clone, Default)]
pub struct BacktestState {
    open: Option<Open>,
    pub realized_pnl: f64,
    pub trades: Vec<TradeEvent>,
}

impl BacktestState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn position(&self) -> Position {
        match self.open {
            None => Position::Flat,
            Some(open) => match open.direction {
                TradeDirection::Long => Position::Long,
                TradeDirection::Short => Position::Short,
            },
        }
    }
}

/// The mean-reversion strategy simulator.
#[derive(Debug, Clone, Copy)]
pub struct Backtester {
    params: BacktestParams,
}

impl Backtester {
    /// Validates thresholds up front: both must be positive and the entry
    /// band must lie outside the exit band, otherwise every entry would
    /// exit on the same observation.
    pub fn new(params: BacktestParams) -> Result<Self, BacktestError> {
        if !(params.entry_threshold > 0.0 && params.entry_threshold.is_finite()) {
            return Err(BacktestError::InvalidThresholds(format!(
                "entry threshold must be positive, got {}",
                params.entry_threshold
            )));
        }
        if !(params.exit_threshold > 0.0 && params.exit_threshold.is_finite()) {
            return Err(BacktestError::InvalidThresholds(format!(
                "exit threshold must be positive, got {}",
                params.exit_threshold
            )));
        }
        if params.exit_threshold >= params.entry_threshold {
            return Err(BacktestError::InvalidThresholds(format!(
                "exit threshold {} must be below entry threshold {}",
                params.exit_threshold, params.entry_threshold
            )));
        }
        Ok(Self { params })
    }

    pub fn params(&self) -> &BacktestParams {
        &self.params
    }

    /// Advances the state machine by one observation. Returns the trade
    /// event if this observation closed a position.
    pub fn step(&self, state: &mut BacktestState, record: &AnalyticsRecord) -> Option<TradeEvent> {
        let (Some(z), Some(spread)) = (record.zscore, record.spread) else {
            return None;
        };

        match state.open {
            None => {
                if z > self.params.entry_threshold {
                    state.open = Some(Open {
                        direction: TradeDirection::Short,
                        entry_spread: spread,
                        entry_ts: record.ts,
                    });
                } else if z < -self.params.entry_threshold {
                    state.open = Some(Open {
                        direction: TradeDirection::Long,
                        entry_spread: spread,
                        entry_ts: record.ts,
                    });
                }
                None
            }
            Some(open) if z.abs() < self.params.exit_threshold => {
                let trade = close_trade(open, spread, record.ts);
                state.realized_pnl += trade.pnl;
                state.trades.push(trade.clone());
                state.open = None;
                Some(trade)
            }
            Some(_) => None,
        }
    }

    /// Folds an entire record series (already in timestamp order) and
    /// aggregates the result. An open position at end of series is realized
    /// only when `close_at_end` is set; otherwise it is reported as
    /// unrealized against the final computable spread.
    pub fn run(&self, records: &[AnalyticsRecord]) -> BacktestReport {
        let mut state = BacktestState::new();
        for record in records {
            self.step(&mut state, record);
        }

        let last_spread = records
            .iter()
            .rev()
            .find_map(|r| r.spread.map(|s| (s, r.ts)));

        let mut open_position = None;
        if let Some(open) = state.open.take() {
            match (self.params.close_at_end, last_spread) {
                (true, Some((spread, ts))) => {
                    let trade = close_trade(open, spread, ts);
                    state.realized_pnl += trade.pnl;
                    state.trades.push(trade);
                }
                _ => {
                    open_position = Some(OpenPosition {
                        direction: open.direction,
                        entry_ts: open.entry_ts,
                        entry_spread: open.entry_spread,
                        unrealized_pnl: last_spread
                            .map(|(s, _)| open.direction.sign() * (s - open.entry_spread)),
                    });
                }
            }
        }

        debug!(
            trades = state.trades.len(),
            realized_pnl = state.realized_pnl,
            open = open_position.is_some(),
            "backtest complete"
        );
        BacktestReport::from_trades(state.trades, open_position)
    }
}

fn close_trade(open: Open, exit_spread: f64, exit_ts: DateTime<Utc>) -> TradeEvent {
    let pnl = open.direction.sign() * (exit_spread - open.entry_spread);
    let return_pct = if open.entry_spread != 0.0 {
        Some(pnl / open.entry_spread.abs() * 100.0)
    } else {
        None
    };
    TradeEvent {
        direction: open.direction,
        entry_ts: open.entry_ts,
        exit_ts,
        entry_spread: open.entry_spread,
        exit_spread,
        pnl,
        return_pct,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 10, min, 0).unwrap()
    }

    fn rec(min: u32, zscore: Option<f64>, spread: Option<f64>) -> AnalyticsRecord {
        AnalyticsRecord {
            pair_y: "BTCUSDT".to_string(),
            pair_x: "ETHUSDT".to_string(),
            timeframe: "1m".to_string(),
            ts: ts(min),
            hedge_ratio: Some(3.0),
            spread,
            zscore,
            correlation: None,
            volatility: None,
            adf_pvalue: None,
            is_stationary: None,
        }
    }

    fn simulator() -> Backtester {
        Backtester::new(BacktestParams::default()).unwrap()
    }

    #[test]
    fn reference_sequence_produces_two_closed_trades() {
        // z = [0.5, 2.1, 1.8, 0.3, -2.2, -0.1] with entry 2.0 / exit 0.5.
        let zs = [0.5, 2.1, 1.8, 0.3, -2.2, -0.1];
        let spreads = [10.0, 11.0, 12.0, 10.0, 8.0, 9.0];
        let records: Vec<_> = zs
            .iter()
            .zip(spreads.iter())
            .enumerate()
            .map(|(i, (z, s))| rec(i as u32, Some(*z), Some(*s)))
            .collect();

        let sim = simulator();
        let mut state = BacktestState::new();
        let mut positions = Vec::new();
        for record in &records {
            sim.step(&mut state, record);
            positions.push(state.position());
        }
        assert_eq!(
            positions,
            vec![
                Position::Flat,
                Position::Short,
                Position::Short,
                Position::Flat,
                Position::Long,
                Position::Flat,
            ]
        );

        assert_eq!(state.trades.len(), 2);
        let first = &state.trades[0];
        assert_eq!(first.direction, TradeDirection::Short);
        assert_eq!(first.entry_ts, ts(1));
        assert_eq!(first.exit_ts, ts(3));
        // Short the spread at 11, buy back at 10.
        assert!((first.pnl - 1.0).abs() < 1e-12);

        let second = &state.trades[1];
        assert_eq!(second.direction, TradeDirection::Long);
        assert!((second.pnl - 1.0).abs() < 1e-12);
        assert!((state.realized_pnl - 2.0).abs() < 1e-12);
    }

    #[test]
    fn null_observations_cause_no_transition() {
        let records = vec![
            rec(0, Some(2.5), Some(10.0)), // enter short
            rec(1, None, Some(11.0)),      // null z: hold
            rec(2, Some(0.1), None),       // null spread: hold
            rec(3, Some(0.1), Some(9.0)),  // exit
        ];
        let sim = simulator();
        let mut state = BacktestState::new();

        sim.step(&mut state, &records[0]);
        assert_eq!(state.position(), Position::Short);
        sim.step(&mut state, &records[1]);
        assert_eq!(state.position(), Position::Short);
        sim.step(&mut state, &records[2]);
        assert_eq!(state.position(), Position::Short);
        let trade = sim.step(&mut state, &records[3]).unwrap();
        assert_eq!(state.position(), Position::Flat);
        assert!((trade.pnl - 1.0).abs() < 1e-12);
    }

    #[test]
    fn open_position_is_reported_unrealized() {
        let records = vec![
            rec(0, Some(0.2), Some(10.0)),
            rec(1, Some(2.4), Some(12.0)), // enter short, never exits
            rec(2, Some(1.9), Some(11.0)),
        ];
        let report = simulator().run(&records);
        assert_eq!(report.total_trades, 0);
        assert_eq!(report.total_pnl, 0.0);

        let open = report.open_position.unwrap();
        assert_eq!(open.direction, TradeDirection::Short);
        assert_eq!(open.entry_ts, ts(1));
        // Short from 12, marked at the final spread of 11.
        assert!((open.unrealized_pnl.unwrap() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn close_at_end_realizes_the_tail_position() {
        let params = BacktestParams {
            close_at_end: true,
            ..BacktestParams::default()
        };
        let records = vec![
            rec(0, Some(-2.4), Some(8.0)), // enter long
            rec(1, Some(-1.9), Some(9.5)),
        ];
        let report = Backtester::new(params).unwrap().run(&records);
        assert_eq!(report.total_trades, 1);
        assert!(report.open_position.is_none());
        assert!((report.total_pnl - 1.5).abs() < 1e-12);
    }

    #[test]
    fn zscore_inside_entry_band_stays_flat() {
        let records = vec![
            rec(0, Some(1.99), Some(10.0)),
            rec(1, Some(-1.99), Some(10.0)),
            rec(2, Some(0.0), Some(10.0)),
        ];
        let report = simulator().run(&records);
        assert_eq!(report.total_trades, 0);
        assert!(report.open_position.is_none());
    }

    #[test]
    fn invalid_thresholds_are_rejected() {
        let mut params = BacktestParams::default();
        params.exit_threshold = 2.5;
        assert!(Backtester::new(params).is_err());

        params = BacktestParams::default();
        params.entry_threshold = -1.0;
        assert!(Backtester::new(params).is_err());

        params = BacktestParams::default();
        params.exit_threshold = 0.0;
        assert!(Backtester::new(params).is_err());
    }

    #[test]
    fn report_aggregates_win_rate_and_returns() {
        let records = vec![
            rec(0, Some(2.5), Some(10.0)),  // short at 10
            rec(1, Some(0.1), Some(8.0)),   // exit: +2
            rec(2, Some(-2.5), Some(8.0)),  // long at 8
            rec(3, Some(0.2), Some(7.0)),   // exit: -1
        ];
        let report = simulator().run(&records);
        assert_eq!(report.total_trades, 2);
        assert_eq!(report.winning_trades, 1);
        assert_eq!(report.losing_trades, 1);
        assert!((report.total_pnl - 1.0).abs() < 1e-12);
        assert!((report.win_rate_pct.unwrap() - 50.0).abs() < 1e-12);
        assert!((report.average_pnl.unwrap() - 0.5).abs() < 1e-12);
        assert!((report.max_pnl.unwrap() - 2.0).abs() < 1e-12);
        assert!((report.min_pnl.unwrap() + 1.0).abs() < 1e-12);
        // Both trades held for one minute.
        assert_eq!(report.average_holding_period.as_secs(), 60);
    }
}
