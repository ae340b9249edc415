use chrono::Duration;
use core_types::{BarFill, SymbolPair, Timeframe};
use serde::Deserialize;

/// The root configuration structure for the entire application.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database: Database,
    /// The (Y, X) symbol pairs to analyze. Y is regressed on X.
    pub pairs: Vec<SymbolPair>,
    pub analytics: Analytics,
    #[serde(default)]
    pub bars: Bars,
    #[serde(default)]
    pub alerts: Alerts,
    #[serde(default)]
    pub backtest: Backtest,
}

/// Connection settings for the persistent store.
#[derive(Debug, Clone, Deserialize)]
pub struct Database {
    /// SQLite connection string, e.g. "sqlite://storage/pairflow.db".
    /// A DATABASE_URL environment variable takes precedence.
    pub url: String,
}

/// Parameters for the analytics recomputation pipeline.
#[derive(Debug, Clone, Deserialize)]
pub struct Analytics {
    /// Bar intervals to compute, e.g. ["1s", "1m", "5m"].
    pub timeframes: Vec<Timeframe>,
    pub rolling_windows: RollingWindows,
    /// Horizon bounding how much tick history is re-fetched on a cold start.
    pub lookback_minutes: u32,
    /// Cadence of the recomputation loop, in seconds.
    pub update_interval_secs: u64,
}

impl Analytics {
    pub fn lookback(&self) -> Duration {
        Duration::minutes(i64::from(self.lookback_minutes))
    }
}

/// Trailing-window sizes, in bars. Each is the minimum number of
/// observations before the corresponding statistic becomes non-null.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct RollingWindows {
    /// OLS window for the hedge ratio.
    #[serde(default = "default_hedge_window")]
    pub hedge: usize,
    pub zscore: usize,
    pub correlation: usize,
    pub volatility: usize,
}

fn default_hedge_window() -> usize {
    60
}

/// Bar construction options.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct Bars {
    /// What to do with intervals that received no ticks. The default omits
    /// them; "forward-fill" carries the prior close at zero volume.
    #[serde(default)]
    pub fill: BarFill,
}

/// Alerting thresholds. Only the z-score threshold is consumed by the core,
/// as the backtester's default entry level.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Alerts {
    #[serde(default = "default_entry_threshold")]
    pub default_zscore_threshold: f64,
}

impl Default for Alerts {
    fn default() -> Self {
        Self {
            default_zscore_threshold: default_entry_threshold(),
        }
    }
}

fn default_entry_threshold() -> f64 {
    2.0
}

/// Defaults for the backtest simulator.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Backtest {
    #[serde(default = "default_exit_threshold")]
    pub exit_threshold: f64,
    /// Force-close an open position at the final observation instead of
    /// reporting it as unrealized.
    #[serde(default)]
    pub close_at_end: bool,
}

impl Default for Backtest {
    fn default() -> Self {
        Self {
            exit_threshold: default_exit_threshold(),
            close_at_end: false,
        }
    }
}

fn default_exit_threshold() -> f64 {
    0.5
}
