//! # Pairflow Pair/Timeframe Processor
//!
//! Applies the rolling statistics library to one pair's bar series for one
//! timeframe, producing one [`AnalyticsRecord`] per aligned bar timestamp.
//!
//! The computation half ([`compute_records`]) is a pure function of its
//! inputs: processing an overlapping time range twice yields identical
//! records, which is what makes the persisted pipeline idempotent. The
//! persistence half appends through the repository, whose duplicate-key
//! rejection guarantees already-covered ranges are skipped, not rewritten.

use chrono::{DateTime, Utc};
use configuration::RollingWindows;
use core_types::{AnalyticsRecord, Bar, SymbolPair, Timeframe};
use database::DbRepository;
use stats::ADF_MIN_OBS;
use tracing::debug;

pub mod error;

pub use error::ProcessorError;

/// Upper bound on the trailing spread history fed to each per-record ADF
/// refit. Bounds the quadratic cost of running the test at every timestamp
/// while staying far above its minimum sample size.
const ADF_MAX_OBS: usize = 512;

/// Outcome of a persisted processing pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProcessOutcome {
    /// Rows actually inserted (existing keys are skipped).
    pub records_written: u64,
    /// Timestamp of the last computed record; the new watermark.
    pub watermark: DateTime<Utc>,
}

/// Number of bars of trailing history required before the newest bar can
/// produce a fully populated record: the hedge window feeds the spread,
/// which in turn feeds the deepest consumer on top of it.
pub fn required_history_bars(windows: &RollingWindows) -> usize {
    let deepest = windows
        .zscore
        .max(windows.correlation)
        .max(windows.volatility + 1)
        .max(ADF_MIN_OBS);
    windows.hedge + deepest
}

/// Inner-joins two bar series on timestamp and computes the full metric set
/// per aligned point. Bars present in only one series are dropped for that
/// point. Output fields follow the null-propagation contract: `None` is
/// "not enough history yet", never an error.
pub fn compute_records(
    pair: &SymbolPair,
    timeframe: Timeframe,
    y_bars: &[Bar],
    x_bars: &[Bar],
    windows: &RollingWindows,
) -> Vec<AnalyticsRecord> {
    let (timestamps, y, x) = align(y_bars, x_bars);
    let n = timestamps.len();
    if n == 0 {
        return Vec::new();
    }

    let betas = stats::rolling_hedge_ratio(&y, &x, windows.hedge);
    let spread = stats::spread_series(&y, &x, &betas);
    let zscore = stats::rolling_zscore(&spread, windows.zscore);
    let correlation = stats::rolling_correlation(&y, &x, windows.correlation);
    let volatility =
        stats::rolling_volatility(&y, windows.volatility, timeframe.periods_per_year());

    // The ADF input at each point is the trailing run of non-null spreads,
    // so every record stays a pure function of the series up to that point.
    let mut adf_pvalue = vec![None; n];
    let mut is_stationary = vec![None; n];
    let mut spread_history: Vec<f64> = Vec::with_capacity(n);
    for t in 0..n {
        if let Some(s) = spread[t] {
            spread_history.push(s);
            let lo = spread_history.len().saturating_sub(ADF_MAX_OBS);
            if let Some(result) = stats::adf_test(&spread_history[lo..], None) {
                adf_pvalue[t] = Some(result.p_value);
                is_stationary[t] = Some(result.is_stationary);
            }
        }
    }

    let label = timeframe.label();
    let records = (0..n)
        .map(|t| AnalyticsRecord {
            pair_y: pair.y.clone(),
            pair_x: pair.x.clone(),
            timeframe: label.clone(),
            ts: timestamps[t],
            hedge_ratio: betas[t],
            spread: spread[t],
            zscore: zscore[t],
            correlation: correlation[t],
            volatility: volatility[t],
            adf_pvalue: adf_pvalue[t],
            is_stationary: is_stationary[t],
        })
        .collect();

    debug!(pair = %pair, timeframe = %timeframe, aligned = n, "computed analytics records");
    records
}

/// Merge-joins two timestamp-sorted bar series, keeping only timestamps
/// present in both.
fn align(y_bars: &[Bar], x_bars: &[Bar]) -> (Vec<DateTime<Utc>>, Vec<f64>, Vec<f64>) {
    let mut timestamps = Vec::new();
    let mut y = Vec::new();
    let mut x = Vec::new();

    let (mut i, mut j) = (0, 0);
    while i < y_bars.len() && j < x_bars.len() {
        match y_bars[i].ts.cmp(&x_bars[j].ts) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                timestamps.push(y_bars[i].ts);
                y.push(y_bars[i].close);
                x.push(x_bars[j].close);
                i += 1;
                j += 1;
            }
        }
    }
    (timestamps, y, x)
}

/// Computes analytics for one pair and timeframe, then persists the batch
/// with duplicate-key rejection, advancing the watermark to the last record
/// timestamp. Keys that already exist in the store are skipped, never
/// rewritten.
#[derive(Debug, Clone)]
pub struct PairProcessor {
    windows: RollingWindows,
    repo: DbRepository,
}

impl PairProcessor {
    pub fn new(windows: RollingWindows, repo: DbRepository) -> Self {
        Self { windows, repo }
    }

    pub fn windows(&self) -> &RollingWindows {
        &self.windows
    }

    /// Runs the pure computation and appends the result. Returns `None`
    /// when the aligned series is empty (nothing to persist, no watermark
    /// movement).
    pub async fn process_and_persist(
        &self,
        pair: &SymbolPair,
        timeframe: Timeframe,
        y_bars: &[Bar],
        x_bars: &[Bar],
    ) -> Result<Option<ProcessOutcome>, ProcessorError> {
        let records = compute_records(pair, timeframe, y_bars, x_bars, &self.windows);
        let Some(last) = records.last() else {
            return Ok(None);
        };
        let watermark = last.ts;

        let records_written = self
            .repo
            .save_analytics(pair, timeframe, &records, watermark)
            .await?;

        Ok(Some(ProcessOutcome {
            records_written,
            watermark,
        }))
    }
}
