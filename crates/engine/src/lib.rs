//! # Pairflow Engine Orchestrator
//!
//! Drives the periodic batch recomputation pipeline: on a fixed cadence,
//! every configured (pair, timeframe) combination independently fetches
//! ticks newer than its stored watermark, rebuilds bars, recomputes
//! analytics and appends the results.
//!
//! ## Architectural Principles
//!
//! - **Keyed watermark state:** "last processed timestamp" lives in the
//!   store, keyed by (pair, timeframe), never in ambient globals. A cycle
//!   advances it only inside the same transaction that persists its batch.
//! - **Isolation:** combinations share no mutable state; one failing
//!   combination is logged and retried next tick without blocking the
//!   others or crashing the process.
//! - **Cooperative shutdown:** ctrl-c stops the loop between cycles; since
//!   each batch is atomic, stopping can never corrupt the store.

use bars::BarBuilder;
use chrono::{DateTime, Utc};
use configuration::Config;
use core_types::{Bar, SymbolPair, Timeframe};
use database::DbRepository;
use futures::future::join_all;
use processor::{required_history_bars, PairProcessor};
use tracing::{info, warn};

pub mod error;

pub use error::EngineError;

/// Outcome of one (pair, timeframe) processing cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CycleOutcome {
    /// No ticks newer than the watermark (or no complete bars yet).
    Skipped,
    Processed {
        /// Rows actually inserted; overlap with prior cycles inserts nothing.
        records_written: u64,
        watermark: DateTime<Utc>,
    },
}

/// The central orchestrator for the analytics pipeline.
pub struct Engine {
    config: Config,
    repo: DbRepository,
    processor: PairProcessor,
}

impl Engine {
    pub fn new(config: Config, repo: DbRepository) -> Self {
        let processor = PairProcessor::new(config.analytics.rolling_windows, repo.clone());
        Self {
            config,
            repo,
            processor,
        }
    }

    /// Runs the cadence loop until ctrl-c. Each tick of the interval runs
    /// one full cycle; shutdown only happens between cycles.
    pub async fn run(&self) -> Result<(), EngineError> {
        let period = std::time::Duration::from_secs(self.config.analytics.update_interval_secs);
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        info!(
            pairs = self.config.pairs.len(),
            timeframes = self.config.analytics.timeframes.len(),
            cadence_secs = self.config.analytics.update_interval_secs,
            "analytics engine started"
        );

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.run_cycle(Utc::now()).await;
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("shutdown requested, engine stopping");
                    break;
                }
            }
        }
        Ok(())
    }

    /// One batch pass over every configured (pair, timeframe) combination.
    /// Combinations run concurrently; failures are logged per key and the
    /// affected range is retried on the next cadence tick because the
    /// watermark was not advanced.
    pub async fn run_cycle(&self, now: DateTime<Utc>) {
        let combinations: Vec<(SymbolPair, Timeframe)> = self
            .config
            .pairs
            .iter()
            .flat_map(|pair| {
                self.config
                    .analytics
                    .timeframes
                    .iter()
                    .map(move |tf| (pair.clone(), *tf))
            })
            .collect();

        let results = join_all(combinations.iter().map(|(pair, timeframe)| async move {
            (pair, *timeframe, self.process_combination(pair, *timeframe, now).await)
        }))
        .await;

        let mut written = 0u64;
        let mut failed = 0usize;
        for (pair, timeframe, result) in results {
            match result {
                Ok(CycleOutcome::Processed { records_written, .. }) => written += records_written,
                Ok(CycleOutcome::Skipped) => {}
                Err(error) => {
                    failed += 1;
                    warn!(pair = %pair, timeframe = %timeframe, %error,
                        "cycle failed; watermark untouched, retrying next tick");
                }
            }
        }
        if written > 0 || failed > 0 {
            info!(records = written, failed, "cycle complete");
        }
    }

    /// The per-combination state machine as one fallible pass:
    /// fetch -> compute -> persist, with every early return an idle cycle.
    async fn process_combination(
        &self,
        pair: &SymbolPair,
        timeframe: Timeframe,
        now: DateTime<Utc>,
    ) -> Result<CycleOutcome, EngineError> {
        let watermark = self.repo.watermark(pair, timeframe).await?;

        // Fetching: idle unless some leg has ticks newer than the watermark.
        if let Some(mark) = watermark {
            let newest = match (
                self.repo.latest_tick_ts(&pair.y).await?,
                self.repo.latest_tick_ts(&pair.x).await?,
            ) {
                (Some(y), Some(x)) => y.max(x),
                _ => return Ok(CycleOutcome::Skipped),
            };
            if newest <= mark {
                return Ok(CycleOutcome::Skipped);
            }
        }

        // Refetch enough trailing history to refill the deepest window
        // chain behind the watermark, bounded by the cold-start lookback.
        let lookback_start = now - self.config.analytics.lookback();
        let padding = timeframe.duration() * required_history_bars(self.processor.windows()) as i32;
        let since = match watermark {
            Some(mark) => (mark - padding).max(lookback_start),
            None => lookback_start,
        };

        let y_ticks = self.repo.ticks_since(&pair.y, since).await?;
        let x_ticks = self.repo.ticks_since(&pair.x, since).await?;
        if y_ticks.is_empty() || x_ticks.is_empty() {
            return Ok(CycleOutcome::Skipped);
        }

        // Computing: the interval containing `now` may still receive ticks;
        // records are append-only, so only complete bars are processed.
        let cutoff = timeframe.floor(now);
        let builder = BarBuilder::new(timeframe, self.config.bars.fill);
        let y_bars: Vec<Bar> = builder
            .build(&y_ticks)
            .into_iter()
            .filter(|bar| bar.ts < cutoff)
            .collect();
        let x_bars: Vec<Bar> = builder
            .build(&x_ticks)
            .into_iter()
            .filter(|bar| bar.ts < cutoff)
            .collect();
        if y_bars.is_empty() || x_bars.is_empty() {
            return Ok(CycleOutcome::Skipped);
        }

        // Persisting: the batch append and the watermark advance share one
        // transaction inside the processor.
        match self
            .processor
            .process_and_persist(pair, timeframe, &y_bars, &x_bars)
            .await?
        {
            Some(outcome) => Ok(CycleOutcome::Processed {
                records_written: outcome.records_written,
                watermark: outcome.watermark,
            }),
            None => Ok(CycleOutcome::Skipped),
        }
    }
}
