//! # Pairflow Bar Builder
//!
//! Resamples an irregular tick stream into fixed-interval bars for one
//! symbol and one timeframe. Each tick lands in the interval
//! `floor(ts / timeframe)`; the bar close is the last tick price observed in
//! the interval and the bar volume is the tick-volume sum.
//!
//! Intervals that received no ticks are omitted by default, so consumers
//! must tolerate irregular bar spacing; with [`BarFill::ForwardFill`]
//! interior gaps are emitted carrying the prior close at zero volume.
//! Multiple timeframes are built independently from the same tick sequence.

use core_types::{Bar, BarFill, Tick, Timeframe};
use tracing::trace;

/// Builds fixed-interval bars from ticks for a single symbol.
#[derive(Debug, Clone, Copy)]
pub struct BarBuilder {
    timeframe: Timeframe,
    fill: BarFill,
}

impl BarBuilder {
    pub fn new(timeframe: Timeframe, fill: BarFill) -> Self {
        Self { timeframe, fill }
    }

    /// Resamples `ticks` into bars. Empty input yields an empty series, not
    /// an error. Ticks may arrive slightly out of order within a fetched
    /// batch; they are sorted by timestamp before bucketing.
    ///
    /// Output invariants: every bar timestamp is aligned to the timeframe
    /// boundary, and timestamps are strictly increasing.
    pub fn build(&self, ticks: &[Tick]) -> Vec<Bar> {
        if ticks.is_empty() {
            return Vec::new();
        }

        let mut ordered: Vec<&Tick> = ticks.iter().collect();
        ordered.sort_by_key(|t| t.ts);
        let symbol = ordered[0].symbol.clone();

        let mut bars: Vec<Bar> = Vec::new();
        for tick in ordered {
            let start = self.timeframe.floor(tick.ts);
            match bars.last_mut() {
                Some(bar) if bar.ts == start => {
                    bar.close = tick.price;
                    bar.volume += tick.volume;
                }
                _ => bars.push(Bar {
                    symbol: symbol.clone(),
                    timeframe: self.timeframe,
                    ts: start,
                    close: tick.price,
                    volume: tick.volume,
                }),
            }
        }
        trace!(symbol = %symbol, timeframe = %self.timeframe, bars = bars.len(), "resampled ticks");

        match self.fill {
            BarFill::Omit => bars,
            BarFill::ForwardFill => self.forward_fill(bars),
        }
    }

    /// Emits interior empty intervals between the first and last observed
    /// interval with the prior close and zero volume.
    fn forward_fill(&self, bars: Vec<Bar>) -> Vec<Bar> {
        let step = self.timeframe.duration();
        let mut filled: Vec<Bar> = Vec::with_capacity(bars.len());
        for bar in bars {
            if let Some(prev) = filled.last() {
                let close = prev.close;
                let symbol = prev.symbol.clone();
                let mut next_ts = prev.ts + step;
                while next_ts < bar.ts {
                    filled.push(Bar {
                        symbol: symbol.clone(),
                        timeframe: self.timeframe,
                        ts: next_ts,
                        close,
                        volume: 0.0,
                    });
                    next_ts += step;
                }
            }
            filled.push(bar);
        }
        filled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};

    fn ts(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, h, m, s).unwrap()
    }

    fn tick(at: DateTime<Utc>, price: f64, volume: f64) -> Tick {
        Tick {
            symbol: "BTCUSDT".to_string(),
            price,
            volume,
            ts: at,
        }
    }

    fn minute() -> Timeframe {
        "1m".parse().unwrap()
    }

    #[test]
    fn close_is_last_tick_in_interval() {
        // Ticks at 00:00:10, 00:00:45, 00:01:05 with 1m bars: two bars,
        // closing at the 00:00:45 and 00:01:05 prices.
        let ticks = vec![
            tick(ts(0, 0, 10), 100.0, 1.0),
            tick(ts(0, 0, 45), 101.0, 2.0),
            tick(ts(0, 1, 5), 102.0, 3.0),
        ];
        let bars = BarBuilder::new(minute(), BarFill::Omit).build(&ticks);
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].ts, ts(0, 0, 0));
        assert_eq!(bars[0].close, 101.0);
        assert_eq!(bars[0].volume, 3.0);
        assert_eq!(bars[1].ts, ts(0, 1, 0));
        assert_eq!(bars[1].close, 102.0);
    }

    #[test]
    fn empty_input_yields_empty_series() {
        let bars = BarBuilder::new(minute(), BarFill::Omit).build(&[]);
        assert!(bars.is_empty());
    }

    #[test]
    fn gaps_are_omitted_by_default() {
        let ticks = vec![
            tick(ts(0, 0, 30), 10.0, 1.0),
            tick(ts(0, 5, 30), 11.0, 1.0),
        ];
        let bars = BarBuilder::new(minute(), BarFill::Omit).build(&ticks);
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[1].ts, ts(0, 5, 0));
    }

    #[test]
    fn forward_fill_emits_interior_gaps_at_prior_close() {
        let ticks = vec![
            tick(ts(0, 0, 30), 10.0, 1.0),
            tick(ts(0, 3, 30), 11.0, 1.0),
        ];
        let bars = BarBuilder::new(minute(), BarFill::ForwardFill).build(&ticks);
        assert_eq!(bars.len(), 4);
        assert_eq!(bars[1].ts, ts(0, 1, 0));
        assert_eq!(bars[1].close, 10.0);
        assert_eq!(bars[1].volume, 0.0);
        assert_eq!(bars[2].ts, ts(0, 2, 0));
        assert_eq!(bars[2].close, 10.0);
        assert_eq!(bars[3].close, 11.0);
    }

    #[test]
    fn out_of_order_ticks_are_tolerated() {
        let ticks = vec![
            tick(ts(0, 0, 45), 101.0, 1.0),
            tick(ts(0, 0, 10), 100.0, 1.0),
        ];
        let bars = BarBuilder::new(minute(), BarFill::Omit).build(&ticks);
        assert_eq!(bars.len(), 1);
        assert_eq!(bars[0].close, 101.0);
    }

    #[test]
    fn timestamps_are_aligned_and_strictly_increasing() {
        let ticks: Vec<Tick> = (0..600)
            .map(|i| tick(ts(0, 0, 0) + chrono::Duration::seconds(i * 7), 100.0 + i as f64, 1.0))
            .collect();
        let tf: Timeframe = "30s".parse().unwrap();
        let bars = BarBuilder::new(tf, BarFill::Omit).build(&ticks);
        for pair in bars.windows(2) {
            assert!(pair[0].ts < pair[1].ts);
        }
        for bar in &bars {
            assert_eq!(bar.ts, tf.floor(bar.ts));
        }
    }

    #[test]
    fn timeframes_build_independently() {
        let ticks = vec![
            tick(ts(0, 0, 10), 100.0, 1.0),
            tick(ts(0, 2, 45), 101.0, 2.0),
            tick(ts(0, 7, 5), 102.0, 3.0),
        ];
        let one = BarBuilder::new(minute(), BarFill::Omit).build(&ticks);
        let five = BarBuilder::new("5m".parse().unwrap(), BarFill::Omit).build(&ticks);
        assert_eq!(one.len(), 3);
        assert_eq!(five.len(), 2);
        assert_eq!(five[0].close, 101.0);
        assert_eq!(five[1].close, 102.0);
    }
}
