//! End-to-end pipeline test: seeded ticks flow through bar building,
//! analytics computation and persistence, with watermark bookkeeping and
//! idempotent reprocessing asserted against an in-memory store.

use chrono::{DateTime, Duration, TimeZone, Utc};
use configuration::{Alerts, Analytics, Backtest, Bars, Config, Database, RollingWindows};
use core_types::{SymbolPair, Tick, Timeframe};
use database::{connect, run_migrations, DbRepository};
use engine::Engine;

fn base() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()
}

fn pair() -> SymbolPair {
    SymbolPair {
        y: "BTCUSDT".to_string(),
        x: "ETHUSDT".to_string(),
    }
}

fn config() -> Config {
    Config {
        database: Database {
            url: "sqlite::memory:".to_string(),
        },
        pairs: vec![pair()],
        analytics: Analytics {
            timeframes: vec!["1m".parse().unwrap()],
            rolling_windows: RollingWindows {
                hedge: 5,
                zscore: 4,
                correlation: 5,
                volatility: 4,
            },
            lookback_minutes: 1_440,
            update_interval_secs: 10,
        },
        bars: Bars::default(),
        alerts: Alerts::default(),
        backtest: Backtest::default(),
    }
}

/// Two ticks per minute per symbol; Y tracks 3x with a deterministic wiggle.
fn seed_ticks(minutes: std::ops::Range<i64>) -> Vec<Tick> {
    let mut ticks = Vec::new();
    for minute in minutes {
        let at = base() + Duration::minutes(minute);
        let wiggle = ((minute * 37) % 11) as f64 / 10.0;
        let x_price = 100.0 + minute as f64;
        let y_price = 3.0 * x_price + wiggle;
        for (symbol, price) in [("BTCUSDT", y_price), ("ETHUSDT", x_price)] {
            ticks.push(Tick {
                symbol: symbol.to_string(),
                price: price - 0.1,
                volume: 1.0,
                ts: at + Duration::seconds(10),
            });
            ticks.push(Tick {
                symbol: symbol.to_string(),
                price,
                volume: 1.0,
                ts: at + Duration::seconds(40),
            });
        }
    }
    ticks
}

async fn setup() -> (Engine, DbRepository) {
    let pool = connect("sqlite::memory:").await.unwrap();
    run_migrations(&pool).await.unwrap();
    let repo = DbRepository::new(pool);
    (Engine::new(config(), repo.clone()), repo)
}

#[tokio::test]
async fn cycle_processes_complete_bars_and_advances_the_watermark() {
    let (engine, repo) = setup().await;
    let tf: Timeframe = "1m".parse().unwrap();

    repo.insert_ticks(&seed_ticks(0..40)).await.unwrap();

    // `now` falls mid-minute 40, so bars 0..=39 are complete.
    let now = base() + Duration::minutes(40) + Duration::seconds(30);
    engine.run_cycle(now).await;

    let records = repo
        .analytics_since(&pair(), tf, base() - Duration::minutes(1))
        .await
        .unwrap();
    assert_eq!(records.len(), 40);
    assert_eq!(records.last().unwrap().ts, base() + Duration::minutes(39));
    assert_eq!(
        repo.watermark(&pair(), tf).await.unwrap(),
        Some(base() + Duration::minutes(39))
    );

    // Warmup rows are null, settled rows are populated.
    assert!(records[0].hedge_ratio.is_none());
    let settled = records.last().unwrap();
    assert!(settled.hedge_ratio.is_some());
    assert!(settled.zscore.is_some());
    assert!(settled.correlation.is_some());
    assert!(settled.volatility.is_some());
    assert!(settled.adf_pvalue.is_some());
}

#[tokio::test]
async fn idle_and_overlapping_cycles_write_nothing_new() {
    let (engine, repo) = setup().await;
    let tf: Timeframe = "1m".parse().unwrap();

    repo.insert_ticks(&seed_ticks(0..30)).await.unwrap();
    let now = base() + Duration::minutes(30) + Duration::seconds(30);
    engine.run_cycle(now).await;

    let first = repo
        .analytics_since(&pair(), tf, base() - Duration::minutes(1))
        .await
        .unwrap();
    assert_eq!(first.len(), 30);

    // No new ticks: the cycle is a no-op.
    engine.run_cycle(now + Duration::seconds(10)).await;
    let second = repo
        .analytics_since(&pair(), tf, base() - Duration::minutes(1))
        .await
        .unwrap();
    assert_eq!(second, first);

    // New ticks: only the new bars append; existing rows are untouched.
    repo.insert_ticks(&seed_ticks(30..35)).await.unwrap();
    let later = base() + Duration::minutes(35) + Duration::seconds(30);
    engine.run_cycle(later).await;

    let third = repo
        .analytics_since(&pair(), tf, base() - Duration::minutes(1))
        .await
        .unwrap();
    assert_eq!(third.len(), 35);
    assert_eq!(&third[..30], &first[..]);
    assert_eq!(
        repo.watermark(&pair(), tf).await.unwrap(),
        Some(base() + Duration::minutes(34))
    );
}

#[tokio::test]
async fn failed_persistence_leaves_the_watermark_untouched() {
    let pool = connect("sqlite::memory:").await.unwrap();
    run_migrations(&pool).await.unwrap();
    let repo = DbRepository::new(pool.clone());
    let engine = Engine::new(config(), repo.clone());
    let tf: Timeframe = "1m".parse().unwrap();

    repo.insert_ticks(&seed_ticks(0..20)).await.unwrap();
    let now = base() + Duration::minutes(20) + Duration::seconds(30);
    engine.run_cycle(now).await;
    let mark = repo.watermark(&pair(), tf).await.unwrap();
    assert_eq!(mark, Some(base() + Duration::minutes(19)));

    // Sabotage the analytics table; the next cycle must fail without
    // advancing the watermark, so the range is retried later.
    sqlx::query("DROP TABLE analytics")
        .execute(&pool)
        .await
        .unwrap();
    repo.insert_ticks(&seed_ticks(20..25)).await.unwrap();
    engine
        .run_cycle(base() + Duration::minutes(25) + Duration::seconds(30))
        .await;
    assert_eq!(repo.watermark(&pair(), tf).await.unwrap(), mark);
}
