use crate::DbError;
use chrono::{DateTime, Utc};
use core_types::{AnalyticsRecord, SymbolPair, Tick, Timeframe};
use sqlx::SqlitePool;

/// The `DbRepository` provides a high-level, application-specific interface
/// to the store. It encapsulates all SQL queries and data access logic.
#[derive(Debug, Clone)]
pub struct DbRepository {
    pool: SqlitePool,
}

impl DbRepository {
    /// Creates a new `DbRepository` with a shared database connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Appends raw ticks. This is the write half of the tick table, used by
    /// the ingestion collaborator and by tests; the engine itself only reads.
    pub async fn insert_ticks(&self, ticks: &[Tick]) -> Result<(), DbError> {
        let mut tx = self.pool.begin().await?;
        for tick in ticks {
            sqlx::query("INSERT INTO ticks (symbol, price, volume, ts) VALUES (?, ?, ?, ?)")
                .bind(&tick.symbol)
                .bind(tick.price)
                .bind(tick.volume)
                .bind(tick.ts)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    /// Fetches all ticks for a symbol strictly newer than `since`, ordered
    /// by timestamp.
    pub async fn ticks_since(
        &self,
        symbol: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<Tick>, DbError> {
        let ticks = sqlx::query_as::<_, Tick>(
            "SELECT symbol, price, volume, ts FROM ticks WHERE symbol = ? AND ts > ? ORDER BY ts ASC",
        )
        .bind(symbol)
        .bind(since)
        .fetch_all(&self.pool)
        .await?;
        Ok(ticks)
    }

    /// Timestamp of the newest tick for a symbol, if any exist.
    pub async fn latest_tick_ts(&self, symbol: &str) -> Result<Option<DateTime<Utc>>, DbError> {
        let ts = sqlx::query_scalar::<_, Option<DateTime<Utc>>>(
            "SELECT MAX(ts) FROM ticks WHERE symbol = ?",
        )
        .bind(symbol)
        .fetch_one(&self.pool)
        .await?;
        Ok(ts)
    }

    /// Appends a batch of analytics records and advances the pair's
    /// watermark in a single transaction.
    ///
    /// Rows whose key already exists are skipped (`ON CONFLICT DO NOTHING`),
    /// making overlapping reprocessing idempotent: existing rows are never
    /// rewritten. Returns the number of rows actually inserted.
    pub async fn save_analytics(
        &self,
        pair: &SymbolPair,
        timeframe: Timeframe,
        records: &[AnalyticsRecord],
        watermark: DateTime<Utc>,
    ) -> Result<u64, DbError> {
        let mut tx = self.pool.begin().await?;

        let mut inserted = 0u64;
        for record in records {
            let result = sqlx::query(
                r#"
                INSERT INTO analytics (
                    pair_y, pair_x, timeframe, ts, hedge_ratio, spread, zscore,
                    correlation, volatility, adf_pvalue, is_stationary
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT (pair_y, pair_x, timeframe, ts) DO NOTHING
                "#,
            )
            .bind(&record.pair_y)
            .bind(&record.pair_x)
            .bind(&record.timeframe)
            .bind(record.ts)
            .bind(record.hedge_ratio)
            .bind(record.spread)
            .bind(record.zscore)
            .bind(record.correlation)
            .bind(record.volatility)
            .bind(record.adf_pvalue)
            .bind(record.is_stationary)
            .execute(&mut *tx)
            .await?;
            inserted += result.rows_affected();
        }

        sqlx::query(
            r#"
            INSERT INTO watermarks (pair_y, pair_x, timeframe, last_ts)
            VALUES (?, ?, ?, ?)
            ON CONFLICT (pair_y, pair_x, timeframe) DO UPDATE SET last_ts = excluded.last_ts
            "#,
        )
        .bind(&pair.y)
        .bind(&pair.x)
        .bind(timeframe.label())
        .bind(watermark)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(inserted)
    }

    /// Last fully processed bar timestamp for a (pair, timeframe)
    /// combination, or `None` before the first successful cycle.
    pub async fn watermark(
        &self,
        pair: &SymbolPair,
        timeframe: Timeframe,
    ) -> Result<Option<DateTime<Utc>>, DbError> {
        let ts = sqlx::query_scalar::<_, DateTime<Utc>>(
            "SELECT last_ts FROM watermarks WHERE pair_y = ? AND pair_x = ? AND timeframe = ?",
        )
        .bind(&pair.y)
        .bind(&pair.x)
        .bind(timeframe.label())
        .fetch_optional(&self.pool)
        .await?;
        Ok(ts)
    }

    /// All analytics records for a pair and timeframe strictly newer than
    /// `since`, in timestamp order. Feeds the backtester and the export
    /// surface.
    pub async fn analytics_since(
        &self,
        pair: &SymbolPair,
        timeframe: Timeframe,
        since: DateTime<Utc>,
    ) -> Result<Vec<AnalyticsRecord>, DbError> {
        let records = sqlx::query_as::<_, AnalyticsRecord>(
            r#"
            SELECT pair_y, pair_x, timeframe, ts, hedge_ratio, spread, zscore,
                   correlation, volatility, adf_pvalue, is_stationary
            FROM analytics
            WHERE pair_y = ? AND pair_x = ? AND timeframe = ? AND ts > ?
            ORDER BY ts ASC
            "#,
        )
        .bind(&pair.y)
        .bind(&pair.x)
        .bind(timeframe.label())
        .bind(since)
        .fetch_all(&self.pool)
        .await?;
        Ok(records)
    }

    /// The most recent analytics record for a pair and timeframe.
    pub async fn latest_analytics(
        &self,
        pair: &SymbolPair,
        timeframe: Timeframe,
    ) -> Result<Option<AnalyticsRecord>, DbError> {
        let record = sqlx::query_as::<_, AnalyticsRecord>(
            r#"
            SELECT pair_y, pair_x, timeframe, ts, hedge_ratio, spread, zscore,
                   correlation, volatility, adf_pvalue, is_stationary
            FROM analytics
            WHERE pair_y = ? AND pair_x = ? AND timeframe = ?
            ORDER BY ts DESC
            LIMIT 1
            "#,
        )
        .bind(&pair.y)
        .bind(&pair.x)
        .bind(timeframe.label())
        .fetch_optional(&self.pool)
        .await?;
        Ok(record)
    }
}
