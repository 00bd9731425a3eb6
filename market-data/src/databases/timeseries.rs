use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{Candle, Result, SignalError};
use rust_decimal::Decimal;
use sqlx::postgres::PgPool;
use tracing::{debug, info};

use crate::store::{PriceStats, PriceStore};

/// PostgreSQL-backed candle storage
pub struct TimeSeriesDB {
    pool: PgPool,
}

#[derive(sqlx::FromRow)]
struct CandleRow {
    asset: String,
    timeframe: i32,
    timestamp: DateTime<Utc>,
    open: Decimal,
    high: Decimal,
    low: Decimal,
    close: Decimal,
    volume: Decimal,
}

impl TryFrom<CandleRow> for Candle {
    type Error = SignalError;

    fn try_from(row: CandleRow) -> Result<Self> {
        let timeframe = u32::try_from(row.timeframe)
            .map_err(|_| SignalError::Persistence(format!("negative timeframe {}", row.timeframe)))?;

        Ok(Candle {
            asset: row.asset,
            timeframe,
            timestamp: row.timestamp,
            open: row.open,
            high: row.high,
            low: row.low,
            close: row.close,
            volume: row.volume,
        })
    }
}

fn timeframe_param(timeframe: u32) -> Result<i32> {
    i32::try_from(timeframe)
        .map_err(|_| SignalError::Persistence(format!("timeframe {} out of range", timeframe)))
}

impl TimeSeriesDB {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn init_tables(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS price_data (
                id BIGSERIAL PRIMARY KEY,
                asset TEXT NOT NULL,
                timeframe INTEGER NOT NULL,
                timestamp TIMESTAMPTZ NOT NULL,
                open NUMERIC NOT NULL,
                high NUMERIC NOT NULL,
                low NUMERIC NOT NULL,
                close NUMERIC NOT NULL,
                volume NUMERIC NOT NULL DEFAULT 0,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                UNIQUE (asset, timeframe, timestamp)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        info!("✅ Initialized price_data table");

        Ok(())
    }
}

#[async_trait]
impl PriceStore for TimeSeriesDB {
    async fn upsert(&self, candle: &Candle) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO price_data (asset, timeframe, timestamp, open, high, low, close, volume)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (asset, timeframe, timestamp) DO UPDATE
            SET open = EXCLUDED.open,
                high = EXCLUDED.high,
                low = EXCLUDED.low,
                close = EXCLUDED.close,
                volume = EXCLUDED.volume
            "#,
        )
        .bind(&candle.asset)
        .bind(timeframe_param(candle.timeframe)?)
        .bind(candle.timestamp)
        .bind(candle.open)
        .bind(candle.high)
        .bind(candle.low)
        .bind(candle.close)
        .bind(candle.volume)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn latest_candles(&self, asset: &str, timeframe: u32, limit: usize) -> Result<Vec<Candle>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);

        let rows = sqlx::query_as::<_, CandleRow>(
            r#"
            SELECT asset, timeframe, timestamp, open, high, low, close, volume
            FROM price_data
            WHERE asset = $1 AND timeframe = $2
            ORDER BY timestamp DESC
            LIMIT $3
            "#,
        )
        .bind(asset)
        .bind(timeframe_param(timeframe)?)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        debug!("Fetched {} candles for {} M{}", rows.len(), asset, timeframe);

        let mut candles = rows
            .into_iter()
            .map(Candle::try_from)
            .collect::<Result<Vec<_>>>()?;
        candles.reverse();

        Ok(candles)
    }

    async fn stats(&self) -> Result<PriceStats> {
        let row = sqlx::query_as::<_, (i64, i64, Option<DateTime<Utc>>, Option<DateTime<Utc>>)>(
            r#"
            SELECT
                COUNT(*) AS total,
                COUNT(DISTINCT asset) AS unique_assets,
                MIN(timestamp) AS oldest,
                MAX(timestamp) AS newest
            FROM price_data
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(PriceStats {
            total_records: row.0.max(0) as u64,
            unique_assets: row.1.max(0) as u64,
            oldest: row.2,
            newest: row.3,
        })
    }

    async fn clear(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM price_data")
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}
