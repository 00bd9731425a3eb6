// Signal Storage Interface
// Persists signals and their verification results

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{Result, Signal, SignalCandidate, SignalError, SignalResult};
use rust_decimal::Decimal;
use sqlx::postgres::PgPool;
use std::collections::HashMap;
use tracing::info;
use uuid::Uuid;

/// Trait for signal storage backends
#[async_trait]
pub trait SignalStorage: Send + Sync {
    /// Persist a candidate as a new `PENDING` signal and return its assigned id
    async fn create(&self, candidate: &SignalCandidate, created_at: DateTime<Utc>) -> Result<Uuid>;

    /// Record a terminal result. Only rows still `PENDING` are touched;
    /// returns whether the row transitioned.
    async fn update_result(
        &self,
        signal_id: Uuid,
        result: SignalResult,
        close_price: Option<Decimal>,
        verified_at: DateTime<Utc>,
    ) -> Result<bool>;

    /// Retrieve a signal by ID
    async fn get(&self, signal_id: Uuid) -> Result<Option<Signal>>;

    /// All signals, oldest first
    async fn get_all(&self) -> Result<Vec<Signal>>;

    /// Signals still awaiting verification
    async fn get_pending(&self) -> Result<Vec<Signal>> {
        let signals = self.get_all().await?;
        Ok(signals
            .into_iter()
            .filter(|s| s.result == SignalResult::Pending)
            .collect())
    }
}

/// In-memory signal storage (for testing and development)
pub struct InMemoryStorage {
    signals: tokio::sync::RwLock<HashMap<Uuid, Signal>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self {
            signals: tokio::sync::RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SignalStorage for InMemoryStorage {
    async fn create(&self, candidate: &SignalCandidate, created_at: DateTime<Utc>) -> Result<Uuid> {
        let id = Uuid::new_v4();
        let mut signals = self.signals.write().await;
        signals.insert(id, Signal::pending(id, candidate, created_at));
        Ok(id)
    }

    async fn update_result(
        &self,
        signal_id: Uuid,
        result: SignalResult,
        close_price: Option<Decimal>,
        verified_at: DateTime<Utc>,
    ) -> Result<bool> {
        let mut signals = self.signals.write().await;
        match signals.get_mut(&signal_id) {
            Some(signal) if signal.result == SignalResult::Pending => {
                signal.result = result;
                signal.close_price = close_price;
                signal.verified_at = Some(verified_at);
                Ok(true)
            }
            Some(_) => Ok(false),
            None => Err(SignalError::Persistence(format!("signal {} not found", signal_id))),
        }
    }

    async fn get(&self, signal_id: Uuid) -> Result<Option<Signal>> {
        let signals = self.signals.read().await;
        Ok(signals.get(&signal_id).cloned())
    }

    async fn get_all(&self) -> Result<Vec<Signal>> {
        let signals = self.signals.read().await;
        let mut all: Vec<Signal> = signals.values().cloned().collect();
        all.sort_by_key(|s| s.created_at);
        Ok(all)
    }
}

/// PostgreSQL signal storage
pub struct PgSignalStorage {
    pool: PgPool,
}

#[derive(sqlx::FromRow)]
struct SignalRow {
    id: Uuid,
    asset: String,
    timeframe: i32,
    direction: String,
    confidence: f64,
    entry_price: Decimal,
    target_price: Decimal,
    expiry_time: DateTime<Utc>,
    result: String,
    close_price: Option<Decimal>,
    created_at: DateTime<Utc>,
    verified_at: Option<DateTime<Utc>>,
}

impl TryFrom<SignalRow> for Signal {
    type Error = SignalError;

    fn try_from(row: SignalRow) -> Result<Self> {
        Ok(Signal {
            id: row.id,
            asset: row.asset,
            timeframe: u32::try_from(row.timeframe).map_err(|_| {
                SignalError::Persistence(format!("negative timeframe {}", row.timeframe))
            })?,
            direction: row.direction.parse()?,
            confidence: row.confidence,
            entry_price: row.entry_price,
            target_price: row.target_price,
            expiry_time: row.expiry_time,
            result: row.result.parse()?,
            close_price: row.close_price,
            created_at: row.created_at,
            verified_at: row.verified_at,
        })
    }
}

const SIGNAL_COLUMNS: &str = "id, asset, timeframe, direction, confidence, entry_price, target_price, \
     expiry_time, result, close_price, created_at, verified_at";

impl PgSignalStorage {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn init_tables(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS signals (
                id UUID PRIMARY KEY,
                asset TEXT NOT NULL,
                timeframe INTEGER NOT NULL,
                direction TEXT NOT NULL,
                confidence DOUBLE PRECISION NOT NULL,
                entry_price NUMERIC NOT NULL,
                target_price NUMERIC NOT NULL,
                expiry_time TIMESTAMPTZ NOT NULL,
                result TEXT NOT NULL DEFAULT 'PENDING',
                close_price NUMERIC,
                created_at TIMESTAMPTZ NOT NULL,
                verified_at TIMESTAMPTZ
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_signals_result ON signals(result)")
            .execute(&self.pool)
            .await?;

        info!("Signal tables initialized");
        Ok(())
    }
}

#[async_trait]
impl SignalStorage for PgSignalStorage {
    async fn create(&self, candidate: &SignalCandidate, created_at: DateTime<Utc>) -> Result<Uuid> {
        let id = Uuid::new_v4();
        let timeframe = i32::try_from(candidate.timeframe).map_err(|_| {
            SignalError::Persistence(format!("timeframe {} out of range", candidate.timeframe))
        })?;

        sqlx::query(
            r#"
            INSERT INTO signals
                (id, asset, timeframe, direction, confidence, entry_price, target_price,
                 expiry_time, result, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(id)
        .bind(&candidate.asset)
        .bind(timeframe)
        .bind(candidate.direction.as_str())
        .bind(candidate.confidence)
        .bind(candidate.entry_price)
        .bind(candidate.target_price)
        .bind(candidate.expiry_time)
        .bind(SignalResult::Pending.as_str())
        .bind(created_at)
        .execute(&self.pool)
        .await?;

        Ok(id)
    }

    async fn update_result(
        &self,
        signal_id: Uuid,
        result: SignalResult,
        close_price: Option<Decimal>,
        verified_at: DateTime<Utc>,
    ) -> Result<bool> {
        let updated = sqlx::query(
            r#"
            UPDATE signals
            SET result = $1, close_price = $2, verified_at = $3
            WHERE id = $4 AND result = 'PENDING'
            "#,
        )
        .bind(result.as_str())
        .bind(close_price)
        .bind(verified_at)
        .bind(signal_id)
        .execute(&self.pool)
        .await?;

        Ok(updated.rows_affected() == 1)
    }

    async fn get(&self, signal_id: Uuid) -> Result<Option<Signal>> {
        let query = format!("SELECT {} FROM signals WHERE id = $1", SIGNAL_COLUMNS);
        let row = sqlx::query_as::<_, SignalRow>(&query)
            .bind(signal_id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Signal::try_from).transpose()
    }

    async fn get_all(&self) -> Result<Vec<Signal>> {
        let query = format!("SELECT {} FROM signals ORDER BY created_at", SIGNAL_COLUMNS);
        let rows = sqlx::query_as::<_, SignalRow>(&query)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(Signal::try_from).collect()
    }

    async fn get_pending(&self) -> Result<Vec<Signal>> {
        let query = format!(
            "SELECT {} FROM signals WHERE result = 'PENDING' ORDER BY expiry_time",
            SIGNAL_COLUMNS
        );
        let rows = sqlx::query_as::<_, SignalRow>(&query)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(Signal::try_from).collect()
    }
}
