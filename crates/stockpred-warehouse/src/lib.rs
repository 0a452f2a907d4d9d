//! # Stockpred Warehouse
//!
//! DuckDB-backed prediction log for stockpred.
//!
//! Every successful forecast is appended to the `predictions` table as
//! `(ticker_symbol, predicted_price, prediction_timestamp)`. Rows are never
//! updated once written.
//!
//! ```rust,no_run
//! use stockpred_warehouse::{PredictionRow, Warehouse};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let warehouse = Warehouse::open_default()?;
//!     warehouse.insert_prediction(&PredictionRow::new("id-1", "AAPL", 191.2))?;
//!
//!     for row in warehouse.recent_predictions("AAPL", 10)? {
//!         println!("{} {} {}", row.recorded_at.unwrap_or_default(), row.ticker, row.predicted_price);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Tables
//!
//! | Table | Description |
//! |-------|-------------|
//! | `predictions` | One row per served forecast |
//! | `schema_migrations` | Applied migration versions |

pub mod duckdb;
pub mod migrations;

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use ::duckdb::{params, Connection, ToSql};
use serde::Serialize;
use thiserror::Error;

pub use crate::duckdb::{ConnectionPool, PooledConnection};

/// Errors raised by warehouse operations.
#[derive(Debug, Error)]
pub enum WarehouseError {
    #[error(transparent)]
    DuckDb(#[from] ::duckdb::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("invalid prediction row: {0}")]
    InvalidRow(String),
}

/// Location and pool sizing of the warehouse database.
#[derive(Debug, Clone)]
pub struct WarehouseConfig {
    /// Root directory for stockpred state.
    pub stockpred_home: PathBuf,
    /// Path to the `DuckDB` database file.
    pub db_path: PathBuf,
    /// Idle connections kept between requests.
    pub max_pool_size: usize,
}

impl Default for WarehouseConfig {
    fn default() -> Self {
        Self::in_home(resolve_stockpred_home())
    }
}

impl WarehouseConfig {
    /// Configuration rooted at an explicit home directory.
    pub fn in_home(stockpred_home: impl Into<PathBuf>) -> Self {
        let stockpred_home = stockpred_home.into();
        let db_path = stockpred_home.join("predictions.duckdb");
        Self {
            stockpred_home,
            db_path,
            max_pool_size: 4,
        }
    }
}

/// One row of the `predictions` table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionRow {
    pub id: String,
    pub ticker: String,
    pub predicted_price: f64,
    /// UTC timestamp as `YYYY-MM-DD HH:MM:SS`; `None` on insert means
    /// "stamp with the write time".
    pub recorded_at: Option<String>,
}

impl PredictionRow {
    pub fn new(id: impl Into<String>, ticker: impl Into<String>, predicted_price: f64) -> Self {
        Self {
            id: id.into(),
            ticker: ticker.into(),
            predicted_price,
            recorded_at: None,
        }
    }

    pub fn with_recorded_at(mut self, recorded_at: impl Into<String>) -> Self {
        self.recorded_at = Some(recorded_at.into());
        self
    }

    fn validate(&self) -> Result<(), WarehouseError> {
        if self.id.trim().is_empty() {
            return Err(WarehouseError::InvalidRow(String::from("id must not be empty")));
        }
        if self.ticker.trim().is_empty() || self.ticker.len() > 20 {
            return Err(WarehouseError::InvalidRow(format!(
                "ticker '{}' must be 1-20 characters",
                self.ticker
            )));
        }
        if !self.predicted_price.is_finite() {
            return Err(WarehouseError::InvalidRow(String::from(
                "predicted_price must be finite",
            )));
        }
        Ok(())
    }
}

/// Prediction log backed by a `DuckDB` file.
#[derive(Clone)]
pub struct Warehouse {
    config: WarehouseConfig,
    pool: ConnectionPool,
}

impl Warehouse {
    pub fn open_default() -> Result<Self, WarehouseError> {
        Self::open(WarehouseConfig::default())
    }

    /// Open (creating if needed) the warehouse and apply pending migrations.
    pub fn open(config: WarehouseConfig) -> Result<Self, WarehouseError> {
        if let Some(parent) = config.db_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let pool = ConnectionPool::open(config.db_path.clone(), config.max_pool_size)?;
        let warehouse = Self { config, pool };
        warehouse.initialize()?;
        tracing::debug!(path = %warehouse.db_path().display(), "warehouse opened");
        Ok(warehouse)
    }

    pub fn initialize(&self) -> Result<(), WarehouseError> {
        let connection = self.pool.acquire()?;
        migrations::apply_migrations(&connection)?;
        Ok(())
    }

    pub fn db_path(&self) -> &Path {
        self.pool.db_path()
    }

    pub fn config(&self) -> &WarehouseConfig {
        &self.config
    }

    pub fn insert_prediction(&self, row: &PredictionRow) -> Result<(), WarehouseError> {
        self.insert_predictions(std::slice::from_ref(row))
    }

    /// Append prediction rows in a single transaction; nothing is written if
    /// any row fails.
    pub fn insert_predictions(&self, rows: &[PredictionRow]) -> Result<(), WarehouseError> {
        if rows.is_empty() {
            return Ok(());
        }
        for row in rows {
            row.validate()?;
        }

        let connection = self.pool.acquire()?;
        connection.execute_batch("BEGIN TRANSACTION")?;
        let result = (|| -> Result<(), WarehouseError> {
            for row in rows {
                let params: [&dyn ToSql; 4] =
                    [&row.id, &row.ticker, &row.predicted_price, &row.recorded_at];
                connection.execute(
                    "INSERT INTO predictions \
                     (id, ticker_symbol, predicted_price, prediction_timestamp) \
                     VALUES (?, ?, ?, COALESCE(CAST(? AS TIMESTAMP), CAST(now() AS TIMESTAMP)))",
                    params.as_slice(),
                )?;
            }
            Ok(())
        })();

        finalize_transaction(&connection, result)
    }

    /// Most recent predictions for `ticker`, newest first.
    pub fn recent_predictions(
        &self,
        ticker: &str,
        limit: usize,
    ) -> Result<Vec<PredictionRow>, WarehouseError> {
        let connection = self.pool.acquire()?;
        let mut statement = connection.prepare(
            "SELECT id, ticker_symbol, predicted_price, \
             strftime(prediction_timestamp, '%Y-%m-%d %H:%M:%S') \
             FROM predictions WHERE ticker_symbol = ? \
             ORDER BY prediction_timestamp DESC, id DESC LIMIT ?",
        )?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = statement.query_map(params![ticker, limit], |row| {
            Ok(PredictionRow {
                id: row.get(0)?,
                ticker: row.get(1)?,
                predicted_price: row.get(2)?,
                recorded_at: row.get(3)?,
            })
        })?;

        rows.collect::<Result<Vec<_>, _>>().map_err(WarehouseError::from)
    }

    pub fn prediction_count(&self, ticker: &str) -> Result<u64, WarehouseError> {
        let connection = self.pool.acquire()?;
        let count: i64 = connection.query_row(
            "SELECT COUNT(*) FROM predictions WHERE ticker_symbol = ?",
            params![ticker],
            |row| row.get(0),
        )?;
        Ok(u64::try_from(count).unwrap_or_default())
    }
}

fn finalize_transaction<T>(
    connection: &Connection,
    result: Result<T, WarehouseError>,
) -> Result<T, WarehouseError> {
    match result {
        Ok(value) => {
            connection.execute_batch("COMMIT")?;
            Ok(value)
        }
        Err(error) => {
            if let Err(rollback) = connection.execute_batch("ROLLBACK") {
                tracing::warn!(%rollback, "rollback after failed insert also failed");
            }
            Err(error)
        }
    }
}

fn resolve_stockpred_home() -> PathBuf {
    if let Some(path) = env::var_os("STOCKPRED_HOME") {
        let path = PathBuf::from(path);
        if !path.as_os_str().is_empty() {
            return path;
        }
    }

    if let Some(home) = env::var_os("HOME") {
        return PathBuf::from(home).join(".stockpred");
    }

    PathBuf::from(".stockpred")
}
