//! Durable prediction log contract.

use std::sync::{Mutex, PoisonError};

use serde::Serialize;
use stockpred_warehouse::{PredictionRow, Warehouse};
use uuid::Uuid;

use crate::{StoreError, Ticker, UtcDateTime};

/// One served forecast, immutable once written.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionRecord {
    pub id: Uuid,
    pub ticker: Ticker,
    pub predicted_price: f64,
    pub timestamp: UtcDateTime,
}

impl PredictionRecord {
    /// Stamp a new record with a fresh id and the current time.
    pub fn new(ticker: Ticker, predicted_price: f64) -> Self {
        Self {
            id: Uuid::new_v4(),
            ticker,
            predicted_price,
            timestamp: UtcDateTime::now(),
        }
    }
}

/// Sink for served forecasts. Calls may block; async callers should move
/// them off the runtime.
pub trait PredictionStore: Send + Sync {
    fn record(&self, record: &PredictionRecord) -> Result<(), StoreError>;
}

impl PredictionStore for Warehouse {
    fn record(&self, record: &PredictionRecord) -> Result<(), StoreError> {
        let row = PredictionRow::new(
            record.id.to_string(),
            record.ticker.as_str(),
            record.predicted_price,
        )
        .with_recorded_at(record.timestamp.format_storage());

        self.insert_prediction(&row)
            .map_err(|error| StoreError::new(error.to_string()))
    }
}

/// In-process store for tests and embedding.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<Vec<PredictionRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<PredictionRecord> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl PredictionStore for MemoryStore {
    fn record(&self, record: &PredictionRecord) -> Result<(), StoreError> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record.clone());
        Ok(())
    }
}

/// Stands in for a prediction log that could not be opened. Every write
/// fails, so callers surface the lost record instead of silently buffering it.
#[derive(Debug, Clone)]
pub struct UnavailableStore {
    reason: String,
}

impl UnavailableStore {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl PredictionStore for UnavailableStore {
    fn record(&self, _record: &PredictionRecord) -> Result<(), StoreError> {
        Err(StoreError::new(format!(
            "prediction log unavailable: {}",
            self.reason
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stockpred_warehouse::WarehouseConfig;

    #[test]
    fn warehouse_store_persists_record_with_its_timestamp() {
        let temp = tempfile::tempdir().expect("tempdir");
        let warehouse = Warehouse::open(WarehouseConfig::in_home(temp.path())).expect("open");

        let mut record = PredictionRecord::new(Ticker::parse("nvda").expect("valid"), 131.5);
        record.timestamp = UtcDateTime::parse("2025-02-03T20:15:00Z").expect("valid");
        warehouse.record(&record).expect("record");

        let rows = warehouse.recent_predictions("NVDA", 5).expect("query");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, record.id.to_string());
        assert_eq!(rows[0].predicted_price, 131.5);
        assert_eq!(rows[0].recorded_at.as_deref(), Some("2025-02-03 20:15:00"));
    }

    #[test]
    fn warehouse_errors_become_store_errors() {
        let temp = tempfile::tempdir().expect("tempdir");
        let warehouse = Warehouse::open(WarehouseConfig::in_home(temp.path())).expect("open");

        let record = PredictionRecord::new(Ticker::parse("AAPL").expect("valid"), f64::NAN);
        let error = warehouse.record(&record).expect_err("nan price");
        assert!(error.message().contains("predicted_price must be finite"));
    }

    #[test]
    fn memory_store_keeps_records_in_order() {
        let store = MemoryStore::new();
        for price in [1.0, 2.0] {
            store
                .record(&PredictionRecord::new(
                    Ticker::parse("TEST").expect("valid"),
                    price,
                ))
                .expect("record");
        }

        let prices: Vec<f64> = store.records().iter().map(|r| r.predicted_price).collect();
        assert_eq!(prices, vec![1.0, 2.0]);
    }

    #[test]
    fn unavailable_store_rejects_every_write() {
        let store = UnavailableStore::new("database is locked");
        let record = PredictionRecord::new(Ticker::parse("TEST").expect("valid"), 10.0);

        for _ in 0..2 {
            let error = store.record(&record).expect_err("unavailable");
            assert_eq!(
                error.message(),
                "prediction log unavailable: database is locked"
            );
        }
    }
}
