//! Next-close prediction pipeline.
//!
//! ```text
//! ticker ─▶ validate ─▶ fetch closes ─▶ length gate ─▶ fit_transform
//!                                                        │
//!   response ◀─ store record ◀─ inverse ◀─ model(window) ◀┘
//! ```
//!
//! Validation and the length gate run before anything expensive: a missing
//! ticker never reaches the source, and a short history never reaches the
//! model or the store. Store failures are reported as a warning on the
//! outcome instead of discarding a computed forecast.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tokio::task::JoinError;

use crate::config::EngineConfig;
use crate::data_source::{HistoryRequest, PriceSource, SourceError, SourceErrorKind};
use crate::model::SharedModel;
use crate::normalizer::{NormalizationState, Window, WindowNormalizer};
use crate::store::{PredictionRecord, PredictionStore};
use crate::{
    ClosePoint, ModelError, PredictionError, PredictionResponse, PriceSeries, StoreError, Ticker,
};

/// A served forecast.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionOutcome {
    pub response: PredictionResponse,
    pub record: PredictionRecord,
    /// Set when the forecast could not be persisted.
    pub warning: Option<String>,
}

impl PredictionOutcome {
    pub fn prediction(&self) -> f64 {
        self.response.prediction
    }
}

/// Orchestrates source, normalizer, model and store for one request at a
/// time; safe to share across concurrent requests.
#[derive(Clone)]
pub struct PredictionEngine {
    source: Arc<dyn PriceSource>,
    model: Arc<SharedModel>,
    store: Arc<dyn PredictionStore>,
    config: EngineConfig,
    normalizer: WindowNormalizer,
}

impl PredictionEngine {
    pub fn new(
        source: Arc<dyn PriceSource>,
        model: Arc<SharedModel>,
        store: Arc<dyn PredictionStore>,
        config: EngineConfig,
    ) -> Self {
        Self {
            source,
            model,
            store,
            normalizer: WindowNormalizer::new(config.time_steps),
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn model_name(&self) -> &str {
        self.model.name()
    }

    /// Forecast from an already-fetched series, calling the model and the
    /// store on the current thread.
    pub fn predict(&self, series: &PriceSeries) -> Result<PredictionOutcome, PredictionError> {
        let (state, window) = self.normalizer.prepare(&series.closes())?;
        let scaled = self.model.predict(&window)?;
        let (response, record) = self.assemble(series, &state, scaled);

        let warning = self
            .store
            .record(&record)
            .err()
            .map(|error| store_warning(&record, &PredictionError::StoreWriteFailure(error)));

        Ok(PredictionOutcome {
            response,
            record,
            warning,
        })
    }

    /// Full request pipeline for a raw, possibly absent ticker.
    pub async fn run(&self, ticker: Option<&str>) -> Result<PredictionOutcome, PredictionError> {
        let ticker = Ticker::parse(ticker.unwrap_or_default())?;
        tracing::info!(%ticker, source = self.source.id(), "prediction requested");

        let points = self.fetch(&ticker).await?;
        self.normalizer.ensure_history(points.len())?;

        let series = PriceSeries::new(ticker, points).map_err(|error| {
            PredictionError::DataFetchFailure(SourceError::internal(format!(
                "source returned an unusable series: {error}"
            )))
        })?;

        let (state, window) = self.normalizer.prepare(&series.closes())?;
        let scaled = self.infer(window).await?;
        let (response, record) = self.assemble(&series, &state, scaled);
        let warning = self.persist(&record).await;

        tracing::info!(
            ticker = %record.ticker,
            prediction = response.prediction,
            points = response.historical_data.len(),
            "prediction served"
        );

        Ok(PredictionOutcome {
            response,
            record,
            warning,
        })
    }

    async fn fetch(&self, ticker: &Ticker) -> Result<Vec<ClosePoint>, PredictionError> {
        let request = HistoryRequest::trailing_days(ticker.clone(), self.config.lookback_days);
        let timeout_ms = millis(self.config.fetch_timeout);

        match tokio::time::timeout(self.config.fetch_timeout, self.source.daily_closes(request))
            .await
        {
            Ok(Ok(points)) => {
                tracing::debug!(%ticker, points = points.len(), "history fetched");
                Ok(points)
            }
            Ok(Err(error)) if error.kind() == SourceErrorKind::Timeout => {
                tracing::warn!(%ticker, timeout_ms, %error, "history transport timed out");
                Err(PredictionError::DataFetchTimeout { timeout_ms })
            }
            Ok(Err(error)) => {
                tracing::warn!(%ticker, code = error.code(), %error, "history fetch failed");
                Err(PredictionError::DataFetchFailure(error))
            }
            Err(_) => {
                tracing::warn!(%ticker, timeout_ms, "history fetch timed out");
                Err(PredictionError::DataFetchTimeout { timeout_ms })
            }
        }
    }

    async fn infer(&self, window: Window) -> Result<f64, PredictionError> {
        let model = Arc::clone(&self.model);
        let timeout_ms = millis(self.config.inference_timeout);
        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&cancelled);
        let task =
            tokio::task::spawn_blocking(move || model.predict_unless_cancelled(&window, &flag));

        // A timed-out task cannot be stopped once the model runs; the flag
        // only keeps it from starting if it is still queued.
        let result = match tokio::time::timeout(self.config.inference_timeout, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join)) => Err(join_failure(join)),
            Err(_) => {
                cancelled.store(true, Ordering::Release);
                Err(ModelError::Timeout { timeout_ms })
            }
        };

        result.map_err(|error| {
            tracing::error!(model = self.model.name(), %error, "inference failed");
            PredictionError::ModelInferenceFailure(error)
        })
    }

    async fn persist(&self, record: &PredictionRecord) -> Option<String> {
        let store = Arc::clone(&self.store);
        let owned = record.clone();
        let outcome = tokio::task::spawn_blocking(move || store.record(&owned)).await;

        let error = match outcome {
            Ok(Ok(())) => return None,
            Ok(Err(error)) => PredictionError::StoreWriteFailure(error),
            Err(join) => PredictionError::StoreWriteFailure(StoreError::new(join.to_string())),
        };
        Some(store_warning(record, &error))
    }

    fn assemble(
        &self,
        series: &PriceSeries,
        state: &NormalizationState,
        scaled: f64,
    ) -> (PredictionResponse, PredictionRecord) {
        let prediction = self.normalizer.inverse(state, scaled);
        let record = PredictionRecord::new(series.ticker().clone(), prediction);
        let response = PredictionResponse {
            prediction,
            historical_data: series.to_historical(),
        };
        (response, record)
    }
}

fn store_warning(record: &PredictionRecord, error: &PredictionError) -> String {
    tracing::warn!(
        ticker = %record.ticker,
        id = %record.id,
        code = error.code(),
        %error,
        "prediction computed but not recorded"
    );
    format!("prediction was not recorded: {error}")
}

fn join_failure(error: JoinError) -> ModelError {
    if error.is_panic() {
        ModelError::Backend(String::from("model panicked during inference"))
    } else {
        ModelError::Backend(error.to_string())
    }
}

fn millis(duration: std::time::Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
