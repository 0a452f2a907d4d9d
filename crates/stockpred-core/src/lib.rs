//! # Stockpred Core
//!
//! Next-close forecasting for a single ticker from its recent daily closes.
//!
//! ## Overview
//!
//! - **Window normalization** of a raw close series into a fixed, unit-range
//!   model input, with the inverse mapping carried per request
//! - **Sequence model contract** plus an LSTM inference backend
//! - **Market-data source contract** and a Yahoo chart adapter
//! - **Prediction pipeline** wiring source, model and prediction log together
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`adapters`] | Market-data adapters (Yahoo) |
//! | [`circuit_breaker`] | Circuit breaker for upstream calls |
//! | [`config`] | Engine configuration and environment overrides |
//! | [`data_source`] | Price source trait, history request, source errors |
//! | [`domain`] | Ticker, price series, response types, timestamps |
//! | [`engine`] | The prediction pipeline |
//! | [`error`] | Validation, model, store and prediction errors |
//! | [`http_client`] | HTTP client abstraction |
//! | [`model`] | Sequence model trait, shared handle, LSTM backend |
//! | [`normalizer`] | Min-max window normalization |
//! | [`store`] | Prediction log contract |
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use stockpred_core::{
//!     EngineConfig, LstmModel, MemoryStore, PredictionEngine, SharedModel, YahooAdapter,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let model = SharedModel::from_model(LstmModel::load("model.json")?);
//!     let engine = PredictionEngine::new(
//!         Arc::new(YahooAdapter::default()),
//!         Arc::new(model),
//!         Arc::new(MemoryStore::new()),
//!         EngineConfig::from_env(),
//!     );
//!
//!     let outcome = engine.run(Some("AAPL")).await?;
//!     println!("next close: {:.2}", outcome.prediction());
//!     Ok(())
//! }
//! ```
//!
//! ## Error Handling
//!
//! Every pipeline failure is a [`PredictionError`] with a stable
//! [`code`](PredictionError::code). Caller mistakes (missing or malformed
//! ticker, too little history) report `is_client_error() == true`; upstream,
//! model and store failures do not.

pub mod adapters;
pub mod circuit_breaker;
pub mod config;
pub mod data_source;
pub mod domain;
pub mod engine;
pub mod error;
pub mod http_client;
pub mod model;
pub mod normalizer;
pub mod store;

// Adapter implementations
pub use adapters::YahooAdapter;

// Circuit breaker
pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};

// Configuration
pub use config::EngineConfig;

// Data source trait and types
pub use data_source::{HistoryRequest, PriceSource, SourceError, SourceErrorKind, SourceFuture};

// Domain models
pub use domain::{
    format_date, ClosePoint, HistoricalPoint, PredictionResponse, PriceSeries, Ticker,
    UtcDateTime,
};

// Pipeline
pub use engine::{PredictionEngine, PredictionOutcome};

// Error types
pub use error::{ModelError, PredictionError, StoreError, ValidationError};

// HTTP client types
pub use http_client::{
    HttpClient, HttpError, HttpFuture, HttpRequest, HttpResponse, NoopHttpClient,
    ReqwestHttpClient,
};

// Models
pub use model::{constant_model, FnModel, LstmModel, SequenceModel, SharedModel};

// Normalization
pub use normalizer::{NormalizationState, Window, WindowNormalizer, TIME_STEPS};

// Prediction log
pub use store::{MemoryStore, PredictionRecord, PredictionStore, UnavailableStore};
