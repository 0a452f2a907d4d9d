//! Behavior-driven tests for failure handling
//!
//! These tests verify that every failure mode surfaces as the right error
//! kind, that nothing is recorded when a forecast could not be produced, and
//! that upstream failures never leak panics to the caller.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use stockpred_core::{
    CircuitBreaker, CircuitBreakerConfig, CircuitState, EngineConfig, FnModel, HttpClient,
    HttpError, HttpFuture, HttpRequest, HttpResponse, ModelError, PredictionEngine,
    PredictionError, SharedModel, SourceError, SourceErrorKind, YahooAdapter, TIME_STEPS,
};
use stockpred_tests::{engine_with, memory_store, rising_closes, BrokenStore, ScriptedSource};

// =============================================================================
// Request Validation
// =============================================================================

#[tokio::test]
async fn when_ticker_is_missing_no_data_is_fetched() {
    // Given: A source that would answer
    let source = Arc::new(ScriptedSource::closes(&rising_closes(65)));
    let engine = engine_with(source.clone(), 0.5, memory_store());

    // When: The ticker is absent or blank
    let absent = engine.run(None).await.expect_err("absent ticker");
    let blank = engine.run(Some("   ")).await.expect_err("blank ticker");

    // Then: Both are rejected as missing before any upstream call
    assert_eq!(absent, PredictionError::MissingTicker);
    assert_eq!(blank, PredictionError::MissingTicker);
    assert_eq!(absent.to_string(), "Ticker symbol is required");
    assert_eq!(source.calls(), 0);
}

#[tokio::test]
async fn when_ticker_is_malformed_request_is_rejected_as_client_error() {
    // Given: An engine
    let source = Arc::new(ScriptedSource::closes(&rising_closes(65)));
    let engine = engine_with(source.clone(), 0.5, memory_store());

    // When: The ticker contains characters no symbol can hold
    let error = engine
        .run(Some("AAPL; DROP TABLE predictions"))
        .await
        .expect_err("malformed ticker");

    // Then: It is an invalid-ticker client error and the source is untouched
    assert!(matches!(error, PredictionError::InvalidTicker(_)));
    assert!(error.is_client_error());
    assert_eq!(source.calls(), 0);
}

// =============================================================================
// Insufficient History
// =============================================================================

#[tokio::test]
async fn when_history_is_one_day_short_nothing_is_recorded() {
    // Given: 59 closes
    let store = memory_store();
    let engine = engine_with(
        Arc::new(ScriptedSource::closes(&rising_closes(TIME_STEPS - 1))),
        0.5,
        store.clone(),
    );

    // When: A forecast is requested
    let error = engine.run(Some("TEST")).await.expect_err("short history");

    // Then: The observed and required counts are reported
    assert_eq!(
        error,
        PredictionError::InsufficientHistory {
            observed: 59,
            required: 60,
        }
    );
    assert!(error.to_string().contains("Not enough historical data"));
    assert!(store.is_empty());
}

#[tokio::test]
async fn when_ticker_is_unknown_history_is_empty() {
    // Given: A source with no rows for the ticker
    let engine = engine_with(Arc::new(ScriptedSource::closes(&[])), 0.5, memory_store());

    // When: A forecast is requested
    let error = engine.run(Some("ZZZZ")).await.expect_err("no history");

    // Then: It reads as zero observed days
    assert!(matches!(
        error,
        PredictionError::InsufficientHistory { observed: 0, .. }
    ));
}

#[tokio::test]
async fn when_exactly_sixty_days_exist_forecast_succeeds() {
    // Given: Exactly TIME_STEPS closes
    let engine = engine_with(
        Arc::new(ScriptedSource::closes(&rising_closes(TIME_STEPS))),
        0.0,
        memory_store(),
    );

    // When: A forecast is requested
    let outcome = engine.run(Some("EDGE")).await.expect("boundary forecast");

    // Then: The minimum close comes back for a zero model output
    assert_eq!(outcome.prediction(), 100.0);
}

// =============================================================================
// Upstream Failures
// =============================================================================

#[tokio::test]
async fn when_source_fails_error_is_a_server_side_fetch_failure() {
    // Given: A source that is down
    let store = memory_store();
    let engine = engine_with(
        Arc::new(ScriptedSource::failing(SourceError::unavailable(
            "upstream returned 503",
        ))),
        0.5,
        store.clone(),
    );

    // When: A forecast is requested
    let error = engine.run(Some("AAPL")).await.expect_err("fetch failure");

    // Then: The source error is carried through and nothing is recorded
    match &error {
        PredictionError::DataFetchFailure(source) => {
            assert_eq!(source.kind(), SourceErrorKind::Unavailable);
            assert!(source.retryable());
        }
        other => panic!("expected fetch failure, got {other:?}"),
    }
    assert!(!error.is_client_error());
    assert_eq!(error.code(), "data.fetch_failure");
    assert!(store.is_empty());
}

struct StatusClient {
    status: u16,
}

impl HttpClient for StatusClient {
    fn execute<'a>(&'a self, _request: HttpRequest) -> HttpFuture<'a> {
        let status = self.status;
        Box::pin(async move { Ok(HttpResponse::with_status(status, "{}")) })
    }
}

struct DroppedClient;

struct StalledClient;

impl HttpClient for StalledClient {
    fn execute<'a>(&'a self, _request: HttpRequest) -> HttpFuture<'a> {
        Box::pin(async move { Err(HttpError::timeout("request timeout: deadline elapsed")) })
    }
}

impl HttpClient for DroppedClient {
    fn execute<'a>(&'a self, _request: HttpRequest) -> HttpFuture<'a> {
        Box::pin(async move { Err(HttpError::new("connection reset by peer")) })
    }
}

fn yahoo_engine(adapter: YahooAdapter) -> PredictionEngine {
    PredictionEngine::new(
        Arc::new(adapter),
        Arc::new(SharedModel::from_model(stockpred_core::constant_model(0.5))),
        memory_store(),
        EngineConfig::default(),
    )
}

#[tokio::test]
async fn when_yahoo_does_not_know_ticker_history_is_insufficient() {
    // Given: Yahoo answering 404
    let engine = yahoo_engine(YahooAdapter::with_http_client(Arc::new(StatusClient {
        status: 404,
    })));

    // When: A forecast is requested
    let error = engine.run(Some("NOPE")).await.expect_err("unknown ticker");

    // Then: An unknown ticker reads as no history, a client error
    assert!(matches!(
        error,
        PredictionError::InsufficientHistory { observed: 0, .. }
    ));
}

#[tokio::test]
async fn when_yahoo_keeps_failing_circuit_opens_and_calls_stop() {
    // Given: A transport that always drops the connection
    let breaker = Arc::new(CircuitBreaker::new(CircuitBreakerConfig {
        failure_threshold: 2,
        open_timeout: Duration::from_secs(60),
    }));
    let engine = yahoo_engine(
        YahooAdapter::with_http_client(Arc::new(DroppedClient))
            .with_circuit_breaker(breaker.clone()),
    );

    // When: Three forecasts are requested
    for _ in 0..2 {
        let error = engine.run(Some("AAPL")).await.expect_err("transport");
        assert!(matches!(error, PredictionError::DataFetchFailure(_)));
    }
    let error = engine.run(Some("AAPL")).await.expect_err("circuit open");

    // Then: The breaker is open and the third call never reached upstream
    assert_eq!(breaker.state(), CircuitState::Open);
    match error {
        PredictionError::DataFetchFailure(source) => {
            assert!(source.message().contains("circuit breaker is open"));
        }
        other => panic!("expected fetch failure, got {other:?}"),
    }
}

#[tokio::test]
async fn when_yahoo_transport_times_out_caller_sees_fetch_timeout() {
    // Given: A transport whose own deadline fires before the engine's
    let engine = yahoo_engine(YahooAdapter::with_http_client(Arc::new(StalledClient)));

    // When: A forecast is requested
    let error = engine.run(Some("AAPL")).await.expect_err("timeout");

    // Then: It is reported as a fetch timeout, not a generic failure
    assert!(matches!(error, PredictionError::DataFetchTimeout { .. }));
    assert_eq!(error.code(), "data.fetch_timeout");
}

#[tokio::test]
async fn when_yahoo_returns_server_error_fetch_fails() {
    // Given: Yahoo answering 500
    let engine = yahoo_engine(YahooAdapter::with_http_client(Arc::new(StatusClient {
        status: 500,
    })));

    // When: A forecast is requested
    let error = engine.run(Some("AAPL")).await.expect_err("server error");

    // Then: It is a retryable fetch failure
    match error {
        PredictionError::DataFetchFailure(source) => assert!(source.retryable()),
        other => panic!("expected fetch failure, got {other:?}"),
    }
}

// =============================================================================
// Model Failures
// =============================================================================

#[tokio::test]
async fn when_model_panics_caller_gets_inference_failure() {
    // Given: A model that panics on every window
    let store = memory_store();
    let engine = PredictionEngine::new(
        Arc::new(ScriptedSource::closes(&rising_closes(65))),
        Arc::new(SharedModel::from_model(FnModel::new(
            "panicking",
            |_window: &[f64]| -> Result<f64, ModelError> { panic!("weights corrupted") },
        ))),
        store.clone(),
        EngineConfig::default(),
    );

    // When: A forecast is requested
    let error = engine.run(Some("TEST")).await.expect_err("panic");

    // Then: The panic is contained and nothing is recorded
    assert!(matches!(
        error,
        PredictionError::ModelInferenceFailure(ModelError::Backend(_))
    ));
    assert_eq!(error.code(), "model.inference_failure");
    assert!(store.is_empty());
}

#[tokio::test]
async fn when_model_is_slow_request_times_out() {
    // Given: A model slower than the inference budget
    let engine = PredictionEngine::new(
        Arc::new(ScriptedSource::closes(&rising_closes(65))),
        Arc::new(SharedModel::from_model(FnModel::new(
            "slow",
            |_window: &[f64]| {
                std::thread::sleep(Duration::from_millis(300));
                Ok(0.5)
            },
        ))),
        memory_store(),
        EngineConfig::default().with_inference_timeout(Duration::from_millis(20)),
    );

    // When: A forecast is requested
    let error = engine.run(Some("TEST")).await.expect_err("timeout");

    // Then: The timeout is reported as an inference failure
    assert_eq!(
        error,
        PredictionError::ModelInferenceFailure(ModelError::Timeout { timeout_ms: 20 })
    );
}

#[tokio::test]
async fn when_queued_inference_is_abandoned_model_runs_only_once() {
    // Given: A model that holds the inference slot longer than the budget
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let engine = PredictionEngine::new(
        Arc::new(ScriptedSource::closes(&rising_closes(65))),
        Arc::new(SharedModel::from_model(FnModel::new(
            "slow",
            move |_window: &[f64]| {
                counter.fetch_add(1, Ordering::SeqCst);
                std::thread::sleep(Duration::from_millis(400));
                Ok(0.5)
            },
        ))),
        memory_store(),
        EngineConfig::default().with_inference_timeout(Duration::from_millis(100)),
    );

    // When: Two forecasts race and both give up waiting
    let (first, second) = tokio::join!(engine.run(Some("AAPL")), engine.run(Some("MSFT")));
    tokio::time::sleep(Duration::from_millis(600)).await;

    // Then: Both time out and the queued one never reached the model
    for result in [first, second] {
        assert!(matches!(
            result,
            Err(PredictionError::ModelInferenceFailure(ModelError::Timeout { .. }))
        ));
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

// =============================================================================
// Store Failures
// =============================================================================

#[tokio::test]
async fn when_store_is_unwritable_prediction_is_still_served() {
    // Given: A prediction log that rejects writes
    let engine = engine_with(
        Arc::new(ScriptedSource::closes(&rising_closes(65))),
        0.5,
        Arc::new(BrokenStore),
    );

    // When: A forecast is requested
    let outcome = engine.run(Some("TEST")).await.expect("forecast");

    // Then: The forecast is intact and the lost write is reported
    assert_eq!(outcome.prediction(), 132.0);
    let warning = outcome.warning.expect("warning");
    assert!(warning.contains("not recorded"));
    assert!(warning.contains("read-only"));
}
