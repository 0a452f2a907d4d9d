//! # Stockpred Web
//!
//! HTTP surface of the prediction pipeline.
//!
//! | Route | Method | Body | Response |
//! |-------|--------|------|----------|
//! | `/predict` | `POST` | `{"ticker": "AAPL"}` | `{"prediction", "historical_data", "warning"?}` |
//! | `/health` | `GET` | | `{"status": "ok", "model": ...}` |
//!
//! Failures answer `{"error": message}`: `400` when the caller can fix the
//! request (missing or malformed ticker, not enough history), `500`
//! otherwise. CORS is open to any origin.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use stockpred_core::{HistoricalPoint, PredictionEngine, PredictionError, PredictionOutcome};
use thiserror::Error;
use tower_http::cors::CorsLayer;

/// Errors raised while running the server.
#[derive(Debug, Error)]
pub enum WebError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
    #[error("server error: {0}")]
    Serve(#[from] std::io::Error),
}

#[derive(Debug, Default, Deserialize)]
struct PredictRequest {
    #[serde(default)]
    ticker: Option<String>,
}

#[derive(Debug, Serialize)]
struct PredictBody {
    prediction: f64,
    historical_data: Vec<HistoricalPoint>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warning: Option<String>,
}

impl From<PredictionOutcome> for PredictBody {
    fn from(outcome: PredictionOutcome) -> Self {
        Self {
            prediction: outcome.response.prediction,
            historical_data: outcome.response.historical_data,
            warning: outcome.warning,
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

/// A request-level failure rendered as `{"error": ...}`.
#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

impl From<PredictionError> for ApiError {
    fn from(error: PredictionError) -> Self {
        let status = if error.is_client_error() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        Self {
            status,
            message: error.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorBody { error: self.message })).into_response()
    }
}

#[derive(Clone)]
struct AppState {
    engine: Arc<PredictionEngine>,
}

/// Build the application router around a shared engine.
pub fn router(engine: Arc<PredictionEngine>) -> Router {
    Router::new()
        .route("/predict", post(predict))
        .route("/health", get(health))
        .layer(CorsLayer::permissive())
        .with_state(AppState { engine })
}

/// Bind `addr` and serve until the process is stopped.
pub async fn serve(addr: SocketAddr, engine: Arc<PredictionEngine>) -> Result<(), WebError> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|source| WebError::Bind { addr, source })?;
    tracing::info!(%addr, model = engine.model_name(), "listening");
    axum::serve(listener, router(engine)).await?;
    Ok(())
}

async fn predict(State(state): State<AppState>, body: Bytes) -> Result<Response, ApiError> {
    let request = parse_request(&body)?;
    let outcome = state.engine.run(request.ticker.as_deref()).await.map_err(|error| {
        if !error.is_client_error() {
            tracing::error!(code = error.code(), %error, "prediction failed");
        }
        ApiError::from(error)
    })?;

    Ok(Json(PredictBody::from(outcome)).into_response())
}

// An empty body is treated like a body without a ticker.
fn parse_request(body: &[u8]) -> Result<PredictRequest, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(PredictRequest::default());
    }
    serde_json::from_slice(body).map_err(|error| {
        ApiError::bad_request(format!("request body must be a JSON object: {error}"))
    })
}

async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "model": state.engine.model_name(),
    }))
}
