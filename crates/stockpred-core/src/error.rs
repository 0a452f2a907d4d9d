use thiserror::Error;

use crate::data_source::SourceError;

/// Validation and contract errors for domain values.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("ticker symbol is required")]
    EmptyTicker,
    #[error("ticker length {len} exceeds max {max}")]
    TickerTooLong { len: usize, max: usize },
    #[error("ticker must start with an ASCII letter or '^': '{ch}'")]
    TickerInvalidStart { ch: char },
    #[error("ticker contains invalid character '{ch}' at index {index}")]
    TickerInvalidChar { ch: char, index: usize },

    #[error("timestamp must be RFC3339 UTC (suffix Z): '{value}'")]
    TimestampNotUtc { value: String },

    #[error("field '{field}' must be finite")]
    NonFiniteValue { field: &'static str },
    #[error("field '{field}' must be non-negative")]
    NegativeValue { field: &'static str },

    #[error("price series must contain at least one point")]
    EmptySeries,
    #[error("price series is not in ascending date order at index {index}")]
    UnorderedSeries { index: usize },
    #[error("price series contains duplicate date {date}")]
    DuplicateDate { date: String },
}

/// Failures raised by a sequence model or its loader.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ModelError {
    #[error("model expects a window of {expected} values, got {actual}")]
    ShapeMismatch { expected: usize, actual: usize },
    #[error("model produced a non-finite output ({value})")]
    NonFiniteOutput { value: f64 },
    #[error("model artifact is invalid: {0}")]
    InvalidArtifact(String),
    #[error("failed to read model artifact: {0}")]
    Io(String),
    #[error("inference backend failed: {0}")]
    Backend(String),
    #[error("inference did not finish within {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
    #[error("inference abandoned before the model was invoked")]
    Cancelled,
}

/// Persistence failure reported by a [`PredictionStore`](crate::store::PredictionStore).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct StoreError {
    message: String,
}

impl StoreError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Everything that can abort a prediction request.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PredictionError {
    #[error("Ticker symbol is required")]
    MissingTicker,

    #[error("invalid ticker: {0}")]
    InvalidTicker(ValidationError),

    #[error("Not enough historical data ({observed} days) to predict; at least {required} are required")]
    InsufficientHistory { observed: usize, required: usize },

    #[error("failed to fetch market data: {0}")]
    DataFetchFailure(SourceError),

    #[error("market data fetch did not finish within {timeout_ms}ms")]
    DataFetchTimeout { timeout_ms: u64 },

    #[error("model inference failed: {0}")]
    ModelInferenceFailure(#[from] ModelError),

    #[error("failed to record prediction: {0}")]
    StoreWriteFailure(StoreError),
}

impl PredictionError {
    /// Stable machine-readable code.
    pub const fn code(&self) -> &'static str {
        match self {
            Self::MissingTicker => "request.missing_ticker",
            Self::InvalidTicker(_) => "request.invalid_ticker",
            Self::InsufficientHistory { .. } => "data.insufficient_history",
            Self::DataFetchFailure(_) => "data.fetch_failure",
            Self::DataFetchTimeout { .. } => "data.fetch_timeout",
            Self::ModelInferenceFailure(_) => "model.inference_failure",
            Self::StoreWriteFailure(_) => "store.write_failure",
        }
    }

    /// `true` when the caller can fix the request (400-class).
    pub const fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::MissingTicker | Self::InvalidTicker(_) | Self::InsufficientHistory { .. }
        )
    }
}

impl From<ValidationError> for PredictionError {
    fn from(error: ValidationError) -> Self {
        match error {
            ValidationError::EmptyTicker => Self::MissingTicker,
            other => Self::InvalidTicker(other),
        }
    }
}
