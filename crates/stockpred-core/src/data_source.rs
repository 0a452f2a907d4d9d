//! Market-data source contract.
//!
//! A [`PriceSource`] answers one question: the daily closes of a ticker over
//! a closed date range. Adapters (see [`crate::adapters`]) implement it; the
//! prediction engine only ever sees this trait.

use std::fmt::{Display, Formatter};
use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};
use time::{Date, Duration};

use crate::{ClosePoint, Ticker, UtcDateTime};

/// Boxed future returned by [`PriceSource`] methods.
pub type SourceFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, SourceError>> + Send + 'a>>;

/// Daily-close history request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryRequest {
    pub ticker: Ticker,
    pub start: Date,
    pub end: Date,
}

impl HistoryRequest {
    pub fn new(ticker: Ticker, start: Date, end: Date) -> Result<Self, SourceError> {
        if start > end {
            return Err(SourceError::invalid_request(format!(
                "history start {start} is after end {end}"
            )));
        }

        Ok(Self { ticker, start, end })
    }

    /// The `days` calendar days ending today (UTC).
    pub fn trailing_days(ticker: Ticker, days: u32) -> Self {
        Self::trailing_days_from(ticker, UtcDateTime::now().date(), days)
    }

    pub fn trailing_days_from(ticker: Ticker, end: Date, days: u32) -> Self {
        let start = end
            .checked_sub(Duration::days(i64::from(days)))
            .unwrap_or(Date::MIN);
        Self { ticker, start, end }
    }

    /// Number of calendar days covered, inclusive.
    pub fn span_days(&self) -> i64 {
        (self.end - self.start).whole_days() + 1
    }
}

/// Canonical source error categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceErrorKind {
    Unavailable,
    Timeout,
    InvalidRequest,
    Internal,
}

/// Structured source error with stable code and retry hint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceError {
    kind: SourceErrorKind,
    message: String,
    retryable: bool,
}

impl SourceError {
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::Unavailable,
            message: message.into(),
            retryable: true,
        }
    }

    /// The upstream did not answer within the transport deadline.
    pub fn timeout(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::Timeout,
            message: message.into(),
            retryable: true,
        }
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::InvalidRequest,
            message: message.into(),
            retryable: false,
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::Internal,
            message: message.into(),
            retryable: false,
        }
    }

    pub const fn kind(&self) -> SourceErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn retryable(&self) -> bool {
        self.retryable
    }

    pub const fn code(&self) -> &'static str {
        match self.kind {
            SourceErrorKind::Unavailable => "source.unavailable",
            SourceErrorKind::Timeout => "source.timeout",
            SourceErrorKind::InvalidRequest => "source.invalid_request",
            SourceErrorKind::Internal => "source.internal",
        }
    }
}

impl Display for SourceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.code())
    }
}

impl std::error::Error for SourceError {}

/// Provider of daily closing prices.
///
/// An unknown ticker or a range without trading days is `Ok(vec![])`, not an
/// error; the caller decides whether the history is long enough. Points come
/// back in ascending date order.
pub trait PriceSource: Send + Sync {
    /// Short provider identifier used in logs.
    fn id(&self) -> &'static str;

    fn daily_closes<'a>(&'a self, request: HistoryRequest) -> SourceFuture<'a, Vec<ClosePoint>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::Month;

    fn ticker() -> Ticker {
        Ticker::parse("AAPL").expect("valid")
    }

    #[test]
    fn history_request_rejects_inverted_range() {
        let start = Date::from_calendar_date(2024, Month::March, 2).expect("valid");
        let end = Date::from_calendar_date(2024, Month::March, 1).expect("valid");

        let error = HistoryRequest::new(ticker(), start, end).expect_err("inverted");
        assert_eq!(error.kind(), SourceErrorKind::InvalidRequest);
        assert!(!error.retryable());
    }

    #[test]
    fn trailing_days_spans_requested_window() {
        let end = Date::from_calendar_date(2024, Month::March, 1).expect("valid");
        let request = HistoryRequest::trailing_days_from(ticker(), end, 730);

        assert_eq!(request.end, end);
        assert_eq!(request.span_days(), 731);
        assert_eq!(
            request.start,
            Date::from_calendar_date(2022, Month::March, 2).expect("valid")
        );
    }

    #[test]
    fn error_display_carries_stable_code() {
        let error = SourceError::unavailable("connection reset");
        assert_eq!(error.to_string(), "connection reset (source.unavailable)");
        assert!(error.retryable());
    }

    #[test]
    fn transport_timeout_has_its_own_code() {
        let error = SourceError::timeout("no answer in 10s");
        assert_eq!(error.kind(), SourceErrorKind::Timeout);
        assert_eq!(error.code(), "source.timeout");
        assert!(error.retryable());
    }
}
