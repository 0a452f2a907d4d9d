use serde::{Deserialize, Serialize};
use time::Date;

use super::timestamp::format_date;
use crate::{Ticker, ValidationError};

/// One trading day's closing price.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClosePoint {
    pub date: Date,
    pub close: f64,
}

impl ClosePoint {
    pub fn new(date: Date, close: f64) -> Result<Self, ValidationError> {
        if !close.is_finite() {
            return Err(ValidationError::NonFiniteValue { field: "close" });
        }
        if close < 0.0 {
            return Err(ValidationError::NegativeValue { field: "close" });
        }
        Ok(Self { date, close })
    }
}

/// Daily closes for one ticker, strictly ascending by date.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceSeries {
    ticker: Ticker,
    points: Vec<ClosePoint>,
}

impl PriceSeries {
    /// Build a series, enforcing non-empty, finite, non-negative closes and
    /// strictly increasing dates.
    pub fn new(ticker: Ticker, points: Vec<ClosePoint>) -> Result<Self, ValidationError> {
        if points.is_empty() {
            return Err(ValidationError::EmptySeries);
        }

        for point in &points {
            ClosePoint::new(point.date, point.close)?;
        }

        for (index, pair) in points.windows(2).enumerate() {
            let (previous, current) = (pair[0].date, pair[1].date);
            if current == previous {
                return Err(ValidationError::DuplicateDate {
                    date: format_date(current),
                });
            }
            if current < previous {
                return Err(ValidationError::UnorderedSeries { index: index + 1 });
            }
        }

        Ok(Self { ticker, points })
    }

    pub fn ticker(&self) -> &Ticker {
        &self.ticker
    }

    pub fn points(&self) -> &[ClosePoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.points.iter().map(|point| point.close).collect()
    }

    /// The series as wire rows, in the same order.
    pub fn to_historical(&self) -> Vec<HistoricalPoint> {
        self.points.iter().map(HistoricalPoint::from).collect()
    }
}

/// A `(Date, Close)` row of the prediction response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalPoint {
    #[serde(rename = "Date")]
    pub date: String,
    #[serde(rename = "Close")]
    pub close: f64,
}

impl From<&ClosePoint> for HistoricalPoint {
    fn from(point: &ClosePoint) -> Self {
        Self {
            date: format_date(point.date),
            close: point.close,
        }
    }
}

/// Forecast plus the history it was computed from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResponse {
    pub prediction: f64,
    pub historical_data: Vec<HistoricalPoint>,
}
