//! # Domain Models
//!
//! Request-scoped values that flow through the prediction pipeline.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Ticker`] | Validated, upper-cased market ticker |
//! | [`ClosePoint`] | One trading day's close |
//! | [`PriceSeries`] | Ascending, duplicate-free daily closes for one ticker |
//! | [`HistoricalPoint`] | `{Date, Close}` row returned to callers |
//! | [`PredictionResponse`] | Forecast plus the history it came from |
//! | [`UtcDateTime`] | UTC timestamp |
//!
//! All constructors validate their invariants; a [`PriceSeries`] that exists is
//! never empty, never out of order, and never holds a NaN.

mod series;
mod ticker;
mod timestamp;

pub use series::{ClosePoint, HistoricalPoint, PredictionResponse, PriceSeries};
pub use ticker::Ticker;
pub use timestamp::{format_date, UtcDateTime};
