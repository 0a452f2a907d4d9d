//! Min-max window normalization.
//!
//! The sequence model was trained on closes rescaled to `[0, 1]` over the
//! whole fetched history, so serving must rebuild exactly that mapping per
//! request and invert it on the model output:
//!
//! ```text
//! scaled = (v - min) / (max - min)
//! price  = scaled * (max - min) + min
//! ```
//!
//! A [`NormalizationState`] is produced by every fit and travels with the
//! window it describes; nothing here is shared between requests.

use crate::{PredictionError, ValidationError};

/// Number of consecutive closes the model consumes.
pub const TIME_STEPS: usize = 60;

/// Observed `(min, max)` range of one fitted series.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalizationState {
    min: f64,
    max: f64,
}

impl NormalizationState {
    /// Fit over `values`.
    pub fn fit(values: &[f64]) -> Result<Self, ValidationError> {
        let mut iter = values.iter().copied();
        let first = iter.next().ok_or(ValidationError::EmptySeries)?;
        if !first.is_finite() {
            return Err(ValidationError::NonFiniteValue { field: "close" });
        }

        let (mut min, mut max) = (first, first);
        for value in iter {
            if !value.is_finite() {
                return Err(ValidationError::NonFiniteValue { field: "close" });
            }
            min = min.min(value);
            max = max.max(value);
        }

        Ok(Self { min, max })
    }

    pub const fn min(&self) -> f64 {
        self.min
    }

    pub const fn max(&self) -> f64 {
        self.max
    }

    pub fn range(&self) -> f64 {
        self.max - self.min
    }

    /// A constant series: every value equals `min`.
    pub fn is_flat(&self) -> bool {
        self.range() <= 0.0
    }

    /// Forward map. Flat series map every value to `0.0`.
    pub fn transform(&self, value: f64) -> f64 {
        if self.is_flat() {
            0.0
        } else {
            (value - self.min) / self.range()
        }
    }

    /// Inverse map back to price units. For a flat series this is
    /// `scaled * 0 + min == min`.
    pub fn inverse(&self, scaled: f64) -> f64 {
        scaled * self.range() + self.min
    }
}

/// Fixed-length model input: the newest `TIME_STEPS` normalized closes.
#[derive(Debug, Clone, PartialEq)]
pub struct Window(Vec<f64>);

impl Window {
    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = f64> + '_ {
        self.0.iter().copied()
    }

    pub fn into_inner(self) -> Vec<f64> {
        self.0
    }
}

impl AsRef<[f64]> for Window {
    fn as_ref(&self) -> &[f64] {
        self.as_slice()
    }
}

/// Builds model windows of a fixed size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowNormalizer {
    window_size: usize,
}

impl Default for WindowNormalizer {
    fn default() -> Self {
        Self::new(TIME_STEPS)
    }
}

impl WindowNormalizer {
    pub fn new(window_size: usize) -> Self {
        Self {
            window_size: window_size.max(1),
        }
    }

    pub const fn window_size(&self) -> usize {
        self.window_size
    }

    /// Fit min/max over the full series and rescale every value.
    pub fn fit_transform(
        &self,
        values: &[f64],
    ) -> Result<(NormalizationState, Vec<f64>), ValidationError> {
        let state = NormalizationState::fit(values)?;
        let scaled = values.iter().map(|value| state.transform(*value)).collect();
        Ok((state, scaled))
    }

    /// Undo [`fit_transform`](Self::fit_transform) for a model output.
    pub fn inverse(&self, state: &NormalizationState, scaled: f64) -> f64 {
        state.inverse(scaled)
    }

    /// The final `window_size` values of an already-normalized series.
    pub fn last_window(&self, normalized: &[f64]) -> Result<Window, PredictionError> {
        self.ensure_history(normalized.len())?;
        let start = normalized.len() - self.window_size;
        Ok(Window(normalized[start..].to_vec()))
    }

    /// Length gate, run before any fitting.
    pub fn ensure_history(&self, observed: usize) -> Result<(), PredictionError> {
        if observed < self.window_size {
            return Err(PredictionError::InsufficientHistory {
                observed,
                required: self.window_size,
            });
        }
        Ok(())
    }

    /// Length check, fit, and window extraction in pipeline order.
    pub fn prepare(&self, closes: &[f64]) -> Result<(NormalizationState, Window), PredictionError> {
        self.ensure_history(closes.len())?;
        let (state, normalized) = self.fit_transform(closes).map_err(history_error)?;
        let window = self.last_window(&normalized)?;
        Ok((state, window))
    }
}

// Bad closes reaching the normalizer mean the upstream delivered garbage.
fn history_error(error: ValidationError) -> PredictionError {
    PredictionError::DataFetchFailure(crate::SourceError::internal(format!(
        "unusable price history: {error}"
    )))
}
