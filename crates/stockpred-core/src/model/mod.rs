//! Sequence model contract.
//!
//! The forecaster treats the trained model as a black box mapping a
//! [`Window`] of normalized closes to one normalized scalar. Implementations:
//!
//! | Type | Description |
//! |------|-------------|
//! | [`LstmModel`] | Stacked LSTM + dense head loaded from a JSON weight artifact |
//! | [`FnModel`] | Closure-backed model for tests and fixed-output runs |
//!
//! [`SharedModel`] is the process-wide handle the engine holds: it enforces
//! the input length, serializes calls for models that are not safe to invoke
//! concurrently, and rejects non-finite outputs.

mod lstm;

use std::fmt::{Debug, Formatter};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

pub use lstm::{DenseWeights, LstmArtifact, LstmLayerWeights, LstmModel};

use crate::normalizer::Window;
use crate::ModelError;

/// Trained model: normalized window in, normalized scalar out.
pub trait SequenceModel: Send + Sync {
    fn predict(&self, window: &Window) -> Result<f64, ModelError>;

    fn name(&self) -> &str;

    /// Input length the model was trained on, if it fixes one.
    fn window_size(&self) -> Option<usize> {
        None
    }

    /// Whether `predict` may run on several threads at once.
    fn is_concurrent(&self) -> bool {
        false
    }
}

/// Model backed by a plain function.
pub struct FnModel<F> {
    name: String,
    func: F,
}

impl<F> FnModel<F>
where
    F: Fn(&[f64]) -> Result<f64, ModelError> + Send + Sync,
{
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }
}

impl<F> SequenceModel for FnModel<F>
where
    F: Fn(&[f64]) -> Result<f64, ModelError> + Send + Sync,
{
    fn predict(&self, window: &Window) -> Result<f64, ModelError> {
        (self.func)(window.as_slice())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// A model that always answers `value`.
pub fn constant_model(
    value: f64,
) -> FnModel<impl Fn(&[f64]) -> Result<f64, ModelError> + Send + Sync> {
    FnModel::new("constant", move |_: &[f64]| Ok(value))
}

/// Process-wide model handle.
pub struct SharedModel {
    model: Arc<dyn SequenceModel>,
    slot: Mutex<()>,
}

impl SharedModel {
    pub fn new(model: Arc<dyn SequenceModel>) -> Self {
        Self {
            model,
            slot: Mutex::new(()),
        }
    }

    pub fn from_model<M>(model: M) -> Self
    where
        M: SequenceModel + 'static,
    {
        Self::new(Arc::new(model))
    }

    pub fn name(&self) -> &str {
        self.model.name()
    }

    pub fn window_size(&self) -> Option<usize> {
        self.model.window_size()
    }

    /// Blocking inference call.
    pub fn predict(&self, window: &Window) -> Result<f64, ModelError> {
        self.predict_unless_cancelled(window, &AtomicBool::new(false))
    }

    /// Like [`predict`](Self::predict), but gives up with
    /// [`ModelError::Cancelled`] if `cancelled` is set by the time the call
    /// reaches the model. A caller that stopped waiting while queued behind
    /// another inference never runs its own.
    pub fn predict_unless_cancelled(
        &self,
        window: &Window,
        cancelled: &AtomicBool,
    ) -> Result<f64, ModelError> {
        if let Some(expected) = self.model.window_size() {
            if window.len() != expected {
                return Err(ModelError::ShapeMismatch {
                    expected,
                    actual: window.len(),
                });
            }
        }

        let value = if self.model.is_concurrent() {
            if cancelled.load(Ordering::Acquire) {
                return Err(ModelError::Cancelled);
            }
            self.model.predict(window)?
        } else {
            let _guard = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
            if cancelled.load(Ordering::Acquire) {
                return Err(ModelError::Cancelled);
            }
            self.model.predict(window)?
        };

        if !value.is_finite() {
            return Err(ModelError::NonFiniteOutput { value });
        }
        Ok(value)
    }
}

impl Debug for SharedModel {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedModel")
            .field("model", &self.model.name())
            .field("concurrent", &self.model.is_concurrent())
            .finish()
    }
}
