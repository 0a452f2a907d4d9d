use std::path::Path;

use ndarray::{s, Array1, Array2};
use serde::{Deserialize, Serialize};

use super::SequenceModel;
use crate::normalizer::Window;
use crate::ModelError;

/// Weight artifact exported from the offline trainer.
///
/// Matrices follow the Keras layout: `kernel` is `input_dim x 4*units`,
/// `recurrent_kernel` is `units x 4*units`, gate blocks ordered i, f, c, o.
/// Every LSTM layer but the last feeds its full output sequence to the next.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LstmArtifact {
    pub sequence_length: usize,
    pub lstm: Vec<LstmLayerWeights>,
    pub dense: DenseWeights,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LstmLayerWeights {
    pub units: usize,
    pub kernel: Vec<Vec<f64>>,
    pub recurrent_kernel: Vec<Vec<f64>>,
    pub bias: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DenseWeights {
    pub kernel: Vec<Vec<f64>>,
    pub bias: Vec<f64>,
}

#[derive(Debug, Clone)]
struct LstmLayer {
    units: usize,
    kernel: Array2<f64>,
    recurrent_kernel: Array2<f64>,
    bias: Array1<f64>,
}

impl LstmLayer {
    /// Run the layer over `inputs` (`timesteps x input_dim`) from a zero
    /// state, returning the hidden state at every step.
    fn forward(&self, inputs: &Array2<f64>) -> Array2<f64> {
        let units = self.units;
        let mut hidden = Array1::<f64>::zeros(units);
        let mut cell = Array1::<f64>::zeros(units);
        let mut outputs = Array2::<f64>::zeros((inputs.nrows(), units));

        for (step, x) in inputs.rows().into_iter().enumerate() {
            let z = x.dot(&self.kernel) + hidden.dot(&self.recurrent_kernel) + &self.bias;

            let input_gate = z.slice(s![0..units]).mapv(sigmoid);
            let forget_gate = z.slice(s![units..2 * units]).mapv(sigmoid);
            let candidate = z.slice(s![2 * units..3 * units]).mapv(f64::tanh);
            let output_gate = z.slice(s![3 * units..4 * units]).mapv(sigmoid);

            cell = &forget_gate * &cell + &input_gate * &candidate;
            hidden = &output_gate * &cell.mapv(f64::tanh);
            outputs.row_mut(step).assign(&hidden);
        }

        outputs
    }
}

/// Stacked LSTM regressor with a single-output dense head.
#[derive(Debug, Clone)]
pub struct LstmModel {
    sequence_length: usize,
    layers: Vec<LstmLayer>,
    dense_kernel: Array2<f64>,
    dense_bias: Array1<f64>,
}

impl LstmModel {
    pub fn from_artifact(artifact: LstmArtifact) -> Result<Self, ModelError> {
        if artifact.sequence_length == 0 {
            return Err(invalid("sequence_length must be positive"));
        }
        if artifact.lstm.is_empty() {
            return Err(invalid("at least one lstm layer is required"));
        }

        let mut input_dim = 1;
        let mut layers = Vec::with_capacity(artifact.lstm.len());
        for (index, weights) in artifact.lstm.into_iter().enumerate() {
            let units = weights.units;
            if units == 0 {
                return Err(invalid(format!("lstm[{index}].units must be positive")));
            }
            let gates = 4 * units;

            let kernel = matrix(
                &format!("lstm[{index}].kernel"),
                weights.kernel,
                (input_dim, gates),
            )?;
            let recurrent_kernel = matrix(
                &format!("lstm[{index}].recurrent_kernel"),
                weights.recurrent_kernel,
                (units, gates),
            )?;
            let bias = vector(&format!("lstm[{index}].bias"), weights.bias, gates)?;

            layers.push(LstmLayer {
                units,
                kernel,
                recurrent_kernel,
                bias,
            });
            input_dim = units;
        }

        let dense_kernel = matrix("dense.kernel", artifact.dense.kernel, (input_dim, 1))?;
        let dense_bias = vector("dense.bias", artifact.dense.bias, 1)?;

        Ok(Self {
            sequence_length: artifact.sequence_length,
            layers,
            dense_kernel,
            dense_bias,
        })
    }

    pub fn from_json_str(json: &str) -> Result<Self, ModelError> {
        let artifact: LstmArtifact = serde_json::from_str(json)
            .map_err(|error| invalid(format!("malformed JSON: {error}")))?;
        Self::from_artifact(artifact)
    }

    /// Load a weight artifact from disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ModelError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|error| ModelError::Io(format!("{}: {error}", path.display())))?;
        let model = Self::from_json_str(&json)?;
        tracing::info!(
            path = %path.display(),
            layers = model.layers.len(),
            sequence_length = model.sequence_length,
            "loaded lstm model"
        );
        Ok(model)
    }

    pub fn sequence_length(&self) -> usize {
        self.sequence_length
    }

    fn forward(&self, window: &[f64]) -> f64 {
        let mut activations = Array2::from_shape_fn((window.len(), 1), |(row, _)| window[row]);
        for layer in &self.layers {
            activations = layer.forward(&activations);
        }

        let last = activations.row(activations.nrows() - 1);
        let output = last.dot(&self.dense_kernel) + &self.dense_bias;
        output[0]
    }
}

impl SequenceModel for LstmModel {
    fn predict(&self, window: &Window) -> Result<f64, ModelError> {
        if window.len() != self.sequence_length {
            return Err(ModelError::ShapeMismatch {
                expected: self.sequence_length,
                actual: window.len(),
            });
        }
        Ok(self.forward(window.as_slice()))
    }

    fn name(&self) -> &str {
        "lstm"
    }

    fn window_size(&self) -> Option<usize> {
        Some(self.sequence_length)
    }

    fn is_concurrent(&self) -> bool {
        true
    }
}

fn sigmoid(value: f64) -> f64 {
    1.0 / (1.0 + (-value).exp())
}

fn invalid(message: impl Into<String>) -> ModelError {
    ModelError::InvalidArtifact(message.into())
}

fn matrix(
    name: &str,
    rows: Vec<Vec<f64>>,
    (expected_rows, expected_cols): (usize, usize),
) -> Result<Array2<f64>, ModelError> {
    if rows.len() != expected_rows || rows.iter().any(|row| row.len() != expected_cols) {
        let actual_cols = rows.first().map(Vec::len).unwrap_or(0);
        return Err(invalid(format!(
            "{name} must be {expected_rows}x{expected_cols}, got {}x{actual_cols}",
            rows.len()
        )));
    }

    let flat: Vec<f64> = rows.into_iter().flatten().collect();
    if flat.iter().any(|value| !value.is_finite()) {
        return Err(invalid(format!("{name} contains non-finite weights")));
    }
    Array2::from_shape_vec((expected_rows, expected_cols), flat)
        .map_err(|error| invalid(format!("{name}: {error}")))
}

fn vector(name: &str, values: Vec<f64>, expected: usize) -> Result<Array1<f64>, ModelError> {
    if values.len() != expected {
        return Err(invalid(format!(
            "{name} must have {expected} values, got {}",
            values.len()
        )));
    }
    if values.iter().any(|value| !value.is_finite()) {
        return Err(invalid(format!("{name} contains non-finite weights")));
    }
    Ok(Array1::from_vec(values))
}
