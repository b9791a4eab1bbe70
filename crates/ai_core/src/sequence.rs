//! Single-layer LSTM over a univariate lookback window
//!
//! The manifest's feature list for a sequence model is its window, oldest
//! first (e.g. `VOLUMEN_LAG_7` .. `VOLUMEN_LAG_1`). Inputs are min-max scaled,
//! run through the recurrent cell, read out by a dense head and scaled back.
//!
//! Gate rows are stacked in the order input, forget, cell, output; each block
//! has `hidden_size` rows.

use crate::errors::{AiCoreError, PredictionError, Result};
use crate::features::FeatureSet;
use crate::model::{ensure_finite, ForecastModel};
use crate::types::ModelKind;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Min-max scaling fitted on the training series
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct MinMaxScaler {
    pub min: f64,
    pub max: f64,
}

impl MinMaxScaler {
    fn span(&self) -> f64 {
        self.max - self.min
    }

    pub fn scale(&self, x: f64) -> f64 {
        (x - self.min) / self.span()
    }

    pub fn unscale(&self, y: f64) -> f64 {
        y * self.span() + self.min
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LstmParams {
    pub hidden_size: usize,
    /// `4 * hidden_size` input-to-gate weights
    pub input_weights: Vec<f64>,
    /// `4 * hidden_size` rows of `hidden_size` recurrent weights
    pub recurrent_weights: Vec<Vec<f64>>,
    /// `4 * hidden_size` gate biases
    pub bias: Vec<f64>,
    pub dense_weights: Vec<f64>,
    #[serde(default)]
    pub dense_bias: f64,
    pub scaler: MinMaxScaler,
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

impl LstmParams {
    pub fn validate(&self) -> Result<()> {
        let h = self.hidden_size;
        let gates = 4 * h;
        let invalid = |msg: String| Err(AiCoreError::InvalidParameters(msg));

        if h == 0 {
            return invalid("hidden_size must be positive".to_string());
        }
        if self.input_weights.len() != gates || self.bias.len() != gates {
            return invalid(format!(
                "expected {gates} input weights and biases, found {} and {}",
                self.input_weights.len(),
                self.bias.len()
            ));
        }
        if self.recurrent_weights.len() != gates
            || self.recurrent_weights.iter().any(|row| row.len() != h)
        {
            return invalid(format!("recurrent weights must be {gates}x{h}"));
        }
        if self.dense_weights.len() != h {
            return invalid(format!(
                "expected {h} dense weights, found {}",
                self.dense_weights.len()
            ));
        }
        let span = self.scaler.span();
        if !span.is_finite() || span <= 0.0 {
            return invalid(format!(
                "scaler range [{}, {}] is empty",
                self.scaler.min, self.scaler.max
            ));
        }

        let all = self
            .input_weights
            .iter()
            .chain(&self.bias)
            .chain(self.recurrent_weights.iter().flatten())
            .chain(&self.dense_weights)
            .chain(std::iter::once(&self.dense_bias));
        if all.copied().any(|v| !v.is_finite()) {
            return invalid("LSTM weights must be finite".to_string());
        }
        Ok(())
    }

    /// Run the cell over a raw (unscaled) window and return the unscaled output
    pub fn predict_window(&self, window: &[f64]) -> f64 {
        let h = self.hidden_size;
        let mut hidden = vec![0.0; h];
        let mut cell = vec![0.0; h];
        let mut gates = vec![0.0; 4 * h];

        for &raw in window {
            let x = self.scaler.scale(raw);
            for (row, gate) in gates.iter_mut().enumerate() {
                let recurrent: f64 = self.recurrent_weights[row]
                    .iter()
                    .zip(&hidden)
                    .map(|(w, h)| w * h)
                    .sum();
                *gate = self.input_weights[row] * x + recurrent + self.bias[row];
            }
            for j in 0..h {
                let input = sigmoid(gates[j]);
                let forget = sigmoid(gates[h + j]);
                let candidate = gates[2 * h + j].tanh();
                let output = sigmoid(gates[3 * h + j]);
                cell[j] = forget * cell[j] + input * candidate;
                hidden[j] = output * cell[j].tanh();
            }
        }

        let scaled: f64 = self
            .dense_weights
            .iter()
            .zip(&hidden)
            .map(|(w, h)| w * h)
            .sum::<f64>()
            + self.dense_bias;
        self.scaler.unscale(scaled)
    }
}

#[derive(Debug, Clone)]
pub struct LstmModel {
    params: LstmParams,
    window: Vec<String>,
}

impl LstmModel {
    pub fn new(params: LstmParams, window: Vec<String>) -> Result<Self> {
        params.validate()?;
        if window.is_empty() {
            return Err(AiCoreError::InvalidParameters(
                "sequence model needs a non-empty lookback window".to_string(),
            ));
        }
        Ok(Self { params, window })
    }

    pub fn from_slice(bytes: &[u8], window: Vec<String>) -> Result<Self> {
        Self::new(serde_json::from_slice(bytes)?, window)
    }

    pub fn params(&self) -> &LstmParams {
        &self.params
    }
}

impl ForecastModel for LstmModel {
    fn kind(&self) -> ModelKind {
        ModelKind::Lstm
    }

    fn required_features(&self) -> &[String] {
        &self.window
    }

    fn predict(
        &self,
        features: &FeatureSet,
        _date: Option<NaiveDate>,
    ) -> std::result::Result<f64, PredictionError> {
        let window = features.project(&self.window);
        ensure_finite(ModelKind::Lstm, self.params.predict_window(&window))
    }
}
