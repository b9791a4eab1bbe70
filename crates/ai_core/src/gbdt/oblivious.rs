//! Oblivious (symmetric) boosted trees, CatBoost-style
//!
//! Every level of an oblivious tree applies the same split, so a tree of
//! depth `d` is `d` (feature, border) pairs plus `2^d` leaf values. Split `i`
//! sets bit `i` of the leaf index when `feature > border`.

use crate::errors::{AiCoreError, PredictionError, Result};
use crate::features::FeatureSet;
use crate::model::{ensure_finite, ForecastModel};
use crate::types::ModelKind;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Largest supported tree depth (CatBoost caps at 16)
pub const MAX_DEPTH: usize = 16;

/// One level of an oblivious tree
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ObliviousSplit {
    #[serde(alias = "feature")]
    pub feature_idx: usize,
    pub border: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ObliviousTree {
    pub splits: Vec<ObliviousSplit>,
    pub leaf_values: Vec<f64>,
}

impl ObliviousTree {
    pub fn leaf_index(&self, row: &[f64]) -> usize {
        self.splits
            .iter()
            .enumerate()
            .fold(0usize, |idx, (depth, split)| {
                if row[split.feature_idx] > split.border {
                    idx | (1 << depth)
                } else {
                    idx
                }
            })
    }

    fn validate(&self, feature_count: usize) -> std::result::Result<(), String> {
        if self.splits.len() > MAX_DEPTH {
            return Err(format!("depth {} exceeds {MAX_DEPTH}", self.splits.len()));
        }
        let expected = 1usize << self.splits.len();
        if self.leaf_values.len() != expected {
            return Err(format!(
                "expected {expected} leaf values, found {}",
                self.leaf_values.len()
            ));
        }
        if let Some(split) = self.splits.iter().find(|s| s.feature_idx >= feature_count) {
            return Err(format!(
                "split on feature {} but only {feature_count} features are declared",
                split.feature_idx
            ));
        }
        if self.splits.iter().any(|s| s.border.is_nan()) {
            return Err("NaN border".to_string());
        }
        if self.leaf_values.iter().any(|v| !v.is_finite()) {
            return Err("non-finite leaf value".to_string());
        }
        Ok(())
    }
}

/// Serialized CatBoost-style parameters
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ObliviousEnsemble {
    #[serde(default)]
    pub base_score: f64,
    /// Multiplier applied to the summed leaves
    #[serde(default = "unit_scale")]
    pub scale: f64,
    pub trees: Vec<ObliviousTree>,
}

fn unit_scale() -> f64 {
    1.0
}

impl ObliviousEnsemble {
    pub fn score(&self, row: &[f64]) -> f64 {
        let leaves: f64 = self
            .trees
            .iter()
            .map(|tree| tree.leaf_values[tree.leaf_index(row)])
            .sum();
        self.scale * leaves + self.base_score
    }

    pub fn validate(&self, feature_count: usize) -> Result<()> {
        if self.trees.is_empty() {
            return Err(AiCoreError::InvalidParameters(
                "oblivious ensemble has no trees".to_string(),
            ));
        }
        if !self.scale.is_finite() || !self.base_score.is_finite() {
            return Err(AiCoreError::InvalidParameters(
                "scale and base_score must be finite".to_string(),
            ));
        }
        for (i, tree) in self.trees.iter().enumerate() {
            tree.validate(feature_count).map_err(|e| {
                AiCoreError::InvalidParameters(format!("Oblivious tree {i}: {e}"))
            })?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct CatBoostModel {
    params: ObliviousEnsemble,
    features: Vec<String>,
}

impl CatBoostModel {
    pub fn new(params: ObliviousEnsemble, features: Vec<String>) -> Result<Self> {
        params.validate(features.len())?;
        Ok(Self { params, features })
    }

    pub fn from_slice(bytes: &[u8], features: Vec<String>) -> Result<Self> {
        Self::new(serde_json::from_slice(bytes)?, features)
    }
}

impl ForecastModel for CatBoostModel {
    fn kind(&self) -> ModelKind {
        ModelKind::CatBoost
    }

    fn required_features(&self) -> &[String] {
        &self.features
    }

    fn predict(
        &self,
        features: &FeatureSet,
        _date: Option<NaiveDate>,
    ) -> std::result::Result<f64, PredictionError> {
        // Validation pinned every split inside the projected row.
        let row = features.project(&self.features);
        ensure_finite(ModelKind::CatBoost, self.params.score(&row))
    }
}
