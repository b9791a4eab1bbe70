//! Bagged regression trees
//!
//! A random forest predicts the unweighted mean of its trees. Per-tree
//! `weight` fields are accepted in the artifact but ignored.

use crate::errors::{AiCoreError, PredictionError, Result};
use crate::features::FeatureSet;
use crate::gbdt::Tree;
use crate::model::{ensure_finite, ForecastModel};
use crate::types::ModelKind;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ForestParams {
    pub trees: Vec<Tree>,
}

impl ForestParams {
    pub fn validate(&self, feature_count: usize) -> Result<()> {
        if self.trees.is_empty() {
            return Err(AiCoreError::InvalidParameters(
                "forest has no trees".to_string(),
            ));
        }
        for (i, tree) in self.trees.iter().enumerate() {
            tree.validate(feature_count).map_err(|e| {
                AiCoreError::InvalidParameters(format!("Forest tree {i}: {e}"))
            })?;
        }
        Ok(())
    }

    pub fn mean(&self, row: &[f64]) -> Option<f64> {
        let total = self
            .trees
            .iter()
            .try_fold(0.0, |sum, tree| tree.evaluate(row).map(|leaf| sum + leaf))?;
        Some(total / self.trees.len() as f64)
    }
}

#[derive(Debug, Clone)]
pub struct RandomForestModel {
    params: ForestParams,
    features: Vec<String>,
}

impl RandomForestModel {
    pub fn new(params: ForestParams, features: Vec<String>) -> Result<Self> {
        params.validate(features.len())?;
        Ok(Self { params, features })
    }

    pub fn from_slice(bytes: &[u8], features: Vec<String>) -> Result<Self> {
        Self::new(serde_json::from_slice(bytes)?, features)
    }

    pub fn num_trees(&self) -> usize {
        self.params.trees.len()
    }
}

impl ForecastModel for RandomForestModel {
    fn kind(&self) -> ModelKind {
        ModelKind::RandomForest
    }

    fn required_features(&self) -> &[String] {
        &self.features
    }

    fn predict(
        &self,
        features: &FeatureSet,
        _date: Option<NaiveDate>,
    ) -> std::result::Result<f64, PredictionError> {
        let row = features.project(&self.features);
        let mean = self.params.mean(&row).ok_or_else(|| {
            PredictionError::execution(ModelKind::RandomForest, "tree traversal failed")
        })?;
        ensure_finite(ModelKind::RandomForest, mean)
    }
}
