//! Leaf-wise gradient boosted trees (LightGBM-style export)
//!
//! Prediction is `base_score + Σ leaf(tree) * tree.weight`. Leaf values are
//! expected to already include the learning-rate shrinkage, as exported by
//! the offline pipeline.

use super::tree::Tree;
use crate::errors::{AiCoreError, PredictionError, Result};
use crate::features::FeatureSet;
use crate::model::{ensure_finite, ForecastModel};
use crate::types::ModelKind;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

fn default_version() -> i32 {
    1
}

/// Serialized parameters of a boosted tree ensemble
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BoostedTrees {
    /// Artifact format version (always 1 for now)
    #[serde(default = "default_version")]
    pub version: i32,

    /// Initial prediction before any tree is added
    #[serde(default)]
    pub base_score: f64,

    /// Decision trees in the ensemble
    pub trees: Vec<Tree>,
}

impl BoostedTrees {
    pub fn new(trees: Vec<Tree>, base_score: f64) -> Self {
        Self {
            version: 1,
            base_score,
            trees,
        }
    }

    /// Validate structure against the declared feature count
    pub fn validate(&self, feature_count: usize) -> Result<()> {
        if self.version != 1 {
            return Err(AiCoreError::UnsupportedFormat(format!(
                "boosted trees version {}",
                self.version
            )));
        }
        if !self.base_score.is_finite() {
            return Err(AiCoreError::InvalidParameters(format!(
                "base_score is not finite: {}",
                self.base_score
            )));
        }
        if self.trees.is_empty() {
            return Err(AiCoreError::InvalidParameters(
                "boosted ensemble has no trees".to_string(),
            ));
        }
        for (i, tree) in self.trees.iter().enumerate() {
            tree.validate(feature_count).map_err(|e| {
                AiCoreError::InvalidParameters(format!("Tree {i} validation failed: {e}"))
            })?;
        }
        Ok(())
    }

    /// Raw score for a projected row; `None` on malformed traversal
    pub fn score(&self, row: &[f64]) -> Option<f64> {
        self.trees.iter().try_fold(self.base_score, |sum, tree| {
            tree.evaluate(row).map(|leaf| sum + leaf * tree.weight)
        })
    }

    pub fn num_trees(&self) -> usize {
        self.trees.len()
    }
}

/// Boosted tree model bound to its ordered feature list
#[derive(Debug, Clone)]
pub struct LightGbmModel {
    params: BoostedTrees,
    features: Vec<String>,
}

impl LightGbmModel {
    pub fn new(params: BoostedTrees, features: Vec<String>) -> Result<Self> {
        params.validate(features.len())?;
        Ok(Self { params, features })
    }

    pub fn from_slice(bytes: &[u8], features: Vec<String>) -> Result<Self> {
        Self::new(serde_json::from_slice(bytes)?, features)
    }

    pub fn params(&self) -> &BoostedTrees {
        &self.params
    }
}

impl ForecastModel for LightGbmModel {
    fn kind(&self) -> ModelKind {
        ModelKind::LightGbm
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
        let score = self.params.score(&row).ok_or_else(|| {
            PredictionError::execution(ModelKind::LightGbm, "tree traversal failed")
        })?;
        ensure_finite(ModelKind::LightGbm, score)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gbdt::tree::Node;

    fn features() -> Vec<String> {
        vec!["PRESION_FINAL".to_string(), "TEMPERATURA_FINAL".to_string()]
    }

    fn create_test_params() -> BoostedTrees {
        let tree1 = Tree::new(
            vec![
                Node::internal(0, 0, 50.0, 1, 2),
                Node::leaf(1, 100.0),
                Node::leaf(2, 200.0),
            ],
            1.0,
        );
        let tree2 = Tree::new(
            vec![
                Node::internal(0, 1, 30.0, 1, 2),
                Node::leaf(1, -50.0),
                Node::leaf(2, 50.0),
            ],
            0.5,
        );
        BoostedTrees::new(vec![tree1, tree2], 10.0)
    }

    #[test]
    fn test_score_accumulates_weighted_leaves() {
        let params = create_test_params();
        // 10 + 100 * 1.0 + (-50) * 0.5
        assert_eq!(params.score(&[30.0, 20.0]), Some(85.0));
        // 10 + 200 * 1.0 + 50 * 0.5
        assert_eq!(params.score(&[60.0, 40.0]), Some(235.0));
    }

    #[test]
    fn test_predict_projects_named_features() {
        let model = LightGbmModel::new(create_test_params(), features()).unwrap();
        let fs = FeatureSet::new()
            .with("TEMPERATURA_FINAL", 40.0)
            .with("PRESION_FINAL", 60.0)
            .with("UNUSED", 1e9);
        assert_eq!(model.predict(&fs, None).unwrap(), 235.0);
    }

    #[test]
    fn test_missing_features_read_as_zero() {
        let model = LightGbmModel::new(create_test_params(), features()).unwrap();
        // both features 0.0 -> left, left
        assert_eq!(model.predict(&FeatureSet::new(), None).unwrap(), 85.0);
    }

    #[test]
    fn test_validation_rejects_out_of_range_feature() {
        let err = LightGbmModel::new(create_test_params(), vec!["ONLY_ONE".to_string()]);
        assert!(err.is_err());

        let mut params = create_test_params();
        params.version = 7;
        assert!(params.validate(2).is_err());

        assert!(BoostedTrees::new(vec![], 0.0).validate(2).is_err());
    }

    #[test]
    fn test_deterministic_inference_repeated() {
        let model = LightGbmModel::new(create_test_params(), features()).unwrap();
        let fs = FeatureSet::new().with("PRESION_FINAL", 42.0);
        let first = model.predict(&fs, None).unwrap();
        assert!((0..100).all(|_| model.predict(&fs, None).unwrap() == first));
    }
}
