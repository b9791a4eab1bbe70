//! Tree ensemble models
//!
//! - `tree`: flat-vector regression trees shared by boosted and bagged models
//! - `model`: leaf-wise boosted trees (`lightgbm` artifacts)
//! - `oblivious`: symmetric boosted trees (`catboost` artifacts)
//!
//! # Artifact format
//!
//! ```json
//! {
//!   "version": 1,
//!   "base_score": 1520.5,
//!   "trees": [
//!     {
//!       "nodes": [
//!         {"id":0,"left":1,"right":2,"feature_idx":3,"threshold":12.75},
//!         {"id":1,"leaf":-23.4},
//!         {"id":2,"leaf":45.6}
//!       ],
//!       "weight": 1.0
//!     }
//!   ]
//! }
//! ```
//!
//! `feature_idx` indexes the ordered feature list recorded for the model in
//! the valve manifest.

pub mod model;
pub mod oblivious;
pub mod tree;

pub use model::{BoostedTrees, LightGbmModel};
pub use oblivious::{CatBoostModel, ObliviousEnsemble, ObliviousSplit, ObliviousTree};
pub use tree::{Node, Tree};

#[cfg(test)]
mod integration_tests {
    use super::*;
    use crate::features::FeatureSet;
    use crate::model::{decode_model, ForecastModel};
    use crate::types::ModelKind;

    #[test]
    fn test_documented_format_decodes() {
        let json = r#"{
            "version": 1,
            "base_score": 1520.5,
            "trees": [{
                "nodes": [
                    {"id":0,"left":1,"right":2,"feature_idx":3,"threshold":12.75},
                    {"id":1,"leaf":-23.4},
                    {"id":2,"leaf":45.6}
                ],
                "weight": 1.0
            }]
        }"#;
        let features: Vec<String> = ["A", "B", "C", "D"].iter().map(|s| s.to_string()).collect();
        let model = decode_model(ModelKind::LightGbm, json.as_bytes(), features).unwrap();

        let low = model
            .predict(&FeatureSet::new().with("D", 12.0), None)
            .unwrap();
        let high = model
            .predict(&FeatureSet::new().with("D", 13.0), None)
            .unwrap();
        assert!((low - 1497.1).abs() < 1e-9);
        assert!((high - 1566.1).abs() < 1e-9);
    }

    #[test]
    fn test_boosted_json_roundtrip() {
        let tree = Tree::new(
            vec![
                Node::internal(0, 0, 50.0, 1, 2),
                Node::leaf(1, 100.0),
                Node::leaf(2, 200.0),
            ],
            1.0,
        );
        let params = BoostedTrees::new(vec![tree], 12.5);
        let json = crate::serde_canon::to_canonical_json(&params).unwrap();
        let restored: BoostedTrees = serde_json::from_str(&json).unwrap();
        assert_eq!(params, restored);
        assert_eq!(params.score(&[30.0]), restored.score(&[30.0]));
    }
}
