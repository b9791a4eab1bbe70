//! Weighted ensemble over per-model volume forecasts
//!
//! Every kind declared for a valve is run; kinds that fail are logged and
//! reported as skipped. The survivors are averaged with their configured
//! weights renormalised to sum to one. With no survivor the outcome is
//! [`EnsembleOutcome::NoPredictionAvailable`], never a number.

use crate::errors::WeightError;
use chrono::NaiveDate;
use gasbal_ai_core::{FeatureSet, ModelKind, PredictionError};
use gasbal_ai_registry::EntityModels;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Weight policy: per-entity override, then per-kind default, then fallback
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EnsembleConfig {
    pub default_weights: BTreeMap<ModelKind, f64>,
    pub fallback_weight: f64,
    pub entity_overrides: BTreeMap<String, BTreeMap<ModelKind, f64>>,
}

impl Default for EnsembleConfig {
    fn default() -> Self {
        let default_weights = BTreeMap::from([
            (ModelKind::Prophet, 0.2),
            (ModelKind::LightGbm, 0.25),
            (ModelKind::RandomForest, 0.25),
            (ModelKind::CatBoost, 0.3),
        ]);
        Self {
            default_weights,
            fallback_weight: 0.2,
            entity_overrides: BTreeMap::new(),
        }
    }
}

fn check_weight(key: impl Into<String>, value: f64) -> Result<(), WeightError> {
    if value.is_finite() && value > 0.0 && value <= 1.0 {
        Ok(())
    } else {
        Err(WeightError {
            key: key.into(),
            value,
        })
    }
}

impl EnsembleConfig {
    /// Configured (not yet renormalised) weight for one model
    pub fn weight_for(&self, entity: &str, kind: ModelKind) -> f64 {
        self.entity_overrides
            .get(entity)
            .and_then(|weights| weights.get(&kind))
            .or_else(|| self.default_weights.get(&kind))
            .copied()
            .unwrap_or(self.fallback_weight)
    }

    pub fn validate(&self) -> Result<(), WeightError> {
        check_weight("fallback", self.fallback_weight)?;
        for (kind, weight) in &self.default_weights {
            check_weight(kind.as_str(), *weight)?;
        }
        for (entity, weights) in &self.entity_overrides {
            for (kind, weight) in weights {
                check_weight(format!("{entity}/{kind}"), *weight)?;
            }
        }
        Ok(())
    }

    /// Install per-entity weights, typically from the reliability scorer
    pub fn apply_suggestions(
        &mut self,
        entity: &str,
        weights: &BTreeMap<ModelKind, f64>,
    ) -> Result<(), WeightError> {
        for (kind, weight) in weights {
            check_weight(format!("{entity}/{kind}"), *weight)?;
        }
        self.entity_overrides
            .insert(entity.to_string(), weights.clone());
        Ok(())
    }

    pub fn clear_overrides(&mut self, entity: &str) -> bool {
        self.entity_overrides.remove(entity).is_some()
    }
}

/// One model's contribution to an ensemble forecast
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WeightedPrediction {
    pub kind: ModelKind,
    pub prediction: f64,
    /// Weight from configuration
    pub weight: f64,
    /// Weight after renormalising over the successful models
    pub normalized_weight: f64,
}

/// A kind excluded from the blend and why
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SkippedModel {
    pub kind: ModelKind,
    pub reason: String,
}

impl From<&PredictionError> for SkippedModel {
    fn from(err: &PredictionError) -> Self {
        Self {
            kind: err.kind(),
            reason: err.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EnsembleResult {
    pub entity: String,
    pub prediction: f64,
    pub contributions: Vec<WeightedPrediction>,
    pub skipped: Vec<SkippedModel>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum EnsembleOutcome {
    Predicted(EnsembleResult),
    NoPredictionAvailable {
        entity: String,
        skipped: Vec<SkippedModel>,
    },
}

impl EnsembleOutcome {
    pub fn prediction(&self) -> Option<f64> {
        match self {
            Self::Predicted(result) => Some(result.prediction),
            Self::NoPredictionAvailable { .. } => None,
        }
    }

    pub fn skipped(&self) -> &[SkippedModel] {
        match self {
            Self::Predicted(result) => &result.skipped,
            Self::NoPredictionAvailable { skipped, .. } => skipped,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct EnsemblePredictor {
    config: EnsembleConfig,
}

impl EnsemblePredictor {
    pub fn new(config: EnsembleConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EnsembleConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut EnsembleConfig {
        &mut self.config
    }

    /// Run every declared kind for the entity and blend the survivors
    pub fn predict(
        &self,
        models: &EntityModels,
        features: &FeatureSet,
        date: Option<NaiveDate>,
    ) -> EnsembleOutcome {
        let outcomes = models
            .configured()
            .into_iter()
            .map(|kind| (kind, models.predict(kind, features, date)));
        self.combine(models.entity(), outcomes)
    }

    /// Blend per-kind outcomes. Order of the input is preserved in the result.
    pub fn combine<I>(&self, entity: &str, outcomes: I) -> EnsembleOutcome
    where
        I: IntoIterator<Item = (ModelKind, Result<f64, PredictionError>)>,
    {
        let mut successes = Vec::new();
        let mut skipped = Vec::new();

        for (kind, outcome) in outcomes {
            match outcome {
                Ok(prediction) if prediction.is_finite() => successes.push((kind, prediction)),
                Ok(prediction) => {
                    warn!(entity, %kind, prediction, "discarding non-finite prediction");
                    skipped.push(SkippedModel {
                        kind,
                        reason: format!("non-finite prediction {prediction}"),
                    });
                }
                Err(err) => {
                    warn!(entity, %kind, error = %err, "model excluded from ensemble");
                    skipped.push(SkippedModel::from(&err));
                }
            }
        }

        if successes.is_empty() {
            warn!(entity, skipped = skipped.len(), "no model produced a prediction");
            return EnsembleOutcome::NoPredictionAvailable {
                entity: entity.to_string(),
                skipped,
            };
        }

        let weights: Vec<f64> = successes
            .iter()
            .map(|(kind, _)| self.config.weight_for(entity, *kind))
            .collect();
        let total: f64 = weights.iter().sum();

        let contributions: Vec<WeightedPrediction> = successes
            .iter()
            .zip(&weights)
            .map(|(&(kind, prediction), &weight)| WeightedPrediction {
                kind,
                prediction,
                weight,
                normalized_weight: weight / total,
            })
            .collect();

        let prediction = if let [only] = contributions.as_slice() {
            only.prediction
        } else {
            contributions
                .iter()
                .map(|c| c.normalized_weight * c.prediction)
                .sum()
        };

        debug!(
            entity,
            prediction,
            models = contributions.len(),
            skipped = skipped.len(),
            "ensemble prediction"
        );

        EnsembleOutcome::Predicted(EnsembleResult {
            entity: entity.to_string(),
            prediction,
            contributions,
            skipped,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn predictor_with(entity: &str, weights: &[(ModelKind, f64)]) -> EnsemblePredictor {
        let mut config = EnsembleConfig::default();
        config
            .apply_suggestions(entity, &weights.iter().copied().collect())
            .unwrap();
        EnsemblePredictor::new(config)
    }

    #[test]
    fn test_default_weights() {
        let config = EnsembleConfig::default();
        assert_eq!(config.weight_for("V1", ModelKind::Prophet), 0.2);
        assert_eq!(config.weight_for("V1", ModelKind::LightGbm), 0.25);
        assert_eq!(config.weight_for("V1", ModelKind::RandomForest), 0.25);
        assert_eq!(config.weight_for("V1", ModelKind::CatBoost), 0.3);
        assert_eq!(config.weight_for("V1", ModelKind::Lstm), 0.2);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_override_precedence() {
        let predictor = predictor_with("V1", &[(ModelKind::CatBoost, 0.9)]);
        let config = predictor.config();
        assert_eq!(config.weight_for("V1", ModelKind::CatBoost), 0.9);
        // other kinds of the same entity fall back to the defaults
        assert_eq!(config.weight_for("V1", ModelKind::LightGbm), 0.25);
        assert_eq!(config.weight_for("V2", ModelKind::CatBoost), 0.3);
    }

    #[test]
    fn test_weighted_mean() {
        let predictor = predictor_with(
            "E1",
            &[(ModelKind::LightGbm, 0.4), (ModelKind::CatBoost, 0.6)],
        );
        let outcome = predictor.combine(
            "E1",
            vec![(ModelKind::LightGbm, Ok(100.0)), (ModelKind::CatBoost, Ok(120.0))],
        );
        let result = match outcome {
            EnsembleOutcome::Predicted(result) => result,
            other => panic!("unexpected {other:?}"),
        };
        assert!((result.prediction - 112.0).abs() < 1e-9);
        let total: f64 = result.contributions.iter().map(|c| c.normalized_weight).sum();
        assert!((total - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_non_finite_success_is_skipped() {
        let predictor = EnsemblePredictor::default();
        let outcome = predictor.combine(
            "V1",
            vec![
                (ModelKind::LightGbm, Ok(f64::NAN)),
                (ModelKind::CatBoost, Ok(80.0)),
            ],
        );
        assert_eq!(outcome.prediction(), Some(80.0));
        assert_eq!(outcome.skipped().len(), 1);
        assert_eq!(outcome.skipped()[0].kind, ModelKind::LightGbm);
    }

    #[test]
    fn test_invalid_weights_rejected() {
        let mut config = EnsembleConfig::default();
        for bad in [0.0, -0.1, 1.5, f64::NAN, f64::INFINITY] {
            let weights = BTreeMap::from([(ModelKind::Lstm, bad)]);
            assert!(config.apply_suggestions("V1", &weights).is_err());
        }
        assert!(config.entity_overrides.is_empty());

        config.fallback_weight = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_outcome_json_shape() {
        let outcome = EnsembleOutcome::NoPredictionAvailable {
            entity: "E2".to_string(),
            skipped: vec![],
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "no_prediction_available");
        assert_eq!(json["entity"], "E2");
    }
}
