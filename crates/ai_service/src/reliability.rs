//! Forecast accuracy metrics and reliability scoring
//!
//! Metrics are computed per valve and model kind from back-test history.
//! The reliability score of a valve is derived from its best model (lowest
//! MAE among kinds with enough history):
//!
//! ```text
//! e     = MAPE / 100                  when MAPE is defined
//!       = MAE / mean(|actual|)        otherwise, if the mean is non-zero
//!       = MAE                         otherwise
//! score = clamp(100 * (1 - e / error_at_zero_score), 0, 100)
//! ```

use crate::errors::ScoreError;
use crate::history::{EntityHistory, HistoryPair, HistoryProvider};
use gasbal_ai_core::ModelKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Smallest MAE used when inverting errors into weights
const MIN_MAE: f64 = 1e-9;

/// Aggregate error metrics for one model of one valve
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ErrorMetrics {
    pub mae: f64,
    pub rmse: f64,
    /// Percent; `None` when every actual is zero
    pub mape: Option<f64>,
    /// Scaled by the in-sample one-step naive error; `None` when undefined
    pub mase: Option<f64>,
    pub n: usize,
}

impl ErrorMetrics {
    /// `None` for an empty series
    pub fn from_pairs(pairs: &[HistoryPair]) -> Option<Self> {
        if pairs.is_empty() {
            return None;
        }
        let n = pairs.len() as f64;

        let mae = pairs
            .iter()
            .map(|p| (p.actual - p.predicted).abs())
            .sum::<f64>()
            / n;
        let rmse = (pairs
            .iter()
            .map(|p| (p.actual - p.predicted).powi(2))
            .sum::<f64>()
            / n)
            .sqrt();

        let percentage: Vec<f64> = pairs
            .iter()
            .filter(|p| p.actual != 0.0)
            .map(|p| ((p.actual - p.predicted) / p.actual).abs())
            .collect();
        let mape = (!percentage.is_empty())
            .then(|| 100.0 * percentage.iter().sum::<f64>() / percentage.len() as f64);

        let naive_scale = (pairs.len() > 1).then(|| {
            pairs
                .windows(2)
                .map(|w| (w[1].actual - w[0].actual).abs())
                .sum::<f64>()
                / (pairs.len() - 1) as f64
        });
        let mase = naive_scale.filter(|s| *s > 0.0).map(|s| mae / s);

        Some(Self {
            mae,
            rmse,
            mape,
            mase,
            n: pairs.len(),
        })
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReliabilityTier {
    High,
    MediumHigh,
    Medium,
    Low,
}

/// Lower bounds (inclusive) of each tier
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TierThresholds {
    pub high: f64,
    pub medium_high: f64,
    pub medium: f64,
}

impl Default for TierThresholds {
    fn default() -> Self {
        Self {
            high: 80.0,
            medium_high: 70.0,
            medium: 60.0,
        }
    }
}

impl TierThresholds {
    pub fn tier(&self, value: f64) -> ReliabilityTier {
        if value >= self.high {
            ReliabilityTier::High
        } else if value >= self.medium_high {
            ReliabilityTier::MediumHigh
        } else if value >= self.medium {
            ReliabilityTier::Medium
        } else {
            ReliabilityTier::Low
        }
    }

    pub fn is_ordered(&self) -> bool {
        self.high >= self.medium_high && self.medium_high >= self.medium
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ReliabilityConfig {
    /// Pairs a model needs before it counts
    pub min_history: usize,
    /// Relative error at which the score reaches zero
    pub error_at_zero_score: f64,
    pub tiers: TierThresholds,
}

impl Default for ReliabilityConfig {
    fn default() -> Self {
        Self {
            min_history: 3,
            error_at_zero_score: 0.5,
            tiers: TierThresholds::default(),
        }
    }
}

impl ReliabilityConfig {
    /// Map a relative error to a score in [0, 100]
    pub fn score_for_error(&self, relative_error: f64) -> f64 {
        let value = 100.0 * (1.0 - relative_error / self.error_at_zero_score);
        if value.is_nan() {
            0.0
        } else {
            value.clamp(0.0, 100.0)
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReliabilityScore {
    pub entity: String,
    pub value: f64,
    pub tier: ReliabilityTier,
    pub best_model: ModelKind,
    /// Relative error the score was derived from
    pub relative_error: f64,
    pub metrics: BTreeMap<ModelKind, ErrorMetrics>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FleetSummary {
    pub entities_scored: usize,
    pub mean_score: Option<f64>,
    pub by_tier: BTreeMap<ReliabilityTier, usize>,
    pub best_model_counts: BTreeMap<ModelKind, usize>,
    /// Entities without enough history to score
    pub insufficient: Vec<String>,
}

fn metrics_of(history: &EntityHistory) -> BTreeMap<ModelKind, ErrorMetrics> {
    history
        .iter()
        .filter_map(|(kind, pairs)| ErrorMetrics::from_pairs(pairs).map(|m| (*kind, m)))
        .collect()
}

pub struct ReliabilityScorer {
    history: Arc<dyn HistoryProvider>,
    config: ReliabilityConfig,
}

impl ReliabilityScorer {
    pub fn new(history: Arc<dyn HistoryProvider>, config: ReliabilityConfig) -> Self {
        Self { history, config }
    }

    pub fn config(&self) -> &ReliabilityConfig {
        &self.config
    }

    /// Metrics for every kind with at least one pair
    pub fn metrics(&self, entity: &str) -> Result<BTreeMap<ModelKind, ErrorMetrics>, ScoreError> {
        let history = self.history.history(entity)?;
        Ok(metrics_of(&history))
    }

    /// Metrics restricted to kinds with enough history
    fn qualified(
        &self,
        entity: &str,
        metrics: &BTreeMap<ModelKind, ErrorMetrics>,
    ) -> Result<BTreeMap<ModelKind, ErrorMetrics>, ScoreError> {
        let available = metrics.values().map(|m| m.n).max().unwrap_or(0);
        let qualified: BTreeMap<_, _> = metrics
            .iter()
            .filter(|(_, m)| m.n >= self.config.min_history)
            .map(|(kind, m)| (*kind, *m))
            .collect();
        if qualified.is_empty() {
            return Err(ScoreError::InsufficientData {
                entity: entity.to_string(),
                required: self.config.min_history,
                available,
            });
        }
        Ok(qualified)
    }

    /// Score from one read of the entity's history
    #[instrument(skip(self))]
    pub fn score(&self, entity: &str) -> Result<ReliabilityScore, ScoreError> {
        let history = self.history.history(entity)?;
        let metrics = metrics_of(&history);
        let qualified = self.qualified(entity, &metrics)?;

        // Ties go to the first kind in enum order.
        let (best_model, best) = qualified
            .iter()
            .min_by(|a, b| a.1.mae.total_cmp(&b.1.mae))
            .map(|(kind, m)| (*kind, *m))
            .ok_or_else(|| ScoreError::InsufficientData {
                entity: entity.to_string(),
                required: self.config.min_history,
                available: 0,
            })?;

        let relative_error = match best.mape {
            Some(mape) => mape / 100.0,
            None => {
                let mean_abs = history
                    .get(&best_model)
                    .filter(|pairs| !pairs.is_empty())
                    .map(|pairs| {
                        pairs.iter().map(|p| p.actual.abs()).sum::<f64>() / pairs.len() as f64
                    })
                    .unwrap_or(0.0);
                if mean_abs > 0.0 {
                    best.mae / mean_abs
                } else {
                    best.mae
                }
            }
        };

        let value = self.config.score_for_error(relative_error);
        let tier = self.config.tiers.tier(value);
        debug!(entity, %best_model, relative_error, value, ?tier, "reliability scored");

        Ok(ReliabilityScore {
            entity: entity.to_string(),
            value,
            tier,
            best_model,
            relative_error,
            metrics,
        })
    }

    /// Inverse-MAE weights over kinds with enough history, summing to 1
    pub fn suggest_weights(&self, entity: &str) -> Result<BTreeMap<ModelKind, f64>, ScoreError> {
        let metrics = self.metrics(entity)?;
        let qualified = self.qualified(entity, &metrics)?;
        let inverse: BTreeMap<ModelKind, f64> = qualified
            .iter()
            .map(|(kind, m)| (*kind, 1.0 / m.mae.max(MIN_MAE)))
            .collect();
        let total: f64 = inverse.values().sum();
        Ok(inverse
            .into_iter()
            .map(|(kind, w)| (kind, w / total))
            .collect())
    }

    /// Scores across every entity with history
    pub fn fleet_summary(&self) -> Result<FleetSummary, ScoreError> {
        let mut summary = FleetSummary::default();
        let mut total = 0.0;

        for entity in self.history.entities()? {
            match self.score(&entity) {
                Ok(score) => {
                    summary.entities_scored += 1;
                    total += score.value;
                    *summary.by_tier.entry(score.tier).or_default() += 1;
                    *summary.best_model_counts.entry(score.best_model).or_default() += 1;
                }
                Err(ScoreError::InsufficientData { .. }) => summary.insufficient.push(entity),
                Err(e) => return Err(e),
            }
        }

        if summary.entities_scored > 0 {
            summary.mean_score = Some(total / summary.entities_scored as f64);
        }
        info!(
            scored = summary.entities_scored,
            insufficient = summary.insufficient.len(),
            "fleet reliability summary"
        );
        Ok(summary)
    }
}
