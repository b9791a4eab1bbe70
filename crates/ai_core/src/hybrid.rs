//! Composite model: calendar trend plus sequence residual
//!
//! Artifact layout: `{"trend": <calendar params>, "residual": <lstm params>}`.
//! Either component may be missing from an artifact exported mid-training;
//! the model still loads but refuses to predict.

use crate::calendar::CalendarParams;
use crate::errors::{AiCoreError, PredictionError, Result};
use crate::features::FeatureSet;
use crate::model::{ensure_finite, ForecastModel};
use crate::sequence::LstmParams;
use crate::types::ModelKind;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct HybridParams {
    #[serde(default)]
    pub trend: Option<CalendarParams>,
    #[serde(default)]
    pub residual: Option<LstmParams>,
}

#[derive(Debug, Clone)]
pub struct HybridModel {
    params: HybridParams,
    window: Vec<String>,
}

fn unavailable(component: &'static str, reason: &str) -> PredictionError {
    PredictionError::ComponentUnavailable {
        kind: ModelKind::Hybrid,
        component,
        reason: reason.to_string(),
    }
}

impl HybridModel {
    pub fn new(params: HybridParams, window: Vec<String>) -> Result<Self> {
        if let Some(trend) = &params.trend {
            trend.validate()?;
        }
        if let Some(residual) = &params.residual {
            residual.validate()?;
        }
        if params.trend.is_none() && params.residual.is_none() {
            return Err(AiCoreError::InvalidParameters(
                "hybrid artifact has neither trend nor residual".to_string(),
            ));
        }
        Ok(Self { params, window })
    }

    pub fn from_slice(bytes: &[u8], window: Vec<String>) -> Result<Self> {
        Self::new(serde_json::from_slice(bytes)?, window)
    }

    pub fn is_complete(&self) -> bool {
        self.params.trend.is_some() && self.params.residual.is_some()
    }
}

impl ForecastModel for HybridModel {
    fn kind(&self) -> ModelKind {
        ModelKind::Hybrid
    }

    fn required_features(&self) -> &[String] {
        &self.window
    }

    fn predict(
        &self,
        features: &FeatureSet,
        date: Option<NaiveDate>,
    ) -> std::result::Result<f64, PredictionError> {
        let trend = self
            .params
            .trend
            .as_ref()
            .ok_or_else(|| unavailable("trend", "missing from artifact"))?;
        let residual = self
            .params
            .residual
            .as_ref()
            .ok_or_else(|| unavailable("residual", "missing from artifact"))?;
        let date = date.ok_or_else(|| unavailable("trend", "no calendar date supplied"))?;

        let window = features.project(&self.window);
        let value = trend.evaluate(date) + residual.predict_window(&window);
        ensure_finite(ModelKind::Hybrid, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sequence::MinMaxScaler;

    fn trend() -> CalendarParams {
        serde_json::from_str(r#"{"origin":"2024-01-01","growth":1.0,"offset":1000.0}"#).unwrap()
    }

    fn residual() -> LstmParams {
        LstmParams {
            hidden_size: 1,
            input_weights: vec![0.0; 4],
            recurrent_weights: vec![vec![0.0]; 4],
            bias: vec![0.0; 4],
            dense_weights: vec![0.0],
            dense_bias: 0.25,
            scaler: MinMaxScaler {
                min: -40.0,
                max: 40.0,
            },
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_trend_plus_residual() {
        let params = HybridParams {
            trend: Some(trend()),
            residual: Some(residual()),
        };
        let model = HybridModel::new(params, vec!["RESIDUO_LAG_1".into()]).unwrap();
        assert!(model.is_complete());
        // trend 1000 + 10, residual 0.25 * 80 - 40
        let value = model
            .predict(&FeatureSet::new(), Some(date(2024, 1, 11)))
            .unwrap();
        assert_eq!(value, 990.0);
    }

    #[test]
    fn test_missing_component() {
        let params = HybridParams {
            trend: Some(trend()),
            residual: None,
        };
        let model = HybridModel::new(params, vec!["RESIDUO_LAG_1".into()]).unwrap();
        let err = model
            .predict(&FeatureSet::new(), Some(date(2024, 1, 11)))
            .unwrap_err();
        assert!(matches!(
            err,
            PredictionError::ComponentUnavailable {
                component: "residual",
                ..
            }
        ));
    }

    #[test]
    fn test_missing_date_is_component_failure() {
        let params = HybridParams {
            trend: Some(trend()),
            residual: Some(residual()),
        };
        let model = HybridModel::new(params, vec!["RESIDUO_LAG_1".into()]).unwrap();
        let err = model.predict(&FeatureSet::new(), None).unwrap_err();
        assert!(matches!(
            err,
            PredictionError::ComponentUnavailable {
                component: "trend",
                ..
            }
        ));
    }

    #[test]
    fn test_empty_artifact_rejected() {
        assert!(HybridModel::from_slice(b"{}", vec!["X".into()]).is_err());
    }
}
