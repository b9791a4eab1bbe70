//! Uniform calling convention over heterogeneous model kinds
//!
//! Every kind implements [`ForecastModel`]: given the caller's covariates and
//! an optional calendar date, produce one scalar volume forecast. Kind-specific
//! input needs (a date for calendar models, an ordered feature row for tree
//! models, a lookback window for sequence models) stay inside each
//! implementation.

use crate::calendar::CalendarModel;
use crate::errors::{AiCoreError, PredictionError, Result};
use crate::features::FeatureSet;
use crate::forest::RandomForestModel;
use crate::gbdt::{CatBoostModel, LightGbmModel};
use crate::hybrid::HybridModel;
use crate::sequence::LstmModel;
use crate::types::ModelKind;
use chrono::NaiveDate;
use std::fmt;
use tracing::debug;

/// A loaded, immutable forecasting model
pub trait ForecastModel: Send + Sync + fmt::Debug {
    /// Kind this implementation serves
    fn kind(&self) -> ModelKind;

    /// Ordered input names; empty for calendar-only models
    fn required_features(&self) -> &[String];

    /// Produce one forecast. Deterministic for identical inputs.
    fn predict(
        &self,
        features: &FeatureSet,
        date: Option<NaiveDate>,
    ) -> std::result::Result<f64, PredictionError>;
}

/// Decode an artifact blob into the implementation for `kind`.
///
/// `features` is the ordered list from the valve manifest. It is ignored for
/// calendar models and mandatory for every other kind.
pub fn decode_model(
    kind: ModelKind,
    bytes: &[u8],
    features: Vec<String>,
) -> Result<Box<dyn ForecastModel>> {
    if kind.uses_features() && features.is_empty() {
        return Err(AiCoreError::InvalidParameters(format!(
            "{kind} model declares no input features"
        )));
    }

    let model: Box<dyn ForecastModel> = match kind {
        ModelKind::Prophet => Box::new(CalendarModel::from_slice(bytes)?),
        ModelKind::LightGbm => Box::new(LightGbmModel::from_slice(bytes, features)?),
        ModelKind::CatBoost => Box::new(CatBoostModel::from_slice(bytes, features)?),
        ModelKind::RandomForest => Box::new(RandomForestModel::from_slice(bytes, features)?),
        ModelKind::Lstm => Box::new(LstmModel::from_slice(bytes, features)?),
        ModelKind::Hybrid => Box::new(HybridModel::from_slice(bytes, features)?),
    };

    debug!(
        kind = %kind,
        bytes = bytes.len(),
        features = model.required_features().len(),
        "decoded model artifact"
    );
    Ok(model)
}

/// Reject NaN/inf outputs so they never reach the ensemble as a success
pub(crate) fn ensure_finite(
    kind: ModelKind,
    value: f64,
) -> std::result::Result<f64, PredictionError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(PredictionError::execution(
            kind,
            format!("non-finite prediction {value}"),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feature_models_need_feature_list() {
        let bytes = br#"{"base_score":1.0,"trees":[{"nodes":[{"leaf":2.0}]}]}"#;
        let err = decode_model(ModelKind::LightGbm, bytes, vec![]).unwrap_err();
        assert!(matches!(err, AiCoreError::InvalidParameters(_)));

        let model = decode_model(ModelKind::LightGbm, bytes, vec!["X".into()]).unwrap();
        assert_eq!(model.kind(), ModelKind::LightGbm);
        assert_eq!(model.predict(&FeatureSet::new(), None).unwrap(), 3.0);
    }

    #[test]
    fn test_calendar_model_ignores_feature_list() {
        let bytes = br#"{"origin":"2024-01-01","growth":0.0,"offset":42.0}"#;
        let model = decode_model(ModelKind::Prophet, bytes, vec!["IGNORED".into()]).unwrap();
        assert!(model.required_features().is_empty());
    }

    #[test]
    fn test_garbage_bytes_fail_to_decode() {
        let err = decode_model(ModelKind::CatBoost, b"not json", vec!["X".into()]).unwrap_err();
        assert!(matches!(err, AiCoreError::Serialization(_)));
    }

    #[test]
    fn test_ensure_finite() {
        assert_eq!(ensure_finite(ModelKind::Lstm, 1.5).unwrap(), 1.5);
        assert!(ensure_finite(ModelKind::Lstm, f64::NAN).is_err());
        assert!(ensure_finite(ModelKind::Lstm, f64::INFINITY).is_err());
    }
}
