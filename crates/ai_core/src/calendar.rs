//! Calendar-indexed decomposition model (Prophet-style export)
//!
//! `y(t) = trend(t) ∘ seasonality(t)` where `∘` is `+` in additive mode and
//! `trend * (1 + s)` in multiplicative mode.
//!
//! - trend: `offset + growth * t + Σ delta_j * max(0, t - day_j)` with `t` in
//!   days since `origin`
//! - seasonality: Fourier series over days since the Unix epoch, period
//!   365.25 (yearly) and 7 (weekly); term `k` (1-based) contributes
//!   `sin_k * sin(2πkt/P) + cos_k * cos(2πkt/P)`

use crate::errors::{AiCoreError, PredictionError, Result};
use crate::features::FeatureSet;
use crate::model::{ensure_finite, ForecastModel};
use crate::types::ModelKind;
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

const YEAR_DAYS: f64 = 365.25;
const WEEK_DAYS: f64 = 7.0;
/// `num_days_from_ce` of 1970-01-01
const EPOCH_DAYS_FROM_CE: i32 = 719_163;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SeasonalityMode {
    #[default]
    Additive,
    Multiplicative,
}

/// Slope change applied from `day` (days since origin) onwards
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Changepoint {
    pub day: f64,
    pub delta: f64,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct FourierTerm {
    #[serde(default)]
    pub sin: f64,
    #[serde(default)]
    pub cos: f64,
}

/// Serialized calendar model parameters
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CalendarParams {
    pub origin: NaiveDate,
    #[serde(default)]
    pub growth: f64,
    #[serde(default)]
    pub offset: f64,
    #[serde(default)]
    pub changepoints: Vec<Changepoint>,
    #[serde(default)]
    pub yearly: Vec<FourierTerm>,
    #[serde(default)]
    pub weekly: Vec<FourierTerm>,
    #[serde(default)]
    pub mode: SeasonalityMode,
}

fn fourier(terms: &[FourierTerm], t: f64, period: f64) -> f64 {
    terms
        .iter()
        .enumerate()
        .map(|(i, term)| {
            let angle = 2.0 * PI * (i + 1) as f64 * t / period;
            term.sin * angle.sin() + term.cos * angle.cos()
        })
        .sum()
}

impl CalendarParams {
    pub fn validate(&self) -> Result<()> {
        let scalars = [self.growth, self.offset];
        let changepoints = self.changepoints.iter().flat_map(|c| [c.day, c.delta]);
        let seasonal = self
            .yearly
            .iter()
            .chain(&self.weekly)
            .flat_map(|t| [t.sin, t.cos]);

        if scalars
            .into_iter()
            .chain(changepoints)
            .chain(seasonal)
            .any(|v| !v.is_finite())
        {
            return Err(AiCoreError::InvalidParameters(
                "calendar model has non-finite coefficients".to_string(),
            ));
        }
        Ok(())
    }

    pub fn trend(&self, date: NaiveDate) -> f64 {
        let t = date.signed_duration_since(self.origin).num_days() as f64;
        let bends: f64 = self
            .changepoints
            .iter()
            .filter(|cp| t > cp.day)
            .map(|cp| cp.delta * (t - cp.day))
            .sum();
        self.offset + self.growth * t + bends
    }

    pub fn seasonality(&self, date: NaiveDate) -> f64 {
        let t = f64::from(date.num_days_from_ce() - EPOCH_DAYS_FROM_CE);
        fourier(&self.yearly, t, YEAR_DAYS) + fourier(&self.weekly, t, WEEK_DAYS)
    }

    pub fn evaluate(&self, date: NaiveDate) -> f64 {
        let trend = self.trend(date);
        let seasonal = self.seasonality(date);
        match self.mode {
            SeasonalityMode::Additive => trend + seasonal,
            SeasonalityMode::Multiplicative => trend * (1.0 + seasonal),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CalendarModel {
    params: CalendarParams,
}

impl CalendarModel {
    pub fn new(params: CalendarParams) -> Result<Self> {
        params.validate()?;
        Ok(Self { params })
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        Self::new(serde_json::from_slice(bytes)?)
    }

    pub fn params(&self) -> &CalendarParams {
        &self.params
    }
}

impl ForecastModel for CalendarModel {
    fn kind(&self) -> ModelKind {
        ModelKind::Prophet
    }

    fn required_features(&self) -> &[String] {
        &[]
    }

    fn predict(
        &self,
        _features: &FeatureSet,
        date: Option<NaiveDate>,
    ) -> std::result::Result<f64, PredictionError> {
        let date = date.ok_or(PredictionError::MissingTimestamp {
            kind: ModelKind::Prophet,
        })?;
        ensure_finite(ModelKind::Prophet, self.params.evaluate(date))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn linear() -> CalendarParams {
        CalendarParams {
            origin: date(2024, 1, 1),
            growth: 2.0,
            offset: 100.0,
            changepoints: vec![],
            yearly: vec![],
            weekly: vec![],
            mode: SeasonalityMode::Additive,
        }
    }

    #[test]
    fn test_requires_date() {
        let model = CalendarModel::new(linear()).unwrap();
        let err = model.predict(&FeatureSet::new(), None).unwrap_err();
        assert_eq!(
            err,
            PredictionError::MissingTimestamp {
                kind: ModelKind::Prophet
            }
        );
    }

    #[test]
    fn test_linear_trend_and_changepoint() {
        let mut params = linear();
        assert_eq!(params.trend(date(2024, 1, 11)), 120.0);

        params.changepoints.push(Changepoint { day: 5.0, delta: -1.0 });
        // 100 + 2*10 - 1*(10-5)
        assert_eq!(params.trend(date(2024, 1, 11)), 115.0);
        // before the changepoint nothing changes
        assert_eq!(params.trend(date(2024, 1, 4)), 106.0);
    }

    #[test]
    fn test_weekly_seasonality_repeats() {
        let mut params = linear();
        params.growth = 0.0;
        params.weekly = vec![FourierTerm { sin: 3.0, cos: 1.0 }];
        let a = params.evaluate(date(2024, 3, 4));
        let b = params.evaluate(date(2024, 3, 11));
        assert!((a - b).abs() < 1e-9);
        assert!((params.seasonality(date(2024, 3, 4))).abs() <= 3.0_f64.hypot(1.0) + 1e-12);
    }

    #[test]
    fn test_multiplicative_mode() {
        let mut params = linear();
        params.growth = 0.0;
        params.yearly = vec![FourierTerm { sin: 0.0, cos: 0.1 }];
        let additive = params.evaluate(date(1970, 1, 1));
        params.mode = SeasonalityMode::Multiplicative;
        let multiplicative = params.evaluate(date(1970, 1, 1));
        // at the epoch cos(0) = 1
        assert!((additive - 100.1).abs() < 1e-9);
        assert!((multiplicative - 110.0).abs() < 1e-9);
    }

    #[test]
    fn test_minimal_json() {
        let model =
            CalendarModel::from_slice(br#"{"origin":"2024-01-01","growth":0.0,"offset":42.0}"#)
                .unwrap();
        let value = model
            .predict(&FeatureSet::new().with("IGNORED", 1.0), Some(date(2025, 6, 1)))
            .unwrap();
        assert_eq!(value, 42.0);
        assert_eq!(model.params().mode, SeasonalityMode::Additive);
    }
}
