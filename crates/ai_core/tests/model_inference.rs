//! Cross-kind inference tests through the public decode path.
//! Every kind is decoded from JSON bytes exactly as the registry would.

use chrono::NaiveDate;
use gasbal_ai_core::{decode_model, FeatureSet, ForecastModel, ModelKind, PredictionError};
use proptest::prelude::*;

fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

const LIGHTGBM: &str = r#"{
    "base_score": 500.0,
    "trees": [
        {"nodes": [
            {"id":0,"feature_idx":0,"threshold":20.0,"left":1,"right":2},
            {"id":1,"leaf":-10.0},
            {"id":2,"leaf":10.0}
        ]},
        {"nodes": [
            {"id":0,"feature_idx":1,"threshold":5.0,"left":1,"right":2},
            {"id":1,"leaf":1.0},
            {"id":2,"leaf":3.0}
        ], "weight": 2.0}
    ]
}"#;

const CATBOOST: &str = r#"{
    "base_score": 480.0,
    "trees": [
        {"splits":[{"feature_idx":0,"border":20.0}],"leaf_values":[0.0,40.0]}
    ]
}"#;

const PROPHET: &str = r#"{
    "origin": "2024-01-01",
    "growth": 0.5,
    "offset": 450.0,
    "yearly": [{"sin": 0.0, "cos": 0.0}]
}"#;

fn feature_models() -> Vec<Box<dyn ForecastModel>> {
    let features = names(&["TEMPERATURA_FINAL", "PRESION_FINAL"]);
    vec![
        decode_model(ModelKind::LightGbm, LIGHTGBM.as_bytes(), features.clone()).unwrap(),
        decode_model(ModelKind::CatBoost, CATBOOST.as_bytes(), features).unwrap(),
    ]
}

#[test]
fn decoded_models_report_their_kind_and_inputs() {
    let models = feature_models();
    assert_eq!(models[0].kind(), ModelKind::LightGbm);
    assert_eq!(models[1].kind(), ModelKind::CatBoost);
    assert_eq!(
        models[0].required_features(),
        &names(&["TEMPERATURA_FINAL", "PRESION_FINAL"])[..]
    );

    let prophet = decode_model(ModelKind::Prophet, PROPHET.as_bytes(), vec![]).unwrap();
    assert!(prophet.required_features().is_empty());
}

#[test]
fn feature_models_predict_from_named_inputs() {
    let models = feature_models();
    let fs = FeatureSet::new()
        .with("TEMPERATURA_FINAL", 25.0)
        .with("PRESION_FINAL", 6.0);

    // 500 + 10 + 3 * 2
    assert_eq!(models[0].predict(&fs, None).unwrap(), 516.0);
    // 480 + 40
    assert_eq!(models[1].predict(&fs, None).unwrap(), 520.0);
}

#[test]
fn calendar_model_needs_date_but_not_features() {
    let prophet = decode_model(ModelKind::Prophet, PROPHET.as_bytes(), vec![]).unwrap();
    let date = NaiveDate::from_ymd_opt(2024, 1, 21).unwrap();

    assert_eq!(
        prophet.predict(&FeatureSet::new(), Some(date)).unwrap(),
        460.0
    );
    assert!(matches!(
        prophet.predict(&FeatureSet::new(), None),
        Err(PredictionError::MissingTimestamp { .. })
    ));
}

proptest! {
    #[test]
    fn missing_or_partial_features_never_fail(
        temperature in proptest::option::of(-50.0f64..80.0),
        pressure in proptest::option::of(0.0f64..100.0),
    ) {
        let mut fs = FeatureSet::new();
        if let Some(t) = temperature {
            fs.insert("TEMPERATURA_FINAL", t);
        }
        if let Some(p) = pressure {
            fs.insert("PRESION_FINAL", p);
        }
        for model in feature_models() {
            let value = model.predict(&fs, None);
            prop_assert!(value.is_ok());
            prop_assert!(value.unwrap().is_finite());
        }
    }

    #[test]
    fn inference_is_deterministic(t in -50.0f64..80.0, p in 0.0f64..100.0) {
        let fs = FeatureSet::new()
            .with("TEMPERATURA_FINAL", t)
            .with("PRESION_FINAL", p);
        for model in feature_models() {
            let first = model.predict(&fs, None).unwrap();
            let second = model.predict(&fs, None).unwrap();
            prop_assert_eq!(first.to_bits(), second.to_bits());
        }
    }
}
