//! Type definitions for the AI Core module

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Kind of trained model available for a valve.
///
/// Ordering is the declaration order and drives the deterministic iteration
/// order of registries and ensembles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ModelKind {
    /// Calendar-indexed additive decomposition (trend + seasonality)
    Prophet,
    /// Leaf-wise gradient boosted trees
    LightGbm,
    /// Oblivious (symmetric) gradient boosted trees
    CatBoost,
    /// Bagged regression trees
    RandomForest,
    /// Recurrent sequence model over a lookback window
    Lstm,
    /// Calendar trend plus sequence residual
    Hybrid,
}

impl ModelKind {
    /// Every supported kind, in iteration order
    pub const ALL: [ModelKind; 6] = [
        ModelKind::Prophet,
        ModelKind::LightGbm,
        ModelKind::CatBoost,
        ModelKind::RandomForest,
        ModelKind::Lstm,
        ModelKind::Hybrid,
    ];

    /// Canonical lowercase name used in manifests, file names and configs
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelKind::Prophet => "prophet",
            ModelKind::LightGbm => "lightgbm",
            ModelKind::CatBoost => "catboost",
            ModelKind::RandomForest => "randomforest",
            ModelKind::Lstm => "lstm",
            ModelKind::Hybrid => "hybrid",
        }
    }

    /// Whether the model consumes a named feature list from the caller.
    ///
    /// Sequence and hybrid models read their lookback window through the
    /// same ordered list, so they count as feature-driven here.
    pub fn uses_features(&self) -> bool {
        !matches!(self, ModelKind::Prophet)
    }

    /// Whether a calendar date is needed to produce a prediction
    pub fn requires_timestamp(&self) -> bool {
        matches!(self, ModelKind::Prophet | ModelKind::Hybrid)
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown model kind name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownModelKind(pub String);

impl fmt::Display for UnknownModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown model kind: {}", self.0)
    }
}

impl std::error::Error for UnknownModelKind {}

impl FromStr for ModelKind {
    type Err = UnknownModelKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "prophet" => Ok(ModelKind::Prophet),
            "lightgbm" | "lgbm" => Ok(ModelKind::LightGbm),
            "catboost" => Ok(ModelKind::CatBoost),
            "randomforest" | "random_forest" | "rf" => Ok(ModelKind::RandomForest),
            "lstm" | "hybrid_lstm" => Ok(ModelKind::Lstm),
            "hybrid" | "hybrid_prophet" => Ok(ModelKind::Hybrid),
            _ => Err(UnknownModelKind(s.to_string())),
        }
    }
}

// Plain string (de)serialization so kinds work as map keys in JSON and TOML.
impl Serialize for ModelKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ModelKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct KindVisitor;

        impl<'de> Visitor<'de> for KindVisitor {
            type Value = ModelKind;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a model kind name such as \"lightgbm\"")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<ModelKind, E> {
                v.parse().map_err(E::custom)
            }
        }

        deserializer.deserialize_str(KindVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_kind_names_roundtrip() {
        for kind in ModelKind::ALL {
            assert_eq!(kind.as_str().parse::<ModelKind>().unwrap(), kind);
        }
        assert_eq!("LGBM".parse::<ModelKind>().unwrap(), ModelKind::LightGbm);
        assert!("xgboost".parse::<ModelKind>().is_err());
    }

    #[test]
    fn test_kind_as_map_key() {
        let mut weights = BTreeMap::new();
        weights.insert(ModelKind::CatBoost, 0.3);
        weights.insert(ModelKind::Prophet, 0.2);

        let json = serde_json::to_string(&weights).unwrap();
        assert_eq!(json, r#"{"prophet":0.2,"catboost":0.3}"#);

        let back: BTreeMap<ModelKind, f64> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, weights);
    }

    #[test]
    fn test_feature_and_timestamp_requirements() {
        assert!(!ModelKind::Prophet.uses_features());
        assert!(ModelKind::Prophet.requires_timestamp());
        assert!(ModelKind::CatBoost.uses_features());
        assert!(!ModelKind::CatBoost.requires_timestamp());
        assert!(ModelKind::Hybrid.uses_features());
        assert!(ModelKind::Hybrid.requires_timestamp());
    }
}
