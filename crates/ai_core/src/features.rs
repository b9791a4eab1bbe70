//! Caller-supplied covariates and their projection onto model inputs
//!
//! A `FeatureSet` is a loose name → value map. Models never see it directly:
//! each model projects it onto its own ordered feature list, and anything the
//! caller did not provide is read as 0.0.
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Dense input row in the model's feature order
pub type FeatureVector = Vec<f64>;

/// Named numeric covariates for one prediction
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureSet(BTreeMap<String, f64>);

impl FeatureSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a feature, returning the previous value if any
    pub fn insert(&mut self, name: impl Into<String>, value: f64) -> Option<f64> {
        self.0.insert(name.into(), value)
    }

    /// Builder-style insert
    pub fn with(mut self, name: impl Into<String>, value: f64) -> Self {
        self.insert(name, value);
        self
    }

    /// Raw lookup without defaulting
    pub fn value(&self, name: &str) -> Option<f64> {
        self.0.get(name).copied()
    }

    /// Lookup with the missing-value policy applied.
    ///
    /// Absent names and NaN both read as 0.0.
    pub fn get(&self, name: &str) -> f64 {
        match self.0.get(name) {
            Some(v) if !v.is_nan() => *v,
            _ => 0.0,
        }
    }

    /// Project onto an ordered feature list
    pub fn project(&self, names: &[String]) -> FeatureVector {
        names.iter().map(|name| self.get(name)).collect()
    }

    /// Names in `names` that the caller did not supply
    pub fn missing<'a>(&self, names: &'a [String]) -> Vec<&'a str> {
        names
            .iter()
            .filter(|name| !self.0.contains_key(name.as_str()))
            .map(String::as_str)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

impl<K: Into<String>> FromIterator<(K, f64)> for FeatureSet {
    fn from_iter<I: IntoIterator<Item = (K, f64)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}
