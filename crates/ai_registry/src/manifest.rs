//! Per-valve model manifest.
//!
//! A manifest is the metadata record written by the offline training
//! pipeline next to a valve's artifacts. It names the model kinds that were
//! trained, the ordered input list each kind expects and, optionally, the
//! blake3 digest of every artifact so the registry can refuse tampered or
//! half-written files.
//!
//! ```json
//! {
//!   "entity": "VALVULA_01",
//!   "available_models": ["prophet", "lightgbm", "catboost"],
//!   "features_by_model": {
//!     "lightgbm": ["TEMPERATURA_FINAL", "PRESION_FINAL", "VOLUMEN_LAG_1"],
//!     "catboost": ["TEMPERATURA_FINAL", "PRESION_FINAL"]
//!   },
//!   "artifact_hashes": { "lightgbm": "5d41…" }
//! }
//! ```
//!
//! The pipeline's legacy field names (`modelos_disponibles`,
//! `features_por_modelo`) are accepted as aliases.

use crate::errors::{RegistryError, Result};
use gasbal_ai_core::ModelKind;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct EntityManifest {
    /// Valve key; filled from the lookup key when absent
    #[serde(default)]
    pub entity: String,

    /// Kinds trained for this valve
    #[serde(alias = "modelos_disponibles")]
    pub available_models: Vec<ModelKind>,

    /// Ordered inputs per kind
    #[serde(default, alias = "features_por_modelo")]
    pub features_by_model: BTreeMap<ModelKind, Vec<String>>,

    /// blake3 hex digest of each artifact's bytes
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub artifact_hashes: BTreeMap<ModelKind, String>,
}

impl EntityManifest {
    pub fn new(entity: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            ..Self::default()
        }
    }

    /// Declare a kind with its ordered inputs
    pub fn with_model<I, S>(mut self, kind: ModelKind, features: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if !self.available_models.contains(&kind) {
            self.available_models.push(kind);
        }
        let features: Vec<String> = features.into_iter().map(Into::into).collect();
        if !features.is_empty() {
            self.features_by_model.insert(kind, features);
        }
        self
    }

    pub fn with_artifact_hash(mut self, kind: ModelKind, digest: impl Into<String>) -> Self {
        self.artifact_hashes.insert(kind, digest.into());
        self
    }

    /// Declared kinds in deterministic order
    pub fn kinds(&self) -> BTreeSet<ModelKind> {
        self.available_models.iter().copied().collect()
    }

    /// Ordered inputs for `kind`; always empty for calendar models
    pub fn features_for(&self, kind: ModelKind) -> &[String] {
        if !kind.uses_features() {
            return &[];
        }
        self.features_by_model
            .get(&kind)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn artifact_hash(&self, kind: ModelKind) -> Option<&str> {
        self.artifact_hashes.get(&kind).map(String::as_str)
    }

    /// Check internal consistency.
    ///
    /// Feature lists and hashes may only reference declared kinds, and a kind
    /// may be declared once.
    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: String| RegistryError::InvalidManifest {
            entity: self.entity.clone(),
            reason,
        };

        if self.entity.trim().is_empty() {
            return Err(invalid("entity key is empty".to_string()));
        }

        let kinds = self.kinds();
        if kinds.len() != self.available_models.len() {
            return Err(invalid("a model kind is declared twice".to_string()));
        }
        if let Some(kind) = self
            .features_by_model
            .keys()
            .chain(self.artifact_hashes.keys())
            .find(|k| !kinds.contains(k))
        {
            return Err(invalid(format!("{kind} is referenced but not declared")));
        }
        Ok(())
    }
}
