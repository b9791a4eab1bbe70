//! Forecasting facade over the registry, ensemble and scorer

use crate::config::ServiceConfig;
use crate::data::TableStore;
use crate::ensemble::{EnsembleConfig, EnsembleOutcome, EnsemblePredictor};
use crate::errors::{Result, ServiceError};
use crate::history::{HistoryProvider, TableHistory};
use crate::reliability::{
    ErrorMetrics, FleetSummary, ReliabilityConfig, ReliabilityScore, ReliabilityScorer,
};
use chrono::NaiveDate;
use gasbal_ai_core::{FeatureSet, ModelKind};
use gasbal_ai_registry::{FsArtifactStore, ModelRegistry, RegistryStats};
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Entry point for forecasting and scoring requests
pub struct ForecastService {
    registry: Arc<ModelRegistry>,
    ensemble: RwLock<EnsemblePredictor>,
    scorer: ReliabilityScorer,
}

impl ForecastService {
    pub fn new(
        registry: Arc<ModelRegistry>,
        ensemble: EnsembleConfig,
        history: Arc<dyn HistoryProvider>,
        reliability: ReliabilityConfig,
    ) -> Self {
        Self {
            registry,
            ensemble: RwLock::new(EnsemblePredictor::new(ensemble)),
            scorer: ReliabilityScorer::new(history, reliability),
        }
    }

    /// Build the service from configuration, reading artifacts and tables
    /// from the configured directories. Invalid configuration is rejected.
    pub fn from_config(config: &ServiceConfig) -> Result<Self> {
        let validation = config.validate();
        if !validation.is_valid {
            return Err(ServiceError::Config(validation.errors.join("; ")));
        }
        for warning in &validation.warnings {
            warn!("{warning}");
        }

        let store = Arc::new(FsArtifactStore::new(&config.data.models_dir));
        let registry = Arc::new(ModelRegistry::new(store, config.registry.clone()));
        let tables = Arc::new(TableStore::new(&config.data.data_dir));
        let history = Arc::new(TableHistory::new(tables, config.data.history_table.clone()));

        info!(
            models_dir = %config.data.models_dir.display(),
            data_dir = %config.data.data_dir.display(),
            "forecast service initialised"
        );
        Ok(Self::new(
            registry,
            config.ensemble.clone(),
            history,
            config.reliability.clone(),
        ))
    }

    pub fn registry(&self) -> &Arc<ModelRegistry> {
        &self.registry
    }

    pub fn ensemble_config(&self) -> EnsembleConfig {
        self.ensemble.read().config().clone()
    }

    /// Weighted forecast for one valve
    #[instrument(skip(self, features), fields(features = features.len()))]
    pub async fn predict_ensemble(
        &self,
        entity: &str,
        features: &FeatureSet,
        date: Option<NaiveDate>,
    ) -> Result<EnsembleOutcome> {
        let models = self.registry.entity(entity).await?;
        Ok(self.ensemble.read().predict(&models, features, date))
    }

    #[instrument(skip(self))]
    pub fn reliability_score(&self, entity: &str) -> Result<ReliabilityScore> {
        Ok(self.scorer.score(entity)?)
    }

    pub fn model_metrics(&self, entity: &str) -> Result<BTreeMap<ModelKind, ErrorMetrics>> {
        Ok(self.scorer.metrics(entity)?)
    }

    pub fn suggest_weights(&self, entity: &str) -> Result<BTreeMap<ModelKind, f64>> {
        Ok(self.scorer.suggest_weights(entity)?)
    }

    /// Install the suggested weights as the valve's ensemble overrides
    #[instrument(skip(self))]
    pub fn apply_suggested_weights(&self, entity: &str) -> Result<BTreeMap<ModelKind, f64>> {
        let weights = self.scorer.suggest_weights(entity)?;
        self.ensemble
            .write()
            .config_mut()
            .apply_suggestions(entity, &weights)?;
        info!(entity, models = weights.len(), "ensemble weights updated");
        Ok(weights)
    }

    pub async fn available_models(&self, entity: &str) -> Result<BTreeSet<ModelKind>> {
        Ok(self.registry.list_available_models(entity).await?)
    }

    pub fn fleet_summary(&self) -> Result<FleetSummary> {
        Ok(self.scorer.fleet_summary()?)
    }

    pub fn registry_stats(&self) -> RegistryStats {
        self.registry.stats()
    }
}
